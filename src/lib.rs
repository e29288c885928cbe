// SPDX-License-Identifier: MPL-2.0

//! Thermal Camera - filtered capture, preview and recording core
//!
//! This library drives a camera session, runs every frame through a
//! selectable filter, and fans the result out to a live preview, still
//! photos and video recordings.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera, microphone and permission abstraction
//! - [`controller`]: The capture session worker and its handle
//! - [`filters`]: Filter selection and the per-frame filter engine
//! - [`pipelines`]: Preview, still capture and recording pipelines
//! - [`media`]: Reading recorded media back through GStreamer
//! - [`config`]: User configuration handling
//! - [`storage`]: Media file naming, history and thumbnails
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use thermal_camera::backends::permissions::StaticPermissions;
//! use thermal_camera::backends::virtual_camera::VirtualProvider;
//! use thermal_camera::pipelines::video::default_encoder_factory;
//! use thermal_camera::{CaptureController, ControllerOptions, FilterType};
//!
//! let controller = CaptureController::new(
//!     Arc::new(VirtualProvider::new()),
//!     Arc::new(StaticPermissions::granted()),
//!     default_encoder_factory()?,
//!     ControllerOptions::default(),
//! )?;
//! let _preview = controller.start().wait()?;
//! controller.set_filter(FilterType::Thermal);
//! let (_frame, path) = controller.capture_photo().wait()?;
//! println!("saved {}", path.display());
//! # Ok::<(), thermal_camera::CameraError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod filters;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{CameraPosition, SessionState, VideoFrame};
pub use config::Config;
pub use constants::BitratePreset;
pub use controller::{CaptureController, CaptureEvent, CaptureMode, ControllerOptions};
pub use errors::{CameraError, CameraResult};
pub use filters::{FilterEngine, FilterType};
pub use storage::MediaArtifact;
