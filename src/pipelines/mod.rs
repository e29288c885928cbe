// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines behind the capture session
//!
//! ```text
//!                      ┌────────────────┐
//!                ┌───▶ │  PreviewSink   │  latest frame only
//! ┌────────────┐ │     └────────────────┘
//! │  filtered  │─┤
//! │   frame    │ │     ┌────────────────┐     ┌──────────────┐
//! └────────────┘ └───▶ │ RecordingMuxer │ ──▶ │  AVI / MP4   │
//!                      └────────────────┘     └──────────────┘
//!
//! ┌────────────┐       ┌────────────────┐     ┌──────────────┐
//! │ PhotoOutput│ ────▶ │  StillCapture  │ ──▶ │  JPEG / PNG  │
//! └────────────┘       └────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`preview`]: single-slot preview channel
//! - [`video`]: recording muxer and encoders
//! - [`photo`]: still capture and image encoding

pub mod photo;
pub mod preview;
pub mod video;
