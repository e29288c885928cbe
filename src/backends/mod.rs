// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera and audio capture
//!
//! The backend layer hides hardware access behind traits, so the controller
//! works the same against real devices, the synthetic devices and the
//! scripted devices used by tests:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              CaptureController               │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │ AudioInput  │    │ CameraProvider   │   │
//! │  └─────────────┘    │ CameraInput      │   │
//! │  ┌─────────────┐    │ PhotoOutput      │   │
//! │  │ Permissions │    └──────────────────┘   │
//! │  └─────────────┘    ┌──────────────────┐   │
//! │                     │ Virtual devices  │   │
//! │                     └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`audio`]: Microphone abstraction
//! - [`camera`]: Camera traits, capture session and device controls
//! - [`permissions`]: Camera and microphone access requests
//! - [`virtual_camera`]: Synthetic camera and microphone

pub mod audio;
pub mod camera;
pub mod permissions;
pub mod virtual_camera;
