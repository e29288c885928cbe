// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │  CaptureController  │  ← session worker, fan-out, recording
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← inputs, outputs, configuration units
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraProvider trait│  ← device lookup and opening
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   ┌────────────────┐
//!   │ VirtualCamera  │  ← concrete implementation (tests inject their own)
//!   └────────────────┘
//! ```

pub mod controls;
pub mod frame_loop;
pub mod session;
pub mod types;

pub use controls::{
    ConfigurationLock, DeviceCapabilities, DeviceControls, DeviceSettings, ExposureMode,
    FocusMode, FocusOutcome, NormalizedPoint,
};
pub use session::{CaptureSession, SessionConfiguration, SessionOutput, SessionState};
pub use types::*;

use crate::backends::audio::{AudioDevice, AudioInput};
use std::sync::Arc;

/// Device discovery and opening
///
/// All device lookups go through this trait, so the controller never
/// reaches for a global "default device".
pub trait CameraProvider: Send + Sync {
    /// Enumerate available cameras
    fn cameras(&self) -> Vec<CameraDevice>;

    /// Enumerate available microphones
    fn microphones(&self) -> Vec<AudioDevice>;

    /// First camera facing `position`
    fn default_camera(&self, position: CameraPosition) -> Option<CameraDevice> {
        self.cameras().into_iter().find(|c| c.position == position)
    }

    /// The system default microphone, or the first one found
    fn default_microphone(&self) -> Option<AudioDevice> {
        let microphones = self.microphones();
        microphones
            .iter()
            .find(|m| m.is_default)
            .or_else(|| microphones.first())
            .cloned()
    }

    /// Open a camera. The returned input is not running yet.
    fn open_camera(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraInput>>;

    /// Open a microphone. The returned input is not running yet.
    fn open_microphone(&self, device: &AudioDevice) -> BackendResult<Box<dyn AudioInput>>;
}

/// An opened camera
pub trait CameraInput: Send {
    fn device(&self) -> &CameraDevice;

    /// Still usable; a disconnected input can not be attached to a session
    fn is_connected(&self) -> bool;

    /// Begin delivering frames into `sink`
    fn start(&mut self, sink: VideoSink) -> BackendResult<()>;

    /// Stop delivering frames. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Hardware controls of this very device
    fn controls(&self) -> Arc<DeviceControls>;

    /// The device's still-photo output
    fn photo_output(&self) -> Arc<dyn PhotoOutput>;
}

/// One-shot still capture, independent of the continuous frame path
pub trait PhotoOutput: Send + Sync {
    fn capture_still(&self) -> BackendResult<VideoFrame>;
}
