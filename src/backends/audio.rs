// SPDX-License-Identifier: MPL-2.0

//! Audio input abstraction

use crate::backends::camera::types::{AudioFormat, AudioSink, BackendResult};

/// Represents an audio input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub name: String,
    /// Backend-specific stable identifier
    pub id: String,
    pub is_default: bool,
}

/// An opened microphone
pub trait AudioInput: Send {
    fn device(&self) -> &AudioDevice;

    /// Format of every buffer this input delivers
    fn format(&self) -> AudioFormat;

    /// Begin delivering buffers into `sink`
    fn start(&mut self, sink: AudioSink) -> BackendResult<()>;

    /// Stop delivering buffers. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
