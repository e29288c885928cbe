// SPDX-License-Identifier: GPL-3.0-only

//! Capture session: which devices are attached and which outputs are wired
//!
//! Inputs and outputs can only be changed inside [`CaptureSession::configure`];
//! the mutating methods live on [`SessionConfiguration`], which only exists
//! for the duration of that call. Changes are applied to running hardware when
//! the configuration unit ends.

use super::types::{AudioFormat, AudioSink, BackendError, BackendResult, CameraDevice, VideoSink};
use super::{CameraInput, DeviceControls, PhotoOutput};
use crate::backends::audio::AudioInput;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Configuring,
    Running,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
        };
        write!(f, "{name}")
    }
}

/// Data outputs a session can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionOutput {
    /// Still-photo output of the camera
    StillPhoto,
    /// Continuous video frames (preview and recording)
    VideoData,
    /// Continuous microphone buffers (recording)
    AudioData,
}

pub struct CaptureSession {
    state: SessionState,
    video_input: Option<Box<dyn CameraInput>>,
    audio_input: Option<Box<dyn AudioInput>>,
    outputs: BTreeSet<SessionOutput>,
    video_sink: VideoSink,
    audio_sink: AudioSink,
}

impl CaptureSession {
    /// `video_sink` and `audio_sink` receive the frames of whatever inputs
    /// get attached later.
    pub fn new(video_sink: VideoSink, audio_sink: AudioSink) -> Self {
        Self {
            state: SessionState::Idle,
            video_input: None,
            audio_input: None,
            outputs: BTreeSet::new(),
            video_sink,
            audio_sink,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Run one configuration unit.
    ///
    /// The session reports `Configuring` while `f` runs. Whatever `f` managed
    /// to change before returning stays changed, even on error; callers that
    /// need all-or-nothing use [`SessionConfiguration::replace_video_input`].
    pub fn configure<R>(
        &mut self,
        f: impl FnOnce(&mut SessionConfiguration<'_>) -> BackendResult<R>,
    ) -> BackendResult<R> {
        let previous = self.state;
        self.state = SessionState::Configuring;
        let result = f(&mut SessionConfiguration { session: self });
        self.state = previous;
        self.commit();
        result
    }

    /// Bring running hardware in line with the attached inputs and outputs
    fn commit(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(input) = self.video_input.as_mut() {
            if !input.is_running() {
                if let Err(e) = input.start(self.video_sink.clone()) {
                    warn!(error = %e, "Failed to start video input after configuration");
                }
            }
        }
        self.sync_audio();
    }

    fn sync_audio(&mut self) {
        let wanted = self.outputs.contains(&SessionOutput::AudioData);
        let Some(input) = self.audio_input.as_mut() else {
            return;
        };
        if wanted && !input.is_running() {
            if let Err(e) = input.start(self.audio_sink.clone()) {
                warn!(error = %e, "Audio input failed to start, continuing without audio");
            }
        } else if !wanted && input.is_running() {
            input.stop();
        }
    }

    /// Start the hardware. Requires a video input.
    pub fn start_running(&mut self) -> BackendResult<()> {
        let Some(input) = self.video_input.as_mut() else {
            return Err(BackendError::DeviceNotFound("no video input attached".into()));
        };
        if !input.is_running() {
            input.start(self.video_sink.clone())?;
        }
        self.state = SessionState::Running;
        self.sync_audio();
        info!(
            camera = %input_name(&self.video_input),
            audio = self.has_audio_input(),
            "Capture session running"
        );
        Ok(())
    }

    /// Stop the hardware but keep the configuration
    pub fn pause(&mut self) {
        self.stop_inputs();
        self.state = SessionState::Paused;
        debug!("Capture session paused");
    }

    /// Stop the hardware and detach everything
    pub fn teardown(&mut self) {
        self.stop_inputs();
        self.video_input = None;
        self.audio_input = None;
        self.outputs.clear();
        self.state = SessionState::Idle;
        debug!("Capture session torn down");
    }

    fn stop_inputs(&mut self) {
        if let Some(input) = self.video_input.as_mut() {
            input.stop();
        }
        if let Some(input) = self.audio_input.as_mut() {
            input.stop();
        }
    }

    pub fn video_device(&self) -> Option<&CameraDevice> {
        self.video_input.as_ref().map(|i| i.device())
    }

    pub fn video_controls(&self) -> Option<Arc<DeviceControls>> {
        self.video_input.as_ref().map(|i| i.controls())
    }

    pub fn photo_output(&self) -> Option<Arc<dyn PhotoOutput>> {
        if !self.outputs.contains(&SessionOutput::StillPhoto) {
            return None;
        }
        self.video_input.as_ref().map(|i| i.photo_output())
    }

    pub fn has_audio_input(&self) -> bool {
        self.audio_input.is_some()
    }

    /// Format of the attached microphone, if audio is being captured
    pub fn audio_format(&self) -> Option<AudioFormat> {
        if !self.outputs.contains(&SessionOutput::AudioData) {
            return None;
        }
        self.audio_input.as_ref().map(|i| i.format())
    }

    pub fn has_output(&self, output: SessionOutput) -> bool {
        self.outputs.contains(&output)
    }

    pub fn outputs(&self) -> Vec<SessionOutput> {
        self.outputs.iter().copied().collect()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop_inputs();
    }
}

fn input_name(input: &Option<Box<dyn CameraInput>>) -> String {
    input
        .as_ref()
        .map(|i| i.device().name.clone())
        .unwrap_or_default()
}

/// Mutable view of a session inside a configuration unit
pub struct SessionConfiguration<'a> {
    session: &'a mut CaptureSession,
}

impl SessionConfiguration<'_> {
    /// Whether `input` could be attached in place of (or next to) the
    /// current video input
    pub fn can_add_video_input(&self, input: &dyn CameraInput) -> bool {
        if !input.is_connected() {
            return false;
        }
        match self.session.video_input.as_ref() {
            Some(current) => current.device().id != input.device().id,
            None => true,
        }
    }

    pub fn add_video_input(&mut self, input: Box<dyn CameraInput>) -> BackendResult<()> {
        if self.session.video_input.is_some() {
            return Err(BackendError::Busy("a video input is already attached".into()));
        }
        if !input.is_connected() {
            return Err(BackendError::Disconnected(input.device().name.clone()));
        }
        debug!(camera = %input.device().name, "Attaching video input");
        self.session.video_input = Some(input);
        Ok(())
    }

    /// Detach and stop the video input
    pub fn remove_video_input(&mut self) -> Option<Box<dyn CameraInput>> {
        let mut input = self.session.video_input.take()?;
        input.stop();
        Some(input)
    }

    /// Swap the video input for `input`, all or nothing.
    ///
    /// The new input is validated (and started, on a running session) before
    /// the current one is touched. On error the current input is still
    /// attached and still running; the rejected input is dropped.
    pub fn replace_video_input(
        &mut self,
        mut input: Box<dyn CameraInput>,
    ) -> BackendResult<Option<Box<dyn CameraInput>>> {
        if !self.can_add_video_input(input.as_ref()) {
            return Err(BackendError::InitializationFailed(format!(
                "cannot add input {}",
                input.device().name
            )));
        }
        // A unit opened on a running session reports Configuring; the
        // hardware is live either way.
        if self.hardware_live() {
            input.start(self.session.video_sink.clone())?;
        }
        let previous = self.session.video_input.replace(input);
        Ok(previous.map(|mut old| {
            old.stop();
            old
        }))
    }

    fn hardware_live(&self) -> bool {
        self.session
            .video_input
            .as_ref()
            .map(|i| i.is_running())
            .unwrap_or(false)
    }

    pub fn add_audio_input(&mut self, input: Box<dyn AudioInput>) -> BackendResult<()> {
        if self.session.audio_input.is_some() {
            return Err(BackendError::Busy("an audio input is already attached".into()));
        }
        debug!(microphone = %input.device().name, "Attaching audio input");
        self.session.audio_input = Some(input);
        Ok(())
    }

    pub fn remove_audio_input(&mut self) -> Option<Box<dyn AudioInput>> {
        let mut input = self.session.audio_input.take()?;
        input.stop();
        Some(input)
    }

    pub fn has_audio_input(&self) -> bool {
        self.session.audio_input.is_some()
    }

    pub fn add_output(&mut self, output: SessionOutput) -> BackendResult<()> {
        if output == SessionOutput::AudioData && self.session.audio_input.is_none() {
            return Err(BackendError::DeviceNotFound(
                "audio output needs an audio input".into(),
            ));
        }
        self.session.outputs.insert(output);
        Ok(())
    }

    pub fn remove_output(&mut self, output: SessionOutput) {
        self.session.outputs.remove(&output);
    }

    /// Replace all outputs at once. Audio is silently skipped without a
    /// microphone.
    pub fn set_outputs(&mut self, outputs: &[SessionOutput]) {
        self.session.outputs.clear();
        for output in outputs {
            if *output == SessionOutput::AudioData && self.session.audio_input.is_none() {
                continue;
            }
            self.session.outputs.insert(*output);
        }
    }

    pub fn video_device(&self) -> Option<&CameraDevice> {
        self.session.video_device()
    }
}
