// SPDX-License-Identifier: MPL-2.0

//! Recording muxer
//!
//! `Idle -> Writing -> Finishing -> Idle`. Appends are only honored while
//! writing and never block; the encoder decides whether it has room.

use super::encoder::{EncoderFactory, EncoderRequest, Finalizing, VideoSettings};
use super::session::{AppendOutcome, DropReason, RecordingSession, RecordingSummary};
use crate::backends::camera::types::{AudioFormat, AudioFrame, VideoFrame};
use crate::errors::{CameraError, CameraResult};
use crate::filters::FilterType;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Idle,
    Writing,
    Finishing,
}

pub struct RecordingMuxer {
    factory: Arc<dyn EncoderFactory>,
    settings: VideoSettings,
    state: MuxerState,
    session: Option<RecordingSession>,
}

impl RecordingMuxer {
    pub fn new(factory: Arc<dyn EncoderFactory>, settings: VideoSettings) -> Self {
        Self {
            factory,
            settings,
            state: MuxerState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    pub fn is_writing(&self) -> bool {
        self.state == MuxerState::Writing
    }

    pub fn settings(&self) -> VideoSettings {
        self.settings
    }

    /// Extension of files produced by the configured encoder
    pub fn file_extension(&self) -> &'static str {
        self.factory.file_extension()
    }

    /// The recording in progress, if any
    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Open `path` and begin writing.
    ///
    /// `audio` adds an audio track; `None` records video only.
    pub fn start(
        &mut self,
        path: PathBuf,
        audio: Option<AudioFormat>,
        filter: FilterType,
    ) -> CameraResult<()> {
        if self.state != MuxerState::Idle {
            warn!(state = ?self.state, "Recording start rejected");
            return Err(CameraError::ConfigurationFailed(format!(
                "muxer is {:?}, not idle",
                self.state
            )));
        }

        let request = EncoderRequest {
            path: path.clone(),
            video: self.settings,
            audio,
        };
        let encoder = self.factory.create(&request)?;

        info!(
            path = %path.display(),
            filter = %filter,
            audio = encoder.has_audio_track(),
            "Recording started"
        );
        self.session = Some(RecordingSession::new(path, encoder, filter));
        self.state = MuxerState::Writing;
        Ok(())
    }

    pub fn append_video(&mut self, frame: &VideoFrame) -> AppendOutcome {
        match (&self.state, self.session.as_mut()) {
            (MuxerState::Writing, Some(session)) => session.append_video(frame),
            _ => AppendOutcome::Dropped(DropReason::NotWriting),
        }
    }

    pub fn append_audio(&mut self, frame: &AudioFrame) -> AppendOutcome {
        match (&self.state, self.session.as_mut()) {
            (MuxerState::Writing, Some(session)) => session.append_audio(frame),
            _ => AppendOutcome::Dropped(DropReason::NotWriting),
        }
    }

    /// `Writing -> Finishing`. The returned handle resolves once the file
    /// is closed; call [`complete_finish`](Self::complete_finish) after.
    pub fn stop(&mut self) -> CameraResult<(Finalizing, RecordingSummary)> {
        let session = match (self.state, self.session.take()) {
            (MuxerState::Writing, Some(session)) => session,
            (state, session) => {
                self.session = session;
                return Err(CameraError::ConfigurationFailed(format!(
                    "no recording to stop (muxer is {:?})",
                    state
                )));
            }
        };

        self.state = MuxerState::Finishing;
        let (finalizing, summary) = session.finish();
        debug!(
            path = %summary.path.display(),
            video_frames = summary.video_frames,
            audio_frames = summary.audio_frames,
            "Recording stopping"
        );
        Ok((finalizing, summary))
    }

    /// `Finishing -> Idle`
    pub fn complete_finish(&mut self) {
        if self.state == MuxerState::Finishing {
            self.state = MuxerState::Idle;
        }
    }
}

impl std::fmt::Debug for RecordingMuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingMuxer")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}
