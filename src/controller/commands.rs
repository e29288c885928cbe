// SPDX-License-Identifier: GPL-3.0-only

//! Messages understood by the session worker

use super::CaptureMode;
use crate::backends::camera::{CameraPosition, FocusOutcome, NormalizedPoint, VideoFrame};
use crate::backends::permissions::AccessStatus;
use crate::errors::CameraResult;
use crate::filters::FilterType;
use crate::pipelines::preview::PreviewFrames;
use crate::pipelines::video::RecordingSummary;
use crate::storage::MediaArtifact;
use std::path::PathBuf;
use tokio::sync::oneshot;

pub(crate) type Reply<T> = oneshot::Sender<CameraResult<T>>;

pub(crate) enum Command {
    Start {
        reply: Reply<PreviewFrames>,
    },
    Stop {
        reply: Reply<()>,
    },
    SwitchCamera {
        reply: Reply<CameraPosition>,
    },
    SwitchMode {
        mode: CaptureMode,
        reply: Reply<CaptureMode>,
    },
    Focus {
        point: NormalizedPoint,
        reply: Reply<FocusOutcome>,
    },
    SetZoom {
        factor: f32,
        reply: Reply<f32>,
    },
    SetTorch {
        on: bool,
        reply: Reply<bool>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    StartRecording {
        reply: Reply<PathBuf>,
    },
    StopRecording {
        reply: Reply<MediaArtifact>,
    },
    /// `filter` is the selection at the time of the call
    CapturePhoto {
        filter: FilterType,
        reply: Reply<(VideoFrame, PathBuf)>,
    },
    /// Barrier: answered once every frame queued before it is processed
    Flush {
        reply: Reply<()>,
    },
    Shutdown,

    // Continuations posted by tasks the worker spawned
    StartPermissions {
        camera: AccessStatus,
        microphone: Option<AccessStatus>,
        reply: Reply<PreviewFrames>,
    },
    ResumePermission {
        camera: AccessStatus,
        reply: Reply<()>,
    },
    RecordingFinalized {
        result: CameraResult<PathBuf>,
        summary: RecordingSummary,
        reply: Option<Reply<MediaArtifact>>,
    },
}

impl Command {
    /// Short name for logs
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop { .. } => "stop",
            Command::SwitchCamera { .. } => "switch_camera",
            Command::SwitchMode { .. } => "switch_mode",
            Command::Focus { .. } => "focus",
            Command::SetZoom { .. } => "set_zoom",
            Command::SetTorch { .. } => "set_torch",
            Command::Pause { .. } => "pause",
            Command::Resume { .. } => "resume",
            Command::StartRecording { .. } => "start_recording",
            Command::StopRecording { .. } => "stop_recording",
            Command::CapturePhoto { .. } => "capture_photo",
            Command::Flush { .. } => "flush",
            Command::Shutdown => "shutdown",
            Command::StartPermissions { .. } => "start_permissions",
            Command::ResumePermission { .. } => "resume_permission",
            Command::RecordingFinalized { .. } => "recording_finalized",
        }
    }
}
