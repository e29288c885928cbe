// SPDX-License-Identifier: GPL-3.0-only

//! Capture controller
//!
//! ```text
//!   CaptureController (handle, any thread)
//!        │ commands (unbounded)          filter (watch)
//!        ▼                                   │
//!   ┌──────────────────────── "capture-session" thread ─────────────┐
//!   │ select! { biased; commands, video frames, audio frames }      │
//!   │   frame ─▶ FilterEngine ─┬─▶ PreviewSink                      │
//!   │                          └─▶ RecordingMuxer (while recording) │
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public method is a message to the worker and returns a
//! [`Completion`], except the filter selection which is a shared value read
//! by the worker once per frame.

mod commands;
mod worker;

use crate::backends::camera::{
    CameraPosition, CameraProvider, FocusOutcome, NormalizedPoint, SessionState, VideoFrame,
};
use crate::backends::permissions::PermissionProvider;
use crate::config::Config;
use crate::errors::{CameraError, CameraResult};
use crate::filters::FilterType;
use crate::pipelines::photo::{EncodingFormat, EncodingQuality};
use crate::pipelines::preview::PreviewFrames;
use crate::pipelines::video::{EncoderFactory, VideoSettings};
use crate::storage::MediaArtifact;
use commands::{Command, Reply};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, warn};

/// Capture mode of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}

/// Published to every [`CaptureController::subscribe`] receiver
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    StateChanged(SessionState),
    RecordingStarted { path: PathBuf, filter: FilterType },
    /// A recording was finalized, whether stopped explicitly or by
    /// `stop`/`pause`
    RecordingFinished(CameraResult<MediaArtifact>),
    PhotoCaptured(PathBuf),
}

/// Static configuration of a controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub camera_position: CameraPosition,
    pub capture_mode: CaptureMode,
    pub initial_filter: FilterType,
    pub audio_enabled: bool,
    pub video: VideoSettings,
    pub photo_format: EncodingFormat,
    pub photo_quality: EncodingQuality,
    pub media_dir: PathBuf,
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            camera_position: config.camera_position,
            capture_mode: config.capture_mode,
            initial_filter: config.default_filter,
            audio_enabled: config.audio_enabled,
            video: config.video_settings(),
            photo_format: config.photo.format,
            photo_quality: config.photo.quality,
            media_dir: config.media_dir(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Pending result of a controller request
///
/// Await it, or call [`wait`](Self::wait) from synchronous code. Never
/// wait on the worker thread itself.
#[must_use = "a completion does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<CameraResult<T>>,
}

impl<T> Completion<T> {
    pub fn wait(self) -> CameraResult<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Completion<T> {
    type Output = CameraResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| Err(CameraError::Unknown("capture worker stopped".into())))
        })
    }
}

/// Handle to the capture session worker
pub struct CaptureController {
    commands: mpsc::UnboundedSender<Command>,
    filter: watch::Sender<FilterType>,
    state: watch::Receiver<SessionState>,
    recording: Arc<AtomicBool>,
    events: broadcast::Sender<CaptureEvent>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureController {
    /// Spawn the session worker. No device is touched until [`start`](Self::start).
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionProvider>,
        encoder: Arc<dyn EncoderFactory>,
        options: ControllerOptions,
    ) -> CameraResult<Self> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (filter, filter_rx) = watch::channel(options.initial_filter);
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let (events, _) = broadcast::channel(64);
        let recording = Arc::new(AtomicBool::new(false));

        let shared = worker::Shared {
            commands: commands.clone(),
            filter: filter_rx,
            state: state_tx,
            recording: Arc::clone(&recording),
            events: events.clone(),
        };
        let worker = worker::spawn(provider, permissions, encoder, options, shared, command_rx)
            .map_err(|e| CameraError::Unknown(format!("cannot spawn capture worker: {}", e)))?;

        Ok(Self {
            commands,
            filter,
            state,
            recording,
            events,
            worker: Some(worker),
        })
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Completion<T> {
        let (tx, rx) = oneshot::channel();
        let command = make(tx);
        debug!(command = command.name(), "Posting command");
        // A dead worker drops the reply, which resolves the completion
        let _ = self.commands.send(command);
        Completion { rx }
    }

    /// Ask for access, open the default devices and run the session.
    ///
    /// Resolves to a preview consumer.
    pub fn start(&self) -> Completion<PreviewFrames> {
        self.request(|reply| Command::Start { reply })
    }

    /// Finalize any recording, detach everything and go idle
    pub fn stop(&self) -> Completion<()> {
        self.request(|reply| Command::Stop { reply })
    }

    /// Swap front and back cameras. Resolves to the new position.
    pub fn switch_camera(&self) -> Completion<CameraPosition> {
        self.request(|reply| Command::SwitchCamera { reply })
    }

    pub fn switch_mode(&self, mode: CaptureMode) -> Completion<CaptureMode> {
        self.request(|reply| Command::SwitchMode { mode, reply })
    }

    pub fn focus(&self, point: NormalizedPoint) -> Completion<FocusOutcome> {
        self.request(|reply| Command::Focus { point, reply })
    }

    /// Resolves to the zoom factor actually applied
    pub fn set_zoom(&self, factor: f32) -> Completion<f32> {
        self.request(|reply| Command::SetZoom { factor, reply })
    }

    /// Resolves to whether the torch is now on
    pub fn set_torch(&self, on: bool) -> Completion<bool> {
        self.request(|reply| Command::SetTorch { on, reply })
    }

    pub fn pause(&self) -> Completion<()> {
        self.request(|reply| Command::Pause { reply })
    }

    pub fn resume(&self) -> Completion<()> {
        self.request(|reply| Command::Resume { reply })
    }

    /// Resolves to the path being written
    pub fn start_recording(&self) -> Completion<PathBuf> {
        self.request(|reply| Command::StartRecording { reply })
    }

    /// Resolves once the file is finalized
    pub fn stop_recording(&self) -> Completion<MediaArtifact> {
        self.request(|reply| Command::StopRecording { reply })
    }

    /// Resolves to the filtered still and where it was saved
    pub fn capture_photo(&self) -> Completion<(VideoFrame, PathBuf)> {
        let filter = self.current_filter();
        self.request(|reply| Command::CapturePhoto { filter, reply })
    }

    /// Resolves once every frame delivered so far has been processed
    pub fn flush(&self) -> Completion<()> {
        self.request(|reply| Command::Flush { reply })
    }

    /// Select a filter. Applies from the next processed frame.
    pub fn set_filter(&self, filter: FilterType) -> FilterType {
        self.filter.send_replace(filter);
        filter
    }

    pub fn next_filter(&self) -> FilterType {
        self.step_filter(FilterType::next)
    }

    pub fn previous_filter(&self) -> FilterType {
        self.step_filter(FilterType::previous)
    }

    fn step_filter(&self, step: fn(&FilterType) -> FilterType) -> FilterType {
        let mut selected = FilterType::default();
        self.filter.send_modify(|current| {
            *current = step(current);
            selected = *current;
        });
        selected
    }

    pub fn current_filter(&self) -> FilterType {
        *self.filter.borrow()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Capture worker panicked");
            }
        }
    }
}
