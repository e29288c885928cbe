// SPDX-License-Identifier: GPL-3.0-only

//! Session worker
//!
//! Owns the capture session, the recording muxer and the preview sink. All
//! of them are touched from this one thread only; anything that may take a
//! while (permission prompts, finalizing a file, still capture) runs as a
//! task and posts its result back as a [`Command`].

use super::commands::{Command, Reply};
use super::{CaptureEvent, CaptureMode, ControllerOptions};
use crate::backends::audio::AudioInput;
use crate::backends::camera::{
    AudioFrame, CameraPosition, CameraProvider, CaptureSession, ConfigurationLock, FrameSink,
    SessionOutput, SessionState, VideoFrame,
};
use crate::backends::permissions::{AccessStatus, PermissionProvider};
use crate::constants::{queues, timing};
use crate::errors::{CameraError, CameraResult};
use crate::filters::{FilterEngine, FilterType};
use crate::pipelines::photo::StillCapture;
use crate::pipelines::preview::{PreviewFrames, PreviewSink};
use crate::pipelines::video::{
    AppendOutcome, EncoderFactory, MuxerState, RecordingMuxer, RecordingSummary,
};
use crate::storage::{MediaArtifact, MediaKind, media_file_name};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Channels the worker shares with the controller handle
pub(super) struct Shared {
    /// For continuations posted by spawned tasks
    pub commands: mpsc::UnboundedSender<Command>,
    pub filter: watch::Receiver<FilterType>,
    pub state: watch::Sender<SessionState>,
    pub recording: Arc<AtomicBool>,
    pub events: broadcast::Sender<CaptureEvent>,
}

pub(super) fn spawn(
    provider: Arc<dyn CameraProvider>,
    permissions: Arc<dyn PermissionProvider>,
    encoder: Arc<dyn EncoderFactory>,
    options: ControllerOptions,
    shared: Shared,
    commands: mpsc::UnboundedReceiver<Command>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("capture-session".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Failed to build capture worker runtime");
                    return;
                }
            };

            let (video_sink, video_rx) = FrameSink::channel(queues::VIDEO_FRAME_DEPTH);
            let (audio_sink, audio_rx) = FrameSink::channel(queues::AUDIO_FRAME_DEPTH);
            let worker = Worker {
                session: CaptureSession::new(video_sink, audio_sink),
                preview: PreviewSink::new(),
                engine: FilterEngine::new(),
                muxer: RecordingMuxer::new(encoder, options.video),
                still: StillCapture::new(
                    options.media_dir.clone(),
                    options.photo_format,
                    options.photo_quality,
                ),
                position: options.camera_position,
                mode: options.capture_mode,
                provider,
                permissions,
                options,
                shared,
                frame_count: 0,
            };

            runtime.block_on(worker.run(commands, video_rx, audio_rx));
            debug!("Capture worker exited");
        })
}

/// Outputs attached in each capture mode
fn outputs_for(mode: CaptureMode) -> &'static [SessionOutput] {
    match mode {
        CaptureMode::Photo => &[SessionOutput::StillPhoto],
        CaptureMode::Video => &[
            SessionOutput::StillPhoto,
            SessionOutput::VideoData,
            SessionOutput::AudioData,
        ],
    }
}

fn send<T>(reply: Reply<T>, result: CameraResult<T>) {
    // The caller may have dropped its completion
    let _ = reply.send(result);
}

struct Worker {
    session: CaptureSession,
    preview: PreviewSink,
    engine: FilterEngine,
    muxer: RecordingMuxer,
    still: StillCapture,
    position: CameraPosition,
    mode: CaptureMode,
    provider: Arc<dyn CameraProvider>,
    permissions: Arc<dyn PermissionProvider>,
    options: ControllerOptions,
    shared: Shared,
    frame_count: u64,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut video_rx: mpsc::Receiver<VideoFrame>,
        mut audio_rx: mpsc::Receiver<AudioFrame>,
    ) {
        info!(
            position = %self.position,
            mode = %self.mode,
            encoder = self.muxer.file_extension(),
            "Capture worker started"
        );

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    trace!(command = command.name(), "Handling command");
                    match command {
                        Command::Shutdown => break,
                        Command::Flush { reply } => {
                            self.drain(&mut video_rx, &mut audio_rx);
                            send(reply, Ok(()));
                        }
                        other => self.handle(other),
                    }
                }
                Some(frame) = video_rx.recv() => self.on_video_frame(frame),
                Some(frame) = audio_rx.recv() => self.on_audio_frame(frame),
            }
        }

        self.shutdown(&mut commands).await;
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => self.start(reply),
            Command::StartPermissions {
                camera,
                microphone,
                reply,
            } => self.finish_start(camera, microphone, reply),
            Command::Stop { reply } => {
                self.stop();
                send(reply, Ok(()));
            }
            Command::SwitchCamera { reply } => send(reply, self.switch_camera()),
            Command::SwitchMode { mode, reply } => send(reply, self.switch_mode(mode)),
            Command::Focus { point, reply } => {
                send(reply, self.with_device_lock(|lock| lock.focus_at(point)))
            }
            Command::SetZoom { factor, reply } => {
                send(reply, self.with_device_lock(|lock| lock.set_zoom(factor)))
            }
            Command::SetTorch { on, reply } => {
                send(reply, self.with_device_lock(|lock| lock.set_torch(on)))
            }
            Command::Pause { reply } => send(reply, self.pause()),
            Command::Resume { reply } => self.resume(reply),
            Command::ResumePermission { camera, reply } => {
                send(reply, self.finish_resume(camera))
            }
            Command::StartRecording { reply } => send(reply, self.start_recording()),
            Command::StopRecording { reply } => self.finish_recording(Some(reply)),
            Command::RecordingFinalized {
                result,
                summary,
                reply,
            } => self.recording_finalized(result, summary, reply),
            Command::CapturePhoto { filter, reply } => self.capture_photo(filter, reply),
            Command::Flush { reply } => send(reply, Ok(())),
            Command::Shutdown => {}
        }
    }

    // Frames

    fn drain(
        &mut self,
        video_rx: &mut mpsc::Receiver<VideoFrame>,
        audio_rx: &mut mpsc::Receiver<AudioFrame>,
    ) {
        while let Ok(frame) = video_rx.try_recv() {
            self.on_video_frame(frame);
        }
        while let Ok(frame) = audio_rx.try_recv() {
            self.on_audio_frame(frame);
        }
    }

    fn on_video_frame(&mut self, frame: VideoFrame) {
        if !self.session.is_running() {
            return;
        }
        if !frame.is_well_formed() {
            debug!(
                width = frame.width,
                height = frame.height,
                "Skipping malformed video frame"
            );
            return;
        }

        let filter = *self.shared.filter.borrow();
        let filtered = self.engine.apply(&frame, filter);

        if self.muxer.is_writing() {
            if let AppendOutcome::Dropped(reason) = self.muxer.append_video(&filtered) {
                trace!(?reason, timestamp = ?filtered.timestamp, "Video frame not recorded");
            }
        }
        self.preview.publish(filtered);

        self.frame_count += 1;
        if self.frame_count % timing::FRAME_LOG_INTERVAL == 0 {
            trace!(
                frames = self.frame_count,
                filter = %filter,
                consumers = self.preview.consumer_count(),
                "Processed video frames"
            );
        }
    }

    fn on_audio_frame(&mut self, frame: AudioFrame) {
        if !self.muxer.is_writing() {
            return;
        }
        if let AppendOutcome::Dropped(reason) = self.muxer.append_audio(&frame) {
            trace!(?reason, timestamp = ?frame.timestamp, "Audio buffer not recorded");
        }
    }

    // Lifecycle

    fn start(&mut self, reply: Reply<PreviewFrames>) {
        if self.session.is_running() {
            send(reply, Ok(self.preview.subscribe()));
            return;
        }

        let permissions = Arc::clone(&self.permissions);
        let commands = self.shared.commands.clone();
        let want_microphone = self.options.audio_enabled;
        tokio::spawn(async move {
            let camera = permissions.request_camera_access().await;
            let microphone = if want_microphone && camera.is_granted() {
                Some(permissions.request_microphone_access().await)
            } else {
                None
            };
            let _ = commands.send(Command::StartPermissions {
                camera,
                microphone,
                reply,
            });
        });
    }

    fn finish_start(
        &mut self,
        camera: AccessStatus,
        microphone: Option<AccessStatus>,
        reply: Reply<PreviewFrames>,
    ) {
        if !camera.is_granted() {
            warn!("Camera access denied");
            send(
                reply,
                Err(CameraError::PermissionDenied("camera access denied".into())),
            );
            return;
        }

        let result = self.bring_up(microphone);
        self.publish_state();
        send(reply, result.map(|()| self.preview.subscribe()));
    }

    fn bring_up(&mut self, microphone: Option<AccessStatus>) -> CameraResult<()> {
        match self.session.state() {
            SessionState::Running => return Ok(()),
            SessionState::Paused => {
                return self
                    .session
                    .start_running()
                    .map_err(|e| CameraError::DeviceSetupFailed(e.to_string()));
            }
            SessionState::Idle | SessionState::Configuring => {}
        }

        let device = self.provider.default_camera(self.position).ok_or_else(|| {
            CameraError::DeviceSetupFailed(format!("no {} camera available", self.position))
        })?;
        let camera = self
            .provider
            .open_camera(&device)
            .map_err(|e| CameraError::DeviceSetupFailed(format!("{}: {}", device.name, e)))?;

        let microphone = match microphone {
            Some(AccessStatus::Granted) => self.open_microphone(),
            Some(AccessStatus::Denied) => {
                info!("Microphone access denied, recordings will have no audio");
                None
            }
            None => None,
        };

        let outputs = outputs_for(self.mode);
        let configured = self.session.configure(|cfg| {
            cfg.add_video_input(camera)?;
            if let Some(microphone) = microphone {
                if let Err(e) = cfg.add_audio_input(microphone) {
                    warn!(error = %e, "Failed to attach microphone, continuing without audio");
                }
            }
            cfg.set_outputs(outputs);
            Ok(())
        });

        if let Err(e) = configured.and_then(|()| self.session.start_running()) {
            error!(error = %e, camera = %device.name, "Failed to start capture session");
            self.session.teardown();
            return Err(CameraError::DeviceSetupFailed(e.to_string()));
        }
        Ok(())
    }

    fn open_microphone(&self) -> Option<Box<dyn AudioInput>> {
        let Some(device) = self.provider.default_microphone() else {
            warn!("No microphone found, recordings will have no audio");
            return None;
        };
        match self.provider.open_microphone(&device) {
            Ok(input) => Some(input),
            Err(e) => {
                warn!(error = %e, microphone = %device.name, "Failed to open microphone");
                None
            }
        }
    }

    fn stop(&mut self) {
        if self.muxer.is_writing() {
            self.finish_recording(None);
        }
        self.session.teardown();
        self.publish_state();
        info!("Capture session stopped");
    }

    fn pause(&mut self) -> CameraResult<()> {
        match self.session.state() {
            SessionState::Running => {}
            SessionState::Paused => return Ok(()),
            state => {
                return Err(CameraError::ConfigurationFailed(format!(
                    "cannot pause a {} session",
                    state
                )));
            }
        }
        if self.muxer.is_writing() {
            self.finish_recording(None);
        }
        self.session.pause();
        self.publish_state();
        Ok(())
    }

    fn resume(&mut self, reply: Reply<()>) {
        match self.session.state() {
            SessionState::Paused => {}
            SessionState::Running => {
                send(reply, Ok(()));
                return;
            }
            state => {
                send(
                    reply,
                    Err(CameraError::ConfigurationFailed(format!(
                        "cannot resume a {} session",
                        state
                    ))),
                );
                return;
            }
        }

        let permissions = Arc::clone(&self.permissions);
        let commands = self.shared.commands.clone();
        tokio::spawn(async move {
            let camera = permissions.request_camera_access().await;
            let _ = commands.send(Command::ResumePermission { camera, reply });
        });
    }

    fn finish_resume(&mut self, camera: AccessStatus) -> CameraResult<()> {
        if !camera.is_granted() {
            warn!("Camera access revoked, staying paused");
            return Err(CameraError::PermissionDenied("camera access denied".into()));
        }
        // A stop may have arrived while the prompt was open
        if self.session.state() != SessionState::Paused {
            return Err(CameraError::ConfigurationFailed(format!(
                "session is {}, not paused",
                self.session.state()
            )));
        }
        let result = self
            .session
            .start_running()
            .map_err(|e| CameraError::DeviceSetupFailed(e.to_string()));
        self.publish_state();
        result
    }

    fn switch_camera(&mut self) -> CameraResult<CameraPosition> {
        let target = self.position.flipped();
        if self.session.video_device().is_none() {
            // Nothing attached yet; takes effect on the next start
            self.position = target;
            return Ok(target);
        }

        let device = self.provider.default_camera(target).ok_or_else(|| {
            CameraError::DeviceSetupFailed(format!("no {} camera available", target))
        })?;
        let input = self
            .provider
            .open_camera(&device)
            .map_err(|e| CameraError::DeviceSetupFailed(format!("{}: {}", device.name, e)))?;

        let previous = self
            .session
            .configure(|cfg| cfg.replace_video_input(input))
            .map_err(|e| {
                warn!(error = %e, target = %target, "Camera switch failed, keeping current camera");
                CameraError::DeviceSetupFailed(e.to_string())
            })?;

        if let Some(old) = previous {
            match old.controls().lock_for_configuration() {
                Ok(mut lock) => {
                    lock.set_torch(false);
                }
                Err(e) => warn!(error = %e, "Could not switch off torch of previous camera"),
            }
        }

        self.position = target;
        info!(position = %target, camera = %device.name, "Switched camera");
        Ok(target)
    }

    fn switch_mode(&mut self, mode: CaptureMode) -> CameraResult<CaptureMode> {
        if self.muxer.state() != MuxerState::Idle {
            return Err(CameraError::ConfigurationFailed(
                "cannot switch mode while recording".into(),
            ));
        }
        if mode == self.mode {
            return Ok(mode);
        }
        if self.session.video_device().is_some() {
            let outputs = outputs_for(mode);
            self.session.configure(|cfg| {
                cfg.set_outputs(outputs);
                Ok(())
            })?;
        }
        self.mode = mode;
        info!(mode = %mode, "Capture mode changed");
        Ok(mode)
    }

    /// Run `f` under the active camera's configuration lock
    fn with_device_lock<T>(
        &self,
        f: impl FnOnce(&mut ConfigurationLock<'_>) -> T,
    ) -> CameraResult<T> {
        let controls = self
            .session
            .video_controls()
            .ok_or_else(|| CameraError::ConfigurationFailed("no active camera".into()))?;
        let mut lock = controls.lock_for_configuration()?;
        let result = f(&mut lock);
        drop(lock);
        Ok(result)
    }

    // Recording

    fn start_recording(&mut self) -> CameraResult<PathBuf> {
        if !self.session.is_running() {
            return Err(CameraError::ConfigurationFailed(format!(
                "cannot record from a {} session",
                self.session.state()
            )));
        }
        if self.mode != CaptureMode::Video || !self.session.has_output(SessionOutput::VideoData) {
            return Err(CameraError::ConfigurationFailed(
                "recording needs video mode".into(),
            ));
        }

        let dir = self.still.output_dir().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            CameraError::FileOutputFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let filter = *self.shared.filter.borrow();
        let file_name = media_file_name(MediaKind::Video, filter, self.muxer.file_extension());
        let path = dir.join(file_name);
        self.muxer
            .start(path.clone(), self.session.audio_format(), filter)?;

        self.shared.recording.store(true, Ordering::SeqCst);
        let _ = self.shared.events.send(CaptureEvent::RecordingStarted {
            path: path.clone(),
            filter,
        });
        Ok(path)
    }

    /// Stop writing and finalize in the background
    fn finish_recording(&mut self, reply: Option<Reply<MediaArtifact>>) {
        let (finalizing, summary) = match self.muxer.stop() {
            Ok(stopped) => stopped,
            Err(e) => {
                if let Some(reply) = reply {
                    send(reply, Err(e));
                }
                return;
            }
        };
        self.shared.recording.store(false, Ordering::SeqCst);

        let commands = self.shared.commands.clone();
        tokio::spawn(async move {
            let result = finalizing.await;
            let _ = commands.send(Command::RecordingFinalized {
                result,
                summary,
                reply,
            });
        });
    }

    fn recording_finalized(
        &mut self,
        result: CameraResult<PathBuf>,
        summary: RecordingSummary,
        reply: Option<Reply<MediaArtifact>>,
    ) {
        self.muxer.complete_finish();

        let artifact = result.and_then(|path| MediaArtifact::from_path(&path));
        match &artifact {
            Ok(artifact) => info!(
                path = %artifact.path.display(),
                video_frames = summary.video_frames,
                audio_frames = summary.audio_frames,
                audio = summary.has_audio,
                elapsed = ?summary.elapsed,
                "Recording saved"
            ),
            Err(e) => error!(
                path = %summary.path.display(),
                error = %e,
                "Recording could not be finalized"
            ),
        }

        let _ = self
            .shared
            .events
            .send(CaptureEvent::RecordingFinished(artifact.clone()));
        if let Some(reply) = reply {
            send(reply, artifact);
        }
    }

    // Stills

    fn capture_photo(&mut self, filter: FilterType, reply: Reply<(VideoFrame, PathBuf)>) {
        if !self.session.is_running() {
            send(
                reply,
                Err(CameraError::ConfigurationFailed(format!(
                    "cannot capture from a {} session",
                    self.session.state()
                ))),
            );
            return;
        }
        let Some(output) = self.session.photo_output() else {
            send(
                reply,
                Err(CameraError::ConfigurationFailed(
                    "no still-photo output attached".into(),
                )),
            );
            return;
        };

        let still = self.still.clone();
        let events = self.shared.events.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || still.capture(output.as_ref(), filter))
                .await
                .unwrap_or_else(|e| {
                    Err(CameraError::Unknown(format!("still capture task failed: {}", e)))
                });
            if let Ok((_, path)) = &result {
                let _ = events.send(CaptureEvent::PhotoCaptured(path.clone()));
            }
            send(reply, result);
        });
    }

    // State

    fn publish_state(&self) {
        let state = self.session.state();
        let changed = self.shared.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(state = %state, "Session state changed");
            let _ = self.shared.events.send(CaptureEvent::StateChanged(state));
        }
    }

    async fn shutdown(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        if self.muxer.is_writing() {
            if let Ok((finalizing, summary)) = self.muxer.stop() {
                self.shared.recording.store(false, Ordering::SeqCst);
                let result = finalizing.await;
                self.recording_finalized(result, summary, None);
            }
        }

        // Let background finalization report before the runtime goes away
        while self.muxer.state() == MuxerState::Finishing {
            match commands.recv().await {
                Some(Command::RecordingFinalized {
                    result,
                    summary,
                    reply,
                }) => self.recording_finalized(result, summary, reply),
                Some(other) => trace!(command = other.name(), "Dropping command during shutdown"),
                None => break,
            }
        }

        self.session.teardown();
        self.publish_state();
    }
}
