// SPDX-License-Identifier: GPL-3.0-only

//! Scripted devices and an in-memory encoder for controller tests
//!
//! Scripted cameras do not run a thread: a test pushes each frame itself and
//! then calls `flush()`, so every assertion sees a known frame sequence.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermal_camera::backends::audio::{AudioDevice, AudioInput};
use thermal_camera::backends::camera::{
    AudioFormat, AudioFrame, AudioSink, BackendError, BackendResult, CameraDevice, CameraInput,
    CameraPosition, CameraProvider, DeviceCapabilities, DeviceControls, PhotoOutput, PixelFormat,
    VideoFrame, VideoSink,
};
use thermal_camera::backends::permissions::StaticPermissions;
use thermal_camera::controller::{CaptureController, CaptureMode, ControllerOptions};
use thermal_camera::errors::CameraResult;
use thermal_camera::pipelines::video::{
    EncoderFactory, EncoderRequest, Finalizing, Push, SampleEncoder,
};

pub const BACK: &str = "scripted-back";
pub const FRONT: &str = "scripted-front";
pub const MIC: &str = "scripted-mic";

pub const AUDIO: AudioFormat = AudioFormat {
    channels: 1,
    sample_rate: 8_000,
};

#[derive(Default)]
struct Script {
    video_sinks: HashMap<String, VideoSink>,
    audio_sink: Option<AudioSink>,
    fail_open: HashSet<String>,
    fail_start: HashSet<String>,
    controls: HashMap<String, Arc<DeviceControls>>,
    still: Option<VideoFrame>,
    has_microphone: bool,
}

/// Two cameras and a microphone driven by the test
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        let script = Script {
            has_microphone: true,
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn without_microphone() -> Self {
        let provider = Self::new();
        provider.script.lock().unwrap().has_microphone = false;
        provider
    }

    /// Make opening `id` fail
    pub fn fail_open(&self, id: &str) {
        self.script.lock().unwrap().fail_open.insert(id.to_string());
    }

    /// Make starting `id` fail
    pub fn fail_start(&self, id: &str) {
        self.script.lock().unwrap().fail_start.insert(id.to_string());
    }

    /// Frame returned by every still capture; `None` makes stills fail
    pub fn set_still(&self, frame: Option<VideoFrame>) {
        self.script.lock().unwrap().still = frame;
    }

    /// Deliver a frame from camera `id`, as its capture callback would.
    /// Returns `false` if the camera is not running or the frame was dropped.
    pub fn push_video(&self, id: &str, frame: VideoFrame) -> bool {
        let sink = self.script.lock().unwrap().video_sinks.get(id).cloned();
        sink.map(|sink| sink.deliver(frame)).unwrap_or(false)
    }

    pub fn push_audio(&self, frame: AudioFrame) -> bool {
        let sink = self.script.lock().unwrap().audio_sink.clone();
        sink.map(|sink| sink.deliver(frame)).unwrap_or(false)
    }

    pub fn is_streaming(&self, id: &str) -> bool {
        self.script.lock().unwrap().video_sinks.contains_key(id)
    }

    pub fn microphone_running(&self) -> bool {
        self.script.lock().unwrap().audio_sink.is_some()
    }

    /// Controls of the most recently opened instance of `id`
    pub fn controls(&self, id: &str) -> Option<Arc<DeviceControls>> {
        self.script.lock().unwrap().controls.get(id).cloned()
    }
}

impl CameraProvider for ScriptedProvider {
    fn cameras(&self) -> Vec<CameraDevice> {
        vec![
            CameraDevice {
                name: "Scripted Back".into(),
                id: BACK.into(),
                position: CameraPosition::Back,
            },
            CameraDevice {
                name: "Scripted Front".into(),
                id: FRONT.into(),
                position: CameraPosition::Front,
            },
        ]
    }

    fn microphones(&self) -> Vec<AudioDevice> {
        if !self.script.lock().unwrap().has_microphone {
            return Vec::new();
        }
        vec![AudioDevice {
            name: "Scripted Microphone".into(),
            id: MIC.into(),
            is_default: true,
        }]
    }

    fn open_camera(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraInput>> {
        let mut script = self.script.lock().unwrap();
        if script.fail_open.contains(&device.id) {
            return Err(BackendError::Busy(device.id.clone()));
        }
        let capabilities = match device.position {
            CameraPosition::Back => DeviceCapabilities::default(),
            CameraPosition::Front => DeviceCapabilities {
                focus_point_of_interest: false,
                exposure_point_of_interest: true,
                has_torch: false,
                max_zoom: 2.0,
            },
        };
        let controls = Arc::new(DeviceControls::new(capabilities));
        script.controls.insert(device.id.clone(), Arc::clone(&controls));
        Ok(Box::new(ScriptedCamera {
            device: device.clone(),
            script: Arc::clone(&self.script),
            controls,
            running: false,
        }))
    }

    fn open_microphone(&self, device: &AudioDevice) -> BackendResult<Box<dyn AudioInput>> {
        Ok(Box::new(ScriptedMicrophone {
            device: device.clone(),
            script: Arc::clone(&self.script),
            running: false,
        }))
    }
}

struct ScriptedCamera {
    device: CameraDevice,
    script: Arc<Mutex<Script>>,
    controls: Arc<DeviceControls>,
    running: bool,
}

impl CameraInput for ScriptedCamera {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn start(&mut self, sink: VideoSink) -> BackendResult<()> {
        let mut script = self.script.lock().unwrap();
        if script.fail_start.contains(&self.device.id) {
            return Err(BackendError::InitializationFailed(self.device.id.clone()));
        }
        script.video_sinks.insert(self.device.id.clone(), sink);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.script.lock().unwrap().video_sinks.remove(&self.device.id);
            self.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn controls(&self) -> Arc<DeviceControls> {
        Arc::clone(&self.controls)
    }

    fn photo_output(&self) -> Arc<dyn PhotoOutput> {
        Arc::new(ScriptedStill {
            script: Arc::clone(&self.script),
        })
    }
}

struct ScriptedStill {
    script: Arc<Mutex<Script>>,
}

impl PhotoOutput for ScriptedStill {
    fn capture_still(&self) -> BackendResult<VideoFrame> {
        self.script
            .lock()
            .unwrap()
            .still
            .clone()
            .ok_or_else(|| BackendError::CaptureFailed("no still scripted".into()))
    }
}

struct ScriptedMicrophone {
    device: AudioDevice,
    script: Arc<Mutex<Script>>,
    running: bool,
}

impl AudioInput for ScriptedMicrophone {
    fn device(&self) -> &AudioDevice {
        &self.device
    }

    fn format(&self) -> AudioFormat {
        AUDIO
    }

    fn start(&mut self, sink: AudioSink) -> BackendResult<()> {
        self.script.lock().unwrap().audio_sink = Some(sink);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.script.lock().unwrap().audio_sink = None;
            self.running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// What the in-memory encoder was given
#[derive(Debug, Default)]
pub struct Written {
    pub opened: Vec<EncoderRequest>,
    /// `(pts, first pixel as [r, g, b, a])` per accepted video frame
    pub video: Vec<(Duration, [u8; 4])>,
    pub audio: Vec<Duration>,
    pub finished: usize,
}

/// Encoder that keeps samples in memory and writes a marker file on finish
#[derive(Clone, Default)]
pub struct MemoryEncoderFactory {
    pub written: Arc<Mutex<Written>>,
}

impl MemoryEncoderFactory {
    pub fn video_pts(&self) -> Vec<Duration> {
        self.written.lock().unwrap().video.iter().map(|(pts, _)| *pts).collect()
    }

    pub fn video_pixels(&self) -> Vec<[u8; 4]> {
        self.written.lock().unwrap().video.iter().map(|(_, px)| *px).collect()
    }

    pub fn audio_pts(&self) -> Vec<Duration> {
        self.written.lock().unwrap().audio.clone()
    }

    pub fn last_request(&self) -> Option<EncoderRequest> {
        self.written.lock().unwrap().opened.last().cloned()
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn create(&self, request: &EncoderRequest) -> CameraResult<Box<dyn SampleEncoder>> {
        self.written.lock().unwrap().opened.push(request.clone());
        Ok(Box::new(MemoryEncoder {
            path: request.path.clone(),
            audio: request.audio.is_some(),
            written: Arc::clone(&self.written),
        }))
    }

    fn file_extension(&self) -> &'static str {
        "avi"
    }
}

struct MemoryEncoder {
    path: PathBuf,
    audio: bool,
    written: Arc<Mutex<Written>>,
}

impl SampleEncoder for MemoryEncoder {
    fn has_audio_track(&self) -> bool {
        self.audio
    }

    fn try_push_video(&mut self, frame: &VideoFrame, pts: Duration) -> Push {
        self.written.lock().unwrap().video.push((pts, frame.pixel(0, 0)));
        Push::Accepted
    }

    fn try_push_audio(&mut self, _frame: &AudioFrame, pts: Duration) -> Push {
        self.written.lock().unwrap().audio.push(pts);
        Push::Accepted
    }

    fn finish(self: Box<Self>) -> Finalizing {
        self.written.lock().unwrap().finished += 1;
        let result = std::fs::write(&self.path, b"memory")
            .map(|()| self.path.clone())
            .map_err(Into::into);
        Finalizing::ready(result)
    }
}

/// Solid frame with a timestamp in milliseconds
pub fn frame(rgba: [u8; 4], millis: u64) -> VideoFrame {
    VideoFrame::solid(8, 6, PixelFormat::BGRA, rgba, Duration::from_millis(millis))
}

pub fn audio(millis: u64) -> AudioFrame {
    AudioFrame::new(vec![0; 80], AUDIO, Duration::from_millis(millis))
}

/// Fields drop in order: the controller shuts down before the media
/// directory is removed
pub struct Harness {
    pub controller: CaptureController,
    pub provider: ScriptedProvider,
    pub permissions: StaticPermissions,
    pub encoder: MemoryEncoderFactory,
    pub media: tempfile::TempDir,
}

impl Harness {
    pub fn new(mode: CaptureMode) -> Self {
        Self::with(ScriptedProvider::new(), StaticPermissions::granted(), mode)
    }

    pub fn with(
        provider: ScriptedProvider,
        permissions: StaticPermissions,
        mode: CaptureMode,
    ) -> Self {
        let media = tempfile::tempdir().unwrap();
        let encoder = MemoryEncoderFactory::default();
        let options = ControllerOptions {
            capture_mode: mode,
            media_dir: media.path().to_path_buf(),
            ..ControllerOptions::default()
        };
        let controller = CaptureController::new(
            Arc::new(provider.clone()),
            Arc::new(permissions.clone()),
            Arc::new(encoder.clone()),
            options,
        )
        .unwrap();
        Self {
            controller,
            provider,
            permissions,
            encoder,
            media,
        }
    }

    /// Push a frame from the back camera and wait until it is processed
    pub fn feed(&self, frame: VideoFrame) {
        self.feed_from(BACK, frame);
    }

    pub fn feed_from(&self, id: &str, frame: VideoFrame) {
        assert!(self.provider.push_video(id, frame), "{id} is not streaming");
        self.controller.flush().wait().unwrap();
    }
}
