// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera and microphone
//!
//! Drives the whole stack without hardware: the CLI records from it and it
//! doubles as a reference [`CameraProvider`] implementation.
//!
//! ```text
//! VirtualProvider
//!   ├── "virtual-back"   ──▶ VirtualCamera ──paced thread──▶ VideoSink
//!   ├── "virtual-front"  ──▶ VirtualCamera
//!   └── "virtual-mic"    ──▶ VirtualMicrophone ──paced thread──▶ AudioSink
//! ```
//!
//! Every device of one provider stamps its samples against the same clock.

pub mod pattern;

use crate::backends::audio::{AudioDevice, AudioInput};
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::types::{
    AudioFormat, AudioFrame, AudioSink, BackendError, BackendResult, CameraDevice,
    CameraPosition, PixelFormat, VideoFrame, VideoSink,
};
use crate::backends::camera::{
    CameraInput, CameraProvider, DeviceCapabilities, DeviceControls, PhotoOutput,
};
use crate::constants::{recording, timing};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tone frequency of the synthetic microphone
const TONE_HZ: f32 = 440.0;

/// Frame size of the synthetic cameras
pub const DEFAULT_SIZE: (u32, u32) = (360, 640);

#[derive(Debug)]
struct ProviderState {
    clock: Instant,
    size: (u32, u32),
    audio: AudioFormat,
    unavailable: Mutex<HashSet<String>>,
}

impl ProviderState {
    fn is_available(&self, id: &str) -> bool {
        self.unavailable
            .lock()
            .map(|set| !set.contains(id))
            .unwrap_or(false)
    }
}

/// Provider with one back camera, one front camera and one microphone
#[derive(Debug, Clone)]
pub struct VirtualProvider {
    state: Arc<ProviderState>,
}

impl Default for VirtualProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualProvider {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SIZE.0, DEFAULT_SIZE.1)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(ProviderState {
                clock: Instant::now(),
                size: (width.max(1), height.max(1)),
                audio: AudioFormat {
                    channels: recording::AUDIO_CHANNELS,
                    sample_rate: recording::AUDIO_SAMPLE_RATE,
                },
                unavailable: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Make a device disappear from (or reappear in) enumeration
    pub fn set_available(&self, id: &str, available: bool) {
        if let Ok(mut set) = self.state.unavailable.lock() {
            if available {
                set.remove(id);
            } else {
                set.insert(id.to_string());
            }
        }
    }

    fn all_cameras() -> [CameraDevice; 2] {
        [
            CameraDevice {
                name: "Virtual Back Camera".into(),
                id: "virtual-back".into(),
                position: CameraPosition::Back,
            },
            CameraDevice {
                name: "Virtual Front Camera".into(),
                id: "virtual-front".into(),
                position: CameraPosition::Front,
            },
        ]
    }
}

impl CameraProvider for VirtualProvider {
    fn cameras(&self) -> Vec<CameraDevice> {
        Self::all_cameras()
            .into_iter()
            .filter(|c| self.state.is_available(&c.id))
            .collect()
    }

    fn microphones(&self) -> Vec<AudioDevice> {
        let mic = AudioDevice {
            name: "Virtual Microphone".into(),
            id: "virtual-mic".into(),
            is_default: true,
        };
        if self.state.is_available(&mic.id) {
            vec![mic]
        } else {
            Vec::new()
        }
    }

    fn open_camera(&self, device: &CameraDevice) -> BackendResult<Box<dyn CameraInput>> {
        if !self.cameras().iter().any(|c| c.id == device.id) {
            return Err(BackendError::DeviceNotFound(device.id.clone()));
        }
        debug!(camera = %device.name, "Opening virtual camera");
        let capabilities = match device.position {
            CameraPosition::Back => DeviceCapabilities::default(),
            CameraPosition::Front => DeviceCapabilities {
                focus_point_of_interest: false,
                has_torch: false,
                max_zoom: 2.0,
                ..DeviceCapabilities::default()
            },
        };
        Ok(Box::new(VirtualCamera {
            device: device.clone(),
            provider: Arc::clone(&self.state),
            controls: Arc::new(DeviceControls::new(capabilities)),
            frame_loop: None,
        }))
    }

    fn open_microphone(&self, device: &AudioDevice) -> BackendResult<Box<dyn AudioInput>> {
        if !self.microphones().iter().any(|m| m.id == device.id) {
            return Err(BackendError::DeviceNotFound(device.id.clone()));
        }
        Ok(Box::new(VirtualMicrophone {
            device: device.clone(),
            provider: Arc::clone(&self.state),
            audio_loop: None,
        }))
    }
}

pub struct VirtualCamera {
    device: CameraDevice,
    provider: Arc<ProviderState>,
    controls: Arc<DeviceControls>,
    frame_loop: Option<CaptureLoopController>,
}

impl CameraInput for VirtualCamera {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn is_connected(&self) -> bool {
        self.provider.is_available(&self.device.id)
    }

    fn start(&mut self, sink: VideoSink) -> BackendResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let (width, height) = self.provider.size;
        let position = self.device.position;
        let provider = Arc::clone(&self.provider);
        let controls = Arc::clone(&self.controls);

        let controller = CaptureLoopController::start_paced(
            "virtual-camera",
            timing::VIRTUAL_FRAME_INTERVAL,
            move |tick| {
                if sink.is_closed() {
                    return LoopAction::Stop;
                }
                let settings = controls.snapshot();
                let data = pattern::render_frame(width, height, tick, position, &settings);
                let frame = VideoFrame::new(
                    width,
                    height,
                    PixelFormat::BGRA,
                    data,
                    provider.clock.elapsed(),
                );
                if !sink.deliver(frame) && tick % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(tick, "Virtual camera frame dropped");
                }
                LoopAction::Continue
            },
        )
        .map_err(|e| BackendError::InitializationFailed(format!("frame thread: {}", e)))?;

        info!(camera = %self.device.name, width, height, "Virtual camera started");
        self.frame_loop = Some(controller);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.frame_loop.take() {
            controller.stop();
            debug!(camera = %self.device.name, "Virtual camera stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.frame_loop
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    fn controls(&self) -> Arc<DeviceControls> {
        Arc::clone(&self.controls)
    }

    fn photo_output(&self) -> Arc<dyn PhotoOutput> {
        Arc::new(VirtualStill {
            position: self.device.position,
            id: self.device.id.clone(),
            provider: Arc::clone(&self.provider),
            controls: Arc::clone(&self.controls),
        })
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Full-size still from the current scene
struct VirtualStill {
    position: CameraPosition,
    id: String,
    provider: Arc<ProviderState>,
    controls: Arc<DeviceControls>,
}

impl PhotoOutput for VirtualStill {
    fn capture_still(&self) -> BackendResult<VideoFrame> {
        if !self.provider.is_available(&self.id) {
            return Err(BackendError::Disconnected(self.id.clone()));
        }
        let (width, height) = self.provider.size;
        let elapsed = self.provider.clock.elapsed();
        let period = timing::VIRTUAL_FRAME_INTERVAL.as_millis().max(1);
        let tick = (elapsed.as_millis() / period) as u64;
        let settings = self.controls.snapshot();
        let data = pattern::render_frame(width, height, tick, self.position, &settings);
        Ok(VideoFrame::new(width, height, PixelFormat::BGRA, data, elapsed))
    }
}

pub struct VirtualMicrophone {
    device: AudioDevice,
    provider: Arc<ProviderState>,
    audio_loop: Option<CaptureLoopController>,
}

impl AudioInput for VirtualMicrophone {
    fn device(&self) -> &AudioDevice {
        &self.device
    }

    fn format(&self) -> AudioFormat {
        self.provider.audio
    }

    fn start(&mut self, sink: AudioSink) -> BackendResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let format = self.provider.audio;
        let interval = timing::VIRTUAL_AUDIO_INTERVAL;
        let frames_per_buffer =
            (format.sample_rate as u64 * interval.as_millis() as u64 / 1000) as usize;
        let started = self.provider.clock.elapsed();

        let rate = format.sample_rate.max(1) as f64;
        let controller =
            CaptureLoopController::start_paced("virtual-microphone", interval, move |tick| {
                if sink.is_closed() {
                    return LoopAction::Stop;
                }
                let first_frame = tick * frames_per_buffer as u64;
                let samples = pattern::sine_tone(format, first_frame, frames_per_buffer, TONE_HZ);
                let timestamp = started + Duration::from_secs_f64(first_frame as f64 / rate);
                sink.deliver(AudioFrame::new(samples, format, timestamp));
                LoopAction::Continue
            })
            .map_err(|e| BackendError::InitializationFailed(format!("audio thread: {}", e)))?;

        info!(
            microphone = %self.device.name,
            rate = format.sample_rate,
            "Virtual microphone started"
        );
        self.audio_loop = Some(controller);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.audio_loop.take() {
            controller.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.audio_loop
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }
}

impl Drop for VirtualMicrophone {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FrameSink;

    #[test]
    fn enumerates_both_positions() {
        let provider = VirtualProvider::new();
        assert!(provider.default_camera(CameraPosition::Back).is_some());
        assert!(provider.default_camera(CameraPosition::Front).is_some());
        assert_eq!(provider.default_microphone().map(|m| m.id), Some("virtual-mic".into()));
    }

    #[test]
    fn unavailable_devices_can_not_be_opened() {
        let provider = VirtualProvider::new();
        let front = provider.default_camera(CameraPosition::Front).unwrap();
        provider.set_available("virtual-front", false);
        assert!(provider.open_camera(&front).is_err());
        provider.set_available("virtual-front", true);
        assert!(provider.open_camera(&front).is_ok());
    }

    #[test]
    fn delivers_frames_until_stopped() {
        let provider = VirtualProvider::with_size(8, 8);
        let device = provider.default_camera(CameraPosition::Back).unwrap();
        let mut camera = provider.open_camera(&device).unwrap();
        let (sink, mut rx) = FrameSink::channel(4);
        camera.start(sink).unwrap();
        let frame = rx.blocking_recv().unwrap();
        assert_eq!((frame.width, frame.height), (8, 8));
        assert!(frame.is_well_formed());
        camera.stop();
        assert!(!camera.is_running());
    }

    #[test]
    fn still_reflects_zoom_snapshot() {
        let provider = VirtualProvider::with_size(16, 16);
        let device = provider.default_camera(CameraPosition::Back).unwrap();
        let camera = provider.open_camera(&device).unwrap();
        let wide = camera.photo_output().capture_still().unwrap();
        camera
            .controls()
            .lock_for_configuration()
            .unwrap()
            .set_zoom(4.0);
        let zoomed = camera.photo_output().capture_still().unwrap();
        // Zoom narrows the vertical green ramp; the bar spans whole columns
        let spread = |f: &VideoFrame| {
            (0..16)
                .map(|x| f.pixel(x, 15)[1].saturating_sub(f.pixel(x, 0)[1]))
                .max()
                .unwrap()
        };
        assert!(spread(&zoomed) < spread(&wide));
    }
}
