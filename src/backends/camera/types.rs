// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// Immutable, reference-counted frame bytes
///
/// Cloning shares the allocation. Transforms never write into an existing
/// buffer; they allocate a fresh one.
#[derive(Clone)]
pub struct FrameData(Arc<[u8]>);

impl FrameData {
    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if both handles point at the same allocation
    pub fn ptr_eq(&self, other: &FrameData) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(bytes: Vec<u8>) -> Self {
        FrameData(Arc::from(bytes))
    }
}

impl From<Arc<[u8]>> for FrameData {
    fn from(bytes: Arc<[u8]>) -> Self {
        FrameData(bytes)
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Packed 32-bit pixel layouts produced by capture devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// R G B A byte order
    RGBA,
    /// B G R A byte order (the usual camera-native layout)
    BGRA,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Byte offsets of the red, green and blue channels within a pixel
    pub fn rgb_offsets(&self) -> (usize, usize, usize) {
        match self {
            PixelFormat::RGBA => (0, 1, 2),
            PixelFormat::BGRA => (2, 1, 0),
        }
    }
}

/// One raw video frame
///
/// `timestamp` is the presentation time on the device's monotonic clock.
/// Only its ordering relative to other frames of the same session matters.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes per row, may include padding
    pub stride: u32,
    pub data: FrameData,
    pub timestamp: Duration,
}

impl VideoFrame {
    /// Create a tightly packed frame (`stride == width * 4`)
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<FrameData>,
        timestamp: Duration,
    ) -> Self {
        Self {
            width,
            height,
            format,
            stride: width * PixelFormat::BYTES_PER_PIXEL as u32,
            data: data.into(),
            timestamp,
        }
    }

    /// A frame filled with one color, given as `[r, g, b, a]`
    pub fn solid(
        width: u32,
        height: u32,
        format: PixelFormat,
        rgba: [u8; 4],
        timestamp: Duration,
    ) -> Self {
        let (r, g, b) = format.rgb_offsets();
        let mut pixel = [0u8; 4];
        pixel[r] = rgba[0];
        pixel[g] = rgba[1];
        pixel[b] = rgba[2];
        pixel[3] = rgba[3];
        let data: Vec<u8> = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, format, data, timestamp)
    }

    /// Whether the declared geometry fits inside the buffer
    pub fn is_well_formed(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let row_bytes = self.width as usize * PixelFormat::BYTES_PER_PIXEL;
        let stride = self.stride as usize;
        if stride < row_bytes {
            return false;
        }
        let needed = stride * (self.height as usize - 1) + row_bytes;
        self.data.len() >= needed
    }

    /// Pixel bytes of row `y`, without padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.width as usize * PixelFormat::BYTES_PER_PIXEL]
    }

    /// Same pixels, different timestamp. The buffer is shared.
    pub fn with_timestamp(&self, timestamp: Duration) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    /// True if both frames share one pixel buffer
    pub fn shares_buffer(&self, other: &VideoFrame) -> bool {
        self.data.ptr_eq(&other.data)
    }

    /// `[r, g, b, a]` of the pixel at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let (r, g, b) = self.format.rgb_offsets();
        let offset = y as usize * self.stride as usize + x as usize * 4;
        let px = &self.data[offset..offset + 4];
        [px[r], px[g], px[b], px[3]]
    }

    /// Tightly packed RGB24 copy, the input format for image encoders
    pub fn to_rgb(&self) -> Vec<u8> {
        let (r, g, b) = self.format.rgb_offsets();
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            let row: &[[u8; 4]] = bytemuck::cast_slice(self.row(y));
            for px in row {
                out.extend_from_slice(&[px[r], px[g], px[b]]);
            }
        }
        out
    }

    /// Tightly packed RGBA copy
    pub fn to_rgba(&self) -> Vec<u8> {
        let (r, g, b) = self.format.rgb_offsets();
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            let row: &[[u8; 4]] = bytemuck::cast_slice(self.row(y));
            for px in row {
                out.extend_from_slice(&[px[r], px[g], px[b], px[3]]);
            }
        }
        out
    }
}

/// Interleaved signed 16-bit PCM
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Arc<[i16]>,
    pub channels: u16,
    pub sample_rate: u32,
    /// Same clock domain as [`VideoFrame::timestamp`]
    pub timestamp: Duration,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, format: AudioFormat, timestamp: Duration) -> Self {
        Self {
            samples: Arc::from(samples),
            channels: format.channels,
            sample_rate: format.sample_rate,
            timestamp,
        }
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

/// PCM stream description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Bytes per sample frame
    pub fn block_align(&self) -> u16 {
        self.channels * 2
    }
}

/// Which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    #[default]
    Back,
    Front,
}

impl CameraPosition {
    pub fn flipped(&self) -> Self {
        match self {
            CameraPosition::Back => CameraPosition::Front,
            CameraPosition::Front => CameraPosition::Back,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Backend-specific stable identifier
    pub id: String,
    pub position: CameraPosition,
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Duration of one frame in microseconds, as AVI headers want it
    pub fn frame_duration_us(&self) -> u32 {
        if self.num == 0 {
            return 0;
        }
        ((self.denom as u64 * 1_000_000) / self.num as u64) as u32
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Bounded hand-off from a device thread to its consumer
///
/// Delivery never blocks: when the consumer has fallen behind, the item is
/// dropped at the source.
#[derive(Debug)]
pub struct FrameSink<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for FrameSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> FrameSink<T> {
    /// Create a sink and the receiver that drains it
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    /// Offer an item. Returns `false` if it was dropped.
    pub fn deliver(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Consumer busy, dropping item at source");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Sink for raw video frames
pub type VideoSink = FrameSink<VideoFrame>;

/// Sink for raw audio buffers
pub type AudioSink = FrameSink<AudioFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Backend is not available on this system
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Failed to initialize a device
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// Camera or microphone not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// Device went away while in use
    #[error("Device disconnected: {0}")]
    Disconnected(String),
    /// Device is used by someone else
    #[error("Device busy: {0}")]
    Busy(String),
    /// Access refused by the platform
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Device produced no usable data
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    IoError(String),
    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_respects_channel_order() {
        let bgra = VideoFrame::solid(2, 2, PixelFormat::BGRA, [10, 20, 30, 255], Duration::ZERO);
        assert_eq!(&bgra.data[..4], &[30, 20, 10, 255]);
        assert_eq!(bgra.pixel(1, 1), [10, 20, 30, 255]);
        assert_eq!(bgra.to_rgb(), [10, 20, 30].repeat(4));
    }

    #[test]
    fn padded_rows_are_well_formed() {
        let mut data = vec![0u8; 3 * 16];
        data[16] = 7;
        let frame = VideoFrame {
            width: 3,
            height: 3,
            format: PixelFormat::RGBA,
            stride: 16,
            data: data.into(),
            timestamp: Duration::ZERO,
        };
        assert!(frame.is_well_formed());
        assert_eq!(frame.row(1).len(), 12);
        assert_eq!(frame.row(1)[0], 7);
    }

    #[test]
    fn truncated_buffer_is_malformed() {
        let frame = VideoFrame::new(4, 4, PixelFormat::RGBA, vec![0u8; 10], Duration::ZERO);
        assert!(!frame.is_well_formed());
        let empty = VideoFrame::new(0, 0, PixelFormat::RGBA, Vec::new(), Duration::ZERO);
        assert!(!empty.is_well_formed());
    }

    #[test]
    fn frame_sink_drops_when_full() {
        let (sink, mut rx) = FrameSink::channel(1);
        assert!(sink.deliver(1u32));
        assert!(!sink.deliver(2u32));
        assert_eq!(rx.try_recv().ok(), Some(1));
        assert!(sink.deliver(3u32));
    }

    #[test]
    fn audio_frame_duration() {
        let format = AudioFormat {
            channels: 2,
            sample_rate: 1_000,
        };
        let frame = AudioFrame::new(vec![0; 200], format, Duration::ZERO);
        assert_eq!(frame.frame_count(), 100);
        assert_eq!(frame.duration(), Duration::from_millis(100));
    }
}
