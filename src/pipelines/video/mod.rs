// SPDX-License-Identifier: MPL-2.0

//! Video recording pipeline
//!
//! Filtered frames and raw audio flow from the session worker into a
//! [`RecordingMuxer`], which normalizes timestamps and hands samples to a
//! [`SampleEncoder`] without blocking. Recordings are encoded by GStreamer
//! ([`GstEncoderFactory`]) as H.264/AAC MP4, or as MJPEG/PCM AVI where no
//! H.264 encoder is installed.

pub mod encoder;
pub mod gstreamer;
pub mod muxer;
pub mod session;

pub use encoder::{
    EncoderFactory, EncoderRequest, Finalizing, Push, SampleEncoder, VideoSettings,
};
pub use gstreamer::{ContainerProfile, GstEncoderFactory};
pub use muxer::{MuxerState, RecordingMuxer};
pub use session::{
    AppendOutcome, DropReason, RecordingSession, RecordingSummary, TimestampOrigin, TrackClock,
};

use crate::errors::CameraResult;
use std::sync::Arc;

/// Encoder for the preferred recording profile installed on this system
pub fn default_encoder_factory() -> CameraResult<Arc<dyn EncoderFactory>> {
    let factory = GstEncoderFactory::detect()?;
    tracing::info!(profile = %factory.profile(), "Recording encoder ready");
    Ok(Arc::new(factory))
}
