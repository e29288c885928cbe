// SPDX-License-Identifier: GPL-3.0-only

//! Reading recordings back through GStreamer
//!
//! `filesrc ! decodebin` with one appsink per decoded stream. Used for
//! video thumbnails (first frame only) and to inspect a finished file.

use crate::backends::camera::types::{AudioFormat, PixelFormat, VideoFrame};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long to wait for the first decoded frame
const FIRST_FRAME_TIMEOUT_SECS: u64 = 5;

/// How long a full decode of a file may take
const PROBE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("GStreamer init failed: {0}")]
    Init(String),
    #[error("cannot build decode pipeline: {0}")]
    Pipeline(String),
    #[error("decoding failed: {0}")]
    Stream(String),
    #[error("no video frame within {0}s")]
    Timeout(u64),
    #[error("unexpected sample: {0}")]
    Sample(String),
}

/// Streams and sizes found by decoding a file end to end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Decoded video frames
    pub video_frames: u64,
    pub audio: Option<AudioFormat>,
    /// Decoded audio sample frames (one sample per channel)
    pub audio_samples: u64,
    /// Timestamp of the last video frame
    pub last_video_pts: Option<Duration>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_frames > 0
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

fn init() -> Result<(), DecodeError> {
    gst::init().map_err(|e| DecodeError::Init(e.to_string()))
}

fn location(path: &Path) -> Result<&str, DecodeError> {
    path.to_str()
        .ok_or_else(|| DecodeError::Pipeline(format!("{} is not UTF-8", path.display())))
}

/// Copy a decoded RGBA sample into a frame
fn frame_from_sample(sample: &gst::Sample) -> Result<VideoFrame, DecodeError> {
    let caps = sample
        .caps()
        .ok_or_else(|| DecodeError::Sample("no caps on sample".into()))?;
    let info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| DecodeError::Sample(format!("not raw video: {}", e)))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| DecodeError::Sample("no buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| DecodeError::Sample("buffer not readable".into()))?;
    let timestamp = buffer
        .pts()
        .map(|pts| Duration::from_nanos(pts.nseconds()))
        .unwrap_or_default();

    let stride = info.stride().first().copied().unwrap_or(0).max(0) as u32;
    let frame = VideoFrame {
        width: info.width(),
        height: info.height(),
        format: PixelFormat::RGBA,
        stride,
        data: map.as_slice().to_vec().into(),
        timestamp,
    };
    if !frame.is_well_formed() {
        return Err(DecodeError::Sample(format!(
            "{}x{} sample with {} bytes",
            frame.width,
            frame.height,
            map.size()
        )));
    }
    Ok(frame)
}

/// First video frame of `path`, as RGBA
pub fn first_video_frame(path: &Path) -> Result<VideoFrame, DecodeError> {
    init()?;
    let pipeline_str = format!(
        "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGBA ! \
         appsink name=sink max-buffers=1 drop=true sync=false",
        location(path)?
    );
    let pipeline = gst::parse::launch(&pipeline_str)
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| DecodeError::Pipeline("not a pipeline".into()))?;
    let appsink = pipeline
        .by_name("sink")
        .and_then(|sink| sink.downcast::<gst_app::AppSink>().ok())
        .ok_or_else(|| DecodeError::Pipeline("appsink missing".into()))?;

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| DecodeError::Stream(format!("cannot start decoding: {:?}", e)))?;
    let sample = appsink.try_pull_sample(gst::ClockTime::from_seconds(FIRST_FRAME_TIMEOUT_SECS));
    let _ = pipeline.set_state(gst::State::Null);

    let frame = frame_from_sample(&sample.ok_or(DecodeError::Timeout(FIRST_FRAME_TIMEOUT_SECS))?)?;
    debug!(
        path = %path.display(),
        width = frame.width,
        height = frame.height,
        "Decoded first video frame"
    );
    Ok(frame)
}

/// Counters filled in by the appsink callbacks
type SharedInfo = Arc<Mutex<MediaInfo>>;

fn video_branch(info: SharedInfo) -> Result<Vec<gst::Element>, DecodeError> {
    let convert = make("videoconvert")?;
    let caps = gst::ElementFactory::make("capsfilter")
        .property(
            "caps",
            gst::Caps::builder("video/x-raw").field("format", "RGBA").build(),
        )
        .build()
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?;
    let sink = gst_app::AppSink::builder().sync(false).build();
    sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let frame = frame_from_sample(&sample).map_err(|e| {
                    warn!(error = %e, "Undecodable video sample");
                    gst::FlowError::Error
                })?;
                if let Ok(mut info) = info.lock() {
                    info.width = frame.width;
                    info.height = frame.height;
                    info.video_frames += 1;
                    info.last_video_pts = Some(frame.timestamp);
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
    Ok(vec![convert, caps, sink.upcast()])
}

fn audio_branch(info: SharedInfo) -> Result<Vec<gst::Element>, DecodeError> {
    let convert = make("audioconvert")?;
    let caps = gst::ElementFactory::make("capsfilter")
        .property(
            "caps",
            gst::Caps::builder("audio/x-raw")
                .field("format", "S16LE")
                .field("layout", "interleaved")
                .build(),
        )
        .build()
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?;
    let sink = gst_app::AppSink::builder().sync(false).build();
    sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let format = sample
                    .caps()
                    .and_then(|caps| caps.structure(0))
                    .and_then(|s| {
                        let channels = s.get::<i32>("channels").ok()?;
                        Some((channels, s.get::<i32>("rate").ok()?))
                    });
                let bytes = sample.buffer().map(|b| b.size()).unwrap_or(0) as u64;
                if let (Some((channels, rate)), Ok(mut info)) = (format, info.lock()) {
                    let channels = channels.max(1) as u16;
                    info.audio = Some(AudioFormat {
                        channels,
                        sample_rate: rate.max(0) as u32,
                    });
                    info.audio_samples += bytes / (2 * channels as u64);
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
    Ok(vec![convert, caps, sink.upcast()])
}

fn make(name: &str) -> Result<gst::Element, DecodeError> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| DecodeError::Pipeline(format!("{}: {}", name, e)))
}

/// Link a freshly exposed decodebin pad to a new branch
fn attach_branch(pipeline: &gst::Pipeline, pad: &gst::Pad, branch: Vec<gst::Element>) {
    let linked = pipeline
        .add_many(branch.iter())
        .and_then(|_| gst::Element::link_many(branch.iter()))
        .map_err(|e| e.to_string())
        .and_then(|_| {
            let first = branch.first().ok_or("empty branch")?;
            let sink_pad = first.static_pad("sink").ok_or("branch has no sink pad")?;
            pad.link(&sink_pad).map_err(|e| format!("{:?}", e))?;
            Ok(())
        });
    match linked {
        Ok(()) => {
            for element in &branch {
                let _ = element.sync_state_with_parent();
            }
        }
        Err(e) => warn!(error = %e, pad = %pad.name(), "Cannot attach decode branch"),
    }
}

/// Decode `path` end to end and report what it contains
pub fn inspect(path: &Path) -> Result<MediaInfo, DecodeError> {
    init()?;
    let pipeline = gst::Pipeline::new();
    let src = gst::ElementFactory::make("filesrc")
        .property("location", location(path)?)
        .build()
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?;
    let decode = make("decodebin")?;
    pipeline
        .add_many([&src, &decode])
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?;
    src.link(&decode)
        .map_err(|e| DecodeError::Pipeline(e.to_string()))?;

    let info: SharedInfo = Arc::default();
    let weak = pipeline.downgrade();
    let branch_info = Arc::clone(&info);
    decode.connect_pad_added(move |_, pad| {
        let Some(pipeline) = weak.upgrade() else {
            return;
        };
        let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
        let Some(kind) = caps.structure(0).map(|s| s.name().to_string()) else {
            return;
        };
        let branch = if kind.starts_with("video/") {
            video_branch(Arc::clone(&branch_info))
        } else if kind.starts_with("audio/") {
            audio_branch(Arc::clone(&branch_info))
        } else {
            debug!(%kind, "Ignoring decoded stream");
            return;
        };
        match branch {
            Ok(branch) => attach_branch(&pipeline, pad, branch),
            Err(e) => warn!(error = %e, "Cannot build decode branch"),
        }
    });

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| DecodeError::Stream(format!("cannot start decoding: {:?}", e)))?;
    let result = wait_for_eos(&pipeline);
    let _ = pipeline.set_state(gst::State::Null);
    result?;

    let info = info
        .lock()
        .map(|info| info.clone())
        .map_err(|_| DecodeError::Stream("decode counters poisoned".into()))?;
    info!(
        path = %path.display(),
        video_frames = info.video_frames,
        audio_samples = info.audio_samples,
        "Inspected recording"
    );
    Ok(info)
}

fn wait_for_eos(pipeline: &gst::Pipeline) -> Result<(), DecodeError> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| DecodeError::Pipeline("pipeline has no bus".into()))?;
    let timeout = gst::ClockTime::from_seconds(PROBE_TIMEOUT_SECS);
    match bus.timed_pop_filtered(timeout, &[gst::MessageType::Eos, gst::MessageType::Error]) {
        Some(msg) => match msg.view() {
            gst::MessageView::Error(err) => Err(DecodeError::Stream(err.error().to_string())),
            _ => Ok(()),
        },
        None => Err(DecodeError::Stream(format!(
            "no end of stream within {}s",
            PROBE_TIMEOUT_SECS
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = first_video_frame(&dir.path().join("absent.avi")).unwrap_err();
        assert!(matches!(err, DecodeError::Stream(_) | DecodeError::Timeout(_)));
        assert!(inspect(&dir.path().join("absent.avi")).is_err());
    }

    #[test]
    fn non_media_file_does_not_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.avi");
        std::fs::write(&path, "not a recording").unwrap();
        assert!(inspect(&path).is_err());
    }
}
