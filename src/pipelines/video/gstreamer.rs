// SPDX-License-Identifier: MPL-2.0

//! Recording encoder built on GStreamer
//!
//! ```text
//! appsrc(video) ! videoconvert ! videoscale ! capsfilter ! <video encoder> ─┐
//!                                                                         <muxer> ! filesink
//! appsrc(audio) ! audioconvert ! audioresample ! [aac encoder] ────────────┘
//! ```
//!
//! The appsrc queue level is the backpressure signal: a sample is refused
//! once the queued bytes reach the configured maximum. Errors posted on the
//! pipeline bus latch the encoder into a failed state; later samples are
//! refused and finalization reports the error.

use super::encoder::{EncoderFactory, EncoderRequest, Finalizing, Push, SampleEncoder};
use crate::backends::camera::types::{AudioFormat, AudioFrame, PixelFormat, VideoFrame};
use crate::constants::timing;
use crate::errors::{CameraError, CameraResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Bytes queued in each appsrc before samples are refused
const VIDEO_QUEUE_BYTES: u64 = 32 * 1024 * 1024;
const AUDIO_QUEUE_BYTES: u64 = 1024 * 1024;

/// AAC encoders in order of preference
const AAC_ENCODERS: &[&str] = &["avenc_aac", "fdkaacenc", "voaacenc"];

/// Elements every profile needs
const COMMON_ELEMENTS: &[&str] = &[
    "appsrc",
    "videoconvert",
    "videoscale",
    "capsfilter",
    "audioconvert",
    "audioresample",
    "filesink",
];

/// Silence written when a recording with an audio track got no audio
const PLACEHOLDER_AUDIO: Duration = Duration::from_millis(10);

/// Initialize GStreamer once per process
pub fn init() -> CameraResult<()> {
    gst::init()
        .map_err(|e| CameraError::DeviceSetupFailed(format!("GStreamer init failed: {}", e)))
}

fn element(name: &str) -> CameraResult<gst::Element> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| CameraError::ConfigurationFailed(format!("failed to create {}: {}", name, e)))
}

fn app_src() -> CameraResult<gst_app::AppSrc> {
    element("appsrc")?
        .downcast::<gst_app::AppSrc>()
        .map_err(|_| CameraError::ConfigurationFailed("failed to downcast appsrc".into()))
}

fn clock_time(pts: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(pts.as_nanos() as u64)
}

fn installed(name: &str) -> bool {
    gst::ElementFactory::find(name).is_some()
}

/// Codec and container combination of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerProfile {
    /// H.264 video and AAC audio in MP4
    Mp4,
    /// MJPEG video and PCM audio in AVI (gst-plugins-good only)
    Avi,
}

impl ContainerProfile {
    /// Profiles in order of preference
    pub const ALL: [ContainerProfile; 2] = [ContainerProfile::Mp4, ContainerProfile::Avi];

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerProfile::Mp4 => "mp4",
            ContainerProfile::Avi => "avi",
        }
    }

    fn muxer(&self) -> &'static str {
        match self {
            ContainerProfile::Mp4 => "mp4mux",
            ContainerProfile::Avi => "avimux",
        }
    }

    fn video_chain(&self) -> &'static [&'static str] {
        match self {
            ContainerProfile::Mp4 => &["x264enc", "h264parse"],
            ContainerProfile::Avi => &["jpegenc"],
        }
    }

    /// Audio encoder element; `None` when the container takes raw PCM
    fn audio_encoder(&self) -> CameraResult<Option<&'static str>> {
        match self {
            ContainerProfile::Mp4 => AAC_ENCODERS
                .iter()
                .copied()
                .find(|name| installed(name))
                .map(Some)
                .ok_or_else(|| {
                    CameraError::ConfigurationFailed("no AAC encoder installed".into())
                }),
            ContainerProfile::Avi => Ok(None),
        }
    }

    /// First element this profile needs that is not installed
    fn missing_element(&self) -> Option<&'static str> {
        let missing = COMMON_ELEMENTS
            .iter()
            .chain(self.video_chain())
            .chain(std::iter::once(&self.muxer()))
            .copied()
            .find(|name| !installed(name));
        match (missing, self) {
            (Some(name), _) => Some(name),
            (None, ContainerProfile::Mp4) if self.audio_encoder().is_err() => Some("avenc_aac"),
            (None, _) => None,
        }
    }

    /// Preferred profile among those installed
    pub fn detect() -> CameraResult<Self> {
        init()?;
        Self::ALL
            .into_iter()
            .find(|profile| profile.missing_element().is_none())
            .ok_or_else(|| {
                CameraError::DeviceSetupFailed(
                    "no GStreamer recording profile installed (need x264enc/mp4mux or jpegenc/avimux)"
                        .into(),
                )
            })
    }
}

impl std::fmt::Display for ContainerProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerProfile::Mp4 => write!(f, "H.264/AAC MP4"),
            ContainerProfile::Avi => write!(f, "MJPEG/PCM AVI"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GstEncoderFactory {
    profile: ContainerProfile,
}

impl GstEncoderFactory {
    /// Fails when GStreamer or an element of `profile` is missing
    pub fn new(profile: ContainerProfile) -> CameraResult<Self> {
        init()?;
        if let Some(name) = profile.missing_element() {
            return Err(CameraError::DeviceSetupFailed(format!(
                "GStreamer element {} not installed",
                name
            )));
        }
        Ok(Self { profile })
    }

    /// Factory for the preferred installed profile
    pub fn detect() -> CameraResult<Self> {
        let profile = ContainerProfile::detect()?;
        debug!(%profile, "Selected recording profile");
        Ok(Self { profile })
    }

    pub fn profile(&self) -> ContainerProfile {
        self.profile
    }
}

impl EncoderFactory for GstEncoderFactory {
    fn create(&self, request: &EncoderRequest) -> CameraResult<Box<dyn SampleEncoder>> {
        let encoder = GstEncoder::new(self.profile, request).map_err(|e| {
            CameraError::FileOutputFailed(format!(
                "cannot start {} pipeline for {}: {}",
                self.profile,
                request.path.display(),
                e
            ))
        })?;
        Ok(Box::new(encoder))
    }

    fn file_extension(&self) -> &'static str {
        self.profile.extension()
    }
}

struct GstEncoder {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
    video_src: gst_app::AppSrc,
    audio_src: Option<(gst_app::AppSrc, AudioFormat)>,
    path: PathBuf,
    width: u32,
    height: u32,
    framerate: gst::Fraction,
    /// Geometry of the last caps set on the video appsrc
    input_geometry: Option<(u32, u32, PixelFormat)>,
    video_pushed: u64,
    audio_pushed: u64,
    /// First error posted on the bus
    failure: Option<String>,
    /// Set once EOS has been handed to the finalize thread
    finished: bool,
}

impl GstEncoder {
    fn new(profile: ContainerProfile, request: &EncoderRequest) -> CameraResult<Self> {
        let settings = request.video;
        let path_str = request
            .path
            .to_str()
            .ok_or_else(|| CameraError::FileOutputFailed("output path is not UTF-8".into()))?;
        // Encoders want even dimensions for 4:2:0 chroma
        let width = (settings.width & !1).max(2);
        let height = (settings.height & !1).max(2);

        let pipeline = gst::Pipeline::new();
        let bus = pipeline
            .bus()
            .ok_or_else(|| CameraError::ConfigurationFailed("pipeline has no bus".into()))?;
        let framerate = gst::Fraction::new(
            settings.framerate.num as i32,
            settings.framerate.denom.max(1) as i32,
        );

        let video_src = app_src()?;
        video_src.set_format(gst::Format::Time);
        video_src.set_max_bytes(VIDEO_QUEUE_BYTES);

        let convert = element("videoconvert")?;
        let scale = element("videoscale")?;
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property(
                "caps",
                gst::Caps::builder("video/x-raw")
                    .field("width", width as i32)
                    .field("height", height as i32)
                    .field("pixel-aspect-ratio", gst::Fraction::new(1, 1))
                    .build(),
            )
            .build()
            .map_err(|e| CameraError::ConfigurationFailed(format!("capsfilter: {}", e)))?;

        let mut video_chain = vec![
            video_src.clone().upcast::<gst::Element>(),
            convert,
            scale,
            capsfilter,
        ];
        for name in profile.video_chain() {
            let encoder = element(name)?;
            match *name {
                "x264enc" => {
                    let bitrate = settings.quality.bitrate_kbps(width, height);
                    encoder.set_property("bitrate", bitrate);
                    encoder.set_property_from_str("tune", "zerolatency");
                    encoder.set_property_from_str("speed-preset", "veryfast");
                }
                "jpegenc" => {
                    encoder.set_property("quality", settings.quality.jpeg_quality() as i32);
                }
                _ => {}
            }
            video_chain.push(encoder);
        }

        let mux = element(profile.muxer())?;
        // Seekable output with duration and index written at EOS
        if mux.has_property("streamable") {
            mux.set_property("streamable", false);
        }
        let sink = gst::ElementFactory::make("filesink")
            .property("location", path_str)
            .build()
            .map_err(|e| CameraError::ConfigurationFailed(format!("filesink: {}", e)))?;

        pipeline
            .add_many(video_chain.iter().chain([&mux, &sink]))
            .map_err(|e| CameraError::ConfigurationFailed(format!("add elements: {}", e)))?;
        gst::Element::link_many(video_chain.iter().chain(std::iter::once(&mux)))
            .map_err(|e| CameraError::ConfigurationFailed(format!("link video branch: {}", e)))?;
        mux.link(&sink)
            .map_err(|e| CameraError::ConfigurationFailed(format!("link filesink: {}", e)))?;

        let audio_src = match request.audio {
            Some(format) => Some((
                Self::add_audio_branch(&pipeline, &mux, profile, format)?,
                format,
            )),
            None => None,
        };

        let encoder = Self {
            pipeline,
            bus,
            video_src,
            audio_src,
            path: request.path.clone(),
            width,
            height,
            framerate,
            input_geometry: None,
            video_pushed: 0,
            audio_pushed: 0,
            failure: None,
            finished: false,
        };
        encoder.pipeline.set_state(gst::State::Playing).map_err(|e| {
            CameraError::DeviceSetupFailed(format!("failed to start pipeline: {}", e))
        })?;

        info!(
            path = %request.path.display(),
            %profile,
            width,
            height,
            audio = encoder.audio_src.is_some(),
            "Started recording pipeline"
        );
        Ok(encoder)
    }

    fn add_audio_branch(
        pipeline: &gst::Pipeline,
        mux: &gst::Element,
        profile: ContainerProfile,
        format: AudioFormat,
    ) -> CameraResult<gst_app::AppSrc> {
        let src = app_src()?;
        src.set_format(gst::Format::Time);
        src.set_max_bytes(AUDIO_QUEUE_BYTES);
        src.set_caps(Some(
            &gst::Caps::builder("audio/x-raw")
                .field("format", "S16LE")
                .field("layout", "interleaved")
                .field("rate", format.sample_rate as i32)
                .field("channels", format.channels as i32)
                .build(),
        ));

        let mut chain = vec![
            src.clone().upcast::<gst::Element>(),
            element("audioconvert")?,
            element("audioresample")?,
        ];
        if let Some(name) = profile.audio_encoder()? {
            chain.push(element(name)?);
            debug!(encoder = name, "Audio encoder selected");
        }

        pipeline
            .add_many(chain.iter())
            .map_err(|e| CameraError::ConfigurationFailed(format!("add audio elements: {}", e)))?;
        gst::Element::link_many(chain.iter().chain(std::iter::once(mux)))
            .map_err(|e| CameraError::ConfigurationFailed(format!("link audio branch: {}", e)))?;
        Ok(src)
    }

    fn has_room(src: &gst_app::AppSrc) -> bool {
        src.current_level_bytes() < src.max_bytes()
    }

    /// Drain bus errors. Returns `false` once the pipeline has failed.
    fn healthy(&mut self) -> bool {
        while let Some(msg) = self.bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                error!(
                    path = %self.path.display(),
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "Recording pipeline failed"
                );
                self.failure.get_or_insert_with(|| err.error().to_string());
            }
        }
        self.failure.is_none()
    }

    fn update_video_caps(&mut self, width: u32, height: u32, pixel_format: PixelFormat) {
        let geometry = (width, height, pixel_format);
        if self.input_geometry == Some(geometry) {
            return;
        }
        let format = match pixel_format {
            PixelFormat::RGBA => gst_video::VideoFormat::Rgba,
            PixelFormat::BGRA => gst_video::VideoFormat::Bgra,
        };
        let caps = gst_video::VideoInfo::builder(format, width, height)
            .fps(self.framerate)
            .build()
            .and_then(|info| info.to_caps());
        match caps {
            Ok(caps) => {
                self.video_src.set_caps(Some(&caps));
                self.input_geometry = Some(geometry);
            }
            Err(e) => warn!(?e, "Could not describe input frames"),
        }
    }

    fn push_video(&mut self, frame: &VideoFrame, pts: Duration) -> Push {
        self.update_video_caps(frame.width, frame.height, frame.format);

        let mut packed = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
        for y in 0..frame.height {
            packed.extend_from_slice(frame.row(y));
        }
        let mut buffer = gst::Buffer::from_mut_slice(packed);
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(clock_time(pts));
        }

        match self.video_src.push_buffer(buffer) {
            Ok(_) => {
                self.video_pushed += 1;
                Push::Accepted
            }
            Err(e) => {
                trace!(?e, "Video appsrc refused buffer");
                Push::NotReady
            }
        }
    }

    fn push_audio(&mut self, frame: &AudioFrame, pts: Duration) -> Push {
        let Some((src, _)) = self.audio_src.as_ref() else {
            return Push::NotReady;
        };
        let bytes: Vec<u8> = bytemuck::cast_slice::<i16, u8>(&frame.samples).to_vec();
        let mut buffer = gst::Buffer::from_mut_slice(bytes);
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(clock_time(pts));
            buffer.set_duration(clock_time(frame.duration()));
        }

        match src.push_buffer(buffer) {
            Ok(_) => {
                self.audio_pushed += 1;
                Push::Accepted
            }
            Err(e) => {
                trace!(?e, "Audio appsrc refused buffer");
                Push::NotReady
            }
        }
    }

    /// Give every track at least one sample so the muxer negotiates and
    /// writes headers even for an empty recording
    fn push_placeholders(&mut self) {
        if self.video_pushed == 0 {
            debug!("No video was recorded, writing one black frame");
            let black = VideoFrame::solid(
                self.width,
                self.height,
                PixelFormat::RGBA,
                [0, 0, 0, 255],
                Duration::ZERO,
            );
            self.push_video(&black, Duration::ZERO);
        }
        let audio_format = self.audio_src.as_ref().map(|(_, format)| *format);
        if let Some(format) = audio_format.filter(|_| self.audio_pushed == 0) {
            let frames = (format.sample_rate as u128 * PLACEHOLDER_AUDIO.as_millis()
                / 1000) as usize;
            let silence = vec![0i16; frames.max(1) * format.channels.max(1) as usize];
            debug!("No audio was recorded, writing silence");
            self.push_audio(&AudioFrame::new(silence, format, Duration::ZERO), Duration::ZERO);
        }
    }
}

impl SampleEncoder for GstEncoder {
    fn has_audio_track(&self) -> bool {
        self.audio_src.is_some()
    }

    fn try_push_video(&mut self, frame: &VideoFrame, pts: Duration) -> Push {
        if !self.healthy() {
            return Push::Failed;
        }
        if !frame.is_well_formed() || !Self::has_room(&self.video_src) {
            return Push::NotReady;
        }
        self.push_video(frame, pts)
    }

    fn try_push_audio(&mut self, frame: &AudioFrame, pts: Duration) -> Push {
        if !self.healthy() {
            return Push::Failed;
        }
        match self.audio_src.as_ref() {
            Some((src, _)) if Self::has_room(src) => self.push_audio(frame, pts),
            _ => Push::NotReady,
        }
    }

    fn finish(mut self: Box<Self>) -> Finalizing {
        self.finished = true;
        if !self.healthy() {
            let _ = self.pipeline.set_state(gst::State::Null);
            let reason = self.failure.take().unwrap_or_default();
            return Finalizing::ready(Err(CameraError::FileOutputFailed(format!(
                "{}: {}",
                self.path.display(),
                reason
            ))));
        }
        self.push_placeholders();

        let (done, finalizing) = Finalizing::channel();
        let pipeline = self.pipeline.clone();
        let bus = self.bus.clone();
        let video_src = self.video_src.clone();
        let audio_src = self.audio_src.as_ref().map(|(src, _)| src.clone());
        let path = self.path.clone();
        let (video_frames, audio_buffers) = (self.video_pushed, self.audio_pushed);
        drop(self);

        let spawned = std::thread::Builder::new()
            .name("recording-finalize".into())
            .spawn(move || {
                let _ = video_src.end_of_stream();
                if let Some(src) = audio_src.as_ref() {
                    let _ = src.end_of_stream();
                }
                let result = wait_for_eos(&bus, &path);
                if let Err(e) = pipeline.set_state(gst::State::Null) {
                    warn!(?e, "Failed to set recording pipeline to Null");
                }
                if result.is_ok() {
                    info!(
                        path = %path.display(),
                        video_frames,
                        audio_buffers,
                        "Recording finalized"
                    );
                }
                let _ = done.send(result);
            });

        match spawned {
            Ok(_) => finalizing,
            Err(e) => Finalizing::ready(Err(CameraError::FileOutputFailed(format!(
                "cannot spawn finalize thread: {}",
                e
            )))),
        }
    }
}

fn wait_for_eos(bus: &gst::Bus, path: &Path) -> CameraResult<PathBuf> {
    // Muxers write their index on EOS, which can take a while for long files
    let timeout = gst::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS * 5);
    match bus.timed_pop_filtered(timeout, &[gst::MessageType::Eos, gst::MessageType::Error]) {
        Some(msg) => match msg.view() {
            gst::MessageView::Eos(..) => Ok(path.to_path_buf()),
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "GStreamer error while finalizing"
                );
                Err(CameraError::FileOutputFailed(format!(
                    "{}: {}",
                    path.display(),
                    err.error()
                )))
            }
            _ => Ok(path.to_path_buf()),
        },
        None => {
            warn!(path = %path.display(), "Timed out waiting for EOS");
            Err(CameraError::FileOutputFailed(
                "timed out finalizing recording".into(),
            ))
        }
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.pipeline.set_state(gst::State::Null);
        }
    }
}
