// SPDX-License-Identifier: GPL-3.0-only

//! One in-progress recording
//!
//! Owns the encoder, the shared timestamp origin and one monotonic clock per
//! track. Timestamps handed to the encoder are relative to the origin.

use super::encoder::{Finalizing, Push, SampleEncoder};
use crate::backends::camera::types::{AudioFrame, VideoFrame};
use crate::filters::FilterType;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Timestamp origin shared by every track of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampOrigin {
    #[default]
    Uninitialized,
    Established(Duration),
}

impl TimestampOrigin {
    /// Fix the origin at `timestamp` if none exists yet. Returns the origin.
    pub fn establish(&mut self, timestamp: Duration) -> Duration {
        match *self {
            Self::Established(origin) => origin,
            Self::Uninitialized => {
                *self = Self::Established(timestamp);
                timestamp
            }
        }
    }

    pub fn origin(&self) -> Option<Duration> {
        match self {
            Self::Established(origin) => Some(*origin),
            Self::Uninitialized => None,
        }
    }

    /// `timestamp - origin`, or `None` before the origin or without one
    pub fn relative(&self, timestamp: Duration) -> Option<Duration> {
        self.origin().and_then(|origin| timestamp.checked_sub(origin))
    }
}

/// Per-track bookkeeping; written timestamps are strictly increasing
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackClock {
    last_written: Option<Duration>,
    written: u64,
}

impl TrackClock {
    /// Whether a sample at `timestamp` may be written after the last one
    pub fn admits(&self, timestamp: Duration) -> bool {
        self.last_written.is_none_or(|last| timestamp > last)
    }

    pub fn record_write(&mut self, timestamp: Duration) {
        self.last_written = Some(timestamp);
        self.written += 1;
    }

    pub fn last_written(&self) -> Option<Duration> {
        self.last_written
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Why a sample was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No recording in progress
    NotWriting,
    /// Not newer than the last written sample of its track
    OutOfOrder,
    /// Earlier than the recording origin, or no origin yet
    BeforeOrigin,
    /// The recording has no audio track
    NoAudioTrack,
    /// Encoder busy
    Backpressure,
    /// Frame geometry does not fit its buffer
    Malformed,
    /// The encoder failed earlier in this recording
    EncoderFailed,
}

/// What happened to an appended sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Written,
    Dropped(DropReason),
}

impl AppendOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Counters reported once a recording stops
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub filter: FilterType,
    pub video_frames: u64,
    pub audio_frames: u64,
    pub has_audio: bool,
    pub elapsed: Duration,
}

pub struct RecordingSession {
    path: PathBuf,
    encoder: Box<dyn SampleEncoder>,
    origin: TimestampOrigin,
    video: TrackClock,
    audio: TrackClock,
    filter: FilterType,
    started_at: Instant,
    encoder_failed: bool,
}

impl RecordingSession {
    pub fn new(path: PathBuf, encoder: Box<dyn SampleEncoder>, filter: FilterType) -> Self {
        Self {
            path,
            encoder,
            origin: TimestampOrigin::Uninitialized,
            video: TrackClock::default(),
            audio: TrackClock::default(),
            filter,
            started_at: Instant::now(),
            encoder_failed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filter that was active when the recording started
    pub fn filter(&self) -> FilterType {
        self.filter
    }

    pub fn has_audio_track(&self) -> bool {
        self.encoder.has_audio_track()
    }

    pub fn origin(&self) -> TimestampOrigin {
        self.origin
    }

    pub fn video_frames(&self) -> u64 {
        self.video.written()
    }

    pub fn audio_frames(&self) -> u64 {
        self.audio.written()
    }

    /// Wall-clock time since the recording started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the encoder reported a failed output
    pub fn encoder_failed(&self) -> bool {
        self.encoder_failed
    }

    /// The first well-formed video frame establishes the origin, even if
    /// the encoder then turns it away.
    pub fn append_video(&mut self, frame: &VideoFrame) -> AppendOutcome {
        if self.encoder_failed {
            return AppendOutcome::Dropped(DropReason::EncoderFailed);
        }
        if !frame.is_well_formed() {
            trace!(
                width = frame.width,
                height = frame.height,
                "Dropping malformed video frame"
            );
            return AppendOutcome::Dropped(DropReason::Malformed);
        }
        let timestamp = frame.timestamp;
        self.origin.establish(timestamp);

        if !self.video.admits(timestamp) {
            trace!(
                ?timestamp,
                last = ?self.video.last_written(),
                "Dropping out-of-order video frame"
            );
            return AppendOutcome::Dropped(DropReason::OutOfOrder);
        }
        let Some(pts) = self.origin.relative(timestamp) else {
            return AppendOutcome::Dropped(DropReason::BeforeOrigin);
        };

        match self.encoder.try_push_video(frame, pts) {
            Push::Accepted => {
                self.video.record_write(timestamp);
                AppendOutcome::Written
            }
            Push::NotReady => {
                trace!(?timestamp, "Video encoder not ready, dropping frame");
                AppendOutcome::Dropped(DropReason::Backpressure)
            }
            Push::Failed => self.mark_failed(),
        }
    }

    /// Audio never establishes the origin; samples before it are dropped.
    pub fn append_audio(&mut self, frame: &AudioFrame) -> AppendOutcome {
        if self.encoder_failed {
            return AppendOutcome::Dropped(DropReason::EncoderFailed);
        }
        if !self.encoder.has_audio_track() {
            return AppendOutcome::Dropped(DropReason::NoAudioTrack);
        }
        let timestamp = frame.timestamp;
        let Some(pts) = self.origin.relative(timestamp) else {
            return AppendOutcome::Dropped(DropReason::BeforeOrigin);
        };
        if !self.audio.admits(timestamp) {
            return AppendOutcome::Dropped(DropReason::OutOfOrder);
        }

        match self.encoder.try_push_audio(frame, pts) {
            Push::Accepted => {
                self.audio.record_write(timestamp);
                AppendOutcome::Written
            }
            Push::NotReady => {
                trace!(?timestamp, "Audio encoder not ready, dropping buffer");
                AppendOutcome::Dropped(DropReason::Backpressure)
            }
            Push::Failed => self.mark_failed(),
        }
    }

    fn mark_failed(&mut self) -> AppendOutcome {
        if !self.encoder_failed {
            warn!(path = %self.path.display(), "Encoder failed, no longer recording samples");
            self.encoder_failed = true;
        }
        AppendOutcome::Dropped(DropReason::EncoderFailed)
    }

    /// Close every track and hand the file to background finalization
    pub fn finish(self) -> (Finalizing, RecordingSummary) {
        let summary = RecordingSummary {
            path: self.path.clone(),
            filter: self.filter,
            video_frames: self.video.written(),
            audio_frames: self.audio.written(),
            has_audio: self.encoder.has_audio_track(),
            elapsed: self.started_at.elapsed(),
        };
        (self.encoder.finish(), summary)
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("filter", &self.filter)
            .field("encoder_failed", &self.encoder_failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{AudioFormat, PixelFormat};

    #[test]
    fn origin_is_fixed_by_the_first_timestamp() {
        let mut origin = TimestampOrigin::default();
        assert_eq!(origin.relative(Duration::from_secs(5)), None);

        assert_eq!(origin.establish(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(origin.establish(Duration::from_secs(9)), Duration::from_secs(5));
        assert_eq!(
            origin.relative(Duration::from_millis(5_500)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(origin.relative(Duration::from_secs(4)), None);
    }

    /// Encoder answering every push with a fixed result
    struct FixedEncoder(Push);

    impl SampleEncoder for FixedEncoder {
        fn has_audio_track(&self) -> bool {
            true
        }

        fn try_push_video(&mut self, _frame: &VideoFrame, _pts: Duration) -> Push {
            self.0
        }

        fn try_push_audio(&mut self, _frame: &AudioFrame, _pts: Duration) -> Push {
            self.0
        }

        fn finish(self: Box<Self>) -> Finalizing {
            Finalizing::ready(Ok(PathBuf::from("fixed.avi")))
        }
    }

    fn session(push: Push) -> RecordingSession {
        RecordingSession::new(
            PathBuf::from("fixed.avi"),
            Box::new(FixedEncoder(push)),
            FilterType::Original,
        )
    }

    fn frame(millis: u64) -> VideoFrame {
        VideoFrame::solid(4, 4, PixelFormat::RGBA, [9, 9, 9, 255], Duration::from_millis(millis))
    }

    #[test]
    fn malformed_frames_are_dropped_before_the_origin() {
        let mut session = session(Push::Accepted);
        let bad = VideoFrame::new(16, 16, PixelFormat::RGBA, vec![0u8; 10], Duration::ZERO);
        assert_eq!(
            session.append_video(&bad),
            AppendOutcome::Dropped(DropReason::Malformed)
        );
        assert_eq!(session.origin(), TimestampOrigin::Uninitialized);

        assert!(session.append_video(&frame(33)).is_written());
        assert_eq!(session.origin().origin(), Some(Duration::from_millis(33)));
        assert_eq!(session.video_frames(), 1);
    }

    #[test]
    fn encoder_failure_stops_further_writes() {
        let mut session = session(Push::Failed);
        assert_eq!(
            session.append_video(&frame(0)),
            AppendOutcome::Dropped(DropReason::EncoderFailed)
        );
        assert!(session.encoder_failed());
        let tone = AudioFrame::new(
            vec![0; 8],
            AudioFormat {
                channels: 1,
                sample_rate: 8_000,
            },
            Duration::from_millis(5),
        );
        assert_eq!(
            session.append_audio(&tone),
            AppendOutcome::Dropped(DropReason::EncoderFailed)
        );
        assert_eq!(session.video_frames(), 0);
    }

    #[test]
    fn track_clock_rejects_equal_and_older_timestamps() {
        let mut clock = TrackClock::default();
        assert!(clock.admits(Duration::ZERO));
        clock.record_write(Duration::from_millis(10));
        assert!(!clock.admits(Duration::from_millis(10)));
        assert!(!clock.admits(Duration::from_millis(9)));
        assert!(clock.admits(Duration::from_millis(11)));
        assert_eq!(clock.written(), 1);
    }
}
