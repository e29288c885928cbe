// SPDX-License-Identifier: GPL-3.0-only

//! Encoder seam
//!
//! A [`SampleEncoder`] accepts samples without ever blocking the caller:
//! `try_push_*` either queues the sample or reports why it did not.
//! Encoding and file I/O happen on the encoder's own threads.

use crate::backends::camera::types::{AudioFormat, AudioFrame, Framerate, VideoFrame};
use crate::constants::{BitratePreset, recording};
use crate::errors::{CameraError, CameraResult};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Target encoding parameters, fixed for the lifetime of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    pub quality: BitratePreset,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: recording::DEFAULT_WIDTH,
            height: recording::DEFAULT_HEIGHT,
            framerate: Framerate::from_int(recording::DEFAULT_FRAMERATE),
            quality: BitratePreset::default(),
        }
    }
}

/// Everything an encoder needs to open its output
#[derive(Debug, Clone)]
pub struct EncoderRequest {
    pub path: PathBuf,
    pub video: VideoSettings,
    /// `None` records a video-only file
    pub audio: Option<AudioFormat>,
}

/// Result of offering a sample to an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Accepted,
    /// Encoder busy; the sample was not taken
    NotReady,
    /// The output failed; no further samples will be taken
    Failed,
}

/// One open output file
pub trait SampleEncoder: Send {
    fn has_audio_track(&self) -> bool;

    /// Offer a video frame with a presentation time relative to the
    /// recording origin
    fn try_push_video(&mut self, frame: &VideoFrame, pts: Duration) -> Push;

    /// Offer audio samples with a presentation time relative to the
    /// recording origin
    fn try_push_audio(&mut self, frame: &AudioFrame, pts: Duration) -> Push;

    /// Mark all tracks finished and finalize the file in the background
    fn finish(self: Box<Self>) -> Finalizing;
}

/// Creates encoders for new recordings
pub trait EncoderFactory: Send + Sync {
    fn create(&self, request: &EncoderRequest) -> CameraResult<Box<dyn SampleEncoder>>;

    /// Extension of the files this factory writes, without the dot
    fn file_extension(&self) -> &'static str;
}

/// Pending finalization of a recording
///
/// Resolves to the written file once every queued sample has been encoded
/// and the container has been closed.
#[derive(Debug)]
pub struct Finalizing {
    rx: oneshot::Receiver<CameraResult<PathBuf>>,
}

impl Finalizing {
    pub fn channel() -> (oneshot::Sender<CameraResult<PathBuf>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// An already resolved finalization
    pub fn ready(result: CameraResult<PathBuf>) -> Self {
        let (tx, finalizing) = Self::channel();
        let _ = tx.send(result);
        finalizing
    }

    /// Block the current thread until finalization is done
    pub fn wait(self) -> CameraResult<PathBuf> {
        futures::executor::block_on(self)
    }
}

impl Future for Finalizing {
    type Output = CameraResult<PathBuf>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Err(CameraError::FileOutputFailed(
                    "encoder stopped before finalizing".into(),
                ))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_finalization_resolves_immediately() {
        let path = PathBuf::from("clip.avi");
        assert_eq!(Finalizing::ready(Ok(path.clone())).wait(), Ok(path));
    }

    #[test]
    fn dropped_sender_is_a_file_output_error() {
        let (done, finalizing) = Finalizing::channel();
        drop(done);
        assert!(matches!(
            finalizing.wait(),
            Err(CameraError::FileOutputFailed(_))
        ));
    }
}
