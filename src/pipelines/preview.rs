// SPDX-License-Identifier: GPL-3.0-only

//! Latest-frame-wins preview channel
//!
//! One slot: publishing overwrites whatever the consumer has not picked up
//! yet, so a slow consumer always sees the newest frame and memory stays
//! bounded at one buffered frame.

use crate::backends::camera::types::VideoFrame;
use futures::Stream;
use tokio::sync::watch;

/// Publisher side, owned by the session worker
#[derive(Debug)]
pub struct PreviewSink {
    tx: watch::Sender<Option<VideoFrame>>,
}

impl Default for PreviewSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the buffered frame. Never blocks, works without consumers.
    pub fn publish(&self, frame: VideoFrame) {
        self.tx.send_replace(Some(frame));
    }

    /// A new consumer. It starts with the most recent frame, if any.
    pub fn subscribe(&self) -> PreviewFrames {
        let mut rx = self.tx.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        PreviewFrames { rx }
    }

    /// Frames currently held by the slot (0 or 1)
    pub fn buffered_len(&self) -> usize {
        usize::from(self.tx.borrow().is_some())
    }

    pub fn latest(&self) -> Option<VideoFrame> {
        self.tx.borrow().clone()
    }

    pub fn consumer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Consumer side: a lazy, infinite sequence of preview frames
///
/// The sequence ends only when the publisher goes away. It can not be
/// restarted; [`into_stream`](Self::into_stream) consumes it.
#[derive(Debug)]
pub struct PreviewFrames {
    rx: watch::Receiver<Option<VideoFrame>>,
}

impl PreviewFrames {
    /// Wait for a frame newer than the last one returned
    pub async fn next(&mut self) -> Option<VideoFrame> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }

    /// A frame newer than the last one returned, without waiting
    pub fn try_next(&mut self) -> Option<VideoFrame> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }

    /// Most recent frame, whether or not it was seen before
    pub fn latest(&self) -> Option<VideoFrame> {
        self.rx.borrow().clone()
    }

    pub fn into_stream(mut self) -> impl Stream<Item = VideoFrame> + Send + 'static {
        async_stream::stream! {
            while let Some(frame) = self.next().await {
                yield frame;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::time::Duration;

    fn frame(ms: u64) -> VideoFrame {
        VideoFrame::solid(2, 2, PixelFormat::RGBA, [0, 0, 0, 255], Duration::from_millis(ms))
    }

    #[test]
    fn publishing_without_consumers_keeps_one_frame() {
        let sink = PreviewSink::new();
        assert_eq!(sink.buffered_len(), 0);
        sink.publish(frame(1));
        sink.publish(frame(2));
        assert_eq!(sink.buffered_len(), 1);
        assert_eq!(sink.latest().map(|f| f.timestamp), Some(Duration::from_millis(2)));
    }

    #[test]
    fn late_subscriber_sees_current_frame() {
        let sink = PreviewSink::new();
        sink.publish(frame(7));
        let mut frames = sink.subscribe();
        assert_eq!(frames.try_next().map(|f| f.timestamp), Some(Duration::from_millis(7)));
        assert!(frames.try_next().is_none());
    }
}
