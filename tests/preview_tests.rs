// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the latest-frame-wins preview channel

use futures::StreamExt;
use std::time::Duration;
use thermal_camera::backends::camera::{PixelFormat, VideoFrame};
use thermal_camera::pipelines::preview::PreviewSink;

fn frame(millis: u64) -> VideoFrame {
    VideoFrame::solid(4, 4, PixelFormat::RGBA, [1, 2, 3, 255], Duration::from_millis(millis))
}

#[test]
fn test_burst_keeps_only_the_newest_frame() {
    let sink = PreviewSink::new();
    let mut consumer = sink.subscribe();

    for millis in 0..100 {
        sink.publish(frame(millis));
    }
    assert_eq!(sink.buffered_len(), 1);

    let newest = consumer.try_next().expect("a frame after the burst");
    assert_eq!(newest.timestamp, Duration::from_millis(99));
    assert!(consumer.try_next().is_none(), "older frames were overwritten");
}

#[test]
fn test_every_consumer_sees_the_latest_frame() {
    let sink = PreviewSink::new();
    let mut first = sink.subscribe();
    let mut second = sink.subscribe();
    assert_eq!(sink.consumer_count(), 2);

    sink.publish(frame(1));
    assert_eq!(first.try_next().map(|f| f.timestamp), Some(Duration::from_millis(1)));

    sink.publish(frame(2));
    assert_eq!(first.try_next().map(|f| f.timestamp), Some(Duration::from_millis(2)));
    assert_eq!(second.try_next().map(|f| f.timestamp), Some(Duration::from_millis(2)));
}

#[test]
fn test_stream_yields_published_frames_and_ends_with_publisher() {
    let sink = PreviewSink::new();
    let consumer = sink.subscribe();
    sink.publish(frame(7));

    let mut stream = Box::pin(consumer.into_stream());
    let first = futures::executor::block_on(stream.next()).unwrap();
    assert_eq!(first.timestamp, Duration::from_millis(7));

    drop(sink);
    assert!(futures::executor::block_on(stream.next()).is_none());
}

#[tokio::test]
async fn test_consumer_waits_for_the_next_frame() {
    let sink = PreviewSink::new();
    let mut consumer = sink.subscribe();

    let publisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.publish(frame(5));
        sink
    });

    let received = consumer.next().await.unwrap();
    assert_eq!(received.timestamp, Duration::from_millis(5));
    let sink = publisher.await.unwrap();
    assert_eq!(sink.latest().map(|f| f.timestamp), Some(Duration::from_millis(5)));
}
