// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recording muxer and the GStreamer encoder

mod common;

use common::{MemoryEncoderFactory, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;
use thermal_camera::backends::camera::{AudioFormat, AudioFrame, Framerate, PixelFormat};
use thermal_camera::backends::permissions::StaticPermissions;
use thermal_camera::backends::virtual_camera::VirtualProvider;
use thermal_camera::constants::BitratePreset;
use thermal_camera::media::{first_video_frame, inspect};
use thermal_camera::pipelines::video::{
    AppendOutcome, ContainerProfile, DropReason, GstEncoderFactory, MuxerState, RecordingMuxer,
    VideoSettings,
};
use thermal_camera::storage::generate_thumbnail;
use thermal_camera::{
    CameraError, CaptureController, CaptureMode, ControllerOptions, FilterType, VideoFrame,
};

const AUDIO: AudioFormat = AudioFormat {
    channels: 1,
    sample_rate: 8_000,
};

fn settings() -> VideoSettings {
    VideoSettings {
        width: 32,
        height: 24,
        framerate: Framerate::from_int(30),
        quality: BitratePreset::Low,
    }
}

fn avi() -> Arc<GstEncoderFactory> {
    Arc::new(GstEncoderFactory::new(ContainerProfile::Avi).unwrap())
}

fn muxer() -> RecordingMuxer {
    RecordingMuxer::new(avi(), settings())
}

fn frame(millis: u64) -> VideoFrame {
    VideoFrame::solid(64, 48, PixelFormat::BGRA, [20, 200, 40, 255], Duration::from_millis(millis))
}

fn tone(millis: u64) -> AudioFrame {
    AudioFrame::new(vec![500; 80], AUDIO, Duration::from_millis(millis))
}

#[test]
fn test_empty_recording_is_a_valid_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.avi");
    let mut muxer = muxer();

    muxer.start(path.clone(), None, FilterType::Original).unwrap();
    let (finalizing, summary) = muxer.stop().unwrap();
    assert_eq!(muxer.state(), MuxerState::Finishing);
    assert_eq!(finalizing.wait().unwrap(), path);
    muxer.complete_finish();
    assert_eq!(muxer.state(), MuxerState::Idle);

    // A black frame keeps the empty video track decodable
    assert_eq!(summary.video_frames, 0);
    let info = inspect(&path).unwrap();
    assert!(info.has_video());
    assert!(!info.has_audio());
    assert_eq!(info.video_frames, 1);
    assert_eq!((info.width, info.height), (32, 24));
    let first = first_video_frame(&path).unwrap();
    assert_eq!((first.width, first.height), (32, 24));
    let [r, g, b, _] = first.pixel(first.width / 2, first.height / 2);
    assert!(r < 40 && g < 40 && b < 40);
}

#[test]
fn test_single_frame_recording_is_a_valid_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.avi");
    let mut muxer = muxer();

    muxer.start(path.clone(), Some(AUDIO), FilterType::Thermal).unwrap();
    assert!(muxer.append_video(&frame(1_000)).is_written());
    let (finalizing, summary) = muxer.stop().unwrap();
    finalizing.wait().unwrap();
    muxer.complete_finish();

    assert_eq!(summary.video_frames, 1);
    assert_eq!(summary.filter, FilterType::Thermal);
    assert!(summary.has_audio);
    let info = inspect(&path).unwrap();
    assert_eq!(info.video_frames, 1);
    assert_eq!(info.audio, Some(AUDIO));

    let thumbnail = generate_thumbnail(&path).unwrap();
    assert!(thumbnail.width() > thumbnail.height());
    assert!(thumbnail.width() <= 256);
}

#[test]
fn test_writes_are_monotonic_and_share_one_origin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.avi");
    let mut muxer = muxer();
    muxer.start(path.clone(), Some(AUDIO), FilterType::Original).unwrap();

    // Audio before the first video frame has no origin yet
    assert_eq!(
        muxer.append_audio(&tone(900)),
        AppendOutcome::Dropped(DropReason::BeforeOrigin)
    );
    assert!(muxer.append_video(&frame(1_000)).is_written());
    assert_eq!(
        muxer.append_video(&frame(1_000)),
        AppendOutcome::Dropped(DropReason::OutOfOrder)
    );
    assert_eq!(
        muxer.append_video(&frame(966)),
        AppendOutcome::Dropped(DropReason::OutOfOrder)
    );
    assert!(muxer.append_video(&frame(1_033)).is_written());
    assert_eq!(
        muxer.append_audio(&tone(990)),
        AppendOutcome::Dropped(DropReason::BeforeOrigin)
    );
    assert!(muxer.append_audio(&tone(1_000)).is_written());
    assert!(muxer.append_audio(&tone(1_010)).is_written());
    assert_eq!(
        muxer.append_audio(&tone(1_005)),
        AppendOutcome::Dropped(DropReason::OutOfOrder)
    );

    let session = muxer.session().unwrap();
    assert_eq!(session.video_frames(), 2);
    assert_eq!(session.audio_frames(), 2);

    let (finalizing, _) = muxer.stop().unwrap();
    finalizing.wait().unwrap();
    let info = inspect(&path).unwrap();
    assert_eq!(info.video_frames, 2);
    assert_eq!(info.audio, Some(AUDIO));
    assert!(info.audio_samples >= 160);
}

#[test]
fn test_appends_outside_writing_are_ignored() {
    let mut muxer = muxer();
    assert_eq!(
        muxer.append_video(&frame(0)),
        AppendOutcome::Dropped(DropReason::NotWriting)
    );
    assert!(matches!(
        muxer.stop(),
        Err(CameraError::ConfigurationFailed(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    muxer
        .start(dir.path().join("a.avi"), None, FilterType::Original)
        .unwrap();
    assert!(matches!(
        muxer.start(dir.path().join("b.avi"), None, FilterType::Original),
        Err(CameraError::ConfigurationFailed(_))
    ));
    let (finalizing, _) = muxer.stop().unwrap();
    assert_eq!(
        muxer.append_video(&frame(0)),
        AppendOutcome::Dropped(DropReason::NotWriting)
    );
    // Still finishing: no new recording until the previous one is done
    assert!(muxer.start(dir.path().join("c.avi"), None, FilterType::Original).is_err());
    finalizing.wait().unwrap();
    muxer.complete_finish();
    muxer
        .start(dir.path().join("c.avi"), None, FilterType::Original)
        .unwrap();
}

#[test]
fn test_video_only_recording_drops_audio() {
    let dir = tempfile::tempdir().unwrap();
    let mut muxer = muxer();
    muxer
        .start(dir.path().join("mute.avi"), None, FilterType::Original)
        .unwrap();
    muxer.append_video(&frame(0));
    assert_eq!(
        muxer.append_audio(&tone(10)),
        AppendOutcome::Dropped(DropReason::NoAudioTrack)
    );
}

#[test]
fn test_unwritable_destination_is_file_output_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut muxer = muxer();
    let err = muxer
        .start(dir.path().join("no").join("such.avi"), None, FilterType::Original)
        .unwrap_err();
    assert!(matches!(err, CameraError::FileOutputFailed(_)));
    assert_eq!(muxer.state(), MuxerState::Idle);
}

#[test]
fn test_virtual_camera_recording_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let options = ControllerOptions {
        capture_mode: CaptureMode::Video,
        initial_filter: FilterType::Thermal,
        video: settings(),
        media_dir: dir.path().to_path_buf(),
        ..ControllerOptions::default()
    };
    let controller = CaptureController::new(
        Arc::new(VirtualProvider::with_size(64, 48)),
        Arc::new(StaticPermissions::granted()),
        avi(),
        options,
    )
    .unwrap();

    let mut preview = controller.start().wait().unwrap();
    futures::executor::block_on(preview.next()).unwrap();
    let path = controller.start_recording().wait().unwrap();
    std::thread::sleep(Duration::from_millis(400));
    let artifact = controller.stop_recording().wait().unwrap();
    controller.stop().wait().unwrap();

    assert_eq!(artifact.path, path);
    assert_eq!(artifact.filter, Some(FilterType::Thermal));
    let info = inspect(&path).unwrap();
    assert!(info.video_frames >= 1);
    assert!(info.has_audio());
    assert_eq!((info.width, info.height), (32, 24));
}

#[test]
fn test_malformed_frame_mid_recording_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("glitch.avi");
    let mut muxer = muxer();
    muxer.start(path.clone(), None, FilterType::Original).unwrap();

    assert!(muxer.append_video(&frame(0)).is_written());
    let truncated = VideoFrame::new(
        16,
        16,
        PixelFormat::RGBA,
        vec![0u8; 10],
        Duration::from_millis(33),
    );
    assert_eq!(
        muxer.append_video(&truncated),
        AppendOutcome::Dropped(DropReason::Malformed)
    );
    for i in 2..30 {
        assert!(muxer.append_video(&frame(i * 33)).is_written());
    }

    let (finalizing, summary) = muxer.stop().unwrap();
    assert_eq!(finalizing.wait().unwrap(), path);
    muxer.complete_finish();
    assert_eq!(summary.video_frames, 29);
    assert_eq!(inspect(&path).unwrap().video_frames, 29);
}

/// xorshift64, so a failure reproduces from its seed
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[test]
fn test_shuffled_timestamps_are_written_in_increasing_order() {
    for seed in [0x9e37_79b9_7f4a_7c15, 0xdead_beef, 42] {
        let encoder = MemoryEncoderFactory::default();
        let mut muxer = RecordingMuxer::new(Arc::new(encoder.clone()), settings());
        let dir = tempfile::tempdir().unwrap();
        muxer
            .start(dir.path().join("shuffled.avi"), Some(AUDIO), FilterType::Original)
            .unwrap();

        let mut rng = Rng(seed);
        let mut origin = None;
        let (mut video, mut audio) = (Vec::new(), Vec::new());
        for step in 0..400u64 {
            // Mostly advancing, with jitter that often goes backwards
            let millis = (step * 10 + rng.next() % 120).saturating_sub(60);
            if rng.next() % 3 == 0 {
                if muxer.append_audio(&tone(millis)).is_written() {
                    audio.push(Duration::from_millis(millis));
                }
            } else if muxer.append_video(&frame(millis)).is_written() {
                origin.get_or_insert(Duration::from_millis(millis));
                video.push(Duration::from_millis(millis));
            }
        }
        let origin = origin.unwrap();

        let video_pts = encoder.video_pts();
        let audio_pts = encoder.audio_pts();
        assert!(video_pts.windows(2).all(|w| w[0] < w[1]), "seed {seed:#x}");
        assert!(audio_pts.windows(2).all(|w| w[0] < w[1]), "seed {seed:#x}");
        assert_eq!(video_pts, video.iter().map(|t| *t - origin).collect::<Vec<_>>());
        assert_eq!(audio_pts, audio.iter().map(|t| *t - origin).collect::<Vec<_>>());
        assert!(video.len() > 5 && audio.len() > 3, "seed {seed:#x}");
    }
}

#[test]
fn test_microphone_denied_writes_video_only_container() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new();
    let options = ControllerOptions {
        capture_mode: CaptureMode::Video,
        video: settings(),
        media_dir: dir.path().to_path_buf(),
        ..ControllerOptions::default()
    };
    let controller = CaptureController::new(
        Arc::new(provider.clone()),
        Arc::new(StaticPermissions::new(true, false)),
        avi(),
        options,
    )
    .unwrap();

    controller.start().wait().unwrap();
    let path = controller.start_recording().wait().unwrap();
    for i in 0..30 {
        assert!(provider.push_video(common::BACK, common::frame([200, 40, 40, 255], i * 33)));
        controller.flush().wait().unwrap();
    }
    assert!(!provider.push_audio(common::audio(100)));
    let artifact = controller.stop_recording().wait().unwrap();
    controller.stop().wait().unwrap();

    assert_eq!(artifact.path, path);
    let info = inspect(&path).unwrap();
    assert!(info.has_video());
    assert!(!info.has_audio());
    assert_eq!(info.video_frames, 30);
    assert_eq!((info.width, info.height), (32, 24));
}
