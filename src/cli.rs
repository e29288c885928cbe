// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras and filters
//! - Taking photos
//! - Recording videos
//! - Browsing and deleting captured media
//! - Showing and saving the configuration
//!
//! Every command runs against the synthetic virtual devices.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thermal_camera::backends::camera::{CameraPosition, CameraProvider};
use thermal_camera::backends::permissions::StaticPermissions;
use thermal_camera::backends::virtual_camera::VirtualProvider;
use thermal_camera::config::Config;
use thermal_camera::constants::format_bitrate;
use thermal_camera::controller::{CaptureController, CaptureMode, ControllerOptions};
use thermal_camera::filters::FilterType;
use thermal_camera::pipelines::video::default_encoder_factory;
use thermal_camera::storage::{
    HistoryFilter, delete_media_file, format_recording_time, list_media_files,
};

/// Time given to the virtual camera to deliver its first frames
const WARMUP: Duration = Duration::from_millis(300);

/// List all available cameras and microphones
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let provider = VirtualProvider::new();

    let cameras = provider.cameras();
    if cameras.is_empty() {
        println!("No cameras found.");
    } else {
        println!("Available cameras:");
        println!();
        for (index, camera) in cameras.iter().enumerate() {
            println!("  [{}] {} ({}, {})", index, camera.name, camera.position, camera.id);
        }
    }

    println!();
    let microphones = provider.microphones();
    if microphones.is_empty() {
        println!("No microphones found.");
    } else {
        println!("Available microphones:");
        println!();
        for mic in &microphones {
            let default = if mic.is_default { " [default]" } else { "" };
            println!("  {} ({}){}", mic.name, mic.id, default);
        }
    }

    Ok(())
}

/// List the selectable filters in cycling order
pub fn list_filters() -> Result<(), Box<dyn std::error::Error>> {
    println!("Available filters:");
    println!();
    for filter in FilterType::ALL {
        println!("  {:<10} {}", filter.id(), filter.title());
    }
    Ok(())
}

fn controller(
    config: &Config,
    mode: CaptureMode,
    position: CameraPosition,
    filter: Option<FilterType>,
    output_dir: Option<PathBuf>,
    audio: bool,
) -> Result<CaptureController, Box<dyn std::error::Error>> {
    let mut options = ControllerOptions::from_config(config);
    options.capture_mode = mode;
    options.camera_position = position;
    options.audio_enabled = audio;
    if let Some(filter) = filter {
        options.initial_filter = filter;
    }
    if let Some(dir) = output_dir {
        options.media_dir = dir;
    }

    let controller = CaptureController::new(
        Arc::new(VirtualProvider::new()),
        Arc::new(StaticPermissions::new(true, audio)),
        default_encoder_factory()?,
        options,
    )?;
    Ok(controller)
}

/// Take a photo with the selected filter
pub fn take_photo(
    position: CameraPosition,
    filter: Option<FilterType>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    // A file path means "save here"; a directory means "save in here"
    let rename_to = output.as_ref().filter(|p| p.extension().is_some()).cloned();
    let output_dir = match (&output, &rename_to) {
        (Some(path), Some(_)) => path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf),
        (Some(path), None) => Some(path.clone()),
        (None, _) => None,
    };

    let controller = controller(&config, CaptureMode::Photo, position, filter, output_dir, false)?;
    println!("Filter: {}", controller.current_filter().title());

    println!("Capturing...");
    let mut preview = controller.start().wait()?;
    let first = futures::executor::block_on(preview.next()).ok_or("Camera produced no frames")?;
    println!("Preview: {}x{}", first.width, first.height);
    std::thread::sleep(WARMUP);

    let (frame, path) = controller.capture_photo().wait()?;
    controller.stop().wait()?;

    if let Some(target) = rename_to {
        std::fs::rename(&path, &target)?;
        println!("Photo saved: {} ({}x{})", target.display(), frame.width, frame.height);
        return Ok(());
    }

    println!("Photo saved: {} ({}x{})", path.display(), frame.width, frame.height);
    Ok(())
}

/// Record a video with the selected filter
pub fn record_video(
    position: CameraPosition,
    duration: u64,
    filter: Option<FilterType>,
    output: Option<PathBuf>,
    enable_audio: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let audio = enable_audio && config.audio_enabled;
    let controller = controller(&config, CaptureMode::Video, position, filter, output, audio)?;

    println!("Filter: {}", controller.current_filter().title());
    println!("Duration: {} seconds", duration);
    let settings = config.video_settings();
    println!(
        "Quality: {} ({} at {}x{})",
        settings.quality.display_name(),
        format_bitrate(settings.quality.bitrate_kbps(settings.width, settings.height)),
        settings.width,
        settings.height
    );
    if audio {
        println!("Audio: enabled");
    }

    let _preview = controller.start().wait()?;
    let path = controller.start_recording().wait()?;
    println!("Output: {}", path.display());

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);
    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        print!("\rRecording: {}", format_recording_time(start.elapsed()));
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    let artifact = controller.stop_recording().wait()?;
    controller.stop().wait()?;
    println!("Video saved: {}", artifact.path.display());

    Ok(())
}

/// Print captured media, newest first
pub fn show_history(filter: Option<FilterType>) -> Result<(), Box<dyn std::error::Error>> {
    let dir = Config::load().media_dir();
    let selection = filter.map(HistoryFilter::Filter).unwrap_or_default();
    let files = selection.apply(list_media_files(&dir)?);

    if files.is_empty() {
        println!("No media in {}", dir.display());
        return Ok(());
    }

    println!("Media in {}:", dir.display());
    println!();
    for file in &files {
        let filter = file.filter.map(|f| f.title()).unwrap_or("-");
        println!(
            "  {}  {:<5}  {:<10}  {}",
            file.created.format("%Y-%m-%d %H:%M:%S"),
            file.kind.prefix(),
            filter,
            file.file_name
        );
    }

    Ok(())
}

/// Delete one captured file; bare names resolve against the media directory
pub fn delete_file(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let path = if file.components().count() == 1 && !file.exists() {
        Config::load().media_dir().join(file)
    } else {
        file
    };
    delete_media_file(&path)?;
    println!("Deleted: {}", path.display());
    Ok(())
}

/// Print the configuration as JSON, optionally writing it back to disk
pub fn show_config(save: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    match Config::config_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    println!("Media directory: {}", config.media_dir().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        println!();
        println!("Configuration saved.");
    }
    Ok(())
}
