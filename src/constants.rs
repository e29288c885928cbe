// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application identifier, used for config and media directories
pub const APP_ID: &str = "thermal-camera";

/// Video encoder quality presets
///
/// The GStreamer backend maps a preset to a target bitrate; the built-in
/// MJPEG encoder maps it to a per-frame JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitratePreset {
    /// Smaller files, reduced quality
    Low,
    /// Balanced quality and file size (default)
    #[default]
    Medium,
    /// Larger files, better quality
    High,
}

/// Bitrates in kbps per resolution tier, as `[low, medium, high]`
const BITRATE_TABLE: [(ResolutionTier, [u32; 3]); 4] = [
    (ResolutionTier::SD, [1_000, 2_000, 4_000]),
    (ResolutionTier::HD, [2_500, 5_000, 10_000]),
    (ResolutionTier::FullHD, [4_000, 8_000, 16_000]),
    (ResolutionTier::FourK, [15_000, 30_000, 50_000]),
];

impl BitratePreset {
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    fn index(&self) -> usize {
        match self {
            BitratePreset::Low => 0,
            BitratePreset::Medium => 1,
            BitratePreset::High => 2,
        }
    }

    /// Target bitrate in kbps for a frame size.
    ///
    /// Orientation does not matter: a portrait 720x1280 stream lands in the
    /// same tier as landscape 1280x720.
    pub fn bitrate_kbps(&self, width: u32, height: u32) -> u32 {
        let tier = ResolutionTier::for_frame(width, height);
        BITRATE_TABLE
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, rates)| rates[self.index()])
            .unwrap_or(BITRATE_TABLE[0].1[self.index()])
    }

    /// JPEG quality used per frame by the MJPEG encoder
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            BitratePreset::Low => 60,
            BitratePreset::Medium => 80,
            BitratePreset::High => 92,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// 640x480 and below
    SD,
    /// 1280x720
    HD,
    /// 1920x1080
    FullHD,
    /// 3840x2160 and above
    FourK,
}

impl ResolutionTier {
    /// Classify by the long edge of the frame
    pub fn for_frame(width: u32, height: u32) -> Self {
        match width.max(height) {
            edge if edge >= 3840 => ResolutionTier::FourK,
            edge if edge >= 1920 => ResolutionTier::FullHD,
            edge if edge >= 1280 => ResolutionTier::HD,
            _ => ResolutionTier::SD,
        }
    }
}

/// Format bitrate for display (e.g., "8 Mbps" or "2.5 Mbps")
pub fn format_bitrate(kbps: u32) -> String {
    let mbps = kbps as f64 / 1000.0;
    if mbps == mbps.floor() {
        format!("{} Mbps", mbps as u32)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Recording output defaults
pub mod recording {
    /// Encoded frame width (portrait)
    pub const DEFAULT_WIDTH: u32 = 720;

    /// Encoded frame height (portrait)
    pub const DEFAULT_HEIGHT: u32 = 1280;

    /// Nominal frame rate written to the container header
    pub const DEFAULT_FRAMERATE: u32 = 30;

    /// Microphone sample rate
    pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

    /// Microphone channel count
    pub const AUDIO_CHANNELS: u16 = 1;
}

/// Queue depths between capture callbacks, the session worker and the encoder
pub mod queues {
    /// Raw video frames waiting for the session worker. Kept tiny so late
    /// frames are dropped at the device instead of piling up.
    pub const VIDEO_FRAME_DEPTH: usize = 2;

    /// Raw audio buffers waiting for the session worker
    pub const AUDIO_FRAME_DEPTH: usize = 16;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Interval between synthetic video frames (~30fps)
    pub const VIRTUAL_FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Length of one synthetic audio buffer
    pub const VIRTUAL_AUDIO_INTERVAL: Duration = Duration::from_millis(20);

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;
}

/// Thumbnail edge length in pixels
pub const THUMBNAIL_SIZE: u32 = 256;

/// Media file formats
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

    /// Supported video file extensions
    pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mov"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// Check if a file extension is a supported video format
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
