// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings, stored as JSON under the user's config directory

use crate::backends::camera::types::{CameraPosition, Framerate};
use crate::constants::{APP_ID, BitratePreset, recording};
use crate::controller::CaptureMode;
use crate::filters::FilterType;
use crate::pipelines::photo::{EncodingFormat, EncodingQuality};
use crate::pipelines::video::VideoSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no config directory on this system")]
    NoConfigDir,
}

/// Recording output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: recording::DEFAULT_WIDTH,
            height: recording::DEFAULT_HEIGHT,
            framerate: recording::DEFAULT_FRAMERATE,
            bitrate_preset: BitratePreset::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    pub format: EncodingFormat,
    pub quality: EncodingQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where photos and videos go; `None` uses the data directory
    pub media_dir: Option<PathBuf>,
    /// Filter selected when a session starts
    pub default_filter: FilterType,
    pub capture_mode: CaptureMode,
    /// Camera opened by `start`
    pub camera_position: CameraPosition,
    pub video: VideoConfig,
    pub photo: PhotoConfig,
    /// Request microphone access and record audio when granted
    pub audio_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_dir: None,
            default_filter: FilterType::default(),
            capture_mode: CaptureMode::default(),
            camera_position: CameraPosition::default(),
            video: VideoConfig::default(),
            photo: PhotoConfig::default(),
            audio_enabled: true,
        }
    }
}

impl Config {
    /// `<config_dir>/thermal-camera/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join(CONFIG_FILE))
    }

    /// Load from the default location. Problems are logged and defaults used.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("No config directory, using defaults");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Media directory in effect
    pub fn media_dir(&self) -> PathBuf {
        self.media_dir.clone().unwrap_or_else(default_media_dir)
    }

    pub fn video_settings(&self) -> VideoSettings {
        VideoSettings {
            width: self.video.width.max(2),
            height: self.video.height.max(2),
            framerate: Framerate::from_int(self.video.framerate.max(1)),
            quality: self.video.bitrate_preset,
        }
    }
}

/// `<data_local_dir>/thermal-camera/media`, or `./media` without a data dir
pub fn default_media_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_ID))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media")
}
