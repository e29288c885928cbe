// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for managing photo and video files
//!
//! Media files are named `<kind>-<uuid>-<filter>.<ext>`, e.g.
//! `video-6f1c…-thermal.mp4`. The filter segment is what history filtering
//! matches against.

use crate::constants::{THUMBNAIL_SIZE, file_formats};
use crate::errors::{CameraError, CameraResult};
use crate::filters::FilterType;
use crate::media::decoders;
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// Kind implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if file_formats::is_image_extension(ext) {
            Some(MediaKind::Photo)
        } else if file_formats::is_video_extension(ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Fresh, unique media file name
pub fn media_file_name(kind: MediaKind, filter: FilterType, extension: &str) -> String {
    format!("{}-{}-{}.{}", kind.prefix(), Uuid::new_v4(), filter.id(), extension)
}

/// Filter encoded in a media file name, if any
pub fn filter_from_file_name(file_name: &str) -> Option<FilterType> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let (_, suffix) = stem.rsplit_once('-')?;
    FilterType::from_id(suffix)
}

/// A persisted photo or video
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: MediaKind,
    pub created: DateTime<Local>,
    /// Filter decoded from the file name
    pub filter: Option<FilterType>,
}

impl MediaArtifact {
    /// Describe the file at `path`
    pub fn from_path(path: &Path) -> CameraResult<Self> {
        let kind = MediaKind::from_path(path).ok_or_else(|| {
            CameraError::FileOutputFailed(format!("not a media file: {}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = std::fs::metadata(path)?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        Ok(Self {
            path: path.to_path_buf(),
            filter: filter_from_file_name(&file_name),
            file_name,
            kind,
            created,
        })
    }

    /// Thumbnail, at most [`THUMBNAIL_SIZE`] on the long edge
    pub fn thumbnail(&self) -> CameraResult<RgbaImage> {
        match self.kind {
            MediaKind::Photo => photo_thumbnail(&self.path),
            MediaKind::Video => generate_thumbnail(&self.path),
        }
    }
}

/// Every media file in `dir`, newest first.
///
/// A missing directory is simply empty.
pub fn list_media_files(dir: &Path) -> CameraResult<Vec<MediaArtifact>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<MediaArtifact> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && MediaKind::from_path(path).is_some())
        .filter_map(|path| match MediaArtifact::from_path(&path) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable media file");
                None
            }
        })
        .collect();

    files.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| b.file_name.cmp(&a.file_name))
    });
    debug!(dir = %dir.display(), count = files.len(), "Listed media files");
    Ok(files)
}

pub fn delete_media_file(path: &Path) -> CameraResult<()> {
    if MediaKind::from_path(path).is_none() {
        return Err(CameraError::FileOutputFailed(format!(
            "refusing to delete non-media file {}",
            path.display()
        )));
    }
    std::fs::remove_file(path).map_err(|e| {
        CameraError::FileOutputFailed(format!("failed to delete {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "Deleted media file");
    Ok(())
}

/// Thumbnail of a recording: its first video frame
pub fn generate_thumbnail(video: &Path) -> CameraResult<RgbaImage> {
    let frame = decoders::first_video_frame(video)
        .map_err(|e| CameraError::FileOutputFailed(format!("{}: {}", video.display(), e)))?;
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba()).ok_or_else(|| {
        CameraError::FileOutputFailed(format!("{}: truncated video frame", video.display()))
    })?;
    Ok(image::DynamicImage::ImageRgba8(image)
        .thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
        .into_rgba8())
}

/// Downscaled copy of a photo
pub fn photo_thumbnail(photo: &Path) -> CameraResult<RgbaImage> {
    let image = image::open(photo)
        .map_err(|e| CameraError::FileOutputFailed(format!("{}: {}", photo.display(), e)))?;
    Ok(image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).into_rgba8())
}

/// History view selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    Filter(FilterType),
}

impl HistoryFilter {
    pub fn matches(&self, artifact: &MediaArtifact) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Filter(filter) => artifact.filter == Some(*filter),
        }
    }

    pub fn apply(&self, artifacts: Vec<MediaArtifact>) -> Vec<MediaArtifact> {
        artifacts.into_iter().filter(|a| self.matches(a)).collect()
    }
}

/// Elapsed recording time as `HH:MM:SS`
pub fn format_recording_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
