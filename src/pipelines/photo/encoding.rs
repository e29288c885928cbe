// SPDX-License-Identifier: GPL-3.0-only

//! Still image encoding
//!
//! - JPEG (with quality control)
//! - PNG (lossless)

use crate::backends::camera::types::VideoFrame;
use crate::errors::{CameraError, CameraResult};
use image::{ExtendedColorType, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    #[default]
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    pub const ALL: [EncodingFormat; 2] = [EncodingFormat::Jpeg, EncodingFormat::Png];

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }
}

impl std::str::FromStr for EncodingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(EncodingFormat::Jpeg),
            "png" => Ok(EncodingFormat::Png),
            other => Err(format!("unknown photo format: {}", other)),
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoded image data ready for saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    quality: EncodingQuality,
}

impl PhotoEncoder {
    pub fn new(format: EncodingFormat, quality: EncodingQuality) -> Self {
        Self { format, quality }
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn quality(&self) -> EncodingQuality {
        self.quality
    }

    /// Encode a frame. JPEG drops alpha; PNG keeps it.
    pub fn encode(&self, frame: &VideoFrame) -> CameraResult<EncodedImage> {
        if !frame.is_well_formed() {
            return Err(CameraError::CaptureFailed(format!(
                "malformed {}x{} still frame",
                frame.width, frame.height
            )));
        }

        let data = match self.format {
            EncodingFormat::Jpeg => Self::encode_jpeg(frame, self.quality)?,
            EncodingFormat::Png => Self::encode_png(frame)?,
        };
        debug!(size = data.len(), format = ?self.format, "Encoding complete");

        Ok(EncodedImage {
            data,
            format: self.format,
            width: frame.width,
            height: frame.height,
        })
    }

    /// Write `encoded` to `dir/file_name`, creating `dir` if needed
    pub fn save(
        &self,
        encoded: &EncodedImage,
        dir: &Path,
        file_name: &str,
    ) -> CameraResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            CameraError::FileOutputFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;
        let path = dir.join(file_name);
        std::fs::write(&path, &encoded.data).map_err(|e| {
            CameraError::FileOutputFailed(format!("failed to save {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), bytes = encoded.data.len(), "Photo saved");
        Ok(path)
    }

    fn encode_jpeg(frame: &VideoFrame, quality: EncodingQuality) -> CameraResult<Vec<u8>> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb())
            .ok_or_else(|| CameraError::CaptureFailed("frame buffer too small".into()))?;
        let mut buffer = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.jpeg_quality())
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| CameraError::FileOutputFailed(format!("JPEG encoding failed: {}", e)))?;
        Ok(buffer)
    }

    fn encode_png(frame: &VideoFrame) -> CameraResult<Vec<u8>> {
        let image = RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba())
            .ok_or_else(|| CameraError::CaptureFailed("frame buffer too small".into()))?;
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| CameraError::FileOutputFailed(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::time::Duration;

    #[test]
    fn png_round_trips_pixels() {
        let frame = VideoFrame::solid(3, 2, PixelFormat::BGRA, [10, 20, 30, 255], Duration::ZERO);
        let encoded = PhotoEncoder::new(EncodingFormat::Png, EncodingQuality::High)
            .encode(&frame)
            .unwrap();
        let decoded = image::load_from_memory(&encoded.data).unwrap().into_rgba8();
        assert_eq!(decoded.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn jpeg_quality_presets_are_ordered() {
        assert!(EncodingQuality::Low.jpeg_quality() < EncodingQuality::Medium.jpeg_quality());
        assert!(EncodingQuality::High.jpeg_quality() < EncodingQuality::Maximum.jpeg_quality());
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("JPEG".parse::<EncodingFormat>(), Ok(EncodingFormat::Jpeg));
        assert_eq!("png".parse::<EncodingFormat>(), Ok(EncodingFormat::Png));
        assert!("dng".parse::<EncodingFormat>().is_err());
    }
}
