// SPDX-License-Identifier: MPL-2.0

//! Still capture
//!
//! ```text
//! PhotoOutput → filter → encode → disk
//!       ↓
//! continuous frame path keeps running
//! ```
//!
//! Still capture asks the device for a dedicated still image instead of
//! reusing a preview frame.

pub mod encoding;

pub use encoding::{EncodedImage, EncodingFormat, EncodingQuality, PhotoEncoder};

use crate::backends::camera::PhotoOutput;
use crate::backends::camera::types::VideoFrame;
use crate::errors::{CameraError, CameraResult};
use crate::filters::{FilterEngine, FilterType};
use crate::storage::{MediaKind, media_file_name};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct StillCapture {
    encoder: PhotoEncoder,
    engine: FilterEngine,
    output_dir: PathBuf,
}

impl StillCapture {
    pub fn new(output_dir: PathBuf, format: EncodingFormat, quality: EncodingQuality) -> Self {
        Self {
            encoder: PhotoEncoder::new(format, quality),
            engine: FilterEngine::new(),
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Take one still, filter it, encode it and write it to a fresh file.
    ///
    /// Returns the filtered frame and where it was saved.
    pub fn capture(
        &self,
        output: &dyn PhotoOutput,
        filter: FilterType,
    ) -> CameraResult<(VideoFrame, PathBuf)> {
        let raw = output.capture_still().map_err(|e| {
            warn!(error = %e, "Still capture returned no image");
            CameraError::CaptureFailed(e.to_string())
        })?;
        if !raw.is_well_formed() {
            return Err(CameraError::CaptureFailed(format!(
                "malformed {}x{} still frame",
                raw.width, raw.height
            )));
        }

        let filtered = self.engine.apply(&raw, filter);
        let encoded = self.encoder.encode(&filtered)?;
        let file_name = media_file_name(MediaKind::Photo, filter, encoded.format.extension());
        let path = self.encoder.save(&encoded, &self.output_dir, &file_name)?;

        info!(
            path = %path.display(),
            filter = %filter,
            width = filtered.width,
            height = filtered.height,
            "Photo captured"
        );
        Ok((filtered, path))
    }
}
