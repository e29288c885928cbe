// SPDX-License-Identifier: GPL-3.0-only

//! Visual filters
//!
//! A filter is identified by a [`FilterType`] and defined by an ordered chain
//! of elementary [`Transform`]s looked up in the [`registry`]. The
//! [`FilterEngine`] runs a chain over a frame and never fails: a step that
//! cannot produce output is skipped and the previous result carries on.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use thermal_camera::backends::camera::types::{PixelFormat, VideoFrame};
//! use thermal_camera::filters::{FilterEngine, FilterType};
//!
//! let frame = VideoFrame::solid(8, 8, PixelFormat::BGRA, [40, 80, 120, 255], Duration::ZERO);
//! let thermal = FilterEngine::new().apply(&frame, FilterType::Thermal);
//! assert_eq!((thermal.width, thermal.height), (8, 8));
//! ```

pub mod engine;
pub mod registry;
pub mod transforms;

pub use engine::FilterEngine;
pub use transforms::{GradientStop, Transform, TransformError};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Selectable filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    /// No processing
    #[default]
    Original,
    Thermal,
    Night,
    XRay,
    Glitch,
    Neon,
    Noir,
    Invert,
    Draw,
    Pixel,
}

impl FilterType {
    /// Every filter, in picker order
    pub const ALL: [FilterType; 10] = [
        FilterType::Original,
        FilterType::Thermal,
        FilterType::Night,
        FilterType::XRay,
        FilterType::Glitch,
        FilterType::Neon,
        FilterType::Noir,
        FilterType::Invert,
        FilterType::Draw,
        FilterType::Pixel,
    ];

    /// Stable identifier, used in file names and the config file
    pub fn id(&self) -> &'static str {
        match self {
            FilterType::Original => "original",
            FilterType::Thermal => "thermal",
            FilterType::Night => "night",
            FilterType::XRay => "xRay",
            FilterType::Glitch => "glitch",
            FilterType::Neon => "neon",
            FilterType::Noir => "noir",
            FilterType::Invert => "invert",
            FilterType::Draw => "draw",
            FilterType::Pixel => "pixel",
        }
    }

    /// Human-readable name
    pub fn title(&self) -> &'static str {
        match self {
            FilterType::Original => "Original",
            FilterType::Thermal => "Thermal",
            FilterType::Night => "Night Vision",
            FilterType::XRay => "X-Ray",
            FilterType::Glitch => "Glitch",
            FilterType::Neon => "Neon",
            FilterType::Noir => "Noir",
            FilterType::Invert => "Invert",
            FilterType::Draw => "Draw",
            FilterType::Pixel => "Pixel",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }

    /// Next filter, wrapping around
    pub fn next(&self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    /// Previous filter, wrapping around
    pub fn previous(&self) -> Self {
        let len = Self::ALL.len();
        Self::ALL[(self.position() + len - 1) % len]
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, FilterType::Original)
    }

    /// Case-insensitive lookup by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.id().eq_ignore_ascii_case(id.trim()))
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter `{0}`")]
pub struct UnknownFilter(pub String);

impl FromStr for FilterType {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterType::from_id(s).ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_visits_every_filter_once() {
        let mut seen = vec![FilterType::Original];
        let mut current = FilterType::Original.next();
        while current != FilterType::Original {
            seen.push(current);
            current = current.next();
        }
        assert_eq!(seen, FilterType::ALL);
        assert_eq!(FilterType::Original.previous(), FilterType::Pixel);
        assert_eq!(FilterType::Pixel.next(), FilterType::Original);
    }

    #[test]
    fn identifiers_round_trip_through_serde_and_from_str() {
        for filter in FilterType::ALL {
            let json = serde_json::to_string(&filter).unwrap();
            assert_eq!(json, format!("\"{}\"", filter.id()));
            assert_eq!(filter.id().parse::<FilterType>(), Ok(filter));
        }
        assert_eq!("XRAY".parse::<FilterType>(), Ok(FilterType::XRay));
        assert!("sepia".parse::<FilterType>().is_err());
    }
}
