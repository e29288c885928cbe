// SPDX-License-Identifier: GPL-3.0-only

//! Filter definitions as data
//!
//! Each filter is an ordered chain of transforms. Order is part of the
//! definition: `neon` inverts before tinting, `night` boosts contrast before
//! the green tint and smooths last.

use super::FilterType;
use super::transforms::{GradientStop, Transform};

/// Blue through green and yellow to red, saturating at 35% luminance
pub const THERMAL_GRADIENT: &[GradientStop] = &[
    GradientStop {
        location: 0.0,
        color: [0.0, 0.0, 1.0],
    },
    GradientStop {
        location: 0.15,
        color: [0.0, 1.0, 0.0],
    },
    GradientStop {
        location: 0.25,
        color: [1.0, 1.0, 0.0],
    },
    GradientStop {
        location: 0.35,
        color: [1.0, 0.0, 0.0],
    },
];

const THERMAL: &[Transform] = &[Transform::ColorMap(THERMAL_GRADIENT)];

const NIGHT: &[Transform] = &[
    Transform::ColorControls {
        contrast: 2.0,
        brightness: 0.0,
        saturation: 1.0,
    },
    Transform::Monochrome {
        color: [0.0, 1.0, 0.0],
        intensity: 1.0,
    },
    Transform::NoiseReduction {
        level: 0.02,
        sharpness: 0.4,
    },
];

const XRAY: &[Transform] = &[Transform::XRay];

const GLITCH: &[Transform] = &[Transform::HueAdjust { angle: 5.0 }];

const NEON: &[Transform] = &[
    Transform::ColorInvert,
    Transform::Monochrome {
        color: [0.8, 0.0, 1.0],
        intensity: 1.0,
    },
];

const NOIR: &[Transform] = &[Transform::Noir];

const INVERT: &[Transform] = &[Transform::ColorInvert];

const DRAW: &[Transform] = &[Transform::EdgeWork];

const PIXEL: &[Transform] = &[Transform::Pixellate { scale: 8 }];

/// Filter id to transform chain
pub static REGISTRY: [(FilterType, &[Transform]); 10] = [
    (FilterType::Original, &[]),
    (FilterType::Thermal, THERMAL),
    (FilterType::Night, NIGHT),
    (FilterType::XRay, XRAY),
    (FilterType::Glitch, GLITCH),
    (FilterType::Neon, NEON),
    (FilterType::Noir, NOIR),
    (FilterType::Invert, INVERT),
    (FilterType::Draw, DRAW),
    (FilterType::Pixel, PIXEL),
];

/// Transform chain of `filter`. Empty for the identity filter.
pub fn chain_for(filter: FilterType) -> &'static [Transform] {
    REGISTRY
        .iter()
        .find(|(id, _)| *id == filter)
        .map(|(_, chain)| *chain)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_filter_has_an_entry() {
        for filter in FilterType::ALL {
            assert!(REGISTRY.iter().any(|(id, _)| *id == filter), "{filter} missing");
        }
    }

    #[test]
    fn chains_have_one_to_four_steps() {
        for filter in FilterType::ALL {
            let len = chain_for(filter).len();
            if filter.is_identity() {
                assert_eq!(len, 0);
            } else {
                assert!((1..=4).contains(&len), "{filter} has {len} steps");
            }
        }
    }

    #[test]
    fn neon_inverts_before_tinting() {
        let chain = chain_for(FilterType::Neon);
        assert_eq!(chain[0], Transform::ColorInvert);
        assert!(matches!(chain[1], Transform::Monochrome { .. }));
    }
}
