// SPDX-License-Identifier: GPL-3.0-only

//! Runs filter chains over frames

use super::FilterType;
use super::registry;
use super::transforms::Transform;
use crate::backends::camera::types::VideoFrame;
use tracing::debug;

/// Pure `(frame, filter) -> frame` mapping
///
/// The identity filter hands back the input (same buffer, no copy). Every
/// other filter returns a new frame of the same size and pixel format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, frame: &VideoFrame, filter: FilterType) -> VideoFrame {
        if filter.is_identity() {
            return frame.clone();
        }
        if !frame.is_well_formed() {
            debug!(
                width = frame.width,
                height = frame.height,
                bytes = frame.data.len(),
                "Malformed frame, passing through unfiltered"
            );
            return frame.clone();
        }
        apply_chain(frame, registry::chain_for(filter))
    }
}

/// Apply `chain` in order.
///
/// A step that fails is skipped: the last good intermediate is kept and fed
/// to the next step. An empty chain, or one where every step fails, returns
/// the input.
pub fn apply_chain(frame: &VideoFrame, chain: &[Transform]) -> VideoFrame {
    let mut current: Option<VideoFrame> = None;
    for step in chain {
        let input = current.as_ref().unwrap_or(frame);
        match step.apply(input) {
            Ok(output) => current = Some(output),
            Err(e) => {
                debug!(
                    step = step.name(),
                    error = %e,
                    "Filter step failed, keeping previous output"
                );
            }
        }
    }
    current.unwrap_or_else(|| frame.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::time::Duration;

    fn frame() -> VideoFrame {
        VideoFrame::solid(5, 3, PixelFormat::BGRA, [30, 60, 90, 255], Duration::from_millis(40))
    }

    #[test]
    fn identity_shares_the_buffer() {
        let input = frame();
        let output = FilterEngine::new().apply(&input, FilterType::Original);
        assert!(output.shares_buffer(&input));
    }

    #[test]
    fn failing_last_step_keeps_previous_result() {
        let input = frame();
        let chain = [Transform::ColorInvert, Transform::Pixellate { scale: 0 }];
        let output = apply_chain(&input, &chain);
        assert_eq!(output.pixel(0, 0), [225, 195, 165, 255]);
    }

    #[test]
    fn failing_first_step_is_skipped() {
        let input = frame();
        let chain = [Transform::Pixellate { scale: 0 }, Transform::ColorInvert];
        let output = apply_chain(&input, &chain);
        assert_eq!(output.pixel(4, 2), [225, 195, 165, 255]);
    }

    #[test]
    fn all_steps_failing_returns_input() {
        let input = frame();
        let output = apply_chain(&input, &[Transform::Pixellate { scale: 0 }]);
        assert!(output.shares_buffer(&input));
    }

    #[test]
    fn malformed_frames_pass_through() {
        let bad = VideoFrame::new(10, 10, PixelFormat::RGBA, vec![1u8; 7], Duration::ZERO);
        let output = FilterEngine::new().apply(&bad, FilterType::Thermal);
        assert!(output.shares_buffer(&bad));
    }
}
