// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test imagery and tones

use crate::backends::camera::controls::DeviceSettings;
use crate::backends::camera::types::{AudioFormat, CameraPosition, PixelFormat};

/// Torch brightness boost per channel
const TORCH_BOOST: u8 = 60;

/// Width of the moving bar in pixels
const BAR_WIDTH: u32 = 6;

/// Render one BGRA test frame.
///
/// A horizontal red / vertical green gradient with a white bar sweeping
/// left to right, one step per `tick`. The back camera has a blue floor of
/// 96, the front camera 192, so a camera switch is visible in the output.
/// Zoom crops around the center; the torch brightens everything.
pub fn render_frame(
    width: u32,
    height: u32,
    tick: u64,
    position: CameraPosition,
    settings: &DeviceSettings,
) -> Vec<u8> {
    let zoom = if settings.zoom.is_finite() {
        settings.zoom.max(1.0)
    } else {
        1.0
    };
    let boost = if settings.torch { TORCH_BOOST } else { 0 };
    let blue = match position {
        CameraPosition::Back => 96u8,
        CameraPosition::Front => 192u8,
    };
    let bar = ((tick * 4) % width.max(1) as u64) as u32;
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    let capacity = width as usize * height as usize * PixelFormat::BYTES_PER_PIXEL;
    let mut data = Vec::with_capacity(capacity);
    for y in 0..height {
        let sy = cy + (y as f32 - cy) / zoom;
        let g = (sy / height.max(1) as f32 * 255.0) as u8;
        for x in 0..width {
            let sx = cx + (x as f32 - cx) / zoom;
            let (r, g, b) = if (sx as u32).abs_diff(bar) < BAR_WIDTH / 2 {
                (255, 255, 255)
            } else {
                ((sx / width.max(1) as f32 * 255.0) as u8, g, blue)
            };
            data.extend_from_slice(&[
                b.saturating_add(boost),
                g.saturating_add(boost),
                r.saturating_add(boost),
                255,
            ]);
        }
    }
    data
}

/// Interleaved sine tone starting at sample frame `first_frame`
pub fn sine_tone(format: AudioFormat, first_frame: u64, frames: usize, frequency: f32) -> Vec<i16> {
    let channels = format.channels.max(1) as usize;
    let rate = format.sample_rate.max(1) as f32;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = (first_frame + i as u64) as f32 / rate;
        let value = ((t * frequency * std::f32::consts::TAU).sin() * i16::MAX as f32 * 0.25) as i16;
        samples.extend(std::iter::repeat_n(value, channels));
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torch_brightens_the_frame() {
        let dark = render_frame(8, 8, 0, CameraPosition::Back, &DeviceSettings::default());
        let lit = render_frame(
            8,
            8,
            0,
            CameraPosition::Back,
            &DeviceSettings {
                torch: true,
                ..Default::default()
            },
        );
        let sum = |d: &[u8]| d.iter().map(|&v| v as u64).sum::<u64>();
        assert!(sum(&lit) > sum(&dark));
    }

    #[test]
    fn positions_differ_in_blue_floor() {
        let settings = DeviceSettings::default();
        let back = render_frame(16, 4, 0, CameraPosition::Back, &settings);
        let front = render_frame(16, 4, 0, CameraPosition::Front, &settings);
        // Pixel far from the bar
        let at = (2 * 16 + 12) * 4;
        assert_eq!(back[at], 96);
        assert_eq!(front[at], 192);
    }

    #[test]
    fn tone_is_interleaved() {
        let format = AudioFormat {
            channels: 2,
            sample_rate: 8_000,
        };
        let samples = sine_tone(format, 0, 10, 440.0);
        assert_eq!(samples.len(), 20);
        assert_eq!(samples[2], samples[3]);
    }
}
