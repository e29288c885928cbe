// SPDX-License-Identifier: MPL-2.0

//! Elementary per-frame transforms
//!
//! Every transform reads a frame and returns a new, tightly packed frame of
//! the same size, pixel format and timestamp. Color math runs on normalized
//! `f32` RGB; alpha is carried through untouched.

use crate::backends::camera::types::VideoFrame;
use thiserror::Error;

/// BT.601 luma weights
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("gradient has no stops")]
    EmptyGradient,
    #[error("frame geometry does not match its buffer")]
    MalformedFrame,
}

/// One color of a gradient lookup table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position in `[0, 1]`
    pub location: f32,
    pub color: [f32; 3],
}

/// A single image operation with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Map luminance through a 256-entry gradient lookup table
    ColorMap(&'static [GradientStop]),
    /// Contrast around mid-gray, additive brightness, saturation around luma
    ColorControls {
        contrast: f32,
        brightness: f32,
        saturation: f32,
    },
    /// Tint by luminance, blended with the input by `intensity`
    Monochrome { color: [f32; 3], intensity: f32 },
    /// Edge-preserving smoothing followed by an unsharp mask
    NoiseReduction { level: f32, sharpness: f32 },
    /// Inverted luminance with a cold tint
    XRay,
    /// Rotate hue by `angle` radians
    HueAdjust { angle: f32 },
    ColorInvert,
    /// High-contrast black and white
    Noir,
    /// Sobel edges as dark strokes on paper
    EdgeWork,
    /// Average over `scale` x `scale` blocks
    Pixellate { scale: u32 },
}

impl Transform {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Transform::ColorMap(_) => "color-map",
            Transform::ColorControls { .. } => "color-controls",
            Transform::Monochrome { .. } => "monochrome",
            Transform::NoiseReduction { .. } => "noise-reduction",
            Transform::XRay => "x-ray",
            Transform::HueAdjust { .. } => "hue-adjust",
            Transform::ColorInvert => "color-invert",
            Transform::Noir => "noir",
            Transform::EdgeWork => "edge-work",
            Transform::Pixellate { .. } => "pixellate",
        }
    }

    pub fn apply(&self, frame: &VideoFrame) -> Result<VideoFrame, TransformError> {
        if !frame.is_well_formed() {
            return Err(TransformError::MalformedFrame);
        }
        match *self {
            Transform::ColorMap(stops) => {
                let lut = gradient_lut(stops)?;
                Ok(map_rgb(frame, |rgb| {
                    let idx = (luma(rgb) * 255.0).round().clamp(0.0, 255.0) as usize;
                    lut[idx]
                }))
            }
            Transform::ColorControls {
                contrast,
                brightness,
                saturation,
            } => {
                require_finite("contrast", contrast)?;
                require_finite("brightness", brightness)?;
                require_finite("saturation", saturation)?;
                Ok(map_rgb(frame, |rgb| {
                    let l = luma(rgb);
                    rgb.map(|c| {
                        let saturated = l + (c - l) * saturation;
                        (saturated + brightness - 0.5) * contrast + 0.5
                    })
                }))
            }
            Transform::Monochrome { color, intensity } => {
                require_unit("intensity", intensity)?;
                Ok(map_rgb(frame, |rgb| {
                    let l = luma(rgb);
                    [0, 1, 2].map(|i| rgb[i] + (l * color[i] - rgb[i]) * intensity)
                }))
            }
            Transform::NoiseReduction { level, sharpness } => {
                require_unit("noise level", level)?;
                require_finite("sharpness", sharpness)?;
                Ok(noise_reduction(frame, level, sharpness))
            }
            Transform::XRay => Ok(map_rgb(frame, |rgb| {
                let l = 1.0 - luma(rgb);
                [l * 0.82, l * 0.94, l]
            })),
            Transform::HueAdjust { angle } => {
                require_finite("angle", angle)?;
                let (sin, cos) = angle.sin_cos();
                Ok(map_rgb(frame, |rgb| rotate_hue(rgb, sin, cos)))
            }
            Transform::ColorInvert => Ok(map_rgb(frame, |rgb| rgb.map(|c| 1.0 - c))),
            Transform::Noir => Ok(map_rgb(frame, |rgb| {
                let adjusted = (luma(rgb) - 0.5) * 2.0 + 0.5;
                [adjusted; 3]
            })),
            Transform::EdgeWork => Ok(edge_work(frame)),
            Transform::Pixellate { scale } => {
                if scale == 0 {
                    return Err(TransformError::InvalidParameter {
                        name: "pixel scale",
                        value: 0.0,
                    });
                }
                Ok(pixellate(frame, scale as usize))
            }
        }
    }
}

fn require_finite(name: &'static str, value: f32) -> Result<(), TransformError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TransformError::InvalidParameter { name, value })
    }
}

fn require_unit(name: &'static str, value: f32) -> Result<(), TransformError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TransformError::InvalidParameter { name, value })
    }
}

#[inline]
fn luma(rgb: [f32; 3]) -> f32 {
    LUMA[0] * rgb[0] + LUMA[1] * rgb[1] + LUMA[2] * rgb[2]
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Per-pixel color mapping into a fresh tightly packed buffer
fn map_rgb(frame: &VideoFrame, f: impl Fn([f32; 3]) -> [f32; 3]) -> VideoFrame {
    let (ro, go, bo) = frame.format.rgb_offsets();
    let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
    for y in 0..frame.height {
        let row: &[[u8; 4]] = bytemuck::cast_slice(frame.row(y));
        for px in row {
            let rgb = [
                px[ro] as f32 / 255.0,
                px[go] as f32 / 255.0,
                px[bo] as f32 / 255.0,
            ];
            let [r, g, b] = f(rgb);
            let mut pixel = [0u8; 4];
            pixel[ro] = to_u8(r);
            pixel[go] = to_u8(g);
            pixel[bo] = to_u8(b);
            pixel[3] = px[3];
            out.extend_from_slice(&pixel);
        }
    }
    VideoFrame::new(frame.width, frame.height, frame.format, out, frame.timestamp)
}

/// Normalized RGB plane plus alpha, for neighborhood operations
struct Plane {
    width: usize,
    height: usize,
    rgb: Vec<[f32; 3]>,
    alpha: Vec<u8>,
}

impl Plane {
    fn from_frame(frame: &VideoFrame) -> Self {
        let (ro, go, bo) = frame.format.rgb_offsets();
        let count = frame.width as usize * frame.height as usize;
        let mut rgb = Vec::with_capacity(count);
        let mut alpha = Vec::with_capacity(count);
        for y in 0..frame.height {
            let row: &[[u8; 4]] = bytemuck::cast_slice(frame.row(y));
            for px in row {
                rgb.push([
                    px[ro] as f32 / 255.0,
                    px[go] as f32 / 255.0,
                    px[bo] as f32 / 255.0,
                ]);
                alpha.push(px[3]);
            }
        }
        Self {
            width: frame.width as usize,
            height: frame.height as usize,
            rgb,
            alpha,
        }
    }

    /// Sample with edge clamping
    #[inline]
    fn at(&self, x: isize, y: isize) -> [f32; 3] {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.rgb[y * self.width + x]
    }

    fn into_frame(self, source: &VideoFrame) -> VideoFrame {
        let (ro, go, bo) = source.format.rgb_offsets();
        let mut out = Vec::with_capacity(self.rgb.len() * 4);
        for (rgb, a) in self.rgb.iter().zip(&self.alpha) {
            let mut pixel = [0u8; 4];
            pixel[ro] = to_u8(rgb[0]);
            pixel[go] = to_u8(rgb[1]);
            pixel[bo] = to_u8(rgb[2]);
            pixel[3] = *a;
            out.extend_from_slice(&pixel);
        }
        VideoFrame::new(
            source.width,
            source.height,
            source.format,
            out,
            source.timestamp,
        )
    }
}

/// Build the 256-entry lookup table for a gradient
fn gradient_lut(stops: &[GradientStop]) -> Result<[[f32; 3]; 256], TransformError> {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(TransformError::EmptyGradient),
    };
    let mut lut = [[0.0f32; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let t = i as f32 / 255.0;
        *entry = if t <= first.location {
            first.color
        } else if t >= last.location {
            last.color
        } else {
            let upper = stops
                .iter()
                .position(|s| s.location >= t)
                .unwrap_or(stops.len() - 1)
                .max(1);
            let a = &stops[upper - 1];
            let b = &stops[upper];
            let span = (b.location - a.location).max(f32::EPSILON);
            let k = ((t - a.location) / span).clamp(0.0, 1.0);
            [0, 1, 2].map(|c| a.color[c] + (b.color[c] - a.color[c]) * k)
        };
    }
    Ok(lut)
}

/// Rotate hue in YIQ space
fn rotate_hue(rgb: [f32; 3], sin: f32, cos: f32) -> [f32; 3] {
    let [r, g, b] = rgb;
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let i = 0.596 * r - 0.274 * g - 0.322 * b;
    let q = 0.211 * r - 0.523 * g + 0.312 * b;

    let i2 = i * cos - q * sin;
    let q2 = i * sin + q * cos;

    [
        y + 0.956 * i2 + 0.621 * q2,
        y - 0.272 * i2 - 0.647 * q2,
        y - 1.106 * i2 + 1.703 * q2,
    ]
}

fn noise_reduction(frame: &VideoFrame, level: f32, sharpness: f32) -> VideoFrame {
    let src = Plane::from_frame(frame);
    let mut rgb = Vec::with_capacity(src.rgb.len());
    for y in 0..src.height as isize {
        for x in 0..src.width as isize {
            let center = src.at(x, y);
            let center_luma = luma(center);
            let mut smooth = [0.0f32; 3];
            let mut box_sum = [0.0f32; 3];
            let mut taken = 0.0f32;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let n = src.at(x + dx, y + dy);
                    for c in 0..3 {
                        box_sum[c] += n[c];
                    }
                    // Only average neighbors that look like noise, not edges
                    if (luma(n) - center_luma).abs() <= level {
                        for c in 0..3 {
                            smooth[c] += n[c];
                        }
                        taken += 1.0;
                    }
                }
            }
            rgb.push([0, 1, 2].map(|c| {
                let denoised = smooth[c] / taken;
                let blurred = box_sum[c] / 9.0;
                denoised + (center[c] - blurred) * sharpness
            }));
        }
    }
    Plane { rgb, ..src }.into_frame(frame)
}

fn edge_work(frame: &VideoFrame) -> VideoFrame {
    let src = Plane::from_frame(frame);
    let l = |x: isize, y: isize| luma(src.at(x, y));

    // Pseudo-random paper grain, stable per pixel
    let grain = |x: usize, y: usize| -> f32 {
        let p = (x as f32 * 127.1 + y as f32 * 311.7) * 0.01;
        (p.sin() * 43758.5453).fract().abs()
    };

    let mut rgb = Vec::with_capacity(src.rgb.len());
    for py in 0..src.height {
        for px in 0..src.width {
            let (x, y) = (px as isize, py as isize);
            let gx = -l(x - 1, y - 1) - 2.0 * l(x - 1, y) - l(x - 1, y + 1)
                + l(x + 1, y - 1)
                + 2.0 * l(x + 1, y)
                + l(x + 1, y + 1);
            let gy = -l(x - 1, y - 1) - 2.0 * l(x, y - 1) - l(x + 1, y - 1)
                + l(x - 1, y + 1)
                + 2.0 * l(x, y + 1)
                + l(x + 1, y + 1);
            let edge = (gx * gx + gy * gy).sqrt();
            let stroke = 1.0 - edge * 2.0;
            let paper = 0.95 + grain(px, py) * 0.05;
            rgb.push([(stroke * paper).clamp(0.0, 1.0); 3]);
        }
    }
    Plane { rgb, ..src }.into_frame(frame)
}

fn pixellate(frame: &VideoFrame, scale: usize) -> VideoFrame {
    let mut plane = Plane::from_frame(frame);
    let (w, h) = (plane.width, plane.height);
    for by in (0..h).step_by(scale) {
        for bx in (0..w).step_by(scale) {
            let y_end = (by + scale).min(h);
            let x_end = (bx + scale).min(w);
            let mut sum = [0.0f32; 3];
            for y in by..y_end {
                for x in bx..x_end {
                    let px = plane.rgb[y * w + x];
                    for c in 0..3 {
                        sum[c] += px[c];
                    }
                }
            }
            let n = ((y_end - by) * (x_end - bx)) as f32;
            let mean = sum.map(|s| s / n);
            for y in by..y_end {
                for x in bx..x_end {
                    plane.rgb[y * w + x] = mean;
                }
            }
        }
    }
    plane.into_frame(frame)
}
