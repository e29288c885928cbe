// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the filter engine

use std::time::Duration;
use thermal_camera::backends::camera::{PixelFormat, VideoFrame};
use thermal_camera::filters::{FilterEngine, FilterType};

fn gradient(width: u32, height: u32, format: PixelFormat) -> VideoFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            data.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    VideoFrame::new(width, height, format, data, Duration::from_millis(123))
}

#[test]
fn test_identity_is_a_no_op() {
    let engine = FilterEngine::new();
    let input = gradient(9, 7, PixelFormat::BGRA);
    let output = engine.apply(&input, FilterType::Original);
    assert!(output.shares_buffer(&input));
    assert_eq!(output.timestamp, input.timestamp);
}

#[test]
fn test_every_filter_preserves_size_and_format() {
    let engine = FilterEngine::new();
    for (width, height) in [(1, 1), (3, 5), (17, 9), (64, 48)] {
        for format in [PixelFormat::RGBA, PixelFormat::BGRA] {
            let input = gradient(width, height, format);
            for filter in FilterType::ALL {
                let output = engine.apply(&input, filter);
                assert_eq!(
                    (output.width, output.height, output.format),
                    (width, height, format),
                    "{filter} changed geometry of a {width}x{height} frame"
                );
                assert!(output.is_well_formed(), "{filter} produced a malformed frame");
                assert_eq!(output.timestamp, input.timestamp);
            }
        }
    }
}

#[test]
fn test_filters_allocate_new_buffers() {
    let engine = FilterEngine::new();
    let input = gradient(8, 8, PixelFormat::RGBA);
    let before = input.data.to_vec();
    for filter in FilterType::ALL.into_iter().filter(|f| !f.is_identity()) {
        let output = engine.apply(&input, filter);
        assert!(!output.shares_buffer(&input), "{filter} reused the input buffer");
    }
    assert_eq!(&input.data[..], &before[..], "input frame was mutated");
}

#[test]
fn test_padded_input_gives_packed_output() {
    let width = 5;
    let height = 3;
    let stride = 32;
    let mut data = vec![0u8; (stride * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let offset = (y * stride + x * 4) as usize;
            data[offset..offset + 4].copy_from_slice(&[200, 50, 25, 255]);
        }
    }
    let input = VideoFrame {
        width,
        height,
        format: PixelFormat::RGBA,
        stride,
        data: data.into(),
        timestamp: Duration::ZERO,
    };

    let output = FilterEngine::new().apply(&input, FilterType::Invert);
    assert_eq!(output.stride, width * 4);
    assert_eq!(output.pixel(4, 2), [55, 205, 230, 255]);
}

#[test]
fn test_malformed_frame_passes_through() {
    let input = VideoFrame::new(10, 10, PixelFormat::RGBA, vec![0u8; 12], Duration::ZERO);
    let output = FilterEngine::new().apply(&input, FilterType::Thermal);
    assert!(output.shares_buffer(&input));
}

#[test]
fn test_thermal_maps_dark_to_blue_and_bright_to_red() {
    let engine = FilterEngine::new();
    let dark = VideoFrame::solid(2, 2, PixelFormat::RGBA, [0, 0, 0, 255], Duration::ZERO);
    let bright = VideoFrame::solid(2, 2, PixelFormat::RGBA, [255, 255, 255, 255], Duration::ZERO);

    let [r, _, b, _] = engine.apply(&dark, FilterType::Thermal).pixel(0, 0);
    assert!(b > r, "dark pixels should be cold");
    let [r, _, b, _] = engine.apply(&bright, FilterType::Thermal).pixel(0, 0);
    assert!(r > b, "bright pixels should be hot");
}
