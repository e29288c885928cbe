// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use thermal_camera::constants::{BitratePreset, file_formats};

#[test]
fn test_bitrate_preset_values() {
    assert_eq!(BitratePreset::ALL.len(), 3);
}

#[test]
fn test_bitrate_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut prev_bitrate = 0u32;
    let mut prev_quality = 0u8;
    for preset in BitratePreset::ALL {
        let bitrate = preset.bitrate_kbps(720, 1280);
        assert!(bitrate > prev_bitrate);
        assert!(preset.jpeg_quality() > prev_quality);
        prev_bitrate = bitrate;
        prev_quality = preset.jpeg_quality();
    }
}

#[test]
fn test_bitrate_scales_with_resolution() {
    let sd = BitratePreset::Medium.bitrate_kbps(480, 640);
    let hd = BitratePreset::Medium.bitrate_kbps(720, 1280);
    let uhd = BitratePreset::Medium.bitrate_kbps(2160, 3840);

    assert!(sd < hd);
    assert!(hd < uhd);
}

#[test]
fn test_bitrate_preset_display_names() {
    for preset in BitratePreset::ALL {
        assert!(
            !preset.display_name().is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_media_extensions() {
    assert!(file_formats::is_video_extension("AVI"));
    assert!(file_formats::is_video_extension("mp4"));
    assert!(file_formats::is_image_extension("JPG"));
    assert!(!file_formats::is_image_extension("avi"));
}
