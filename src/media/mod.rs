// SPDX-License-Identifier: MPL-2.0

//! Media formats
//!
//! - [`decoders`]: Reading recordings back through GStreamer, for
//!   thumbnails and inspection

pub mod decoders;

pub use decoders::{DecodeError, MediaInfo, first_video_frame, inspect};
