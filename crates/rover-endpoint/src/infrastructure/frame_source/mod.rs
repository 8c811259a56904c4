//! Frame conversion helpers shared by every frame source.
//!
//! Capture backends deliver interleaved BGR pixels.  The wire carries RGB, and
//! optionally a PNG of it, so every `FrameSource` implementation routes its
//! `reorder` and `encode` hooks through the two functions below.

pub mod mock;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::application::manage_devices::{FrameSourceError, RawFrame};

/// Swaps the first and third byte of every pixel in place.
///
/// Frames with fewer than three channels (greyscale) are left untouched.
/// Applying it twice restores the original frame.
pub fn reorder_bgr_to_rgb(frame: &mut RawFrame) {
    let channels = frame.channels as usize;
    if channels < 3 {
        return;
    }
    for pixel in frame.data.chunks_exact_mut(channels) {
        pixel.swap(0, 2);
    }
}

/// PNG-encodes a frame.
///
/// # Errors
///
/// `FrameSourceError::EncodeFailed` if the channel count has no PNG colour
/// type, the buffer size does not match the dimensions, or the encoder fails.
pub fn encode_png(frame: &RawFrame) -> Result<Vec<u8>, FrameSourceError> {
    let color = match frame.channels {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        n => {
            return Err(FrameSourceError::EncodeFailed(format!(
                "{n} channels per pixel"
            )))
        }
    };

    let expected = frame.width as usize * frame.height as usize * frame.channels as usize;
    if frame.data.len() != expected {
        return Err(FrameSourceError::EncodeFailed(format!(
            "{}x{}x{} frame carries {} bytes",
            frame.width,
            frame.height,
            frame.channels,
            frame.data.len()
        )));
    }

    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &frame.data,
            u32::from(frame.width),
            u32::from(frame.height),
            color,
        )
        .map_err(|e| FrameSourceError::EncodeFailed(e.to_string()))?;
    Ok(out)
}
