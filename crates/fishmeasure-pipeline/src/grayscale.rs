//! Mask decoding, grayscale conversion and binary thresholding.
//!
//! Segmentation hands back an RGBA (or already single-channel) mask. This
//! is the first step in the pipeline: mask in, strict 0/255 binary grid out.

use image::{DynamicImage, GrayImage, RgbaImage};
use imageproc::contrast::ThresholdType;

use crate::types::MeasureError;

/// Foreground intensity in a binary mask.
pub const FOREGROUND: u8 = 255;
/// Background intensity in a binary mask.
pub const BACKGROUND: u8 = 0;

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) into a grayscale mask.
///
/// # Errors
///
/// Returns [`MeasureError::EmptyInput`] if `bytes` is empty and
/// [`MeasureError::ImageDecode`] if the data cannot be decoded.
pub fn decode_mask(bytes: &[u8]) -> Result<GrayImage, MeasureError> {
    if bytes.is_empty() {
        return Err(MeasureError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    to_grayscale(&img)
}

/// Convert any decoded image to single-channel intensities.
///
/// Uses the `image` crate's luminance weights (`0.299 R + 0.587 G + 0.114 B`).
///
/// # Errors
///
/// Returns [`MeasureError::InvalidMask`] for a zero-sized image.
pub fn to_grayscale(image: &DynamicImage) -> Result<GrayImage, MeasureError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MeasureError::InvalidMask {
            reason: format!("zero-sized image {}x{}", image.width(), image.height()),
        });
    }
    Ok(image.to_luma8())
}

/// Convert an RGBA mask to grayscale.
///
/// # Errors
///
/// Returns [`MeasureError::InvalidMask`] for a zero-sized image.
pub fn rgba_to_grayscale(image: &RgbaImage) -> Result<GrayImage, MeasureError> {
    to_grayscale(&DynamicImage::ImageRgba8(image.clone()))
}

/// Threshold a grayscale image into a strict binary mask.
///
/// Pixels strictly brighter than `cutoff` become [`FOREGROUND`]; all
/// others become [`BACKGROUND`].
#[must_use = "returns the binary mask"]
pub fn threshold(gray: &GrayImage, cutoff: u8) -> GrayImage {
    imageproc::contrast::threshold(gray, cutoff, ThresholdType::Binary)
}

/// Binarize a mask for measurement.
///
/// Binary masks arrive as either {0, 255} or {0, 1}. A mask whose
/// brightest pixel is 1 is taken as {0, 1} and widened to
/// {[`BACKGROUND`], [`FOREGROUND`]}; anything else goes through
/// [`threshold`] with `cutoff`.
#[must_use = "returns the binary mask"]
pub fn binarize(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let max = gray.pixels().map(|p| p.0[0]).max().unwrap_or(BACKGROUND);
    if max != 1 {
        return threshold(gray, cutoff);
    }
    let mut binary = gray.clone();
    for p in binary.pixels_mut() {
        p.0[0] = if p.0[0] == 1 { FOREGROUND } else { BACKGROUND };
    }
    binary
}

/// Build a grayscale image from a raw row-major byte buffer.
///
/// # Errors
///
/// Returns [`MeasureError::InvalidMask`] if the buffer length does not
/// equal `width * height` or either dimension is zero.
pub fn gray_from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<GrayImage, MeasureError> {
    if width == 0 || height == 0 {
        return Err(MeasureError::InvalidMask {
            reason: format!("zero-sized mask {width}x{height}"),
        });
    }
    let len = bytes.len();
    GrayImage::from_raw(width, height, bytes).ok_or_else(|| MeasureError::InvalidMask {
        reason: format!("buffer of {len} bytes does not match {width}x{height}"),
    })
}

/// Count foreground pixels in a binary mask.
#[must_use]
pub fn foreground_count(binary: &GrayImage) -> u64 {
    binary
        .pixels()
        .map(|p| u64::from(p.0[0] == FOREGROUND))
        .sum()
}
