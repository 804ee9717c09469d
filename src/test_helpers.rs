//! Shared test utilities for the webthumb test suite.
//!
//! Synthetic images (solid colours, gradients) and helpers that write them to
//! disk or encode them in memory, so tests never depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("in.png");
//! write_png(&path, 800, 600);
//!
//! let job = TransformJob::from_image(gradient_image(800, 600));
//! ```

use image::{DynamicImage, ImageFormat as CodecFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

// =========================================================================
// Synthetic images
// =========================================================================

/// A single-colour RGB image.
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// A red/green gradient across the axes, so crops and scales are visible
/// in the pixel values.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 128])
    });
    DynamicImage::ImageRgb8(img)
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// PNG-encoded gradient bytes.
pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    gradient_image(width, height)
        .write_to(&mut Cursor::new(&mut buf), CodecFormat::Png)
        .unwrap();
    buf
}

/// Write a gradient PNG to `path`.
pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode_png(width, height)).unwrap();
}
