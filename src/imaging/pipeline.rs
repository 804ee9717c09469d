//! Render and encode: source bitmap → target canvas → encoded bytes.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Canvas | `image::RgbaImage::new` (zeroed, i.e. fully transparent) |
//! | Crop | `image::imageops::crop_imm` |
//! | Scale | `image::imageops::resize` with the job's [`Interpolation`](super::Interpolation) |
//! | Compose | `image::imageops::replace` |
//! | Encode | per-format encoders from `image::codecs` |
//!
//! The source is consumed by [`draw`]: its pixels are moved into the working
//! buffer and the decoded image is gone before encoding starts. Any failure
//! after the format check is reported as [`TransformError::TransformFailed`];
//! a partially written stream is never returned.

use super::TransformError;
use super::calculations::crop_fits;
use super::format::{EncoderId, ImageFormat, encoder_for};
use super::params::{CropRect, EncodeParams, Quality};
use image::buffer::ConvertBuffer;
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, Frame, ImageEncoder, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Largest canvas the pipeline will allocate (in pixels).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// An encoded output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Pick the format that will actually be written.
///
/// A format without a raster encoder is an error unless PNG fallback is
/// enabled.
pub fn resolve_format(
    requested: ImageFormat,
    png_fallback: bool,
) -> Result<ImageFormat, TransformError> {
    if encoder_for(requested).is_available() {
        Ok(requested)
    } else if png_fallback {
        debug!(%requested, "no encoder, falling back to png");
        Ok(ImageFormat::Png)
    } else {
        Err(TransformError::UnsupportedFormat(format!(
            "{} (no raster encoder)",
            requested.canonical_extension()
        )))
    }
}

/// Run the full render/encode pipeline on an owned source.
pub fn render(
    source: DynamicImage,
    natural: (u32, u32),
    canvas: (u32, u32),
    filter: FilterType,
    params: &EncodeParams,
) -> Result<Rendered, TransformError> {
    let format = resolve_format(params.format, params.png_fallback)?;

    let region = params.crop.unwrap_or(CropRect::full(natural.0, natural.1));
    if !crop_fits(&region, natural) {
        return Err(TransformError::TransformFailed(format!(
            "crop rectangle {},{} {}x{} lies outside the {}x{} source",
            region.x, region.y, region.width, region.height, natural.0, natural.1
        )));
    }
    let (cw, ch) = canvas;
    if cw as u64 * ch as u64 > MAX_CANVAS_PIXELS {
        return Err(TransformError::TransformFailed(format!(
            "canvas {cw}x{ch} exceeds {MAX_CANVAS_PIXELS} pixels"
        )));
    }

    let target = draw(source, canvas, region, filter);
    let bytes = encode(&target, format, params.quality)?;
    debug!(%format, width = cw, height = ch, bytes = bytes.len(), "encoded");

    Ok(Rendered {
        bytes,
        format,
        width: cw,
        height: ch,
    })
}

/// Draw `region` of `source` scaled onto a fresh transparent canvas.
///
/// Takes ownership of `source`; it is released before this returns.
pub fn draw(
    source: DynamicImage,
    canvas: (u32, u32),
    region: CropRect,
    filter: FilterType,
) -> RgbaImage {
    let (cw, ch) = canvas;
    let mut target = RgbaImage::new(cw, ch);

    let pixels = source.into_rgba8();
    let cropped = if region == CropRect::full(pixels.width(), pixels.height()) {
        pixels
    } else {
        let sub = imageops::crop_imm(&pixels, region.x, region.y, region.width, region.height)
            .to_image();
        drop(pixels);
        sub
    };
    let scaled = if cropped.dimensions() == canvas {
        cropped
    } else {
        imageops::resize(&cropped, cw, ch, filter)
    };

    imageops::replace(&mut target, &scaled, 0, 0);
    target
}

/// Encode a canvas. `quality` only affects JPEG.
pub fn encode(
    canvas: &RgbaImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, TransformError> {
    let (w, h) = canvas.dimensions();
    let mut bytes = Vec::new();

    let written = match encoder_for(format) {
        EncoderId::Jpeg => {
            // JPEG has no alpha channel
            let rgb: RgbImage = canvas.convert();
            JpegEncoder::new_with_quality(&mut bytes, quality.value() as u8).write_image(
                rgb.as_raw(),
                w,
                h,
                ExtendedColorType::Rgb8,
            )
        }
        EncoderId::Png => {
            PngEncoder::new(&mut bytes).write_image(canvas.as_raw(), w, h, ExtendedColorType::Rgba8)
        }
        EncoderId::Bmp => {
            BmpEncoder::new(&mut bytes).write_image(canvas.as_raw(), w, h, ExtendedColorType::Rgba8)
        }
        EncoderId::Tiff => TiffEncoder::new(Cursor::new(&mut bytes)).write_image(
            canvas.as_raw(),
            w,
            h,
            ExtendedColorType::Rgba8,
        ),
        EncoderId::Gif => GifEncoder::new(&mut bytes).encode_frame(Frame::new(canvas.clone())),
        EncoderId::Emf => {
            return Err(TransformError::UnsupportedFormat(
                ".emf (no raster encoder)".to_string(),
            ));
        }
    };

    written.map_err(|e| TransformError::TransformFailed(format!("{format} encode failed: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_image, solid_image};
    use image::{GenericImageView, Rgba};

    fn params(format: ImageFormat) -> EncodeParams {
        EncodeParams::new(format)
    }

    #[test]
    fn png_roundtrip_is_pixel_exact() {
        let source = solid_image(32, 24, [200, 40, 90]);
        let p = params(ImageFormat::Png);
        let out = render(source, (32, 24), (32, 24), FilterType::Triangle, &p).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (32, 24));
        assert!(decoded.pixels().all(|p| p.0 == [200, 40, 90]));
    }

    #[test]
    fn bmp_roundtrip_is_pixel_exact() {
        let source = solid_image(17, 9, [10, 250, 120]);
        let p = params(ImageFormat::Bmp);
        let out = render(source, (17, 9), (17, 9), FilterType::Triangle, &p).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (17, 9));
        assert!(decoded.pixels().all(|p| p.0 == [10, 250, 120]));
    }

    #[test]
    fn jpeg_roundtrip_keeps_dimensions() {
        let source = solid_image(40, 30, [128, 128, 128]);
        let p = params(ImageFormat::Jpeg);
        let out = render(source, (40, 30), (20, 15), FilterType::Triangle, &p).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (20, 15));
        assert_eq!((out.width, out.height), (20, 15));
    }

    #[test]
    fn low_jpeg_quality_is_smaller() {
        let encode_at = |q| {
            let p = params(ImageFormat::Jpeg).with_quality(Quality::new(q));
            render(gradient_image(256, 256), (256, 256), (256, 256), FilterType::Triangle, &p)
                .unwrap()
                .bytes
                .len()
        };
        assert!(encode_at(10) < encode_at(90));
    }

    #[test]
    fn quality_is_ignored_for_png() {
        let at = |q| {
            let p = params(ImageFormat::Png).with_quality(Quality::new(q));
            render(gradient_image(64, 64), (64, 64), (64, 64), FilterType::Triangle, &p)
                .unwrap()
                .bytes
        };
        assert_eq!(at(10), at(90));
    }

    #[test]
    fn gif_and_tiff_encode_and_decode() {
        for format in [ImageFormat::Gif, ImageFormat::Tiff] {
            let out = render(
                solid_image(16, 16, [0, 0, 255]),
                (16, 16),
                (8, 8),
                FilterType::Triangle,
                &params(format),
            )
            .unwrap();
            assert_eq!(out.format, format);
            let decoded = image::load_from_memory(&out.bytes).unwrap();
            assert_eq!(decoded.dimensions(), (8, 8), "{format}");
        }
    }

    #[test]
    fn emf_is_rejected_without_fallback() {
        let err = render(
            solid_image(4, 4, [0, 0, 0]),
            (4, 4),
            (4, 4),
            FilterType::Triangle,
            &params(ImageFormat::Emf),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedFormat(_)));
    }

    #[test]
    fn emf_falls_back_to_png_when_enabled() {
        let p = params(ImageFormat::Emf).with_png_fallback(true);
        let source = solid_image(4, 4, [0, 0, 0]);
        let out = render(source, (4, 4), (4, 4), FilterType::Triangle, &p).unwrap();
        assert_eq!(out.format, ImageFormat::Png);
        assert_eq!(image::guess_format(&out.bytes).unwrap(), image::ImageFormat::Png);
    }

    #[test]
    fn crop_selects_source_region() {
        // left half red, right half blue
        let source = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 10, |x, _| {
            if x < 10 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 255])
            }
        }));
        let p = params(ImageFormat::Png).with_crop(Some(CropRect::new(10, 0, 10, 10)));
        let out = render(source, (20, 10), (10, 10), FilterType::Triangle, &p).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|px| px.0 == [0, 0, 255]));
    }

    #[test]
    fn crop_outside_source_fails() {
        let p = params(ImageFormat::Png).with_crop(Some(CropRect::new(5, 5, 10, 10)));
        let source = solid_image(10, 10, [1, 2, 3]);
        let err = render(source, (10, 10), (10, 10), FilterType::Triangle, &p).unwrap_err();
        assert!(matches!(err, TransformError::TransformFailed(_)));
    }

    #[test]
    fn oversized_canvas_fails_cleanly() {
        let err = render(
            solid_image(2, 2, [1, 2, 3]),
            (2, 2),
            (u32::MAX, u32::MAX),
            FilterType::Triangle,
            &params(ImageFormat::Png),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::TransformFailed(_)));
    }

    #[test]
    fn draw_keeps_source_transparency() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 0])));
        let canvas = draw(source, (4, 4), CropRect::full(4, 4), FilterType::Triangle);
        assert!(canvas.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn draw_scales_to_canvas() {
        let canvas = draw(
            gradient_image(100, 50),
            (10, 5),
            CropRect::full(100, 50),
            FilterType::CatmullRom,
        );
        assert_eq!(canvas.dimensions(), (10, 5));
        assert!(canvas.pixels().all(|p| p.0[3] == 255));
    }
}
