//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the request layer (which decides what image to produce)
//! and the [`pipeline`](super::pipeline) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 50). Clamped on construction.
//! - [`CropRect`]: Source-space region to draw into the canvas.
//! - [`Interpolation`]: Resampling filter used when drawing the source.
//! - [`EncodeParams`]: Everything the encode step needs: format, quality, crop.

use super::format::ImageFormat;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
///
/// Ignored for every format except JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(50)
    }
}

/// A rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full-source rectangle for an image of the given size.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Parses `x,y,width,height`, as given on the command line.
impl std::str::FromStr for CropRect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid crop rectangle '{s}': {e}"))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(format!(
                "invalid crop rectangle '{s}': expected x,y,width,height"
            )),
        }
    }
}

/// Resampling filter for drawing the source into the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// High-quality bilinear (triangle filter).
    #[default]
    Bilinear,
    /// Bicubic (Catmull-Rom), sharper on downscales.
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn filter(self) -> FilterType {
        match self {
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
            Interpolation::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" => Ok(Interpolation::Bilinear),
            "bicubic" => Ok(Interpolation::Bicubic),
            "lanczos3" => Ok(Interpolation::Lanczos3),
            _ => Err(format!(
                "unknown interpolation '{s}': expected bilinear, bicubic or lanczos3"
            )),
        }
    }
}

/// Parameters for the render/encode step.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub format: ImageFormat,
    pub quality: Quality,
    /// Region of the source to draw. `None` draws the whole source.
    pub crop: Option<CropRect>,
    /// Encode as PNG when `format` has no raster encoder, instead of failing.
    pub png_fallback: bool,
}

impl EncodeParams {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: Quality::default(),
            crop: None,
            png_fallback: false,
        }
    }

    pub fn with_png_fallback(mut self, enabled: bool) -> Self {
        self.png_fallback = enabled;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_crop(mut self, crop: Option<CropRect>) -> Self {
        self.crop = crop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_50() {
        assert_eq!(Quality::default().value(), 50);
    }

    #[test]
    fn crop_rect_parses_four_numbers() {
        let rect: CropRect = "10, 20,300,400".parse().unwrap();
        assert_eq!(rect, CropRect::new(10, 20, 300, 400));
    }

    #[test]
    fn crop_rect_rejects_wrong_arity_and_garbage() {
        assert!("1,2,3".parse::<CropRect>().is_err());
        assert!("1,2,3,4,5".parse::<CropRect>().is_err());
        assert!("a,b,c,d".parse::<CropRect>().is_err());
        assert!("-1,0,10,10".parse::<CropRect>().is_err());
    }

    #[test]
    fn interpolation_defaults_to_bilinear() {
        assert_eq!(Interpolation::default().filter(), FilterType::Triangle);
        assert_eq!(Interpolation::Bicubic.filter(), FilterType::CatmullRom);
    }

    #[test]
    fn interpolation_parses_names() {
        assert_eq!("Bicubic".parse::<Interpolation>(), Ok(Interpolation::Bicubic));
        assert_eq!("lanczos3".parse::<Interpolation>(), Ok(Interpolation::Lanczos3));
        assert!("nearest".parse::<Interpolation>().is_err());
    }

    #[test]
    fn encode_params_builder() {
        let params = EncodeParams::new(ImageFormat::Jpeg)
            .with_quality(Quality::new(90))
            .with_crop(Some(CropRect::full(10, 10)));
        assert_eq!(params.quality.value(), 90);
        assert_eq!(params.crop, Some(CropRect::new(0, 0, 10, 10)));
    }
}
