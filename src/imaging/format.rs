//! Output format registry.
//!
//! Maps the six symbolic formats to extension strings, MIME types and
//! encoders. Parsing is strict: an extension that is not in the table below
//! is an error, never a silent default.
//!
//! | Format | Extensions | Encoder |
//! |---|---|---|
//! | Jpeg | `.jpg`, `.jpeg` | `JpegEncoder` with quality |
//! | Gif | `.gif` | `GifEncoder` |
//! | Png | `.png` | `PngEncoder` |
//! | Bmp | `.bmp` | `BmpEncoder` |
//! | Tiff | `.tif`, `.tiff` | `TiffEncoder` |
//! | Emf | `.emf` | none (vector metafile, no raster encoder) |

use super::TransformError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Gif,
    Png,
    Bmp,
    Tiff,
    Emf,
}

/// Identifies the encoder that writes a given format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderId {
    Jpeg,
    Gif,
    Png,
    Bmp,
    Tiff,
    Emf,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        ImageFormat::Jpeg,
        ImageFormat::Gif,
        ImageFormat::Png,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::Emf,
    ];

    /// Canonical file extension, including the leading dot.
    pub fn canonical_extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Gif => ".gif",
            ImageFormat::Png => ".png",
            ImageFormat::Bmp => ".bmp",
            ImageFormat::Tiff => ".tiff",
            ImageFormat::Emf => ".emf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Png => "image/png",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Emf => "image/emf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_extension()[1..])
    }
}

/// Parse an extension such as `".JPG"` into a format.
///
/// The match is case-insensitive and requires the leading dot. `.tif` is an
/// alias for [`ImageFormat::Tiff`].
pub fn parse_format(extension: &str) -> Result<ImageFormat, TransformError> {
    match extension.to_lowercase().as_str() {
        ".jpg" | ".jpeg" => Ok(ImageFormat::Jpeg),
        ".gif" => Ok(ImageFormat::Gif),
        ".png" => Ok(ImageFormat::Png),
        ".bmp" => Ok(ImageFormat::Bmp),
        ".tif" | ".tiff" => Ok(ImageFormat::Tiff),
        ".emf" => Ok(ImageFormat::Emf),
        _ => Err(TransformError::UnsupportedFormat(extension.to_string())),
    }
}

/// Accepts both `"png"` and `".png"`, for CLI flags and query strings.
impl FromStr for ImageFormat {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('.') {
            parse_format(s)
        } else {
            parse_format(&format!(".{s}"))
        }
    }
}

pub fn encoder_for(format: ImageFormat) -> EncoderId {
    match format {
        ImageFormat::Jpeg => EncoderId::Jpeg,
        ImageFormat::Gif => EncoderId::Gif,
        ImageFormat::Png => EncoderId::Png,
        ImageFormat::Bmp => EncoderId::Bmp,
        ImageFormat::Tiff => EncoderId::Tiff,
        ImageFormat::Emf => EncoderId::Emf,
    }
}

impl EncoderId {
    /// Whether a raster encoder is compiled in for this id.
    pub fn is_available(self) -> bool {
        self != EncoderId::Emf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_left_inverse_of_canonical_extension() {
        for format in ImageFormat::ALL {
            assert_eq!(parse_format(format.canonical_extension()).unwrap(), format);
        }
    }

    #[test]
    fn parse_accepts_aliases_and_any_case() {
        assert_eq!(parse_format(".jpeg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(parse_format(".JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(parse_format(".tif").unwrap(), ImageFormat::Tiff);
        assert_eq!(parse_format(".TiFf").unwrap(), ImageFormat::Tiff);
    }

    #[test]
    fn parse_rejects_unknown_extension() {
        let err = parse_format(".webp").unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedFormat(ext) if ext == ".webp"));
        assert!(parse_format("").is_err());
        // the dot is required
        assert!(parse_format("png").is_err());
    }

    #[test]
    fn from_str_accepts_bare_names() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!(".gif".parse::<ImageFormat>().unwrap(), ImageFormat::Gif);
        assert_eq!("TIF".parse::<ImageFormat>().unwrap(), ImageFormat::Tiff);
        assert!("avif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn every_format_has_its_own_encoder() {
        let encoders: Vec<EncoderId> = ImageFormat::ALL.iter().map(|f| encoder_for(*f)).collect();
        for (i, a) in encoders.iter().enumerate() {
            for b in &encoders[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!encoder_for(ImageFormat::Emf).is_available());
        assert!(encoder_for(ImageFormat::Tiff).is_available());
    }

    #[test]
    fn display_omits_the_dot() {
        assert_eq!(ImageFormat::Jpeg.to_string(), "jpg");
        assert_eq!(ImageFormat::Tiff.to_string(), "tiff");
    }
}
