//! Image transform core in pure Rust, built on the `image` crate.
//!
//! | Concern | Crate / function |
//! |---|---|
//! | **Format registry** | [`format`]: extension ↔ format ↔ encoder |
//! | **Sizing** | [`sizing`] + [`calculations`]: proportional resize arithmetic |
//! | **Render** | [`pipeline`]: crop, scale, compose onto a transparent canvas |
//! | **Encode** | JPEG (with quality), PNG, GIF, BMP, TIFF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing the encode step
//! - **Job**: [`TransformJob`], owner of the source bitmap and its sizing state
//! - **Pipeline**: The pixel work

pub mod calculations;
pub mod format;
mod job;
mod params;
pub mod pipeline;
mod sizing;

use crate::capture::CaptureError;
use thiserror::Error;

pub use calculations::BindingAxis;
pub use format::{EncoderId, ImageFormat, encoder_for, parse_format};
pub use job::TransformJob;
pub use params::{CropRect, EncodeParams, Interpolation, Quality};
pub use pipeline::Rendered;
pub use sizing::Sizing;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Image size is not initialized; load a source first")]
    NotInitialized,
    #[error("Transform failed: {0}")]
    TransformFailed(String),
    #[error("Website capture failed: {0}")]
    Capture(#[from] CaptureError),
}
