//! A single transform job: one source bitmap, one target size, one output.
//!
//! The job owns its source exclusively. [`TransformJob::render`] consumes the
//! job, so the source cannot be touched after it has been drawn and the
//! output is produced exactly once.

use super::TransformError;
use super::calculations::BindingAxis;
use super::params::{EncodeParams, Interpolation};
use super::pipeline::{self, Rendered};
use super::sizing::Sizing;
use image::DynamicImage;

#[derive(Debug, Default)]
pub struct TransformJob {
    source: Option<DynamicImage>,
    sizing: Sizing,
    interpolation: Interpolation,
}

impl TransformJob {
    /// An empty job. Sizing calls fail until a source is loaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let mut job = Self::new();
        job.load(image);
        job
    }

    /// Take ownership of a decoded source and reset sizing to its natural
    /// dimensions.
    pub fn load(&mut self, image: DynamicImage) {
        self.sizing.initialize(image.width(), image.height());
        self.source = Some(image);
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn sizing(&self) -> &Sizing {
        &self.sizing
    }

    pub fn natural_size(&self) -> Result<(u32, u32), TransformError> {
        self.sizing.natural()
    }

    pub fn set_constrain_proportions(&mut self, constrain: bool) {
        self.sizing.constrain_proportions = constrain;
    }

    pub fn set_width(&mut self, width: impl Into<i64>) -> Result<(), TransformError> {
        self.sizing.set_width(width)
    }

    pub fn set_height(&mut self, height: impl Into<i64>) -> Result<(), TransformError> {
        self.sizing.set_height(height)
    }

    pub fn set_max_proportions(
        &mut self,
        max_height: u32,
        max_width: u32,
    ) -> Result<BindingAxis, TransformError> {
        self.sizing.set_max_proportions(max_height, max_width)
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        self.sizing.set_canvas_size(width, height)
    }

    /// Draw the source into the canvas and encode it.
    pub fn render(self, params: &EncodeParams) -> Result<Rendered, TransformError> {
        let natural = self.sizing.natural()?;
        let source = self.source.ok_or(TransformError::NotInitialized)?;
        pipeline::render(
            source,
            natural,
            self.sizing.canvas(),
            self.interpolation.filter(),
            params,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageFormat;
    use crate::imaging::params::CropRect;
    use crate::test_helpers::{gradient_image, solid_image};

    #[test]
    fn empty_job_cannot_resize_or_render() {
        let mut job = TransformJob::new();
        assert!(matches!(job.set_width(10), Err(TransformError::NotInitialized)));
        let err = job.render(&EncodeParams::new(ImageFormat::Png)).unwrap_err();
        assert!(matches!(err, TransformError::NotInitialized));
    }

    #[test]
    fn load_records_natural_size() {
        let job = TransformJob::from_image(solid_image(800, 600, [0, 0, 0]));
        assert_eq!(job.natural_size().unwrap(), (800, 600));
        assert_eq!(job.sizing().canvas(), (800, 600));
        assert_eq!(job.interpolation(), Interpolation::Bilinear);
    }

    #[test]
    fn resize_800x600_to_width_400() {
        let mut job = TransformJob::from_image(gradient_image(800, 600));
        job.set_width(400).unwrap();
        assert_eq!(job.sizing().height(), 300);
        let out = job.render(&EncodeParams::new(ImageFormat::Png)).unwrap();
        assert_eq!((out.width, out.height), (400, 300));
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }

    #[test]
    fn explicit_crop_is_scaled_into_canvas() {
        let mut job = TransformJob::from_image(gradient_image(800, 600));
        job.set_width(100).unwrap();
        let params =
            EncodeParams::new(ImageFormat::Png).with_crop(Some(CropRect::new(0, 0, 400, 300)));
        let out = job.render(&params).unwrap();
        assert_eq!((out.width, out.height), (100, 75));
    }

    #[test]
    fn loading_again_replaces_source() {
        let mut job = TransformJob::from_image(solid_image(10, 10, [0, 0, 0]));
        job.set_width(5).unwrap();
        job.load(solid_image(30, 20, [255, 255, 255]));
        assert_eq!(job.natural_size().unwrap(), (30, 20));
        assert_eq!(job.sizing().canvas(), (30, 20));
    }

    #[test]
    fn bicubic_jobs_render() {
        let mut job = TransformJob::from_image(gradient_image(64, 64))
            .with_interpolation(Interpolation::Bicubic);
        job.set_max_proportions(16, 16).unwrap();
        let out = job.render(&EncodeParams::new(ImageFormat::Bmp)).unwrap();
        assert_eq!((out.width, out.height), (16, 16));
    }
}
