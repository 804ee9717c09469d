//! Target-size state of a transform job.
//!
//! [`Sizing`] tracks the natural size of the loaded source, the requested
//! output size and the canvas size. With proportions constrained (the
//! default), setting one axis recomputes the other from the aspect ratio the
//! job had *before* the change, and the canvas follows the new size.
//!
//! Every mutation needs the natural size to be known; calling a setter before
//! a source is loaded fails with [`TransformError::NotInitialized`].

use super::TransformError;
use super::calculations::{BindingAxis, binding_axis, clamp_dimension, scale_other_axis};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sizing {
    natural: Option<(u32, u32)>,
    width: u32,
    height: u32,
    /// Canvas size, `(crop_x, crop_y)`.
    canvas: (u32, u32),
    pub constrain_proportions: bool,
}

impl Default for Sizing {
    fn default() -> Self {
        Self {
            natural: None,
            width: 0,
            height: 0,
            canvas: (0, 0),
            constrain_proportions: true,
        }
    }
}

impl Sizing {
    /// Sizing for a source of the given natural size.
    pub fn for_natural(width: u32, height: u32) -> Self {
        let mut sizing = Self::default();
        sizing.initialize(width, height);
        sizing
    }

    /// Record the natural size of a freshly loaded source. Target and canvas
    /// both reset to it.
    pub fn initialize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.natural = Some((width, height));
        self.width = width;
        self.height = height;
        self.canvas = (width, height);
    }

    pub fn natural(&self) -> Result<(u32, u32), TransformError> {
        self.natural.ok_or(TransformError::NotInitialized)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> (u32, u32) {
        self.canvas
    }

    fn ensure_initialized(&self) -> Result<(), TransformError> {
        self.natural().map(|_| ())
    }

    /// Set the target width. Values below one clamp to one.
    pub fn set_width(&mut self, new_width: impl Into<i64>) -> Result<(), TransformError> {
        self.ensure_initialized()?;
        let w = clamp_dimension(new_width.into());
        if self.constrain_proportions {
            self.height = scale_other_axis(self.width, w, self.height);
        }
        self.width = w;
        self.canvas = (self.width, self.height);
        Ok(())
    }

    /// Set the target height. Values below one clamp to one.
    pub fn set_height(&mut self, new_height: impl Into<i64>) -> Result<(), TransformError> {
        self.ensure_initialized()?;
        let h = clamp_dimension(new_height.into());
        if self.constrain_proportions {
            self.width = scale_other_axis(self.height, h, self.width);
        }
        self.height = h;
        self.canvas = (self.width, self.height);
        Ok(())
    }

    /// Shrink the image to fit inside `max_height` x `max_width`, keeping
    /// its proportions.
    ///
    /// Turns proportion constraining on. Only the longer side is compared to
    /// its limit, so at most one setter runs per call and neither dimension
    /// ever grows.
    pub fn set_max_proportions(
        &mut self,
        max_height: u32,
        max_width: u32,
    ) -> Result<BindingAxis, TransformError> {
        self.ensure_initialized()?;
        self.constrain_proportions = true;
        let axis = binding_axis((self.width, self.height), max_height, max_width);
        match axis {
            BindingAxis::Height => self.set_height(max_height)?,
            BindingAxis::Width => self.set_width(max_width)?,
            BindingAxis::None => {}
        }
        Ok(axis)
    }

    /// Override the canvas size without touching the target size.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<(), TransformError> {
        self.ensure_initialized()?;
        self.canvas = (width.max(1), height.max(1));
        Ok(())
    }
}
