//! Request-level entry point: source in, encoded thumbnail out.
//!
//! [`Thumbnailer`] owns the long-lived pieces (HTTP fetcher, capture bridge,
//! placeholder, output defaults) and runs one [`TransformRequest`] at a time
//! through acquisition, sizing and the render pipeline:
//!
//! ```text
//! TransformRequest
//!   ├── acquire    local file / remote image / website / bytes
//!   ├── size       SizeMode: proportional, fit or exact
//!   └── render     crop → scale → encode
//! ```
//!
//! A `Thumbnailer` is `Sync`; the batch command shares one across a rayon
//! pool and each request gets its own job and bitmap.

use crate::acquire::{
    self, Fetcher, FetchError, HttpFetcher, InMemory, LocalFile, Placeholder,
    RemoteImage, SourceDescriptor, WebsiteSnapshot,
};
use crate::capture::{self, CaptureBridge, CaptureRequest, Viewport};
use crate::config::{OutputConfig, ServiceConfig};
use crate::imaging::{
    CropRect, EncodeParams, ImageFormat, Quality, Rendered, TransformError, TransformJob, pipeline,
};
use crate::types::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// How the requested width and height are applied to the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    /// Set the height, then the width, keeping proportions. The width wins
    /// when the two disagree with the source's aspect ratio.
    #[default]
    Proportional,
    /// Shrink along the binding axis so the result fits inside width × height.
    /// Never enlarges.
    Fit,
    /// Use width and height verbatim, distorting if needed.
    Exact,
}

impl SizeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeMode::Proportional => "proportional",
            SizeMode::Fit => "fit",
            SizeMode::Exact => "exact",
        }
    }
}

impl fmt::Display for SizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "proportional" => Ok(SizeMode::Proportional),
            "fit" => Ok(SizeMode::Fit),
            "exact" => Ok(SizeMode::Exact),
            _ => Err(format!(
                "unknown size mode '{s}': expected proportional, fit or exact"
            )),
        }
    }
}

/// One thumbnail to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub source: SourceDescriptor,
    pub width: u32,
    pub height: u32,
    /// Output format. Falls back to `output.default_format`.
    pub format: Option<ImageFormat>,
    /// JPEG quality. Falls back to `output.jpeg_quality`.
    pub quality: Option<Quality>,
    /// Source region to draw. The whole source when absent.
    pub crop: Option<CropRect>,
    pub mode: SizeMode,
}

impl TransformRequest {
    pub fn new(source: SourceDescriptor, width: u32, height: u32) -> Self {
        Self {
            source,
            width,
            height,
            format: None,
            quality: None,
            crop: None,
            mode: SizeMode::default(),
        }
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_mode(mut self, mode: SizeMode) -> Self {
        self.mode = mode;
        self
    }
}

pub struct Thumbnailer {
    fetcher: Box<dyn Fetcher>,
    bridge: CaptureBridge,
    placeholder: Placeholder,
    viewport: Viewport,
    output: OutputConfig,
}

impl Thumbnailer {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        bridge: CaptureBridge,
        placeholder: Placeholder,
        viewport: Viewport,
        output: OutputConfig,
    ) -> Self {
        Self {
            fetcher,
            bridge,
            placeholder,
            viewport,
            output,
        }
    }

    /// Build the production stack: `reqwest` fetcher, headless Chrome bridge.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.fetch.timeout(), &config.fetch.user_agent)?;
        let launcher = capture::default_launcher(config.capture.chrome_path.clone());
        Ok(Self::new(
            Box::new(fetcher),
            CaptureBridge::new(launcher, config.capture.timing()),
            Placeholder::File(config.fetch.placeholder.clone()),
            config.capture.viewport(),
            config.output.clone(),
        ))
    }

    /// The format and quality a request resolves to.
    pub fn effective_encoding(&self, request: &TransformRequest) -> (ImageFormat, Quality) {
        (
            request.format.unwrap_or(self.output.default_format),
            request.quality.unwrap_or_else(|| self.output.quality()),
        )
    }

    /// Load `source` into a fresh job. Websites are captured at the
    /// configured viewport and scaled to `width` × `height`.
    pub fn acquire(
        &self,
        source: &SourceDescriptor,
        width: u32,
        height: u32,
    ) -> Result<Outcome<TransformJob>, TransformError> {
        debug!(source = %source.location(), "acquiring source");
        let interpolation = self.output.interpolation;
        match source {
            SourceDescriptor::LocalFile(path) => {
                acquire::acquire(&LocalFile { path }, interpolation)
            }
            SourceDescriptor::Bytes(bytes) => acquire::acquire(&InMemory { bytes }, interpolation),
            SourceDescriptor::RemoteImage(url) => acquire::acquire(
                &RemoteImage {
                    url,
                    fetcher: self.fetcher.as_ref(),
                    placeholder: &self.placeholder,
                },
                interpolation,
            ),
            SourceDescriptor::Website(url) => {
                let snapshot = WebsiteSnapshot {
                    request: CaptureRequest {
                        url: url.clone(),
                        viewport: self.viewport,
                        output_width: width.max(1),
                        output_height: height.max(1),
                    },
                    bridge: &self.bridge,
                };
                acquire::acquire(&snapshot, interpolation)
            }
        }
    }

    /// Produce one encoded thumbnail.
    ///
    /// A warning from acquisition (placeholder used, capture cut short)
    /// travels with the result.
    pub fn transform(
        &self,
        request: &TransformRequest,
    ) -> Result<Outcome<Rendered>, TransformError> {
        let (format, quality) = self.effective_encoding(request);
        // don't fetch or launch a browser for a request that can't be encoded
        pipeline::resolve_format(format, self.output.png_fallback)?;

        let Outcome {
            value: mut job,
            warning,
        } = self.acquire(&request.source, request.width, request.height)?;
        apply_size(&mut job, request.mode, request.width, request.height)?;

        let params = EncodeParams::new(format)
            .with_quality(quality)
            .with_crop(request.crop)
            .with_png_fallback(self.output.png_fallback);
        let rendered = job.render(&params)?;
        info!(
            source = %request.source.location(),
            width = rendered.width,
            height = rendered.height,
            format = %rendered.format,
            bytes = rendered.bytes.len(),
            "thumbnail rendered"
        );
        Ok(Outcome {
            value: rendered,
            warning,
        })
    }
}

/// Apply a request's target size to a loaded job.
pub fn apply_size(
    job: &mut TransformJob,
    mode: SizeMode,
    width: u32,
    height: u32,
) -> Result<(), TransformError> {
    match mode {
        SizeMode::Proportional => {
            job.set_height(height)?;
            job.set_width(width)?;
        }
        SizeMode::Fit => {
            job.set_max_proportions(height, width)?;
        }
        SizeMode::Exact => {
            job.set_constrain_proportions(false);
            job.set_width(width)?;
            job.set_height(height)?;
        }
    }
    Ok(())
}
