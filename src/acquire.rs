//! Source acquisition: turn a source descriptor into a decoded bitmap.
//!
//! Every origin implements [`ImageSource`]; [`acquire`] wraps the result in a
//! fresh [`TransformJob`] whose sizing starts at the bitmap's natural size.
//!
//! | Origin | Type | On failure |
//! |---|---|---|
//! | Local file | [`LocalFile`] | `Io` / `Decode` error |
//! | In-memory bytes | [`InMemory`] | `Decode` error |
//! | Remote image | [`RemoteImage`] | placeholder + [`Warning::ImageNotFound`] |
//! | Website | [`WebsiteSnapshot`] | partial render + [`Warning::CaptureTimedOut`], or `Capture` |
//!
//! A remote fetch that fails in transport or with a non-success status is
//! absorbed: the configured placeholder is loaded instead and the job still
//! succeeds. A body that arrives but does not decode is a hard error.

use crate::capture::{CaptureBridge, CaptureRequest};
use crate::imaging::{Interpolation, TransformError, TransformJob};
use crate::types::{Outcome, Warning};
use image::{DynamicImage, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered with status {0}")]
    Status(u16),
}

/// Downloads a URL into memory.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url)
    }
}

/// Blocking HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;
        Ok(body.to_vec())
    }
}

/// Image used when a remote fetch fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// An image file, resolved relative to the working directory.
    File(PathBuf),
    /// A generated opaque white image.
    Blank { width: u32, height: u32 },
}

impl Default for Placeholder {
    fn default() -> Self {
        Placeholder::File(PathBuf::from("white.gif"))
    }
}

impl Placeholder {
    pub fn load(&self) -> Result<DynamicImage, TransformError> {
        match self {
            Placeholder::File(path) => decode_file(path),
            Placeholder::Blank { width, height } => {
                let (w, h) = ((*width).max(1), (*height).max(1));
                Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    w,
                    h,
                    Rgba([255, 255, 255, 255]),
                )))
            }
        }
    }
}

/// Where a transform's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    LocalFile(PathBuf),
    RemoteImage(String),
    Website(String),
    /// Already-encoded image bytes, e.g. read from stdin.
    Bytes(Vec<u8>),
}

/// Substrings that mark a URL as pointing at an image rather than a page.
const IMAGE_URL_MARKERS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", ".ico", ".bmp", ".tiff", ".tif", ".emf", ".webp",
];

impl SourceDescriptor {
    /// Decide whether a URL is an image to download or a page to capture.
    ///
    /// Anything mentioning an image extension anywhere in the URL (path or
    /// query) is treated as an image; everything else is a website.
    pub fn classify_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if IMAGE_URL_MARKERS.iter().any(|m| lower.contains(m)) {
            SourceDescriptor::RemoteImage(url.to_string())
        } else {
            SourceDescriptor::Website(url.to_string())
        }
    }

    /// `http://` and `https://` inputs are URLs, anything else is a path.
    /// Reading `-` from stdin is left to the caller.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::classify_url(input)
        } else {
            SourceDescriptor::LocalFile(PathBuf::from(input))
        }
    }

    /// The URL or path, for logs and cache keys.
    pub fn location(&self) -> String {
        match self {
            SourceDescriptor::LocalFile(p) => p.display().to_string(),
            SourceDescriptor::RemoteImage(u) | SourceDescriptor::Website(u) => u.clone(),
            SourceDescriptor::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

/// A producer of a raw bitmap.
pub trait ImageSource {
    fn load(&self) -> Result<Outcome<DynamicImage>, TransformError>;
}

pub struct LocalFile<'a> {
    pub path: &'a Path,
}

impl ImageSource for LocalFile<'_> {
    fn load(&self) -> Result<Outcome<DynamicImage>, TransformError> {
        decode_file(self.path).map(Outcome::clean)
    }
}

pub struct InMemory<'a> {
    pub bytes: &'a [u8],
}

impl ImageSource for InMemory<'_> {
    fn load(&self) -> Result<Outcome<DynamicImage>, TransformError> {
        decode_bytes(self.bytes).map(Outcome::clean)
    }
}

pub struct RemoteImage<'a> {
    pub url: &'a str,
    pub fetcher: &'a dyn Fetcher,
    pub placeholder: &'a Placeholder,
}

impl ImageSource for RemoteImage<'_> {
    fn load(&self) -> Result<Outcome<DynamicImage>, TransformError> {
        match self.fetcher.fetch(self.url) {
            Ok(body) => {
                debug!(url = self.url, bytes = body.len(), "fetched remote image");
                decode_bytes(&body).map(Outcome::clean)
            }
            Err(e) => {
                warn!(url = self.url, error = %e, "remote image unavailable, using placeholder");
                let image = self.placeholder.load()?;
                Ok(Outcome::warned(
                    image,
                    Warning::ImageNotFound {
                        url: self.url.to_string(),
                        reason: e.to_string(),
                    },
                ))
            }
        }
    }
}

pub struct WebsiteSnapshot<'a> {
    pub request: CaptureRequest,
    pub bridge: &'a CaptureBridge,
}

impl ImageSource for WebsiteSnapshot<'_> {
    fn load(&self) -> Result<Outcome<DynamicImage>, TransformError> {
        Ok(self.bridge.capture(&self.request)?)
    }
}

/// Load a source and hand the bitmap to a new job.
pub fn acquire(
    source: &dyn ImageSource,
    interpolation: Interpolation,
) -> Result<Outcome<TransformJob>, TransformError> {
    let loaded = source.load()?;
    Ok(loaded.map(|image| TransformJob::from_image(image).with_interpolation(interpolation)))
}

fn decode_file(path: &Path) -> Result<DynamicImage, TransformError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| TransformError::Decode(format!("{}: {e}", path.display())))
}

pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, TransformError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))
}
