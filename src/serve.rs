//! HTTP front end.
//!
//! A single-threaded `tiny_http` loop answering one endpoint:
//!
//! ```text
//! GET /getimage?url=<source>&w=<width>&h=<height>[&format=png][&quality=50][&mode=fit]
//! ```
//!
//! | Outcome | Status |
//! |---|---|
//! | Encoded image | 200, `Content-Type` from the format |
//! | Image with a warning | 200 + `X-Webthumb-Warning` header |
//! | Missing or malformed parameter | 400 |
//! | `w` or `h` above `server.max_dimension` | 400 |
//! | Unsupported output format | 400 |
//! | Source could not be decoded or captured | 502 |
//! | Anything else | 500 |
//! | Unknown path / method | 404 / 405 |
//!
//! Request handling is a pure function of the request line and the clock
//! ([`ThumbnailService::handle`]), so it is tested without sockets.

use crate::acquire::SourceDescriptor;
use crate::cache::{CachedResponse, ResponseCache, cache_key};
use crate::imaging::{ImageFormat, Quality, TransformError};
use crate::transform::{SizeMode, Thumbnailer, TransformRequest};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Header carrying the text of a non-fatal warning.
pub const WARNING_HEADER: &str = "X-Webthumb-Warning";

const ENDPOINT: &str = "/getimage";

/// Largest `w` or `h` accepted when no limit is configured.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown path: {0}")]
    UnknownPath(String),
    #[error("Missing parameter: {0}")]
    MissingParam(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidParam { name: &'static str, value: String },
    #[error("{name}={value} exceeds the limit of {max}")]
    TooLarge { name: &'static str, value: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed `/getimage` query.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
    pub quality: Option<Quality>,
    pub mode: SizeMode,
}

impl ImageQuery {
    pub fn to_request(&self) -> TransformRequest {
        let mut request = TransformRequest::new(
            SourceDescriptor::classify_url(&self.url),
            self.width,
            self.height,
        )
        .with_mode(self.mode);
        request.format = self.format;
        request.quality = self.quality;
        request
    }
}

/// Parse the path and query string of a request. Sizes above
/// `max_dimension` on either axis are rejected.
pub fn parse_query(path_and_query: &str, max_dimension: u32) -> Result<ImageQuery, QueryError> {
    let (path, query) = path_and_query
        .split_once('?')
        .unwrap_or((path_and_query, ""));
    if !path.eq_ignore_ascii_case(ENDPOINT) {
        return Err(QueryError::UnknownPath(path.to_string()));
    }

    let mut url = None;
    let mut width = None;
    let mut height = None;
    let mut format = None;
    let mut quality = None;
    let mut mode = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "url" => url = Some(value.into_owned()),
            "w" => width = Some(parse_dimension("w", &value, max_dimension)?),
            "h" => height = Some(parse_dimension("h", &value, max_dimension)?),
            "format" => {
                format = Some(value.parse::<ImageFormat>().map_err(|_| {
                    QueryError::InvalidParam {
                        name: "format",
                        value: value.to_string(),
                    }
                })?)
            }
            "quality" => {
                let q = value.parse::<u32>().map_err(|_| QueryError::InvalidParam {
                    name: "quality",
                    value: value.to_string(),
                })?;
                quality = Some(Quality::new(q));
            }
            "mode" => {
                mode = Some(value.parse::<SizeMode>().map_err(|_| {
                    QueryError::InvalidParam {
                        name: "mode",
                        value: value.to_string(),
                    }
                })?)
            }
            _ => {}
        }
    }

    let url = url.ok_or(QueryError::MissingParam("url"))?;
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(QueryError::InvalidParam {
            name: "url",
            value: url,
        });
    }
    Ok(ImageQuery {
        url,
        width: width.ok_or(QueryError::MissingParam("w"))?,
        height: height.ok_or(QueryError::MissingParam("h"))?,
        format,
        quality,
        mode: mode.unwrap_or_default(),
    })
}

fn parse_dimension(name: &'static str, value: &str, max: u32) -> Result<u32, QueryError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > max => Err(QueryError::TooLarge { name, value: n, max }),
        Ok(n) if n > 0 => Ok(n),
        _ => Err(QueryError::InvalidParam {
            name,
            value: value.to_string(),
        }),
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub warning: Option<String>,
}

impl HttpReply {
    fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: message.into().into_bytes(),
            warning: None,
        }
    }

    fn image(response: CachedResponse, warning: Option<String>) -> Self {
        Self {
            status: 200,
            content_type: response.content_type.to_string(),
            body: response.bytes,
            warning,
        }
    }
}

/// Status code for a failed transform.
pub fn status_for(err: &TransformError) -> u16 {
    match err {
        TransformError::UnsupportedFormat(_) => 400,
        TransformError::Capture(_) | TransformError::Decode(_) => 502,
        _ => 500,
    }
}

pub struct ThumbnailService {
    thumbnailer: Thumbnailer,
    cache: Option<ResponseCache>,
    max_dimension: u32,
}

impl ThumbnailService {
    pub fn new(thumbnailer: Thumbnailer, cache: Option<ResponseCache>) -> Self {
        Self {
            thumbnailer,
            cache,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Answer one request.
    pub fn handle(&mut self, method: &str, path_and_query: &str, now: Instant) -> HttpReply {
        if !method.eq_ignore_ascii_case("GET") {
            return HttpReply::text(405, "Method not allowed");
        }
        let query = match parse_query(path_and_query, self.max_dimension) {
            Ok(q) => q,
            Err(e @ QueryError::UnknownPath(_)) => return HttpReply::text(404, e.to_string()),
            Err(e) => return HttpReply::text(400, e.to_string()),
        };

        let request = query.to_request();
        let (format, quality) = self.thumbnailer.effective_encoding(&request);
        let key = cache_key(&query.url, query.height, query.width, format, quality, query.mode);
        if let Some(cache) = self.cache.as_mut()
            && let Some(hit) = cache.get(&key, now)
        {
            debug!(url = %query.url, "served from cache");
            return HttpReply::image(hit, None);
        }

        match self.thumbnailer.transform(&request) {
            Ok(outcome) => {
                let response = CachedResponse {
                    content_type: outcome.value.format.mime_type(),
                    bytes: outcome.value.bytes,
                };
                match outcome.warning {
                    Some(w) => {
                        warn!(url = %query.url, warning = %w, "served degraded image");
                        HttpReply::image(response, Some(w.to_string()))
                    }
                    None => {
                        if let Some(cache) = self.cache.as_mut() {
                            cache.insert(key, response.clone(), now);
                        }
                        HttpReply::image(response, None)
                    }
                }
            }
            Err(e) => {
                error!(url = %query.url, error = %e, "transform failed");
                HttpReply::text(status_for(&e), e.to_string())
            }
        }
    }
}

/// Run the server loop until the process is stopped.
pub fn serve(mut service: ThumbnailService, bind: &str) -> Result<(), ServeError> {
    let server = tiny_http::Server::http(bind).map_err(|e| ServeError::Bind {
        addr: bind.to_string(),
        reason: e.to_string(),
    })?;
    info!(addr = bind, "listening");

    for request in server.incoming_requests() {
        let reply = service.handle(request.method().as_str(), request.url(), Instant::now());
        info!(
            method = %request.method(),
            url = request.url(),
            status = reply.status,
            bytes = reply.body.len(),
            "request"
        );
        let mut response =
            tiny_http::Response::from_data(reply.body).with_status_code(reply.status);
        if let Ok(h) =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
        {
            response.add_header(h);
        }
        if let Some(w) = reply.warning
            && let Ok(h) = tiny_http::Header::from_bytes(WARNING_HEADER.as_bytes(), w.as_bytes())
        {
            response.add_header(h);
        }
        if let Err(e) = request.respond(response) {
            warn!(error = %e, "failed to write response");
        }
    }
    Ok(())
}
