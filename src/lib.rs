//! # webthumb
//!
//! Thumbnails from anywhere: a local file, a remote image URL, or a live web
//! page. Every source goes through the same steps:
//!
//! ```text
//! 1. Acquire   file / URL / page  →  bitmap       (decode, fetch, or screenshot)
//! 2. Size      bitmap             →  target size  (proportional, fit, exact)
//! 3. Render    bitmap + size      →  bytes        (crop, scale, encode)
//! ```
//!
//! Failures that still leave a usable image (a remote image that 404s, a page
//! that never finishes loading) are not errors: the result carries a
//! [`types::Warning`] next to the placeholder or partial render.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`acquire`] | Source descriptors, local/remote/in-memory loading, placeholder fallback |
//! | [`capture`] | Website screenshots on a worker thread with a hard deadline |
//! | [`imaging`] | Pure-Rust transform core: format registry, sizing math, render, encode |
//! | [`transform`] | [`Thumbnailer`](transform::Thumbnailer): one request through all three steps |
//! | [`batch`] | Parallel thumbnailing of a directory tree with a JSON report |
//! | [`serve`] | `GET /getimage` HTTP front end |
//! | [`cache`] | In-memory TTL cache of encoded responses |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//! | [`types`] | `Outcome` and `Warning`, shared across modules |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding all use the `image` crate. No system
//! image libraries, no shelling out. The only external program is the
//! headless Chrome used for website captures, behind the `chrome` feature.
//!
//! ## Bounded Captures
//!
//! A browser can hang in ways no timeout inside it will catch. The capture
//! runs on its own thread and the caller waits on a channel with a ceiling,
//! so [`capture::CaptureBridge::capture`] returns in bounded time no matter
//! what the page does.
//!
//! ## Strict Formats
//!
//! An output format that can't be encoded (EMF) is an error unless PNG
//! fallback is switched on in config. Nothing silently changes format.

pub mod acquire;
pub mod batch;
pub mod cache;
pub mod capture;
pub mod config;
pub mod imaging;
pub mod output;
pub mod serve;
pub mod transform;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
