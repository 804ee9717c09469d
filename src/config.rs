//! Service configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [fetch]
//! timeout_secs = 30
//! user_agent = "webthumb/0.4.0"
//! placeholder = "white.gif"     # Served when a remote image can't be fetched
//!
//! [capture]
//! viewport_width = 1024
//! viewport_height = 768
//! timeout_secs = 20             # Page load deadline
//! poll_interval_ms = 10
//! snapshot_grace_secs = 10
//! # chrome_path = "/usr/bin/chromium"
//!
//! [output]
//! default_format = "png"
//! jpeg_quality = 50             # 1-100
//! png_fallback = false          # Encode unsupported formats as PNG instead of failing
//! interpolation = "bilinear"    # bilinear | bicubic | lanczos3
//!
//! [cache]
//! enabled = true
//! ttl_secs = 86400
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! max_dimension = 4096          # Largest w or h a request may ask for
//!
//! [processing]
//! max_processes = 4             # Batch workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::capture::{CaptureTiming, Viewport};
use crate::imaging::{ImageFormat, Interpolation, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Remote image download settings.
    pub fetch: FetchConfig,
    /// Website capture settings.
    pub capture: CaptureConfig,
    /// Encoding defaults.
    pub output: OutputConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// HTTP front end settings.
    pub server: ServerConfig,
    /// Parallel batch settings.
    pub processing: ProcessingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.capture.viewport_width == 0 || self.capture.viewport_height == 0 {
            return Err(ConfigError::Validation(
                "capture viewport dimensions must be non-zero".into(),
            ));
        }
        if self.capture.timeout_secs == 0 || self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be non-zero".into(),
            ));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "capture.poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be non-zero".into(),
            ));
        }
        if self.server.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "server.max_dimension must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Image served in place of a remote image that could not be fetched.
    pub placeholder: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("webthumb/", env!("CARGO_PKG_VERSION")).to_string(),
            placeholder: PathBuf::from("white.gif"),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for a page to finish loading before snapshotting
    /// whatever has rendered.
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Extra allowance for browser launch and the snapshot itself.
    pub snapshot_grace_secs: u64,
    /// Chrome/Chromium binary. Auto-detected when absent.
    pub chrome_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let viewport = Viewport::default();
        let timing = CaptureTiming::default();
        Self {
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            timeout_secs: timing.timeout.as_secs(),
            poll_interval_ms: timing.poll_interval.as_millis() as u64,
            snapshot_grace_secs: timing.snapshot_grace.as_secs(),
            chrome_path: None,
        }
    }
}

impl CaptureConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewport_width,
            height: self.viewport_height,
        }
    }

    pub fn timing(&self) -> CaptureTiming {
        CaptureTiming {
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            snapshot_grace: Duration::from_secs(self.snapshot_grace_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Format used when a request doesn't name one.
    pub default_format: ImageFormat,
    /// JPEG quality used when a request doesn't name one (1-100).
    pub jpeg_quality: u32,
    /// Encode formats without an encoder as PNG instead of failing.
    pub png_fallback: bool,
    pub interpolation: Interpolation,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: ImageFormat::Png,
            jpeg_quality: Quality::default().0,
            png_fallback: false,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl OutputConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.jpeg_quality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    /// Upper bound on the `w` and `h` a request may ask for.
    pub max_dimension: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_dimension: 4096,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the service config.
///
/// With no path, the stock defaults are used. A path that doesn't exist is
/// an error: an explicitly named config file must be readable.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# webthumb Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Remote images
# ---------------------------------------------------------------------------
[fetch]
# Seconds to wait for a remote image download.
timeout_secs = 30

# User-Agent header sent with downloads. Defaults to "webthumb/<version>".
# user_agent = "my-crawler/1.0"

# Image used when a remote image can't be downloaded. The response then
# carries an "Image was not found" warning instead of failing.
placeholder = "white.gif"

# ---------------------------------------------------------------------------
# Website capture (headless Chrome)
# ---------------------------------------------------------------------------
[capture]
# Browser window size in pixels.
viewport_width = 1024
viewport_height = 768

# Seconds to wait for the page to finish loading. When it doesn't, whatever
# has rendered so far is captured and a warning is attached.
timeout_secs = 20

# Milliseconds between readiness checks.
poll_interval_ms = 10

# Extra seconds allowed for browser start-up and the screenshot itself.
snapshot_grace_secs = 10

# Chrome/Chromium binary. Auto-detected when omitted.
# chrome_path = "/usr/bin/chromium"

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# Format used when a request doesn't specify one:
# jpeg, png, gif, bmp, tiff (emf is recognized but can't be encoded).
default_format = "png"

# JPEG quality, 1 (smallest) to 100 (best). Ignored by other formats.
jpeg_quality = 50

# Encode formats that have no encoder as PNG instead of failing.
png_fallback = false

# Resampling filter: bilinear, bicubic, lanczos3.
interpolation = "bilinear"

# ---------------------------------------------------------------------------
# Response cache (HTTP server)
# ---------------------------------------------------------------------------
[cache]
enabled = true

# Seconds an encoded response stays cached.
ttl_secs = 86400

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:8080"

# Largest width or height a request may ask for. Larger values are a 400.
max_dimension = 4096

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel batch workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
