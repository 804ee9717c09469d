//! Website screenshots with a hard wall-clock bound.
//!
//! The rendering surface (a headless browser tab) runs on its own worker
//! thread, so a page that never finishes loading cannot stall the caller:
//!
//! ```text
//! caller ──spawn──▶ worker: launch → navigate → poll is_loaded ─┐
//!   │                                   every poll_interval     │
//!   │                          loaded, or deadline reached ─────┤
//!   │                                                  snapshot ┘
//!   └── recv_timeout(timeout + poll_interval + snapshot_grace)
//! ```
//!
//! When the deadline passes before the page reports completion, the worker
//! snapshots whatever has rendered so far and the result carries a
//! [`Warning::CaptureTimedOut`]. If the worker itself hangs (browser stuck in
//! launch or snapshot), the caller gives up at the outer ceiling, raises the
//! cancellation flag and returns [`CaptureError::Timeout`].
//!
//! The surface is a trait so the bridge can be driven without a browser; the
//! production implementation lives in [`chrome`] behind the `chrome` feature.

#[cfg(feature = "chrome")]
pub mod chrome;

use crate::types::{Outcome, Warning};
use image::DynamicImage;
use image::imageops::FilterType;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Snapshot failed: {0}")]
    Snapshot(String),
    #[error("Capture did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Capture was cancelled")]
    Cancelled,
    #[error("Capture worker stopped without a result")]
    WorkerLost,
    #[error("Website capture is not available: {0}")]
    Unavailable(String),
}

/// Browser window size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    pub viewport: Viewport,
    pub output_width: u32,
    pub output_height: u32,
}

/// Timing bounds for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    /// How long to wait for the page to finish loading.
    pub timeout: Duration,
    /// Delay between readiness probes.
    pub poll_interval: Duration,
    /// Extra time allowed for launch overrun and the snapshot itself.
    pub snapshot_grace: Duration,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(10),
            snapshot_grace: Duration::from_secs(10),
        }
    }
}

impl CaptureTiming {
    /// Longest the caller will ever block in [`CaptureBridge::capture`].
    pub fn ceiling(&self) -> Duration {
        self.timeout + self.poll_interval + self.snapshot_grace
    }
}

/// A rendering surface that can load a page and rasterize its viewport.
///
/// Implementations are created and used on the capture worker thread only.
pub trait RenderSurface {
    /// Start loading `url`. Should return once navigation has been issued,
    /// not when the page is complete.
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError>;

    /// Whether the navigated document has finished loading.
    ///
    /// Only the first completion of the top-level document counts; later
    /// in-page navigations and popups must not change the answer.
    fn is_loaded(&mut self) -> Result<bool, CaptureError>;

    /// Rasterize the current viewport.
    fn snapshot(&mut self, viewport: Viewport) -> Result<DynamicImage, CaptureError>;
}

/// Creates render surfaces. Shared with the worker thread.
pub trait SurfaceLauncher: Send + Sync {
    fn launch(&self, viewport: Viewport) -> Result<Box<dyn RenderSurface>, CaptureError>;
}

/// Records the first completion of the top-level document.
#[derive(Debug, Default)]
pub struct LoadLatch {
    completed: Option<String>,
}

impl LoadLatch {
    /// Feed a "document complete" observation for `url`. Returns whether
    /// the latch has fired. `about:blank` (the tab before navigation
    /// commits) never fires it.
    pub fn observe(&mut self, url: &str) -> bool {
        if self.completed.is_none() && !url.is_empty() && url != "about:blank" {
            self.completed = Some(url.to_string());
        }
        self.completed.is_some()
    }

    /// The URL whose completion fired the latch.
    pub fn completed_url(&self) -> Option<&str> {
        self.completed.as_deref()
    }
}

/// Cut a snapshot down to the viewport when the surface returned more.
pub fn crop_to_viewport(image: DynamicImage, viewport: Viewport) -> DynamicImage {
    if image.width() <= viewport.width && image.height() <= viewport.height {
        return image;
    }
    let w = image.width().min(viewport.width);
    let h = image.height().min(viewport.height);
    image.crop_imm(0, 0, w, h)
}

struct Snapshot {
    image: DynamicImage,
    timed_out: bool,
}

pub struct CaptureBridge {
    launcher: Arc<dyn SurfaceLauncher>,
    timing: CaptureTiming,
}

impl CaptureBridge {
    pub fn new(launcher: Arc<dyn SurfaceLauncher>, timing: CaptureTiming) -> Self {
        Self { launcher, timing }
    }

    /// Capture `request.url` and scale the viewport snapshot to the
    /// requested output size.
    pub fn capture(&self, request: &CaptureRequest) -> Result<Outcome<DynamicImage>, CaptureError> {
        let timing = self.timing;
        let started = Instant::now();
        let deadline = started + timing.timeout;
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel(1);

        info!(url = %request.url, "capturing website");
        {
            let launcher = Arc::clone(&self.launcher);
            let cancel = Arc::clone(&cancel);
            let request = request.clone();
            thread::Builder::new()
                .name("webthumb-capture".into())
                .spawn(move || {
                    let result = run_worker(
                        launcher.as_ref(),
                        &request,
                        deadline,
                        timing.poll_interval,
                        &cancel,
                    );
                    // the caller may already have given up
                    let _ = tx.send(result);
                })
                .map_err(|e| CaptureError::Launch(format!("could not spawn capture worker: {e}")))?;
        }

        let snapshot = match rx.recv_timeout(timing.ceiling()) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(url = %request.url, "capture worker exceeded its ceiling");
                return Err(CaptureError::Timeout(timing.ceiling()));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::WorkerLost),
        };

        let image = crop_to_viewport(snapshot.image, request.viewport);
        let output = (request.output_width, request.output_height);
        let image = if (image.width(), image.height()) == output {
            image
        } else {
            image.resize_exact(
                request.output_width.max(1),
                request.output_height.max(1),
                FilterType::Triangle,
            )
        };
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "capture finished");

        if snapshot.timed_out {
            warn!(url = %request.url, "page did not finish loading, using partial render");
            Ok(Outcome::warned(
                image,
                Warning::CaptureTimedOut {
                    url: request.url.clone(),
                    after: timing.timeout,
                },
            ))
        } else {
            Ok(Outcome::clean(image))
        }
    }
}

fn run_worker(
    launcher: &dyn SurfaceLauncher,
    request: &CaptureRequest,
    deadline: Instant,
    poll_interval: Duration,
    cancel: &AtomicBool,
) -> Result<Snapshot, CaptureError> {
    let mut surface = launcher.launch(request.viewport)?;
    surface.navigate(&request.url)?;

    let timed_out = loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(CaptureError::Cancelled);
        }
        match surface.is_loaded() {
            Ok(true) => break false,
            Ok(false) => {}
            // pages mid-navigation can refuse probes; keep polling
            Err(e) => debug!(error = %e, "readiness probe failed"),
        }
        let now = Instant::now();
        if now >= deadline {
            break true;
        }
        thread::sleep(poll_interval.min(deadline - now));
    };

    let image = surface.snapshot(request.viewport)?;
    Ok(Snapshot { image, timed_out })
}

/// Launcher used when the crate is built without browser support.
pub struct UnavailableLauncher;

impl SurfaceLauncher for UnavailableLauncher {
    fn launch(&self, _viewport: Viewport) -> Result<Box<dyn RenderSurface>, CaptureError> {
        Err(CaptureError::Unavailable(
            "built without the `chrome` feature".into(),
        ))
    }
}

/// The launcher for this build: headless Chrome when available.
#[cfg(feature = "chrome")]
pub fn default_launcher(chrome_path: Option<PathBuf>) -> Arc<dyn SurfaceLauncher> {
    Arc::new(chrome::ChromeLauncher::new(chrome_path))
}

#[cfg(not(feature = "chrome"))]
pub fn default_launcher(_chrome_path: Option<PathBuf>) -> Arc<dyn SurfaceLauncher> {
    Arc::new(UnavailableLauncher)
}
