//! Headless Chrome render surface (via `headless_chrome`).
//!
//! One browser process per capture: the surface owns the [`Browser`], so
//! dropping it at the end of the worker closes the tab and kills Chrome on
//! every exit path.

use super::{CaptureError, LoadLatch, RenderSurface, SurfaceLauncher, Viewport, crop_to_viewport};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;

/// Reports the main frame's ready state and URL. Also stubs out
/// `window.open` so popups never steal the capture.
const READINESS_PROBE: &str =
    "(() => { window.open = () => null; return document.readyState + ' ' + location.href; })()";

pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

impl SurfaceLauncher for ChromeLauncher {
    fn launch(&self, viewport: Viewport) -> Result<Box<dyn RenderSurface>, CaptureError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport.width, viewport.height)))
            .path(self.chrome_path.clone())
            .build()
            .map_err(|e| CaptureError::Launch(format!("invalid launch options: {e}")))?;
        let browser = Browser::new(options).map_err(|e| CaptureError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CaptureError::Launch(format!("failed to open tab: {e}")))?;

        Ok(Box::new(ChromeSurface {
            _browser: browser,
            tab,
            latch: LoadLatch::default(),
        }))
    }
}

struct ChromeSurface {
    // kept alive for the tab; dropping it shuts Chrome down
    _browser: Browser,
    tab: Arc<Tab>,
    latch: LoadLatch,
}

impl RenderSurface for ChromeSurface {
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| CaptureError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn is_loaded(&mut self) -> Result<bool, CaptureError> {
        if self.latch.completed_url().is_some() {
            return Ok(true);
        }
        let probe = self
            .tab
            .evaluate(READINESS_PROBE, false)
            .map_err(|e| CaptureError::Navigation(e.to_string()))?;
        let text = probe
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let (state, href) = text.split_once(' ').unwrap_or((text, ""));
        Ok(state == "complete" && self.latch.observe(href))
    }

    fn snapshot(&mut self, viewport: Viewport) -> Result<DynamicImage, CaptureError> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: viewport.width as f64,
            height: viewport.height as f64,
            scale: 1.0,
        };
        let png = self
            .tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
            .map_err(|e| CaptureError::Snapshot(e.to_string()))?;
        let image = image::load_from_memory(&png)
            .map_err(|e| CaptureError::Snapshot(format!("undecodable screenshot: {e}")))?;
        Ok(crop_to_viewport(image, viewport))
    }
}
