//! Capture adapters: everything that turns a URL into pixels.
//!
//! The comparison engine never talks to a browser. It receives encoded image
//! bytes from a [`CaptureAdapter`], which owns navigation, readiness waiting
//! and element lookup. Implementations:
//!
//! - `ChromiumCapture` (feature `browser`): real Chromium over CDP
//! - [`StaticCapture`]: pre-recorded pages for tests and offline runs

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::ChromiumCapture;

use crate::region::Rect;
use crate::result::{ShotError, ShotResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Source of raw page pixels
///
/// Adapters are caller-owned session handles: the caller acquires one, passes
/// it by `&mut` to each comparison, and releases it when done.
#[async_trait]
pub trait CaptureAdapter: Send {
    /// Navigate to `url` and capture the viewport as encoded image bytes
    async fn capture(&mut self, url: &str) -> ShotResult<Vec<u8>>;

    /// Navigate to `url`, capture the viewport, and resolve the bounding
    /// rectangle of the element matching `selector` in viewport pixels
    async fn capture_region(&mut self, url: &str, selector: &str)
        -> ShotResult<(Vec<u8>, Rect)>;
}

/// Browser capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to a Chromium-family executable (None = auto-detect)
    pub executable_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// How long to wait for `document.readyState == "complete"`
    pub ready_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            executable_path: None,
            sandbox: true,
            ready_timeout: Duration::from_secs(60),
        }
    }
}

impl CaptureConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set browser executable (Chrome, Chromium, Edge)
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the page readiness timeout
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Keep the readiness wait strictly inside `capture_timeout`, so a page
    /// that never settles reports as not ready instead of a bare timeout.
    /// A readiness timeout at or above the bound is cut to three quarters of it.
    #[must_use]
    pub fn within_capture_timeout(mut self, capture_timeout: Duration) -> Self {
        if self.ready_timeout >= capture_timeout {
            self.ready_timeout = capture_timeout * 3 / 4;
        }
        self
    }
}

/// One pre-recorded page
#[derive(Debug, Clone, Default)]
struct StaticPage {
    image: Vec<u8>,
    elements: HashMap<String, Rect>,
}

/// In-memory capture adapter serving pre-recorded screenshots
#[derive(Debug, Clone, Default)]
pub struct StaticCapture {
    pages: HashMap<String, StaticPage>,
    unreachable: HashMap<String, String>,
    delay: Option<Duration>,
    call_history: Vec<String>,
}

impl StaticCapture {
    /// Create an adapter with no pages
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `image` for `url`
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, image: Vec<u8>) -> Self {
        self.pages.entry(url.into()).or_default().image = image;
        self
    }

    /// Register an element rectangle on a page
    #[must_use]
    pub fn with_element(
        mut self,
        url: impl Into<String>,
        selector: impl Into<String>,
        rect: Rect,
    ) -> Self {
        self.pages
            .entry(url.into())
            .or_default()
            .elements
            .insert(selector.into(), rect);
        self
    }

    /// Make navigation to `url` fail
    #[must_use]
    pub fn with_unreachable(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.unreachable.insert(url.into(), message.into());
        self
    }

    /// Delay every capture, simulating a slow page
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if a method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    async fn navigate(&self, url: &str) -> ShotResult<&StaticPage> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.unreachable.get(url) {
            return Err(ShotError::NavigationError {
                url: url.to_string(),
                message: message.clone(),
            });
        }
        self.pages
            .get(url)
            .ok_or_else(|| ShotError::NavigationError {
                url: url.to_string(),
                message: "no page recorded for this URL".to_string(),
            })
    }
}

#[async_trait]
impl CaptureAdapter for StaticCapture {
    async fn capture(&mut self, url: &str) -> ShotResult<Vec<u8>> {
        self.call_history.push(format!("capture:{url}"));
        let page = self.navigate(url).await?;
        if page.image.is_empty() {
            return Err(ShotError::capture_unavailable(format!(
                "no screenshot recorded for {url}"
            )));
        }
        Ok(page.image.clone())
    }

    async fn capture_region(
        &mut self,
        url: &str,
        selector: &str,
    ) -> ShotResult<(Vec<u8>, Rect)> {
        self.call_history
            .push(format!("capture_region:{url}:{selector}"));
        let page = self.navigate(url).await?;
        let rect = page
            .elements
            .get(selector)
            .copied()
            .ok_or_else(|| ShotError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        if page.image.is_empty() {
            return Err(ShotError::capture_unavailable(format!(
                "no screenshot recorded for {url}"
            )));
        }
        Ok((page.image.clone(), rect))
    }
}
