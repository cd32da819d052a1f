//! Chromium capture over the Chrome DevTools Protocol.

use super::{CaptureAdapter, CaptureConfig};
use crate::region::Rect;
use crate::result::{ShotError, ShotResult};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Element geometry as reported by `getBoundingClientRect`
#[derive(Debug, Deserialize)]
struct ClientBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Chromium browser session used as a capture adapter
///
/// The session is owned by the caller. [`close`](Self::close) shuts the
/// browser down; dropping the session without closing aborts the CDP handler
/// task so the browser process is torn down either way.
#[derive(Debug)]
pub struct ChromiumCapture {
    config: CaptureConfig,
    browser: CdpBrowser,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

impl ChromiumCapture {
    /// Launch a browser and open a blank page sized to the configured viewport
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::BrowserLaunch`] if Chromium cannot be started.
    pub async fn launch(config: CaptureConfig) -> ShotResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = config.executable_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|message| ShotError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ShotError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ShotError::BrowserLaunch {
                message: e.to_string(),
            })?;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.viewport_width),
            i64::from(config.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| ShotError::BrowserLaunch {
            message: format!("failed to set viewport: {e}"),
        })?;

        debug!(
            width = config.viewport_width,
            height = config.viewport_height,
            headless = config.headless,
            "chromium session started"
        );

        Ok(Self {
            config,
            browser,
            page,
            handle,
        })
    }

    /// Get the capture configuration
    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Shut the browser down
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::BrowserLaunch`] if the browser refuses to close.
    pub async fn close(mut self) -> ShotResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| ShotError::BrowserLaunch {
                message: e.to_string(),
            })?;
        debug!("chromium session closed");
        Ok(())
    }

    async fn navigate(&self, url: &str) -> ShotResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ShotError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        self.wait_until_ready(url).await
    }

    async fn wait_until_ready(&self, url: &str) -> ShotResult<()> {
        let poll = async {
            loop {
                let state = self
                    .page
                    .evaluate("document.readyState")
                    .await
                    .ok()
                    .and_then(|r| r.into_value::<String>().ok());
                if state.as_deref() == Some("complete") {
                    return;
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(self.config.ready_timeout, poll)
            .await
            .map_err(|_| {
                warn!(url, timeout = ?self.config.ready_timeout, "page never became ready");
                ShotError::capture_unavailable(format!(
                    "{url} not ready after {:?}",
                    self.config.ready_timeout
                ))
            })
    }

    async fn screenshot(&self) -> ShotResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| ShotError::capture_unavailable(e.to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| ShotError::capture_unavailable(format!("bad screenshot payload: {e}")))
    }

    async fn element_rect(&self, selector: &str) -> ShotResult<Rect> {
        let quoted = serde_json::to_string(selector).map_err(|e| {
            ShotError::capture_unavailable(format!("unusable selector {selector:?}: {e}"))
        })?;
        let script = format!(
            "JSON.stringify((() => {{ \
                const el = document.querySelector({quoted}); \
                if (!el) return null; \
                const r = el.getBoundingClientRect(); \
                return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; \
            }})())"
        );
        let raw: String = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ShotError::capture_unavailable(e.to_string()))?
            .into_value()
            .map_err(|e| ShotError::capture_unavailable(e.to_string()))?;

        element_from_json(&raw, selector)
    }
}

/// Rect from the serialized bounding box; `null` means no match
fn element_from_json(raw: &str, selector: &str) -> ShotResult<Rect> {
    let found: Option<ClientBox> = serde_json::from_str(raw).map_err(|e| {
        ShotError::capture_unavailable(format!("bad geometry for {selector:?}: {e}"))
    })?;
    let client = found.ok_or_else(|| ShotError::ElementNotFound {
        selector: selector.to_string(),
    })?;
    Rect::from_client_box(client.x, client.y, client.width, client.height)
}

impl Drop for ChromiumCapture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl CaptureAdapter for ChromiumCapture {
    async fn capture(&mut self, url: &str) -> ShotResult<Vec<u8>> {
        self.navigate(url).await?;
        self.screenshot().await
    }

    async fn capture_region(
        &mut self,
        url: &str,
        selector: &str,
    ) -> ShotResult<(Vec<u8>, Rect)> {
        self.navigate(url).await?;
        let rect = self.element_rect(selector).await?;
        let bytes = self.screenshot().await?;
        Ok((bytes, rect))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_geometry_parsed() {
        let rect =
            element_from_json(r#"{"x":2,"y":3,"width":10,"height":5}"#, ".table").unwrap();
        assert_eq!(rect, Rect::new(2, 3, 10, 5));
    }

    #[test]
    fn test_null_geometry_is_element_not_found() {
        let err = element_from_json("null", ".missing").unwrap_err();
        assert!(matches!(err, ShotError::ElementNotFound { selector } if selector == ".missing"));
    }

    #[test]
    fn test_malformed_geometry_is_capture_failure() {
        let err = element_from_json("{\"x\":", ".table").unwrap_err();
        assert!(matches!(err, ShotError::CaptureUnavailable { .. }));
        assert!(err.is_capture_failure());
    }
}
