//! Local headless Chromium renderer.
//!
//! One browser per render call. The browser, its CDP handler task and the
//! page are torn down before `render` returns, on success and on error.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};
use crate::traits::renderer::{RenderRequest, Renderer};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_IDLE_WAIT: Duration = Duration::from_secs(3);

/// Time allowed for late XHR content to land after navigation.
fn idle_budget(timeout: Duration) -> Duration {
    (timeout / 2).min(MAX_IDLE_WAIT)
}

/// Loaded and the DOM size did not move between two polls.
fn is_quiet(ready: bool, previous: Option<usize>, current: Option<usize>) -> bool {
    ready && current.is_some() && previous == current
}

/// Renderer driving a local headless Chromium through CDP.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    /// Path to a Chrome/Chromium binary; auto-detected when None.
    executable: Option<String>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable = Some(path.into());
        self
    }

    fn browser_error(url: &str, reason: impl ToString) -> RenderError {
        RenderError::Browser {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn wait_for_idle(page: &Page, request: &RenderRequest) {
        let deadline = Instant::now() + idle_budget(request.timeout);
        let mut previous = None;
        while Instant::now() < deadline {
            let ready = match page.evaluate("document.readyState").await {
                Ok(state) => state
                    .into_value::<String>()
                    .map(|state| state == "complete")
                    .unwrap_or(false),
                Err(_) => false,
            };
            let current = page.content().await.map(|html| html.len()).ok();
            if is_quiet(ready, previous, current) {
                return;
            }
            previous = current;
            sleep(IDLE_POLL_INTERVAL).await;
        }
        debug!(url = %request.url, "Page still busy after idle wait");
    }

    async fn capture(page: &Page, request: &RenderRequest) -> RenderResult<String> {
        page.goto(request.url.as_str())
            .await
            .map_err(|e| Self::browser_error(&request.url, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| Self::browser_error(&request.url, e))?;
        Self::wait_for_idle(page, request).await;

        if let Some(selector) = &request.wait_for {
            let deadline = Instant::now() + request.timeout;
            loop {
                if page.find_element(selector.as_str()).await.is_ok() {
                    break;
                }
                if Instant::now() >= deadline {
                    // Capture whatever rendered; the selector was a hint
                    debug!(url = %request.url, selector = %selector, "Wait selector never appeared");
                    break;
                }
                sleep(SELECTOR_POLL_INTERVAL).await;
            }
        }

        page.content()
            .await
            .map_err(|e| Self::browser_error(&request.url, e))
    }
}

#[async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| Self::browser_error(&request.url, e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Self::browser_error(&request.url, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        // Budget covers navigation and selector wait
        let result = match browser.new_page("about:blank").await {
            Ok(page) => {
                let captured = timeout(request.timeout * 2, Self::capture(&page, request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(RenderError::Timeout {
                            url: request.url.clone(),
                        })
                    });
                if let Err(e) = page.close().await {
                    warn!(url = %request.url, error = %e, "Failed to close page");
                }
                captured
            }
            Err(e) => Err(Self::browser_error(&request.url, e)),
        };

        if let Err(e) = browser.close().await {
            warn!(url = %request.url, error = %e, "Failed to close browser");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }

    fn name(&self) -> &str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_budget_is_capped() {
        assert_eq!(idle_budget(Duration::from_secs(2)), Duration::from_secs(1));
        assert_eq!(idle_budget(Duration::from_secs(30)), MAX_IDLE_WAIT);
    }

    #[test]
    fn test_is_quiet_needs_load_and_stable_dom() {
        assert!(is_quiet(true, Some(120), Some(120)));
        assert!(!is_quiet(false, Some(120), Some(120)));
        assert!(!is_quiet(true, Some(80), Some(120)));
        assert!(!is_quiet(true, None, Some(120)));
        assert!(!is_quiet(true, None, None));
    }
}
