//! Renderer trait for JavaScript-executing page capture.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RenderError, RenderResult};

/// A single render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,

    /// Selector to wait for before capturing.
    pub wait_for: Option<String>,

    /// Upper bound for the whole render.
    pub timeout: Duration,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            wait_for: None,
            timeout,
        }
    }

    pub fn with_wait_for(mut self, selector: Option<String>) -> Self {
        self.wait_for = selector.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Produces the post-JavaScript HTML of a page.
///
/// Implementations:
/// - `RemoteRenderer` - HTTP render service
/// - `HeadlessRenderer` - local Chromium (feature `headless`)
/// - `FallbackRenderer` - tries one renderer, then another
/// - `NullRenderer` - always unavailable
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String>;

    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String> {
        (**self).render(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Renderer used when no rendering engine is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

#[async_trait]
impl Renderer for NullRenderer {
    async fn render(&self, _request: &RenderRequest) -> RenderResult<String> {
        Err(RenderError::Unavailable)
    }

    fn name(&self) -> &str {
        "null"
    }
}
