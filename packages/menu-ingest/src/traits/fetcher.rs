//! Fetcher trait for page acquisition.
//!
//! A fetcher turns a URL into HTML, deciding on its own whether the page
//! needs JavaScript rendering. Pipeline code only sees the final HTML.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::types::Source;

/// Per-request hints about rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderHint {
    /// Skip the thin-page check and render unconditionally.
    pub force: bool,

    /// Selector to wait for before capturing the rendered page.
    pub wait_for: Option<String>,
}

impl RenderHint {
    /// Hint derived from a source's rule set.
    pub fn for_source(source: &Source) -> Self {
        match &source.rules {
            Some(rules) => Self {
                force: rules.render,
                wait_for: rules.wait_for.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            wait_for: None,
        }
    }
}

/// Final HTML for a URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested.
    pub url: String,

    pub html: String,

    /// Whether the HTML came from a renderer rather than a plain GET.
    pub rendered: bool,
}

impl FetchedPage {
    pub fn plain(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            rendered: false,
        }
    }

    pub fn rendered(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            rendered: true,
        }
    }
}

/// Fetcher trait for pluggable page acquisition.
///
/// Implementations:
/// - `HttpFetcher` - plain GET with render fallback for thin pages
/// - `RateLimitedFetcher` - wraps any fetcher with a request quota
/// - `MockFetcher` - canned pages for tests
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the final HTML for a URL.
    ///
    /// Fails only when no HTML at all could be obtained.
    async fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        hint: &RenderHint,
    ) -> FetchResult<FetchedPage>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        hint: &RenderHint,
    ) -> FetchResult<FetchedPage> {
        (**self).fetch(url, headers, hint).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
