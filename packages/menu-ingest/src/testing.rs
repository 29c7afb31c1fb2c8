//! Testing utilities including mock implementations.
//!
//! Useful for exercising the pipeline without network access. Pair these
//! with [`crate::stores::MemoryStore`].

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult, RenderError, RenderResult};
use crate::traits::{FetchedPage, Fetcher, RenderHint, RenderRequest, Renderer};

/// Record of a call made to the mock fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFetchCall {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub hint: RenderHint,
}

/// A mock fetcher serving canned HTML by URL.
///
/// Unknown URLs answer with a 404 status error; URLs registered with
/// [`MockFetcher::with_failure`] fail with a network error.
#[derive(Default, Clone)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<MockFetchCall>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.set_page(url, html);
        self
    }

    /// Replace (or add) the page served for `url`. Shared between clones.
    pub fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        let url = url.into();
        self.failures.write().unwrap().remove(&url);
        self.pages.write().unwrap().insert(url, html.into());
    }

    /// Make fetches of `url` fail.
    pub fn with_failure(self, url: impl Into<String>) -> Self {
        self.set_failure(url);
        self
    }

    pub fn set_failure(&self, url: impl Into<String>) {
        self.failures.write().unwrap().insert(url.into());
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockFetchCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// URLs requested so far, in order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        hint: &RenderHint,
    ) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(MockFetchCall {
            url: url.to_string(),
            headers: headers.clone(),
            hint: hint.clone(),
        });

        if self.failures.read().unwrap().contains(url) {
            return Err(FetchError::Http {
                url: url.to_string(),
                source: "connection refused".into(),
            });
        }

        match self.pages.read().unwrap().get(url) {
            Some(html) if hint.force => Ok(FetchedPage::rendered(url, html.clone())),
            Some(html) => Ok(FetchedPage::plain(url, html.clone())),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock renderer returning fixed HTML or failing.
pub struct MockRenderer {
    html: Option<String>,
    requests: Arc<RwLock<Vec<RenderRequest>>>,
}

impl MockRenderer {
    /// Renderer that always returns `html`.
    pub fn returning(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Renderer that always fails.
    pub fn failing() -> Self {
        Self {
            html: None,
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String> {
        self.requests.write().unwrap().push(request.clone());
        match &self.html {
            Some(html) => Ok(html.clone()),
            None => Err(RenderError::Remote {
                url: request.url.clone(),
                reason: "mock render failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_fetcher_pages_and_failures() {
        let fetcher = MockFetcher::new()
            .with_page("https://a.com/menu", "<p>menu</p>")
            .with_failure("https://a.com/down");

        let page = fetcher
            .fetch("https://a.com/menu", &HashMap::new(), &RenderHint::default())
            .await
            .unwrap();
        assert_eq!(page.html, "<p>menu</p>");
        assert!(!page.rendered);

        assert!(matches!(
            fetcher.fetch("https://a.com/down", &HashMap::new(), &RenderHint::default()).await,
            Err(FetchError::Http { .. })
        ));
        assert!(matches!(
            fetcher.fetch("https://a.com/missing", &HashMap::new(), &RenderHint::default()).await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(fetcher.call_count(), 3);
    }

    #[tokio::test]
    async fn test_set_page_clears_failure() {
        let fetcher = MockFetcher::new().with_failure("https://a.com/");
        let shared = fetcher.clone();
        shared.set_page("https://a.com/", "<p>back</p>");

        let page = fetcher
            .fetch("https://a.com/", &HashMap::new(), &RenderHint::forced())
            .await
            .unwrap();
        assert!(page.rendered);
    }

    #[tokio::test]
    async fn test_mock_renderer_records_requests() {
        let renderer = MockRenderer::returning("<p>x</p>");
        let request = RenderRequest::new("https://a.com", Duration::from_secs(1))
            .with_wait_for(Some(".menu".into()));
        renderer.render(&request).await.unwrap();

        assert_eq!(renderer.requests()[0].wait_for.as_deref(), Some(".menu"));
        assert!(MockRenderer::failing().render(&request).await.is_err());
    }
}
