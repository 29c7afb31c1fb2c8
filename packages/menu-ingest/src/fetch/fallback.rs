//! Fallback renderer - tries the local browser first, then the remote service.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{RenderError, RenderResult};
use crate::traits::renderer::{RenderRequest, Renderer};

/// Renderer chain: `primary`, then `fallback` when the primary fails.
pub struct FallbackRenderer {
    primary: Option<Arc<dyn Renderer>>,
    fallback: Option<Arc<dyn Renderer>>,
}

impl FallbackRenderer {
    pub fn new(primary: Option<Arc<dyn Renderer>>, fallback: Option<Arc<dyn Renderer>>) -> Self {
        match (&primary, &fallback) {
            (Some(p), Some(f)) => info!(primary = p.name(), fallback = f.name(), "Render chain configured"),
            (Some(p), None) | (None, Some(p)) => info!(renderer = p.name(), "Single renderer configured"),
            (None, None) => info!("Rendering disabled (no local browser or remote endpoint)"),
        }
        Self { primary, fallback }
    }

    pub fn is_enabled(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }
}

#[async_trait]
impl Renderer for FallbackRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String> {
        let primary_error = match &self.primary {
            Some(primary) => match primary.render(request).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    warn!(url = %request.url, renderer = primary.name(), error = %e, "Primary render failed");
                    Some(e)
                }
            },
            None => None,
        };

        match &self.fallback {
            Some(fallback) => fallback.render(request).await,
            None => Err(primary_error.unwrap_or(RenderError::Unavailable)),
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRenderer;
    use std::time::Duration;

    fn request() -> RenderRequest {
        RenderRequest::new("https://example.com", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let local = Arc::new(MockRenderer::returning("<p>local</p>"));
        let remote = Arc::new(MockRenderer::returning("<p>remote</p>"));
        let chain = FallbackRenderer::new(Some(local.clone()), Some(remote.clone()));

        assert_eq!(chain.render(&request()).await.unwrap(), "<p>local</p>");
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_failure() {
        let local = Arc::new(MockRenderer::failing());
        let remote = Arc::new(MockRenderer::returning("<p>remote</p>"));
        let chain = FallbackRenderer::new(Some(local.clone()), Some(remote.clone()));

        assert_eq!(chain.render(&request()).await.unwrap(), "<p>remote</p>");
        assert_eq!(local.call_count(), 1);
        assert_eq!(remote.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_unavailable() {
        let chain = FallbackRenderer::new(None, None);
        assert!(!chain.is_enabled());
        assert!(matches!(
            chain.render(&request()).await,
            Err(RenderError::Unavailable)
        ));
    }
}
