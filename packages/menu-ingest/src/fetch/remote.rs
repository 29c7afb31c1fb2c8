//! Remote rendering service client.
//!
//! The service is a plain HTTP endpoint that returns rendered HTML for the
//! target URL. The target is appended URL-encoded to the endpoint, or
//! substituted for a `{url}` placeholder when one is present.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::traits::renderer::{RenderRequest, Renderer};

const URL_PLACEHOLDER: &str = "{url}";

/// Renderer backed by a remote HTTP render service.
pub struct RemoteRenderer {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RemoteRenderer {
    pub fn new(endpoint: impl Into<String>) -> RenderResult<Self> {
        let endpoint = endpoint.into();
        let client = Client::builder().build().map_err(|e| RenderError::Remote {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Build from config; None when no endpoint is configured.
    pub fn from_config(config: &RenderConfig) -> RenderResult<Option<Self>> {
        match &config.endpoint {
            Some(endpoint) => {
                let mut renderer = Self::new(endpoint.clone())?;
                renderer.token = config.token.clone();
                Ok(Some(renderer))
            }
            None => Ok(None),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Service URL for a render request.
    pub fn request_url(&self, request: &RenderRequest) -> RenderResult<String> {
        let encoded = urlencoding::encode(&request.url);
        let raw = if self.endpoint.contains(URL_PLACEHOLDER) {
            self.endpoint.replace(URL_PLACEHOLDER, &encoded)
        } else {
            format!("{}{}", self.endpoint, encoded)
        };

        let mut service_url = Url::parse(&raw).map_err(|e| RenderError::Remote {
            url: request.url.clone(),
            reason: format!("invalid render endpoint: {}", e),
        })?;

        {
            let mut query = service_url.query_pairs_mut();
            if let Some(selector) = &request.wait_for {
                query.append_pair("waitFor", selector);
            }
            query.append_pair("timeout", &request.timeout.as_millis().to_string());
        }

        Ok(service_url.to_string())
    }
}

#[async_trait]
impl Renderer for RemoteRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult<String> {
        let service_url = self.request_url(request)?;
        debug!(url = %request.url, "Remote render starting");

        let mut builder = self.client.get(&service_url).timeout(request.timeout);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                RenderError::Remote {
                    url: request.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Remote {
                url: request.url.clone(),
                reason: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| RenderError::Remote {
            url: request.url.clone(),
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_url_appends_encoded_target() {
        let renderer = RemoteRenderer::new("https://render.example.com/render?url=").unwrap();
        let request = RenderRequest::new("https://shop.com/menu?a=1", Duration::from_millis(15_000));

        let url = renderer.request_url(&request).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("url".into(), "https://shop.com/menu?a=1".into())));
        assert!(pairs.contains(&("timeout".into(), "15000".into())));
    }

    #[test]
    fn test_request_url_placeholder_and_wait_for() {
        let renderer = RemoteRenderer::new("https://render.example.com/{url}/html").unwrap();
        let request = RenderRequest::new("https://shop.com/", Duration::from_secs(5))
            .with_wait_for(Some(".menu".into()));

        let url = renderer.request_url(&request).unwrap();
        assert!(url.starts_with("https://render.example.com/https%3A%2F%2Fshop.com%2F/html?"));
        assert!(url.contains("waitFor=.menu"));
    }

    #[test]
    fn test_from_config_disabled_without_endpoint() {
        assert!(RemoteRenderer::from_config(&RenderConfig::default())
            .unwrap()
            .is_none());
    }
}
