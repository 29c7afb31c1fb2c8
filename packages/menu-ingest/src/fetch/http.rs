//! HTTP fetcher with render fallback for thin pages.
//!
//! Plain GET first. Pages whose visible text is too short (typical of
//! client-rendered menus) are handed to the configured renderer, and the
//! rendered HTML is kept only if it actually carries more content.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{FetchConfig, RenderConfig};
use crate::error::{FetchError, FetchResult, RenderError};
use crate::traits::fetcher::{FetchedPage, Fetcher, RenderHint};
use crate::traits::renderer::{NullRenderer, RenderRequest, Renderer};

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap();
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Length in characters of the text a visitor would see without JS.
pub fn visible_text_len(html: &str) -> usize {
    let text = SCRIPT_RE.replace_all(html, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = WS_RE.replace_all(&text, " ");
    text.trim().chars().count()
}

/// Content-sufficiency check: true when the page looks client-rendered.
pub fn needs_rendering(html: &str, min_visible_chars: usize) -> bool {
    visible_text_len(html) < min_visible_chars
}

/// Pick between thin plain HTML and a render attempt.
///
/// The rendered page wins only if it is longer than the plain one.
pub fn prefer_rendered(
    url: &str,
    plain: String,
    rendered: Result<String, RenderError>,
) -> FetchedPage {
    match rendered {
        Ok(html) if html.len() > plain.len() => FetchedPage::rendered(url, html),
        Ok(_) => {
            debug!(url = %url, "Rendered page not larger than plain HTML, keeping plain");
            FetchedPage::plain(url, plain)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Render failed, falling back to plain HTML");
            FetchedPage::plain(url, plain)
        }
    }
}

/// Plain HTTP fetcher with an injectable renderer.
///
/// # Example
///
/// ```rust,ignore
/// use menu_ingest::fetch::{HttpFetcher, RemoteRenderer};
///
/// let renderer = Arc::new(RemoteRenderer::new("https://render.example.com/?url=")?);
/// let fetcher = HttpFetcher::new(&config.fetch, &config.render)?.with_renderer(renderer);
/// let page = fetcher.fetch("https://example.com/menu", &headers, &hint).await?;
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    renderer: Arc<dyn Renderer>,
    min_visible_chars: usize,
    render_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with no renderer attached.
    pub fn new(fetch: &FetchConfig, render: &RenderConfig) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .timeout(fetch.timeout)
            .user_agent(fetch.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            renderer: Arc::new(NullRenderer),
            min_visible_chars: fetch.min_visible_chars,
            render_timeout: render.timeout,
        })
    }

    /// Attach the renderer used for thin or forced pages.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Plain GET, returning the body of a 2xx response.
    async fn get(&self, url: &str, headers: &HashMap<String, String>) -> FetchResult<String> {
        debug!(url = %url, "HTTP fetch starting");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            FetchError::from_reqwest(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    fn render_request(&self, url: &str, hint: &RenderHint) -> RenderRequest {
        RenderRequest::new(url, self.render_timeout).with_wait_for(hint.wait_for.clone())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        hint: &RenderHint,
    ) -> FetchResult<FetchedPage> {
        Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;

        if hint.force {
            match self.renderer.render(&self.render_request(url, hint)).await {
                Ok(html) if !html.trim().is_empty() => {
                    debug!(url = %url, renderer = self.renderer.name(), "Forced render succeeded");
                    return Ok(FetchedPage::rendered(url, html));
                }
                Ok(_) => {
                    warn!(url = %url, "Forced render returned empty page, using plain GET");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Forced render failed, using plain GET");
                }
            }
            let html = self.get(url, headers).await?;
            return Ok(FetchedPage::plain(url, html));
        }

        let html = self.get(url, headers).await?;
        if !needs_rendering(&html, self.min_visible_chars) {
            return Ok(FetchedPage::plain(url, html));
        }

        debug!(
            url = %url,
            visible_chars = visible_text_len(&html),
            threshold = self.min_visible_chars,
            "Page looks client-rendered, trying renderer"
        );

        let rendered = self.renderer.render(&self.render_request(url, hint)).await;
        Ok(prefer_rendered(url, html, rendered))
    }

    fn name(&self) -> &str {
        "http"
    }
}
