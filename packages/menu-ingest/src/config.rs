//! Run configuration.
//!
//! Everything environment-derived is read once, here, and threaded into the
//! fetcher, renderers, store and reconciler at construction time.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Desktop browser user agent used for plain GETs unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Plain HTTP retrieval settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout for plain GETs.
    pub timeout: Duration,

    /// User agent sent with plain GETs.
    pub user_agent: String,

    /// Visible-text length below which a page is considered to need rendering.
    pub min_visible_chars: usize,

    /// Outbound fetches per second (None = unlimited).
    pub rate_limit_per_sec: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(20_000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_visible_chars: 200,
            rate_limit_per_sec: None,
        }
    }
}

/// JS-rendering settings (local browser and remote service).
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Remote render endpoint. The target URL is appended URL-encoded,
    /// or substituted for a `{url}` placeholder.
    pub endpoint: Option<String>,

    /// Bearer token for the remote render service.
    pub token: Option<String>,

    /// Upper bound for one render, including any selector wait.
    pub timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout: Duration::from_millis(15_000),
        }
    }
}

/// Content store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1338".to_string(),
            token: None,
            page_size: 100,
        }
    }
}

/// Top-level configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub store: StoreConfig,

    /// Restrict the run to a single source id.
    pub only_source_id: Option<String>,

    /// Sources processed in parallel. 1 = strictly sequential.
    pub concurrency: usize,

    /// Currency assigned when a candidate carries none.
    pub default_currency: String,

    /// Primary category when the owning business declares none.
    pub default_primary_category: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            render: RenderConfig::default(),
            store: StoreConfig::default(),
            only_source_id: None,
            concurrency: 1,
            default_currency: "USD".to_string(),
            default_primary_category: "Food".to_string(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        let fetch = FetchConfig {
            timeout: env_millis("FETCH_TIMEOUT_MS")?.unwrap_or(defaults.fetch.timeout),
            user_agent: env_string("FETCH_USER_AGENT").unwrap_or(defaults.fetch.user_agent),
            min_visible_chars: env_parse("MIN_VISIBLE_CHARS")?
                .unwrap_or(defaults.fetch.min_visible_chars),
            rate_limit_per_sec: env_parse("INGEST_RATE_LIMIT_PER_SEC")?.filter(|n: &u32| *n > 0),
        };

        let render = RenderConfig {
            endpoint: env_string("RENDER_HTTP_URL"),
            token: env_string("RENDER_TOKEN"),
            timeout: env_millis("RENDER_TIMEOUT_MS")?.unwrap_or(defaults.render.timeout),
        };

        let store = StoreConfig {
            base_url: env_string("STRAPI_URL").unwrap_or(defaults.store.base_url),
            token: env_string("INGESTOR_STRAPI_TOKEN"),
            page_size: env_parse("STORE_PAGE_SIZE")?.unwrap_or(defaults.store.page_size),
        };

        let config = Self {
            fetch,
            render,
            store,
            only_source_id: env_string("INGEST_ONLY_SOURCE_ID"),
            concurrency: env_parse("INGEST_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            default_currency: env_string("DEFAULT_CURRENCY").unwrap_or(defaults.default_currency),
            default_primary_category: env_string("DEFAULT_PRIMARY_CATEGORY")
                .unwrap_or(defaults.default_primary_category),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("INGEST_CONCURRENCY must be >= 1");
        }
        if self.store.page_size == 0 {
            anyhow::bail!("STORE_PAGE_SIZE must be >= 1");
        }
        if self.fetch.timeout.is_zero() {
            anyhow::bail!("FETCH_TIMEOUT_MS must be > 0");
        }
        Ok(())
    }

    /// Restrict the run to one source id.
    pub fn with_only_source(mut self, id: impl Into<String>) -> Self {
        self.only_source_id = Some(id.into());
        self
    }

    /// Set source-level parallelism.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the remote render endpoint.
    pub fn with_render_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.render.endpoint = Some(endpoint.into());
        self
    }

    /// Set the default currency code.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Set the store page size used while preloading existing products.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.store.page_size = page_size.max(1);
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}
