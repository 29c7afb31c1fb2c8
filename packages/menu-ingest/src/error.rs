//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so every failure
//! class can be recovered at the narrowest scope that understands it.

use thiserror::Error;

/// Errors that can occur while acquiring a page.
///
/// Recovered by skipping the entry path that produced it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or joined
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Network-level failure
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Server answered with a non-2xx status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the configured timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// HTTP client could not be constructed
    #[error("client error: {0}")]
    Client(String),
}

impl FetchError {
    /// Classify a `reqwest` failure for the given URL.
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: Box::new(error),
            }
        }
    }
}

/// Errors from headless or remote rendering.
///
/// Recovered by falling back to the plain HTML.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No rendering engine is configured
    #[error("no renderer available")]
    Unavailable,

    /// Remote render service failed
    #[error("remote render failed for {url}: {reason}")]
    Remote { url: String, reason: String },

    /// Local browser failed
    #[error("browser render failed for {url}: {reason}")]
    Browser { url: String, reason: String },

    /// Render exceeded its time budget
    #[error("render timeout: {url}")]
    Timeout { url: String },
}

/// Errors parsing embedded data or rules.
///
/// Recovered by skipping the offending script block or rule.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed JSON in a script block
    #[error("JSON parse error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSS selector rejected by the parser
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// Errors from the backing product store.
///
/// Recovered by skipping the item being written.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure talking to the store
    #[error("store request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Store answered with a non-2xx status
    #[error("store {status}: {body}")]
    Status { status: u16, body: String },

    /// Store response did not have the expected shape
    #[error("unexpected store response: {0}")]
    Decode(String),

    /// Referenced record does not exist
    #[error("not found: {id}")]
    NotFound { id: String },

    /// Store refused the write
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        StoreError::Request(Box::new(error))
    }
}

/// Run-level errors (anything that stops a whole run rather than one item).
#[derive(Debug, Error)]
pub enum IngestError {
    /// Store operation failed at run scope (e.g. listing sources)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration rejected
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for render operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for run-level operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
