//! Partner Menu Ingestion
//!
//! Pulls menu and product listings from partner websites and keeps a
//! product catalogue in sync with them.
//!
//! For each active source the pipeline fetches its entry pages (rendering
//! JavaScript when the plain HTML is thin), runs a set of extractors over
//! the HTML, filters and normalizes the candidates, collapses duplicates,
//! and reconciles the result with the store: create new items, update
//! matching ones, leave operator-locked items alone and delete items that
//! disappeared from the site.
//!
//! # Usage
//!
//! ```rust,ignore
//! use menu_ingest::{IngestConfig, Reconciler, MemoryStore};
//! use menu_ingest::testing::MockFetcher;
//!
//! let config = IngestConfig::default();
//! let store = MemoryStore::new();
//! let fetcher = MockFetcher::new().with_page("https://joes.example.com/menu", html);
//!
//! let reconciler = Reconciler::new(store, fetcher, &config);
//! let report = reconciler.run_all(None, 1).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams for fetching, rendering, extraction and storage
//! - [`types`] - Sources, candidates, products and run reports
//! - [`fetch`] - HTTP fetcher, renderers and rate limiting
//! - [`extractors`] - JSON-LD, inline JSON, meta tag and CSS rule extractors
//! - [`pipeline`] - Validation, normalization, dedup and reconciliation
//! - [`stores`] - Strapi and in-memory product stores
//! - [`testing`] - Mock implementations for testing

pub mod config;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::{FetchConfig, IngestConfig, RenderConfig, StoreConfig};
pub use error::{FetchError, IngestError, ParseError, RenderError, StoreError};
pub use traits::{Extractor, FetchedPage, Fetcher, PageContext, ProductStore, RenderHint, Renderer};
pub use types::{
    ExtractionMode, IdentityKey, NormalizedProduct, ProductDraft, ProductFilter, Provenance,
    RawCandidate, RuleSet, RunReport, Source, SourceReport, StoredProduct,
};

pub use extractors::{extract_page, ExtractorSet};
pub use fetch::{FallbackRenderer, HttpFetcher, RateLimitedFetcher, RemoteRenderer};
pub use pipeline::{run_all, Normalizer, Reconciler};
pub use stores::{MemoryStore, StrapiStore};
