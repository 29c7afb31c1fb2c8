//! Trait seams between the pipeline and its collaborators.
//!
//! The pipeline is written against these traits so the network, browser
//! and store can be swapped for in-memory fakes in tests.

pub mod extractor;
pub mod fetcher;
pub mod renderer;
pub mod store;

pub use extractor::{Extractor, PageContext};
pub use fetcher::{FetchedPage, Fetcher, RenderHint};
pub use renderer::{NullRenderer, RenderRequest, Renderer};
pub use store::ProductStore;
