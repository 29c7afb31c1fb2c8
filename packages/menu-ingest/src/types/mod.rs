//! Core data types.

pub mod candidate;
pub mod product;
pub mod report;
pub mod source;

pub use candidate::{Provenance, RawCandidate, RawPrice};
pub use product::{IdentityKey, NormalizedProduct, ProductDraft, ProductFilter, StoredProduct};
pub use report::{RunReport, SourceReport};
pub use source::{join_url, ExtractionMode, FieldSelector, IngestStatus, RuleSet, Source};
