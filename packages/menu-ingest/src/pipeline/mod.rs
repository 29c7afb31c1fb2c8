//! The ingestion pipeline: validation, normalization, dedup and reconciliation.

pub mod dedupe;
pub mod normalize;
pub mod reconcile;
pub mod run;
pub mod validate;

pub use dedupe::{dedupe, richness};
pub use normalize::{classify, coerce_price, Normalizer};
pub use reconcile::Reconciler;
pub use run::run_all;
pub use validate::{is_valid, validate, Rejection};
