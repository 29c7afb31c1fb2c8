//! Product store implementations.

pub mod memory;
pub mod strapi;

pub use memory::{MemoryStore, StoreCall};
pub use strapi::StrapiStore;
