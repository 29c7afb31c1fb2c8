//! Storage trait for sources, products and categories.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::types::{IdentityKey, ProductDraft, ProductFilter, Source, StoredProduct};

/// Backing product store.
///
/// Implementations:
/// - `StrapiStore` - headless CMS over REST
/// - `MemoryStore` - in-process maps for tests and dry runs
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Active sources, optionally restricted to one id.
    async fn list_active_sources(&self, only_id: Option<&str>) -> StoreResult<Vec<Source>>;

    /// One page (1-based) of existing products matching the filter.
    ///
    /// A page shorter than `page_size` is the last one.
    async fn list_existing_products(
        &self,
        filter: &ProductFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<StoredProduct>>;

    /// Look up any product (auto-imported or not) by identity.
    async fn find_product(&self, key: &IdentityKey) -> StoreResult<Option<StoredProduct>>;

    /// Create a product, returning its id.
    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<String>;

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> StoreResult<()>;

    async fn delete_product(&self, id: &str) -> StoreResult<()>;

    /// Find or create a category by name, returning its id.
    async fn ensure_category(&self, name: &str) -> StoreResult<String>;

    /// All existing products matching the filter, paging until a short page.
    async fn list_all_existing_products(
        &self,
        filter: &ProductFilter,
        page_size: usize,
    ) -> StoreResult<Vec<StoredProduct>> {
        let page_size = page_size.max(1);
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let chunk = self.list_existing_products(filter, page, page_size).await?;
            let len = chunk.len();
            all.extend(chunk);
            if len < page_size {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    /// Get the store name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: ProductStore + ?Sized> ProductStore for Arc<T> {
    async fn list_active_sources(&self, only_id: Option<&str>) -> StoreResult<Vec<Source>> {
        (**self).list_active_sources(only_id).await
    }

    async fn list_existing_products(
        &self,
        filter: &ProductFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<StoredProduct>> {
        (**self).list_existing_products(filter, page, page_size).await
    }

    async fn find_product(&self, key: &IdentityKey) -> StoreResult<Option<StoredProduct>> {
        (**self).find_product(key).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<String> {
        (**self).create_product(draft).await
    }

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> StoreResult<()> {
        (**self).update_product(id, draft).await
    }

    async fn delete_product(&self, id: &str) -> StoreResult<()> {
        (**self).delete_product(id).await
    }

    async fn ensure_category(&self, name: &str) -> StoreResult<String> {
        (**self).ensure_category(name).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
