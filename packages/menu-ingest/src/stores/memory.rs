//! In-memory product store for tests and dry runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::ProductStore;
use crate::types::{IdentityKey, IngestStatus, ProductDraft, ProductFilter, Source, StoredProduct};

/// Record of a call made to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListSources { only_id: Option<String> },
    ListProducts { business_id: String, page: usize },
    Find { key: IdentityKey },
    Create { title: String },
    Update { id: String, title: String },
    Delete { id: String },
    EnsureCategory { name: String },
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// In-memory storage for sources, products and categories.
///
/// Products keep insertion order, which is also the pagination order.
/// Data is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<Vec<Source>>,
    products: RwLock<Vec<StoredProduct>>,
    /// Lowercased name -> id.
    categories: RwLock<HashMap<String, String>>,
    /// Lowercased titles whose writes fail.
    failing_titles: RwLock<HashSet<String>>,
    calls: RwLock<Vec<StoreCall>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source (builder pattern).
    pub fn with_source(self, source: Source) -> Self {
        self.add_source(source);
        self
    }

    pub fn add_source(&self, source: Source) {
        write(&self.sources).push(source);
    }

    fn allocate_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}{}", prefix, n)
    }

    /// Insert an existing product as-is, returning its id.
    pub fn seed_product(&self, product: StoredProduct) -> String {
        let id = product.id.clone();
        write(&self.products).push(product);
        id
    }

    /// Insert an auto-imported, unlocked product built from a draft.
    pub fn seed_draft(&self, draft: &ProductDraft) -> String {
        let id = self.allocate_id("p");
        self.seed_product(StoredProduct::from_draft(&id, draft))
    }

    /// Set or clear the operator lock on a product.
    pub fn set_override_lock(&self, id: &str, locked: bool) -> bool {
        match write(&self.products).iter_mut().find(|p| p.id == id) {
            Some(product) => {
                product.override_lock = locked;
                true
            }
            None => false,
        }
    }

    /// Make every write touching this title fail.
    pub fn fail_on_title(&self, title: &str) {
        write(&self.failing_titles).insert(title.trim().to_lowercase());
    }

    pub fn products(&self) -> Vec<StoredProduct> {
        read(&self.products).clone()
    }

    pub fn product(&self, id: &str) -> Option<StoredProduct> {
        read(&self.products).iter().find(|p| p.id == id).cloned()
    }

    pub fn product_count(&self) -> usize {
        read(&self.products).len()
    }

    pub fn category_count(&self) -> usize {
        read(&self.categories).len()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        read(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        write(&self.calls).clear();
    }

    /// Titles of create calls, in order.
    pub fn created_titles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Create { title } => Some(title),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to update calls, in order.
    pub fn updated_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Update { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to delete calls, in order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Delete { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: StoreCall) {
        write(&self.calls).push(call);
    }

    fn check_title(&self, title: &str) -> StoreResult<()> {
        if read(&self.failing_titles).contains(&title.trim().to_lowercase()) {
            return Err(StoreError::Rejected(format!("injected failure for '{}'", title)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_active_sources(&self, only_id: Option<&str>) -> StoreResult<Vec<Source>> {
        self.record(StoreCall::ListSources {
            only_id: only_id.map(str::to_string),
        });
        Ok(read(&self.sources)
            .iter()
            .filter(|s| s.status == IngestStatus::Active)
            .filter(|s| only_id.map(|id| s.id == id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn list_existing_products(
        &self,
        filter: &ProductFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<StoredProduct>> {
        self.record(StoreCall::ListProducts {
            business_id: filter.business_id.clone(),
            page,
        });
        let skip = page.saturating_sub(1) * page_size;
        Ok(read(&self.products)
            .iter()
            .filter(|p| filter.matches(p))
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn find_product(&self, key: &IdentityKey) -> StoreResult<Option<StoredProduct>> {
        self.record(StoreCall::Find { key: key.clone() });
        Ok(read(&self.products).iter().find(|p| &p.key() == key).cloned())
    }

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<String> {
        self.record(StoreCall::Create {
            title: draft.title.clone(),
        });
        self.check_title(&draft.title)?;
        Ok(self.seed_draft(draft))
    }

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> StoreResult<()> {
        self.record(StoreCall::Update {
            id: id.to_string(),
            title: draft.title.clone(),
        });
        self.check_title(&draft.title)?;
        let mut products = write(&self.products);
        let product = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        product.apply(draft);
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> StoreResult<()> {
        self.record(StoreCall::Delete { id: id.to_string() });
        let title = self
            .product(id)
            .map(|p| p.title)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        self.check_title(&title)?;
        write(&self.products).retain(|p| p.id != id);
        Ok(())
    }

    async fn ensure_category(&self, name: &str) -> StoreResult<String> {
        self.record(StoreCall::EnsureCategory {
            name: name.to_string(),
        });
        let key = name.trim().to_lowercase();
        if let Some(id) = read(&self.categories).get(&key) {
            return Ok(id.clone());
        }
        let id = self.allocate_id("c");
        write(&self.categories).insert(key, id.clone());
        Ok(id)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> ProductDraft {
        ProductDraft {
            business_id: "b1".into(),
            title: title.into(),
            description: None,
            price: Some(1.0),
            currency: "USD".into(),
            image_url: None,
            product_url: None,
            source_url: "https://e.com/menu".into(),
            primary_category: "Food".into(),
            secondary_category_ids: Vec::new(),
            auto_imported: true,
            snapshot: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_pagination_and_lock_filter() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store.seed_draft(&draft(&format!("Item {}", n)));
        }
        let locked = store.seed_draft(&draft("Locked"));
        store.set_override_lock(&locked, true);

        let filter = ProductFilter::auto_imported("b1");
        assert_eq!(store.list_existing_products(&filter, 1, 2).await.unwrap().len(), 2);
        assert_eq!(store.list_existing_products(&filter, 3, 2).await.unwrap().len(), 1);

        let all = store.list_all_existing_products(&filter, 2).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|p| !p.override_lock));
    }

    #[tokio::test]
    async fn test_find_includes_locked() {
        let store = MemoryStore::new();
        let id = store.seed_draft(&draft("Brisket"));
        store.set_override_lock(&id, true);

        let key = IdentityKey::new("b1", "https://E.com/menu", "brisket");
        let found = store.find_product(&key).await.unwrap().unwrap();
        assert!(found.override_lock);
    }

    #[tokio::test]
    async fn test_failure_injection_and_calls() {
        let store = MemoryStore::new();
        store.fail_on_title("Bad Item");

        assert!(store.create_product(&draft("Bad Item")).await.is_err());
        let id = store.create_product(&draft("Good Item")).await.unwrap();
        store.delete_product(&id).await.unwrap();

        assert_eq!(store.created_titles(), vec!["Bad Item", "Good Item"]);
        assert_eq!(store.deleted_ids(), vec![id]);
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_category_idempotent() {
        let store = MemoryStore::new();
        let a = store.ensure_category("BBQ").await.unwrap();
        let b = store.ensure_category("bbq").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.category_count(), 1);
    }

    #[tokio::test]
    async fn test_only_active_sources() {
        let store = MemoryStore::new()
            .with_source(Source::new("1", "https://a.com"))
            .with_source(Source::new("2", "https://b.com").with_status(IngestStatus::Paused))
            .with_source(Source::new("3", "https://c.com"));

        let all = store.list_active_sources(None).await.unwrap();
        assert_eq!(all.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);

        let one = store.list_active_sources(Some("3")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert!(store.list_active_sources(Some("2")).await.unwrap().is_empty());
    }
}
