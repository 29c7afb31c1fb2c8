//! Per-source reconciliation against the product store.
//!
//! A source run moves through `Preload -> Extract (per entry path) ->
//! Cleanup`. The existing-key map, seen set and category cache are local to
//! one source run, so sources can be reconciled in parallel.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use url::Url;

use super::dedupe::dedupe;
use super::normalize::Normalizer;
use super::validate::validate;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::extractors::extract_page;
use crate::traits::fetcher::{Fetcher, RenderHint};
use crate::traits::store::ProductStore;
use crate::types::{
    join_url, IdentityKey, NormalizedProduct, ProductDraft, ProductFilter, Source, SourceReport,
};

/// Mutable state for one source run.
#[derive(Default)]
struct SourceRun {
    /// Preloaded auto-imported, unlocked products: key -> store id.
    existing: HashMap<IdentityKey, String>,
    seen: HashSet<IdentityKey>,
    /// Lowercased page URLs whose fetch failed this run.
    failed_pages: HashSet<String>,
    categories: HashMap<String, String>,
}

/// Runs the fetch -> extract -> validate -> normalize -> dedupe -> upsert
/// pipeline for sources.
pub struct Reconciler<S, F> {
    store: S,
    fetcher: F,
    normalizer: Normalizer,
    page_size: usize,
}

impl<S: ProductStore, F: Fetcher> Reconciler<S, F> {
    pub fn new(store: S, fetcher: F, config: &IngestConfig) -> Self {
        Self {
            store,
            fetcher,
            normalizer: Normalizer::from_config(config),
            page_size: config.store.page_size.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Reconcile one source. Errors only when the preload fails; every
    /// per-page and per-item failure is logged and counted instead.
    pub async fn reconcile_source(&self, source: &Source) -> IngestResult<SourceReport> {
        let business_id = source
            .business_id
            .as_deref()
            .ok_or_else(|| IngestError::Config(format!("source {} has no business", source.id)))?;

        let mut report = SourceReport::new(&source.id);
        let mut run = SourceRun::default();

        info!(
            source_id = %source.id,
            base_url = %source.base_url,
            mode = ?source.mode,
            "Reconciling source"
        );

        // Preload
        let mut filter = ProductFilter::auto_imported(business_id);
        if let Ok(prefix) = join_url(&source.base_url, "") {
            filter = filter.with_source_url_prefix(prefix);
        }
        let existing = self
            .store
            .list_all_existing_products(&filter, self.page_size)
            .await?;
        run.existing = existing
            .into_iter()
            .filter(|p| !p.override_lock)
            .map(|p| (p.key(), p.id))
            .collect();
        debug!(source_id = %source.id, existing = run.existing.len(), "Preloaded existing products");

        // Extract
        let hint = RenderHint::for_source(source);
        for path in source.effective_entry_paths() {
            let url = match join_url(&source.base_url, &path) {
                Ok(url) => url,
                Err(e) => {
                    warn!(source_id = %source.id, path = %path, error = %e, "Skipping entry path");
                    report.pages_failed += 1;
                    continue;
                }
            };

            let page = match self.fetcher.fetch(&url, &source.headers, &hint).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(source_id = %source.id, url = %url, error = %e, "Fetch failed, skipping entry path");
                    report.pages_failed += 1;
                    run.failed_pages.insert(url.to_lowercase());
                    continue;
                }
            };
            report.pages_fetched += 1;

            let products = self.process_page(source, business_id, &url, &page.html, &mut report);
            for product in products {
                self.upsert(product, &mut run, &mut report).await;
            }
        }

        // Cleanup
        let stale: Vec<(IdentityKey, String)> = run
            .existing
            .iter()
            .filter(|(key, _)| !run.seen.contains(*key))
            .map(|(key, id)| (key.clone(), id.clone()))
            .collect();

        for (key, id) in stale {
            if run.failed_pages.contains(&key.source_url) {
                debug!(source_id = %source.id, key = %key, "Page failed this run, keeping product");
                continue;
            }
            match self.store.delete_product(&id).await {
                Ok(()) => {
                    debug!(source_id = %source.id, id = %id, title = %key.title, "Deleted stale product");
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(source_id = %source.id, id = %id, title = %key.title, error = %e, "Delete failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            source_id = %source.id,
            pages = report.pages_fetched,
            pages_failed = report.pages_failed,
            created = report.created,
            updated = report.updated,
            skipped_locked = report.skipped_locked,
            deleted = report.deleted,
            failed = report.failed,
            "Source reconciled"
        );

        Ok(report)
    }

    /// Parse, extract, validate, normalize and dedupe one page.
    fn process_page(
        &self,
        source: &Source,
        business_id: &str,
        url: &str,
        html: &str,
        report: &mut SourceReport,
    ) -> Vec<NormalizedProduct> {
        let page_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(source_id = %source.id, url = %url, error = %e, "Unparsable page URL");
                return Vec::new();
            }
        };

        let extraction = extract_page(html, &page_url, source, business_id);
        report.candidates_found += extraction.candidates.len();

        let mut products = Vec::new();
        for candidate in extraction.candidates {
            if let Err(reason) = validate(
                &candidate,
                extraction.page_title.as_deref(),
                extraction.site_name.as_deref(),
            ) {
                debug!(
                    url = %url,
                    title = candidate.title.as_deref().unwrap_or(""),
                    provenance = candidate.provenance.as_str(),
                    reason = %reason,
                    "Dropped candidate"
                );
                report.candidates_dropped += 1;
                continue;
            }
            match self
                .normalizer
                .normalize(candidate, source.business_category.as_deref())
            {
                Some(product) => products.push(product),
                None => report.candidates_dropped += 1,
            }
        }

        let (products, merged) = dedupe(products);
        report.duplicates_merged += merged;
        debug!(url = %url, kept = products.len(), merged, "Page processed");
        products
    }

    async fn upsert(&self, product: NormalizedProduct, run: &mut SourceRun, report: &mut SourceReport) {
        let key = product.key();
        run.seen.insert(key.clone());

        // (store id, auto-imported) of the product this one updates, if any
        let target = match run.existing.get(&key) {
            Some(id) => Some((id.clone(), true)),
            None => match self.store.find_product(&key).await {
                Ok(Some(found)) if found.override_lock => {
                    debug!(id = %found.id, title = %product.title, "Product is locked, skipping");
                    report.skipped_locked += 1;
                    return;
                }
                Ok(Some(found)) => Some((found.id, found.auto_imported)),
                Ok(None) => None,
                Err(e) => {
                    warn!(title = %product.title, url = %product.source_url, error = %e, "Lookup failed");
                    report.failed += 1;
                    return;
                }
            },
        };

        let category_ids = self
            .ensure_categories(&product.secondary_categories, &mut run.categories)
            .await;
        let mut draft = ProductDraft::from_product(&product, category_ids);

        match target {
            Some((id, auto_imported)) => {
                // Manual products stay manual and out of Cleanup's reach
                draft.auto_imported = auto_imported;
                match self.store.update_product(&id, &draft).await {
                    Ok(()) => {
                        debug!(id = %id, title = %draft.title, auto_imported, "Updated product");
                        if auto_imported {
                            run.existing.insert(key, id);
                        }
                        report.updated += 1;
                    }
                    Err(e) => {
                        warn!(id = %id, title = %draft.title, error = %e, "Update failed");
                        report.failed += 1;
                    }
                }
            }
            None => match self.store.create_product(&draft).await {
                Ok(id) => {
                    debug!(id = %id, title = %draft.title, "Created product");
                    run.existing.insert(key, id);
                    report.created += 1;
                }
                Err(e) => {
                    warn!(title = %draft.title, url = %draft.source_url, error = %e, "Create failed");
                    report.failed += 1;
                }
            },
        }
    }

    /// Resolve category names to ids, caching per source run.
    async fn ensure_categories(
        &self,
        names: &[String],
        cache: &mut HashMap<String, String>,
    ) -> Vec<String> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            if let Some(id) = cache.get(name) {
                ids.push(id.clone());
                continue;
            }
            match self.store.ensure_category(name).await {
                Ok(id) => {
                    cache.insert(name.clone(), id.clone());
                    ids.push(id);
                }
                Err(e) => {
                    warn!(category = %name, error = %e, "Category lookup failed, not attaching");
                }
            }
        }
        ids
    }
}
