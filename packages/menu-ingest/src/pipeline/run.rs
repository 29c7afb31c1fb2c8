//! Run orchestration over all active sources.

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::reconcile::Reconciler;
use crate::config::IngestConfig;
use crate::error::IngestResult;
use crate::traits::fetcher::Fetcher;
use crate::traits::store::ProductStore;
use crate::types::{RunReport, Source};

impl<S: ProductStore, F: Fetcher> Reconciler<S, F> {
    /// Reconcile every active source (or only `only_source_id`).
    ///
    /// Up to `concurrency` sources run at once; each source's own
    /// preload/extract/cleanup sequence stays sequential. A source whose
    /// reconciliation fails is logged and counted, never fatal.
    pub async fn run_all(
        &self,
        only_source_id: Option<&str>,
        concurrency: usize,
    ) -> IngestResult<RunReport> {
        let sources = self.store().list_active_sources(only_source_id).await?;
        info!(
            sources = sources.len(),
            only_source_id = only_source_id.unwrap_or("all"),
            concurrency,
            "Starting ingest run"
        );

        let mut report = RunReport::default();
        let (runnable, skipped): (Vec<Source>, Vec<Source>) = sources
            .into_iter()
            .partition(|s| s.business_id.as_deref().map(|b| !b.is_empty()).unwrap_or(false));

        for source in &skipped {
            warn!(source_id = %source.id, base_url = %source.base_url, "Source has no business, skipping");
        }
        report.sources_skipped = skipped.len();

        let results: Vec<_> = stream::iter(runnable.iter())
            .map(|source| async move { (source, self.reconcile_source(source).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (source, result) in results {
            match result {
                Ok(source_report) => report.push(source_report),
                Err(e) => {
                    error!(source_id = %source.id, error = %e, "Source reconciliation failed");
                    report.sources_failed += 1;
                }
            }
        }
        report.sources.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let candidates_found: usize = report.sources.iter().map(|s| s.candidates_found).sum();
        let candidates_dropped: usize = report.sources.iter().map(|s| s.candidates_dropped).sum();
        info!(
            sources = report.sources.len(),
            sources_skipped = report.sources_skipped,
            sources_failed = report.sources_failed,
            candidates_kept = candidates_found - candidates_dropped,
            candidates_dropped,
            created = report.total_created(),
            updated = report.total_updated(),
            skipped_locked = report.total_skipped_locked(),
            deleted = report.total_deleted(),
            failed = report.total_failed(),
            "Ingest run complete"
        );

        Ok(report)
    }
}

/// Build a reconciler from config and run every selected source.
pub async fn run_all<S: ProductStore, F: Fetcher>(
    config: &IngestConfig,
    store: S,
    fetcher: F,
) -> IngestResult<RunReport> {
    let reconciler = Reconciler::new(store, fetcher, config);
    reconciler
        .run_all(config.only_source_id.as_deref(), config.concurrency)
        .await
}
