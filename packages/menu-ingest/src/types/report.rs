//! Per-source and per-run counters.

use serde::Serialize;

/// Outcome of reconciling one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub candidates_found: usize,
    pub candidates_dropped: usize,
    pub duplicates_merged: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_locked: usize,
    pub deleted: usize,
    /// Store writes that failed and were skipped.
    pub failed: usize,
}

impl SourceReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    /// Products touched by create or update.
    pub fn upserted(&self) -> usize {
        self.created + self.updated
    }
}

/// Aggregate over all sources in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    /// Sources skipped before reconciliation (e.g. no owning business).
    pub sources_skipped: usize,
    /// Sources whose reconciliation aborted.
    pub sources_failed: usize,
}

impl RunReport {
    pub fn push(&mut self, report: SourceReport) {
        self.sources.push(report);
    }

    pub fn total_created(&self) -> usize {
        self.sources.iter().map(|s| s.created).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.sources.iter().map(|s| s.updated).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.sources.iter().map(|s| s.deleted).sum()
    }

    pub fn total_skipped_locked(&self) -> usize {
        self.sources.iter().map(|s| s.skipped_locked).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }

    pub fn total_upserted(&self) -> usize {
        self.sources.iter().map(SourceReport::upserted).sum()
    }
}
