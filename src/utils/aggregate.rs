//! Merging of per-batch and per-page results.

use std::collections::HashMap;

use crate::models::{Document, Harvest, HarvestStats, UnitFailure, WorkUnit, IDENTITY_FIELD};

/// Accumulates documents across the units of one operation.
///
/// Records are keyed by an identity field. When the same key arrives twice
/// the later payload replaces the earlier one (last write wins) while keeping
/// the position where the key was first seen.
#[derive(Debug, Clone)]
pub struct Aggregator {
    key_field: String,
    index: HashMap<String, usize>,
    documents: Vec<Document>,
    stats: HarvestStats,
    failures: Vec<UnitFailure>,
    total_found: Option<u64>,
    rate_limit_remaining: Option<u64>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Aggregator keyed by bibcode
    pub fn new() -> Self {
        Self::keyed_by(IDENTITY_FIELD)
    }

    /// Aggregator keyed by an arbitrary string field
    pub fn keyed_by(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            index: HashMap::new(),
            documents: Vec::new(),
            stats: HarvestStats::default(),
            failures: Vec::new(),
            total_found: None,
            rate_limit_remaining: None,
        }
    }

    /// Seed with documents from an earlier run without counting a unit
    pub fn preload(&mut self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            self.insert(document);
        }
    }

    /// Record a successful unit and merge its documents. Returns how many
    /// documents carried a key.
    pub fn record_success(&mut self, documents: Vec<Document>) -> usize {
        self.stats.attempted += 1;
        self.stats.succeeded += 1;
        self.stats.records_received += documents.len();

        let mut merged = 0;
        for document in documents {
            if self.insert(document) {
                merged += 1;
            } else {
                self.stats.records_without_key += 1;
            }
        }
        merged
    }

    /// Record a unit that was attempted and failed
    pub fn record_failure(&mut self, failure: UnitFailure) {
        if failure.was_attempted() {
            self.stats.attempted += 1;
            self.stats.failed += 1;
        } else {
            self.stats.skipped += 1;
        }
        self.failures.push(failure);
    }

    /// Record units that will not be attempted
    pub fn record_skipped(&mut self, units: impl IntoIterator<Item = WorkUnit>) {
        for unit in units {
            self.record_failure(UnitFailure::skipped(unit));
        }
    }

    pub fn set_total_found(&mut self, total_found: u64) {
        self.total_found = Some(total_found);
    }

    /// Remember the most recent rate-limit reading
    pub fn observe_rate_limit(&mut self, remaining: Option<u64>) {
        if remaining.is_some() {
            self.rate_limit_remaining = remaining;
        }
    }

    /// Merged documents so far
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn stats(&self) -> &HarvestStats {
        &self.stats
    }

    /// Close the aggregation. The result is partial whenever a unit failed or was skipped.
    pub fn finish(self) -> Harvest {
        Harvest {
            partial: !self.failures.is_empty(),
            documents: self.documents,
            stats: self.stats,
            failures: self.failures,
            total_found: self.total_found,
            rate_limit_remaining: self.rate_limit_remaining,
        }
    }

    fn insert(&mut self, document: Document) -> bool {
        let Some(key) = document.key(&self.key_field).map(str::to_string) else {
            return false;
        };

        match self.index.get(&key) {
            Some(&position) => self.documents[position] = document,
            None => {
                self.index.insert(key, self.documents.len());
                self.documents.push(document);
            }
        }
        true
    }
}
