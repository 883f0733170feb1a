//! Concept description deduplication across a batch load
//!
//! The cache maps a concept description's global identifier to the record
//! created for it first. It lives as long as the caller keeps it, typically
//! across every document of one load. It takes `&mut self` for insertion and
//! is not meant to be populated from several threads; a caller melting
//! documents in parallel must serialize access or keep one cache per worker.

use std::collections::HashMap;

use crate::melt::types::{Batch, RecordId};

#[derive(Debug, Default, Clone)]
pub struct ConceptCache {
    records: HashMap<String, RecordId>,
}

impl ConceptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<RecordId> {
        self.records.get(identifier).copied()
    }

    /// Remember the record for an identifier; the first record wins
    pub fn insert(&mut self, identifier: impl Into<String>, record: RecordId) -> RecordId {
        *self.records.entry(identifier.into()).or_insert(record)
    }

    /// Drop every identifier a batch added, e.g. after its commit failed
    pub fn forget(&mut self, batch: &Batch) {
        for identifier in batch.cached_identifiers() {
            self.records.remove(identifier);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
