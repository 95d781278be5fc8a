//! History ledger
//!
//! Append-only record of every score mutation. Append is the sole write
//! path: no update or delete exists in the engine's contract (retention
//! purge is an external batch job). Sequence numbers are monotonic per
//! relationship; appends for different relationships interleave freely.

use crate::types::{HistoryEntry, RelationshipId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// In-memory append-only ledger, one partition per relationship.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    partitions: HashMap<RelationshipId, Vec<HistoryEntry>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning the next sequence number for its
    /// relationship. Returns the committed entry.
    pub fn append(&mut self, mut entry: HistoryEntry) -> HistoryEntry {
        let partition = self
            .partitions
            .entry(entry.relationship_id.clone())
            .or_default();
        entry.seq = partition.last().map(|e| e.seq + 1).unwrap_or(0);
        partition.push(entry.clone());
        entry
    }

    /// Ordered entries for a relationship at or after `since`.
    pub fn window(&self, id: &RelationshipId, since: DateTime<Utc>) -> Vec<HistoryEntry> {
        self.partitions
            .get(id)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|entry| entry.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entries for a relationship, in append order.
    pub fn all(&self, id: &RelationshipId) -> Vec<HistoryEntry> {
        self.partitions.get(id).cloned().unwrap_or_default()
    }

    /// Flatten every partition for snapshot export, ordered by relationship
    /// then sequence.
    pub fn export(&self) -> Vec<HistoryEntry> {
        let mut ids: Vec<&RelationshipId> = self.partitions.keys().collect();
        ids.sort();
        ids.into_iter()
            .flat_map(|id| self.partitions[id].iter().cloned())
            .collect()
    }

    /// Rebuild a ledger from exported entries, preserving their sequence
    /// numbers.
    pub fn import(entries: Vec<HistoryEntry>) -> Self {
        let mut partitions: HashMap<RelationshipId, Vec<HistoryEntry>> = HashMap::new();
        for entry in entries {
            partitions
                .entry(entry.relationship_id.clone())
                .or_default()
                .push(entry);
        }
        for partition in partitions.values_mut() {
            partition.sort_by_key(|entry| entry.seq);
        }
        Self { partitions }
    }
}
