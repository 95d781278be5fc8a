//! Persistence boundary
//!
//! The engine owns scoring math, not storage. This module defines the store
//! contract the engine drives, with optimistic concurrency on the state
//! record, plus an in-memory reference implementation used by the CLI and
//! tests. A commit is all-or-nothing: the state save and the ledger append
//! land together or not at all, so a storage fault mid-pipeline can never
//! leave a score without its history entry.

use crate::error::EngineError;
use crate::history::HistoryLedger;
use crate::types::{HistoryEntry, RelationshipId, RelationshipScoreState};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage contract for relationship state and the history ledger.
///
/// `expected_version` carries the optimistic-concurrency token: a commit
/// against a version the store no longer holds fails with `VersionConflict`
/// and the caller retries from fresh state. Implementations over real
/// storage are expected to honor caller-supplied timeouts and surface
/// transient faults as `StorageUnavailable` without partial effects.
pub trait RelationshipStore: Send + Sync {
    /// Committed state for a relationship, if any.
    fn load_state(
        &self,
        id: &RelationshipId,
    ) -> Result<Option<RelationshipScoreState>, EngineError>;

    /// Atomically persist the new state and append its history entry.
    ///
    /// `expected_version` must equal the stored version (0 for a new
    /// relationship). On success the store bumps the version and assigns the
    /// entry's sequence number; the committed pair is returned.
    fn commit(
        &self,
        state: RelationshipScoreState,
        entry: HistoryEntry,
        expected_version: u64,
    ) -> Result<(RelationshipScoreState, HistoryEntry), EngineError>;

    /// Ordered ledger entries for a relationship at or after `since`.
    fn history_window(
        &self,
        id: &RelationshipId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, EngineError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    states: HashMap<RelationshipId, RelationshipScoreState>,
    ledger: HistoryLedger,
}

/// In-memory store. One lock guards states and ledger together, which makes
/// `commit` trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every state record, for export.
    pub fn export_states(&self) -> Vec<RelationshipScoreState> {
        let inner = self.inner.read();
        let mut states: Vec<_> = inner.states.values().cloned().collect();
        states.sort_by(|a, b| a.relationship_id.cmp(&b.relationship_id));
        states
    }

    /// Flatten the ledger, for export.
    pub fn export_history(&self) -> Vec<HistoryEntry> {
        self.inner.read().ledger.export()
    }

    /// Rebuild a store from exported records.
    pub fn import(states: Vec<RelationshipScoreState>, history: Vec<HistoryEntry>) -> Self {
        let inner = MemoryInner {
            states: states
                .into_iter()
                .map(|state| (state.relationship_id.clone(), state))
                .collect(),
            ledger: HistoryLedger::import(history),
        };
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl RelationshipStore for MemoryStore {
    fn load_state(
        &self,
        id: &RelationshipId,
    ) -> Result<Option<RelationshipScoreState>, EngineError> {
        Ok(self.inner.read().states.get(id).cloned())
    }

    fn commit(
        &self,
        mut state: RelationshipScoreState,
        entry: HistoryEntry,
        expected_version: u64,
    ) -> Result<(RelationshipScoreState, HistoryEntry), EngineError> {
        let mut inner = self.inner.write();
        let stored_version = inner
            .states
            .get(&state.relationship_id)
            .map(|s| s.version)
            .unwrap_or(0);
        if stored_version != expected_version {
            return Err(EngineError::VersionConflict(
                state.relationship_id.to_string(),
            ));
        }
        state.version = expected_version + 1;
        let committed_entry = inner.ledger.append(entry);
        inner
            .states
            .insert(state.relationship_id.clone(), state.clone());
        Ok((state, committed_entry))
    }

    fn history_window(
        &self,
        id: &RelationshipId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, EngineError> {
        Ok(self.inner.read().ledger.window(id, since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CauseCode;
    use crate::types::{CrisisState, MoodState, Tier, WorldPulseImpact};
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    fn state(id: &RelationshipId, version: u64) -> RelationshipScoreState {
        RelationshipScoreState {
            relationship_id: id.clone(),
            composite_score: 50.0,
            per_dimension: BTreeMap::new(),
            tier: Tier::Silver,
            mood: MoodState::Steady,
            crisis_state: CrisisState::Calm,
            last_updated_at: Utc::now(),
            last_crisis_at: None,
            version,
        }
    }

    fn entry(id: &RelationshipId) -> HistoryEntry {
        HistoryEntry {
            relationship_id: id.clone(),
            seq: 0,
            timestamp: Utc::now(),
            delta: 2.0,
            cause: CauseCode::GiftGiven,
            composite_after: 52.0,
            mood_after: MoodState::Steady,
            world_pulse: WorldPulseImpact::quiet(),
        }
    }

    #[test]
    fn test_commit_bumps_version_and_assigns_seq() {
        let store = MemoryStore::new();
        let id = RelationshipId::new("a", "b");

        let (committed, first) = store.commit(state(&id, 0), entry(&id), 0).unwrap();
        assert_eq!(committed.version, 1);
        assert_eq!(first.seq, 0);

        let (committed, second) = store.commit(state(&id, 0), entry(&id), 1).unwrap();
        assert_eq!(committed.version, 2);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn test_version_conflict_leaves_store_untouched() {
        let store = MemoryStore::new();
        let id = RelationshipId::new("a", "b");
        store.commit(state(&id, 0), entry(&id), 0).unwrap();

        let err = store.commit(state(&id, 0), entry(&id), 0).unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict(_)));

        // Neither a second state version nor an orphan ledger entry.
        assert_eq!(store.load_state(&id).unwrap().unwrap().version, 1);
        let since = Utc::now() - Duration::hours(1);
        assert_eq!(store.history_window(&id, since).unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_state() {
        let store = MemoryStore::new();
        assert!(store
            .load_state(&RelationshipId::new("x", "y"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_import_export_round_trip() {
        let store = MemoryStore::new();
        let id = RelationshipId::new("a", "b");
        store.commit(state(&id, 0), entry(&id), 0).unwrap();

        let rebuilt = MemoryStore::import(store.export_states(), store.export_history());

        assert_eq!(rebuilt.load_state(&id).unwrap().unwrap().version, 1);
        let since = Utc::now() - Duration::hours(1);
        assert_eq!(rebuilt.history_window(&id, since).unwrap().len(), 1);
    }
}
