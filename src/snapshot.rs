//! Engine state snapshots
//!
//! JSON export/import of everything the in-memory store holds: the config
//! table, every relationship state, and the full ledger. The CLI uses this
//! for `--load-state` / `--save-state` so batch runs can resume with history
//! and sequence numbers intact.

use crate::config::CategoryConfig;
use crate::error::EngineError;
use crate::store::MemoryStore;
use crate::types::{HistoryEntry, RelationshipScoreState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub saved_at: DateTime<Utc>,
    pub config: CategoryConfig,
    pub states: Vec<RelationshipScoreState>,
    pub history: Vec<HistoryEntry>,
}

impl EngineSnapshot {
    /// Capture the store and config table as of now.
    pub fn capture(store: &MemoryStore, config: &CategoryConfig) -> Self {
        Self {
            saved_at: Utc::now(),
            config: config.clone(),
            states: store.export_states(),
            history: store.export_history(),
        }
    }

    /// Rebuild a store from this snapshot. The embedded config is validated
    /// before anything is restored.
    pub fn restore(self) -> Result<(MemoryStore, CategoryConfig), EngineError> {
        self.config.validate()?;
        let store = MemoryStore::import(self.states, self.history);
        Ok((store, self.config))
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
