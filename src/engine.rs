//! Pipeline orchestration
//!
//! `TrustEngine` wires the stages together and owns the concurrency
//! discipline. The write path for one event runs
//! decay → aggregate → crisis → mood → classify → commit
//! under that relationship's shard lock, as one logical transaction: either
//! the new state and its ledger entry land together, or nothing changes.
//! Updates to different relationships proceed in parallel; reads never take
//! the write lock and see only committed snapshots.

use crate::aggregate;
use crate::classify;
use crate::config::{CategoryConfig, ConfigHandle};
use crate::crisis;
use crate::decay;
use crate::error::EngineError;
use crate::event::RelationshipUpdateEvent;
use crate::forecast;
use crate::mood;
use crate::store::RelationshipStore;
use crate::types::{
    ForecastProducer, HistoryEntry, MetricValue, RelationshipId, RelationshipScoreState,
    RelationshipUpdateResult, ScoreView, TrustForecast,
};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;
use uuid::Uuid;

/// Number of relationship lock shards. Same-relationship writers serialize
/// on one shard; writers for different relationships almost always land on
/// different shards and run in parallel.
const LOCK_SHARDS: usize = 64;

/// Forecast horizons exposed to callers, in hours.
pub const SUPPORTED_HORIZONS: [u32; 2] = [24, 72];

/// Trust scoring engine over an injected store.
pub struct TrustEngine<S: RelationshipStore> {
    store: S,
    config: ConfigHandle,
    locks: Vec<Mutex<()>>,
    instance_id: String,
}

impl<S: RelationshipStore> TrustEngine<S> {
    /// Create an engine with a validated config table.
    pub fn new(store: S, config: CategoryConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store,
            config: ConfigHandle::new(config)?,
            locks: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
            instance_id: Uuid::new_v4().to_string(),
        })
    }

    /// Create an engine running the built-in config table.
    pub fn with_default_config(store: S) -> Self {
        Self {
            store,
            config: ConfigHandle::default(),
            locks: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the live config table.
    pub fn config_snapshot(&self) -> std::sync::Arc<CategoryConfig> {
        self.config.snapshot()
    }

    /// Atomically replace the whole config table (optimistic on version).
    pub fn patch_config(
        &self,
        new_config: CategoryConfig,
        expected_version: &str,
    ) -> Result<(), EngineError> {
        self.config.patch(new_config, expected_version)
    }

    fn shard(&self, id: &RelationshipId) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % LOCK_SHARDS]
    }

    fn fresh_state(
        &self,
        id: RelationshipId,
        config: &CategoryConfig,
        now: DateTime<Utc>,
    ) -> RelationshipScoreState {
        let (tier, _) = classify::classify(config.initial_score, config);
        RelationshipScoreState {
            relationship_id: id,
            composite_score: config.initial_score,
            per_dimension: Default::default(),
            tier,
            mood: mood::derive(config.initial_score, 0.0, &config.mood),
            crisis_state: crate::types::CrisisState::Calm,
            last_updated_at: now,
            last_crisis_at: None,
            version: 0,
        }
    }

    /// Apply one relationship update end to end.
    ///
    /// The event's timestamp is the pipeline clock, which keeps batch replay
    /// deterministic. Validation failures reject the event before any state
    /// is touched; a store failure aborts the whole transaction.
    pub fn apply_update(
        &self,
        event: &RelationshipUpdateEvent,
    ) -> Result<RelationshipUpdateResult, EngineError> {
        event.validate()?;
        let config = self.config.snapshot();
        if !config.weights.contains_key(&event.dimension_code) {
            return Err(EngineError::UnknownDimension(event.dimension_code.clone()));
        }

        let now = event.timestamp;
        let id = event.relationship_id.clone();
        let _guard = self.shard(&id).lock();

        let mut state = match self.store.load_state(&id)? {
            Some(state) => state,
            None => self.fresh_state(id.clone(), &config, now),
        };
        let expected_version = state.version;
        let previous_composite = state.composite_score;

        // Age existing samples, then fold in the new observation as a
        // sample-weighted running mean for its dimension.
        decay::age_samples(&mut state, now, &config.decay);
        let weight = config.weights[&event.dimension_code];
        state
            .per_dimension
            .entry(event.dimension_code.clone())
            .and_modify(|sample| {
                let n = sample.sample_size as f64;
                sample.normalized_value =
                    (sample.normalized_value * n + event.raw_value) / (n + 1.0);
                sample.sample_size += 1;
                sample.weight = weight;
                sample.observed_at = now;
            })
            .or_insert_with(|| MetricValue {
                dimension_code: event.dimension_code.clone(),
                normalized_value: event.raw_value,
                weight,
                sample_size: 1,
                observed_at: now,
            });

        let outcome = aggregate::aggregate(&state.per_dimension, &config.weights);
        let composite = outcome.composite.unwrap_or(previous_composite);
        let delta = composite - previous_composite;

        let window_start =
            now - Duration::milliseconds((config.crisis.window_hours * 3_600_000.0) as i64);
        let window = self.store.history_window(&id, window_start)?;
        let crisis_outcome = crisis::evaluate(
            &window,
            delta,
            now,
            state.crisis_state,
            state.last_crisis_at,
            &config.crisis,
        );

        let mood_after = mood::derive(composite, delta, &config.mood);
        let (tier, benefits) = classify::classify(composite, &config);

        state.composite_score = composite;
        state.tier = tier;
        state.mood = mood_after;
        state.crisis_state = crisis_outcome.state;
        state.last_crisis_at = crisis_outcome.last_crisis_at;

        let entry = HistoryEntry {
            relationship_id: id.clone(),
            seq: 0, // assigned by the ledger
            timestamp: now,
            delta,
            cause: event.cause,
            composite_after: composite,
            mood_after,
            world_pulse: crisis_outcome.impact,
        };

        let (committed, _entry) = self.store.commit(state, entry, expected_version)?;
        debug!(
            relationship = %id,
            composite,
            delta,
            tier = tier.as_str(),
            "update committed"
        );

        let insufficient_data = outcome.insufficient_data();
        Ok(RelationshipUpdateResult {
            relationship: ScoreView {
                relationship_id: id,
                composite_score: committed.composite_score,
                tier,
                benefits,
                mood: mood_after,
                per_dimension: outcome.contributions,
                insufficient_data,
                config_version: config.version.clone(),
            },
            trust_delta: delta,
            mood_after,
            world_pulse: crisis_outcome.impact,
            crisis_alert_raised: crisis_outcome.alert_raised,
        })
    }

    /// Committed score snapshot with tier, benefits, and the per-dimension
    /// breakdown. Lock-free read.
    pub fn current_score(&self, id: &RelationshipId) -> Result<Option<ScoreView>, EngineError> {
        let Some(state) = self.store.load_state(id)? else {
            return Ok(None);
        };
        let config = self.config.snapshot();
        let outcome = aggregate::aggregate(&state.per_dimension, &config.weights);
        let (tier, benefits) = classify::classify(state.composite_score, &config);
        let insufficient_data = outcome.insufficient_data();
        Ok(Some(ScoreView {
            relationship_id: state.relationship_id.clone(),
            composite_score: state.composite_score,
            tier,
            benefits,
            mood: state.mood,
            per_dimension: outcome.contributions,
            insufficient_data,
            config_version: config.version.clone(),
        }))
    }

    /// Project the relationship's trajectory. Read-only; horizon must be one
    /// of [`SUPPORTED_HORIZONS`].
    pub fn forecast(
        &self,
        id: &RelationshipId,
        horizon_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustForecast>, EngineError> {
        if !SUPPORTED_HORIZONS.contains(&horizon_hours) {
            return Err(EngineError::InvalidHorizon(horizon_hours));
        }
        let Some(state) = self.store.load_state(id)? else {
            return Ok(None);
        };
        let config = self.config.snapshot();
        let lookback = Duration::milliseconds(
            (config.crisis.window_hours.max(config.forecast.step_hours * 24.0) * 3_600_000.0)
                as i64,
        );
        let history = self.store.history_window(id, now - lookback)?;
        let points = forecast::project(&state, &history, horizon_hours, now, &config);
        Ok(Some(TrustForecast {
            relationship_id: id.clone(),
            producer: ForecastProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at: now,
            horizon_hours,
            points,
        }))
    }

    /// Ordered ledger entries at or after `since`.
    pub fn history(
        &self,
        id: &RelationshipId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, EngineError> {
        self.store.history_window(id, since)
    }
}
