//! Core types for the TrustPulse scoring pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: metric samples, the per-relationship score state, ledger entries,
//! and the derived views returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one ordered relationship pair (subject → target).
///
/// Relationships are keyed records, never an in-memory object graph: a
/// player↔NPC and an NPC↔guild edge reference each other only through ids,
/// so cyclic social graphs cannot create ownership cycles here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipId {
    pub subject: String,
    pub target: String,
}

impl RelationshipId {
    pub fn new(subject: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.subject, self.target)
    }
}

/// Discrete rating band derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Legendary,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Legendary => "legendary",
        }
    }
}

/// Coarse mood readout derived from (score bucket × trend sign).
///
/// Derivation is a fixed lookup table in [`crate::config::MoodTable`], not a
/// learned model, so the thresholds stay auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodState {
    Radiant,
    Warm,
    Cooling,
    Warming,
    Steady,
    Strained,
    Mending,
    Guarded,
    Critical,
}

/// Crisis monitor state machine position.
///
/// `Calm → Elevated → Crisis → Cooldown → Calm`. Transitions are driven by
/// recomputed risk on every evaluation; `Cooldown` falls back to `Calm` purely
/// by elapsed time once the suppression interval has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisState {
    Calm,
    Elevated,
    Crisis,
    Cooldown,
}

/// How a relationship's volatility feeds the simulation-wide instability metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseLevel {
    Stable,
    Rippling,
    Turbulent,
    Quaking,
}

/// World-pulse contribution attached to every ledger entry and alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPulseImpact {
    pub pulse_level: PulseLevel,
    /// Derived from window volatility, always within [0, 1].
    pub crisis_risk: f64,
}

impl WorldPulseImpact {
    /// Impact of a relationship with no recorded volatility.
    pub fn quiet() -> Self {
        Self {
            pulse_level: PulseLevel::Stable,
            crisis_risk: 0.0,
        }
    }
}

/// One stored metric observation for a single trust dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub dimension_code: String,
    /// Normalized observation, 0-100.
    pub normalized_value: f64,
    /// Weight applied at aggregation time, 0-1. Copied from the active config
    /// when the sample was last written.
    pub weight: f64,
    /// Evidence volume. Never decayed; decay models recency, not volume.
    pub sample_size: u32,
    pub observed_at: DateTime<Utc>,
}

/// The mutable aggregate per relationship pair.
///
/// Owned exclusively by the engine: one writer at a time mutates it under the
/// relationship's shard lock, readers only ever see committed snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipScoreState {
    pub relationship_id: RelationshipId,
    /// Composite trust score, 0-100.
    pub composite_score: f64,
    pub per_dimension: BTreeMap<String, MetricValue>,
    pub tier: Tier,
    pub mood: MoodState,
    pub crisis_state: CrisisState,
    pub last_updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_crisis_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped by the store on every commit.
    pub version: u64,
}

/// Immutable record of one score mutation. Append-only; the engine never
/// updates or deletes entries (retention purge is an external batch job).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub relationship_id: RelationshipId,
    /// Monotonic per-relationship sequence number, assigned by the ledger.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub delta: f64,
    pub cause: crate::event::CauseCode,
    pub composite_after: f64,
    pub mood_after: MoodState,
    pub world_pulse: WorldPulseImpact,
}

/// Per-dimension explainability row emitted alongside the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionContribution {
    pub dimension_code: String,
    pub normalized_value: f64,
    /// Effective weight after redistributing mass from missing dimensions.
    pub effective_weight: f64,
    /// `normalized_value × effective_weight`; contributions sum to the composite.
    pub weighted_contribution: f64,
    pub sample_size: u32,
}

/// Committed snapshot returned by the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreView {
    pub relationship_id: RelationshipId,
    pub composite_score: f64,
    pub tier: Tier,
    pub benefits: crate::config::Benefits,
    pub mood: MoodState,
    pub per_dimension: Vec<DimensionContribution>,
    /// True when no dimension currently carries samples; the composite shown
    /// is the last persisted value, unchanged.
    pub insufficient_data: bool,
    /// Version of the config table the tier was resolved against.
    pub config_version: String,
}

/// Outcome of one committed `apply_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdateResult {
    pub relationship: ScoreView,
    pub trust_delta: f64,
    pub mood_after: MoodState,
    pub world_pulse: WorldPulseImpact,
    pub crisis_alert_raised: bool,
}

/// One projected future point. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Projected composite score, 0-100.
    pub expected_index: f64,
    pub mood: MoodState,
    /// Non-increasing with horizon within one projection.
    pub confidence: f64,
    pub world_pulse: WorldPulseImpact,
}

/// Producer metadata stamped on every forecast payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A complete trajectory from one `project` call.
///
/// Points are correlated draws from a single trend line; callers must present
/// them together and never mix points across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustForecast {
    pub relationship_id: RelationshipId,
    pub producer: ForecastProducer,
    pub generated_at: DateTime<Utc>,
    pub horizon_hours: u32,
    pub points: Vec<ForecastPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_id_display() {
        let id = RelationshipId::new("player-7", "npc-blacksmith");
        assert_eq!(id.to_string(), "player-7->npc-blacksmith");
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Bronze < Tier::Silver);
        assert!(Tier::Silver < Tier::Gold);
        assert!(Tier::Gold < Tier::Platinum);
        assert!(Tier::Platinum < Tier::Legendary);
    }

    #[test]
    fn test_tier_serde_lowercase() {
        let json = serde_json::to_string(&Tier::Legendary).unwrap();
        assert_eq!(json, "\"legendary\"");
        let back: Tier = serde_json::from_str("\"bronze\"").unwrap();
        assert_eq!(back, Tier::Bronze);
    }

    #[test]
    fn test_quiet_pulse() {
        let impact = WorldPulseImpact::quiet();
        assert_eq!(impact.pulse_level, PulseLevel::Stable);
        assert_eq!(impact.crisis_risk, 0.0);
    }
}
