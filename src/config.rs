//! Category configuration
//!
//! The whole scoring surface is configuration, not constants: tier bands and
//! benefits, dimension weights, decay defaults, the mood lookup table, crisis
//! thresholds, and forecast tuning. The table is versioned and hot-swappable
//! as one unit; partial updates are rejected so tier boundaries can never be
//! observed in a half-applied state.

use crate::error::EngineError;
use crate::types::{MoodState, Tier};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Tolerance for the weight-sum invariant.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Gameplay benefits unlocked by a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefits {
    pub commission_discount_pct: f64,
    pub escrow_bonus_pct: f64,
    pub invite_quota: u32,
    pub exclusive_contracts: bool,
    pub matchmaking_boost: bool,
}

/// One tier band. Bands are kept sorted ascending by `min_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBand {
    pub min_score: f64,
    pub tier: Tier,
    pub benefits: Benefits,
}

/// Time-decay defaults applied to every stored metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayDefaults {
    pub half_life_hours: f64,
    /// Scores decay toward this floor, never past it.
    pub floor: f64,
}

/// Mood lookup row for one score bucket: resolved by trend sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodRow {
    pub falling: MoodState,
    pub steady: MoodState,
    pub rising: MoodState,
}

/// Deterministic (score bucket × trend sign) → mood lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodTable {
    /// Scores below this are the low bucket.
    pub low_cut: f64,
    /// Scores at or above this are the high bucket.
    pub high_cut: f64,
    /// Deltas within ±epsilon count as steady.
    pub trend_epsilon: f64,
    pub low: MoodRow,
    pub mid: MoodRow,
    pub high: MoodRow,
}

/// Crisis monitor thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisConfig {
    /// Sliding window length over the history ledger.
    pub window_hours: f64,
    /// Cumulative negative delta magnitude that triggers an alert.
    pub drop_threshold: f64,
    /// Crisis risk (0-1) that triggers an alert.
    pub risk_threshold: f64,
    /// Risk at which the state machine moves Calm → Elevated.
    pub elevated_threshold: f64,
    /// No repeat alert for the same relationship within this interval.
    pub suppression_hours: f64,
    /// Delta stddev mapping to risk 1.0.
    pub volatility_scale: f64,
}

/// Forecast projector tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Most recent history points used for the least-squares trend.
    pub trend_points: usize,
    /// Confidence at horizon zero with a full trend window.
    pub base_confidence: f64,
    /// Confidence decay constant: conf(h) = base × exp(-h/constant).
    pub confidence_decay_hours: f64,
    /// Blend constant: trend dominates below, decay dominates above.
    pub blend_hours: f64,
    /// Spacing between projected points.
    pub step_hours: f64,
}

/// Versioned, process-wide scoring configuration.
///
/// Loaded at startup and replaced atomically as a whole table through
/// [`ConfigHandle::patch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub version: String,
    /// Sorted ascending by `min_score`.
    pub bands: Vec<CategoryBand>,
    /// Per-dimension weights; must sum to 1.0 ± epsilon.
    pub weights: BTreeMap<String, f64>,
    pub decay: DecayDefaults,
    pub mood: MoodTable,
    pub crisis: CrisisConfig,
    pub forecast: ForecastConfig,
    /// Composite assigned to a relationship before its first sample lands.
    pub initial_score: f64,
}

impl CategoryConfig {
    /// Built-in table so the engine runs without external config. Every
    /// threshold here is overridable; treat these as starting points to be
    /// confirmed against product requirements, not shipped constants.
    pub fn default_table() -> Self {
        let benefits = |discount, escrow, quota, exclusive, boost| Benefits {
            commission_discount_pct: discount,
            escrow_bonus_pct: escrow,
            invite_quota: quota,
            exclusive_contracts: exclusive,
            matchmaking_boost: boost,
        };

        let mut weights = BTreeMap::new();
        weights.insert("reliability".to_string(), 0.35);
        weights.insert("generosity".to_string(), 0.25);
        weights.insert("camaraderie".to_string(), 0.25);
        weights.insert("candor".to_string(), 0.15);

        Self {
            version: "builtin-1".to_string(),
            bands: vec![
                CategoryBand {
                    min_score: 0.0,
                    tier: Tier::Bronze,
                    benefits: benefits(0.0, 0.0, 1, false, false),
                },
                CategoryBand {
                    min_score: 30.0,
                    tier: Tier::Silver,
                    benefits: benefits(2.5, 1.0, 3, false, false),
                },
                CategoryBand {
                    min_score: 60.0,
                    tier: Tier::Gold,
                    benefits: benefits(5.0, 2.5, 5, false, true),
                },
                CategoryBand {
                    min_score: 80.0,
                    tier: Tier::Platinum,
                    benefits: benefits(7.5, 5.0, 8, true, true),
                },
                CategoryBand {
                    min_score: 92.0,
                    tier: Tier::Legendary,
                    benefits: benefits(10.0, 7.5, 12, true, true),
                },
            ],
            weights,
            decay: DecayDefaults {
                half_life_hours: 168.0,
                floor: 20.0,
            },
            mood: MoodTable {
                low_cut: 30.0,
                high_cut: 70.0,
                trend_epsilon: 0.25,
                low: MoodRow {
                    falling: MoodState::Critical,
                    steady: MoodState::Guarded,
                    rising: MoodState::Mending,
                },
                mid: MoodRow {
                    falling: MoodState::Strained,
                    steady: MoodState::Steady,
                    rising: MoodState::Warming,
                },
                high: MoodRow {
                    falling: MoodState::Cooling,
                    steady: MoodState::Warm,
                    rising: MoodState::Radiant,
                },
            },
            crisis: CrisisConfig {
                window_hours: 24.0,
                drop_threshold: 15.0,
                risk_threshold: 0.75,
                elevated_threshold: 0.4,
                suppression_hours: 12.0,
                volatility_scale: 10.0,
            },
            forecast: ForecastConfig {
                trend_points: 8,
                base_confidence: 0.9,
                confidence_decay_hours: 48.0,
                blend_hours: 24.0,
                step_hours: 6.0,
            },
            initial_score: 50.0,
        }
    }

    /// Validate the whole table. Called at load and on every patch; a table
    /// that fails any check is rejected in full.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version.is_empty() {
            return Err(EngineError::InvalidConfig("empty version".to_string()));
        }
        if self.bands.is_empty() {
            return Err(EngineError::InvalidConfig("no category bands".to_string()));
        }
        for pair in self.bands.windows(2) {
            if pair[1].min_score < pair[0].min_score {
                return Err(EngineError::InvalidConfig(format!(
                    "bands not sorted ascending: {} after {}",
                    pair[1].min_score, pair[0].min_score
                )));
            }
        }
        if self.weights.is_empty() {
            return Err(EngineError::InvalidConfig("no dimension weights".to_string()));
        }
        for (code, w) in &self.weights {
            if !(0.0..=1.0).contains(w) {
                return Err(EngineError::InvalidConfig(format!(
                    "weight for `{code}` outside [0, 1]: {w}"
                )));
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(EngineError::InvalidConfig(format!(
                "dimension weights sum to {sum}, expected 1.0"
            )));
        }
        if self.decay.half_life_hours <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "decay half-life must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.decay.floor) {
            return Err(EngineError::InvalidConfig(
                "decay floor outside [0, 100]".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.initial_score) {
            return Err(EngineError::InvalidConfig(
                "initial score outside [0, 100]".to_string(),
            ));
        }
        if self.crisis.window_hours <= 0.0 || self.crisis.suppression_hours <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "crisis window and suppression must be positive".to_string(),
            ));
        }
        if self.crisis.volatility_scale <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "volatility scale must be positive".to_string(),
            ));
        }
        if self.forecast.trend_points < 2 {
            return Err(EngineError::InvalidConfig(
                "forecast needs at least 2 trend points".to_string(),
            ));
        }
        if self.forecast.step_hours <= 0.0
            || self.forecast.blend_hours <= 0.0
            || self.forecast.confidence_decay_hours <= 0.0
        {
            return Err(EngineError::InvalidConfig(
                "forecast time constants must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a table from JSON.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self::default_table()
    }
}

/// Shared handle over the live config table.
///
/// Copy-on-write replace: readers clone the `Arc` and keep using their
/// snapshot even across a concurrent swap; they always see the old or the new
/// table in full, never a mix.
#[derive(Debug)]
pub struct ConfigHandle {
    live: RwLock<Arc<CategoryConfig>>,
}

impl ConfigHandle {
    pub fn new(config: CategoryConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            live: RwLock::new(Arc::new(config)),
        })
    }

    /// Snapshot of the live table. Cheap: one atomic refcount bump.
    pub fn snapshot(&self) -> Arc<CategoryConfig> {
        self.live.read().clone()
    }

    /// Atomically replace the whole table.
    ///
    /// Optimistic concurrency on the version string: the caller must name the
    /// version it based its edit on, and loses to any writer that landed
    /// in between.
    pub fn patch(
        &self,
        new_config: CategoryConfig,
        expected_version: &str,
    ) -> Result<(), EngineError> {
        new_config.validate()?;
        let mut live = self.live.write();
        if live.version != expected_version {
            return Err(EngineError::StaleConfigVersion {
                held: expected_version.to_string(),
                live: live.version.clone(),
            });
        }
        info!(
            old = %live.version,
            new = %new_config.version,
            "category config swapped"
        );
        *live = Arc::new(new_config);
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self {
            live: RwLock::new(Arc::new(CategoryConfig::default_table())),
        }
    }
}
