//! Trust trajectory projection
//!
//! Extrapolates future score points as a superposition of two pulls: the
//! linear trend estimated from recent ledger entries (least-squares slope),
//! and the decay model's pull toward the configured floor. The blend weight
//! shifts with horizon, so the near term follows the trend and the long term
//! follows decay. Confidence decays exponentially with horizon.
//!
//! Pure read path: nothing here mutates score state or the ledger. Points
//! from one call form a single correlated trajectory and must be presented
//! together.

use crate::config::CategoryConfig;
use crate::crisis;
use crate::decay::decay_value;
use crate::mood;
use crate::types::{ForecastPoint, HistoryEntry, RelationshipScoreState, WorldPulseImpact};
use chrono::{DateTime, Duration, Utc};

/// Least-squares slope (score points per hour) over the given entries,
/// measured against `now`. Returns 0.0 with fewer than two points.
pub fn trend_slope(entries: &[HistoryEntry], now: DateTime<Utc>) -> f64 {
    if entries.len() < 2 {
        return 0.0;
    }
    let n = entries.len() as f64;
    let xs: Vec<f64> = entries
        .iter()
        .map(|e| (e.timestamp - now).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let ys: Vec<f64> = entries.iter().map(|e| e.composite_after).collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let covariance: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let variance: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();

    if variance <= f64::EPSILON {
        0.0
    } else {
        covariance / variance
    }
}

/// Project the relationship's trajectory over `horizon_hours`.
///
/// `history` should be the relationship's recent ledger entries in ascending
/// order; only the most recent `trend_points` are used for the slope.
pub fn project(
    state: &RelationshipScoreState,
    history: &[HistoryEntry],
    horizon_hours: u32,
    now: DateTime<Utc>,
    config: &CategoryConfig,
) -> Vec<ForecastPoint> {
    let fc = &config.forecast;
    let recent: &[HistoryEntry] = if history.len() > fc.trend_points {
        &history[history.len() - fc.trend_points..]
    } else {
        history
    };

    let slope = trend_slope(recent, now);
    let current = state.composite_score;

    // Volatility context for the world-pulse projection; fades with horizon
    // along the same constant as confidence.
    let recent_deltas: Vec<f64> = recent.iter().map(|e| e.delta).collect();
    let current_risk = crisis::crisis_risk(&recent_deltas, &config.crisis);

    // Thin evidence lowers confidence across the whole trajectory without
    // zeroing it; the horizon decay below stays strictly decreasing.
    let data_factor = 0.5 + 0.5 * (recent.len() as f64 / fc.trend_points as f64).min(1.0);

    let mut points = Vec::new();
    let mut previous_expected = current;
    let mut h = fc.step_hours;
    while h <= horizon_hours as f64 + 1e-9 {
        let trend = (current + slope * h).clamp(0.0, 100.0);
        let toward_floor = decay_value(current, h, &config.decay);
        // Near-term trend-dominated, long-term decay-dominated.
        let decay_weight = 1.0 - (-h / fc.blend_hours).exp();
        let expected = (1.0 - decay_weight) * trend + decay_weight * toward_floor;

        let confidence = fc.base_confidence * data_factor * (-h / fc.confidence_decay_hours).exp();
        let projected_risk = current_risk * (-h / fc.confidence_decay_hours).exp();

        points.push(ForecastPoint {
            timestamp: now + Duration::milliseconds((h * 3_600_000.0) as i64),
            expected_index: expected,
            mood: mood::derive(expected, expected - previous_expected, &config.mood),
            confidence,
            world_pulse: WorldPulseImpact {
                pulse_level: crisis::pulse_level(projected_risk),
                crisis_risk: projected_risk,
            },
        });

        previous_expected = expected;
        h += fc.step_hours;
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CauseCode;
    use crate::types::{CrisisState, MoodState, RelationshipId, Tier};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).unwrap()
    }

    fn state(composite: f64) -> RelationshipScoreState {
        RelationshipScoreState {
            relationship_id: RelationshipId::new("a", "b"),
            composite_score: composite,
            per_dimension: BTreeMap::new(),
            tier: Tier::Silver,
            mood: MoodState::Steady,
            crisis_state: CrisisState::Calm,
            last_updated_at: now(),
            last_crisis_at: None,
            version: 1,
        }
    }

    fn entry(hours_ago: i64, composite_after: f64, delta: f64) -> HistoryEntry {
        HistoryEntry {
            relationship_id: RelationshipId::new("a", "b"),
            seq: 0,
            timestamp: now() - Duration::hours(hours_ago),
            delta,
            cause: CauseCode::TradeCompleted,
            composite_after,
            mood_after: MoodState::Steady,
            world_pulse: WorldPulseImpact::quiet(),
        }
    }

    fn flat_history(composite: f64) -> Vec<HistoryEntry> {
        (1..=8)
            .rev()
            .map(|hours| entry(hours, composite, 0.0))
            .collect()
    }

    #[test]
    fn test_trend_slope_of_rising_history() {
        let entries = vec![entry(4, 40.0, 2.0), entry(3, 42.0, 2.0), entry(2, 44.0, 2.0)];
        let slope = trend_slope(&entries, now());
        assert!((slope - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_slope_flat_or_sparse() {
        assert_eq!(trend_slope(&[], now()), 0.0);
        assert_eq!(trend_slope(&[entry(1, 50.0, 0.0)], now()), 0.0);
        let flat = flat_history(50.0);
        assert!(trend_slope(&flat, now()).abs() < 1e-9);
    }

    #[test]
    fn test_flat_history_converges_toward_floor() {
        let config = CategoryConfig::default_table();
        let points = project(&state(50.0), &flat_history(50.0), 72, now(), &config);

        assert_eq!(points.len(), 12); // 72h at 6h steps
        let floor = config.decay.floor;
        let first_gap = (points.first().unwrap().expected_index - floor).abs();
        let last_gap = (points.last().unwrap().expected_index - floor).abs();
        assert!(last_gap < first_gap);
        // Monotone march toward the floor for a flat trend above it.
        for pair in points.windows(2) {
            assert!(pair[1].expected_index <= pair[0].expected_index + 1e-9);
        }
    }

    #[test]
    fn test_confidence_strictly_decreasing() {
        let config = CategoryConfig::default_table();
        let points = project(&state(50.0), &flat_history(50.0), 72, now(), &config);
        for pair in points.windows(2) {
            assert!(pair[1].confidence < pair[0].confidence);
        }
    }

    #[test]
    fn test_near_term_follows_trend() {
        let config = CategoryConfig::default_table();
        let rising: Vec<HistoryEntry> = (1..=8)
            .rev()
            .map(|hours| entry(hours, 60.0 - hours as f64 * 1.5, 1.5))
            .collect();
        let points = project(&state(58.5), &rising, 24, now(), &config);

        // A strong upward trend lifts the first point above the current
        // score despite the decay pull.
        assert!(points[0].expected_index > 58.5);
    }

    #[test]
    fn test_points_within_bounds_and_ordered() {
        let config = CategoryConfig::default_table();
        let points = project(&state(97.0), &flat_history(97.0), 72, now(), &config);
        for pair in points.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for point in &points {
            assert!((0.0..=100.0).contains(&point.expected_index));
            assert!((0.0..=1.0).contains(&point.confidence));
        }
    }

    #[test]
    fn test_does_not_mutate_inputs() {
        let config = CategoryConfig::default_table();
        let s = state(50.0);
        let history = flat_history(50.0);
        let before = (s.clone(), history.clone());
        let _ = project(&s, &history, 24, now(), &config);
        assert_eq!(before, (s, history));
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use crate::types::{CrisisState, MoodState, RelationshipId, Tier};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    proptest! {
        /// Confidence is non-increasing in horizon for any starting score.
        #[test]
        fn confidence_monotone(composite in 0.0f64..=100.0) {
            let config = CategoryConfig::default_table();
            let now = Utc::now();
            let state = RelationshipScoreState {
                relationship_id: RelationshipId::new("a", "b"),
                composite_score: composite,
                per_dimension: BTreeMap::new(),
                tier: Tier::Bronze,
                mood: MoodState::Steady,
                crisis_state: CrisisState::Calm,
                last_updated_at: now,
                last_crisis_at: None,
                version: 0,
            };
            let points = project(&state, &[], 72, now, &config);
            for pair in points.windows(2) {
                prop_assert!(pair[1].confidence <= pair[0].confidence);
            }
        }
    }
}
