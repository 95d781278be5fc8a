//! Time decay for stored metric samples
//!
//! Old interactions fade: every stored dimension value is pulled toward the
//! configured floor with an exponential half-life before aggregation runs.
//! Sample counts are never decayed; they record evidence volume, not recency.

use crate::config::DecayDefaults;
use crate::types::RelationshipScoreState;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Exponential pull of a single value toward the floor.
///
/// `value' = floor + (value - floor) * 2^(-elapsed_hours / half_life_hours)`
///
/// Values below the floor decay upward toward it by the same law; decay never
/// moves a value further from the floor than it started.
pub fn decay_value(value: f64, elapsed_hours: f64, defaults: &DecayDefaults) -> f64 {
    if elapsed_hours <= 0.0 {
        return value;
    }
    let factor = 2f64.powf(-elapsed_hours / defaults.half_life_hours);
    defaults.floor + (value - defaults.floor) * factor
}

/// Age every stored sample in place and advance `last_updated_at`.
///
/// Idempotent for a fixed `now`: elapsed time is measured from the state's
/// own `last_updated_at`, which this call advances, so a second call with the
/// same `now` sees elapsed = 0 and is a no-op. Negative elapsed time (clock
/// skew between callers) is clamped to zero and logged; decay is never
/// applied as growth, and the stored clock never moves backward.
///
/// Returns the elapsed hours actually applied.
pub fn age_samples(
    state: &mut RelationshipScoreState,
    now: DateTime<Utc>,
    defaults: &DecayDefaults,
) -> f64 {
    let elapsed_seconds = (now - state.last_updated_at).num_milliseconds() as f64 / 1000.0;
    if elapsed_seconds < 0.0 {
        warn!(
            relationship = %state.relationship_id,
            skew_seconds = -elapsed_seconds,
            "clock skew clamped: decay treated as zero"
        );
        return 0.0;
    }
    let elapsed_hours = elapsed_seconds / 3600.0;
    if elapsed_hours > 0.0 {
        for sample in state.per_dimension.values_mut() {
            sample.normalized_value =
                decay_value(sample.normalized_value, elapsed_hours, defaults);
        }
    }
    state.last_updated_at = now;
    elapsed_hours
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Decay moves a value monotonically toward the floor, never past it
        /// and never away from it.
        #[test]
        fn decay_approaches_floor(
            value in 0.0f64..100.0,
            floor in 0.0f64..100.0,
            hours in 0.0f64..10_000.0,
        ) {
            let defaults = DecayDefaults { half_life_hours: 24.0, floor };
            let decayed = decay_value(value, hours, &defaults);
            prop_assert!((decayed - floor).abs() <= (value - floor).abs() + 1e-9);
            // Same side of the floor as the start.
            prop_assert!((decayed - floor) * (value - floor) >= -1e-9);
        }

        /// Splitting an interval in two equals decaying over the whole span.
        #[test]
        fn decay_composes_over_intervals(
            value in 0.0f64..100.0,
            h1 in 0.0f64..500.0,
            h2 in 0.0f64..500.0,
        ) {
            let defaults = DecayDefaults { half_life_hours: 24.0, floor: 20.0 };
            let split = decay_value(decay_value(value, h1, &defaults), h2, &defaults);
            let whole = decay_value(value, h1 + h2, &defaults);
            prop_assert!((split - whole).abs() < 1e-9);
        }
    }
}
