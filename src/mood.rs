//! Mood derivation
//!
//! Mood is a coarse readout of (composite score bucket × recent trend sign),
//! resolved through the explicit lookup table in the config so every
//! threshold stays auditable. No learned model, no hidden state.

use crate::config::MoodTable;
use crate::types::MoodState;

/// Trend sign of the most recent delta, dead-banded by the table's epsilon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Falling,
    Steady,
    Rising,
}

impl Trend {
    pub fn of(delta: f64, epsilon: f64) -> Self {
        if delta > epsilon {
            Trend::Rising
        } else if delta < -epsilon {
            Trend::Falling
        } else {
            Trend::Steady
        }
    }
}

/// Resolve the mood for a composite score and its most recent delta.
pub fn derive(composite: f64, recent_delta: f64, table: &MoodTable) -> MoodState {
    let row = if composite < table.low_cut {
        &table.low
    } else if composite >= table.high_cut {
        &table.high
    } else {
        &table.mid
    };
    match Trend::of(recent_delta, table.trend_epsilon) {
        Trend::Falling => row.falling,
        Trend::Steady => row.steady,
        Trend::Rising => row.rising,
    }
}
