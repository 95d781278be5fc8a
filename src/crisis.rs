//! Crisis alert monitoring
//!
//! Watches the recent delta window for each relationship and raises an alert
//! when the cumulative negative movement or the volatility-derived crisis
//! risk crosses its threshold. A raised alert enters a cooldown: no repeat
//! alert for the same relationship until the suppression interval elapses,
//! which keeps rapid successive negative events from becoming alert storms.
//!
//! State machine: `Calm → Elevated → Crisis → Cooldown → Calm`. Every
//! evaluation recomputes risk from the window; `Cooldown` falls back to
//! `Calm` purely by elapsed time.

use crate::config::CrisisConfig;
use crate::types::{CrisisState, HistoryEntry, PulseLevel, WorldPulseImpact};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Result of one crisis evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrisisOutcome {
    pub alert_raised: bool,
    pub state: CrisisState,
    pub last_crisis_at: Option<DateTime<Utc>>,
    pub impact: WorldPulseImpact,
}

/// Map a crisis risk value onto the world-pulse band.
pub fn pulse_level(risk: f64) -> PulseLevel {
    if risk < 0.25 {
        PulseLevel::Stable
    } else if risk < 0.5 {
        PulseLevel::Rippling
    } else if risk < 0.75 {
        PulseLevel::Turbulent
    } else {
        PulseLevel::Quaking
    }
}

/// Volatility-derived crisis risk: window delta stddev normalized to [0, 1].
pub fn crisis_risk(deltas: &[f64], config: &CrisisConfig) -> f64 {
    if deltas.len() < 2 {
        return 0.0;
    }
    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    let variance =
        deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / deltas.len() as f64;
    (variance.sqrt() / config.volatility_scale).clamp(0.0, 1.0)
}

/// Evaluate the window plus the incoming delta and advance the state machine.
///
/// `window` holds the relationship's ledger entries; entries older than the
/// configured window are ignored here so callers may pass a generous slice.
pub fn evaluate(
    window: &[HistoryEntry],
    new_delta: f64,
    now: DateTime<Utc>,
    previous_state: CrisisState,
    last_crisis_at: Option<DateTime<Utc>>,
    config: &CrisisConfig,
) -> CrisisOutcome {
    let cutoff = now - Duration::milliseconds((config.window_hours * 3_600_000.0) as i64);
    let mut deltas: Vec<f64> = window
        .iter()
        .filter(|entry| entry.timestamp >= cutoff)
        .map(|entry| entry.delta)
        .collect();
    deltas.push(new_delta);

    let cumulative_drop: f64 = deltas.iter().filter(|d| **d < 0.0).map(|d| -d).sum();
    let risk = crisis_risk(&deltas, config);
    let impact = WorldPulseImpact {
        pulse_level: pulse_level(risk),
        crisis_risk: risk,
    };

    // Suppression: once raised, no repeat alert until the interval elapses.
    if matches!(previous_state, CrisisState::Crisis | CrisisState::Cooldown) {
        if let Some(raised_at) = last_crisis_at {
            let elapsed = now - raised_at;
            let suppression =
                Duration::milliseconds((config.suppression_hours * 3_600_000.0) as i64);
            if elapsed < suppression {
                return CrisisOutcome {
                    alert_raised: false,
                    state: CrisisState::Cooldown,
                    last_crisis_at,
                    impact,
                };
            }
        }
    }

    if cumulative_drop >= config.drop_threshold || risk >= config.risk_threshold {
        info!(
            cumulative_drop,
            risk, "crisis alert raised"
        );
        CrisisOutcome {
            alert_raised: true,
            state: CrisisState::Crisis,
            last_crisis_at: Some(now),
            impact,
        }
    } else if risk >= config.elevated_threshold {
        CrisisOutcome {
            alert_raised: false,
            state: CrisisState::Elevated,
            last_crisis_at,
            impact,
        }
    } else {
        CrisisOutcome {
            alert_raised: false,
            state: CrisisState::Calm,
            last_crisis_at,
            impact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryConfig;
    use crate::event::CauseCode;
    use crate::types::{MoodState, RelationshipId};
    use chrono::TimeZone;

    fn config() -> CrisisConfig {
        CategoryConfig::default_table().crisis
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).unwrap()
    }

    fn entry(delta: f64, hours_ago: i64) -> HistoryEntry {
        HistoryEntry {
            relationship_id: RelationshipId::new("a", "b"),
            seq: 0,
            timestamp: now() - Duration::hours(hours_ago),
            delta,
            cause: CauseCode::TradeCompleted,
            composite_after: 50.0,
            mood_after: MoodState::Steady,
            world_pulse: WorldPulseImpact::quiet(),
        }
    }

    #[test]
    fn test_calm_on_quiet_window() {
        let window = vec![entry(0.5, 3), entry(-0.2, 2), entry(0.1, 1)];
        let outcome = evaluate(&window, 0.3, now(), CrisisState::Calm, None, &config());

        assert!(!outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Calm);
        assert_eq!(outcome.impact.pulse_level, PulseLevel::Stable);
    }

    #[test]
    fn test_cumulative_drop_raises_alert() {
        let window = vec![entry(-6.0, 4), entry(-5.0, 2)];
        let outcome = evaluate(&window, -5.0, now(), CrisisState::Calm, None, &config());

        assert!(outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Crisis);
        assert_eq!(outcome.last_crisis_at, Some(now()));
    }

    #[test]
    fn test_volatility_raises_alert() {
        // Large swings in both directions: little net drop, high stddev.
        let window = vec![entry(12.0, 5), entry(-13.0, 4), entry(14.0, 3), entry(-12.0, 2)];
        let outcome = evaluate(&window, 11.0, now(), CrisisState::Calm, None, &config());

        assert!(outcome.impact.crisis_risk >= config().risk_threshold);
        assert!(outcome.alert_raised);
    }

    #[test]
    fn test_entries_outside_window_ignored() {
        // The same drops, but too old to count.
        let window = vec![entry(-10.0, 40), entry(-10.0, 30)];
        let outcome = evaluate(&window, -1.0, now(), CrisisState::Calm, None, &config());

        assert!(!outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Calm);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_alert() {
        let raised_at = now() - Duration::hours(2);
        let window = vec![entry(-8.0, 1)];

        // Further heavy negative deltas within suppression must not re-raise.
        let outcome = evaluate(
            &window,
            -9.0,
            now(),
            CrisisState::Crisis,
            Some(raised_at),
            &config(),
        );

        assert!(!outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Cooldown);
        assert_eq!(outcome.last_crisis_at, Some(raised_at));
    }

    #[test]
    fn test_cooldown_returns_to_calm_after_suppression() {
        let raised_at = now() - Duration::hours(13); // past 12h suppression
        let outcome = evaluate(
            &[],
            0.0,
            now(),
            CrisisState::Cooldown,
            Some(raised_at),
            &config(),
        );

        assert!(!outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Calm);
    }

    #[test]
    fn test_can_re_raise_after_suppression() {
        let raised_at = now() - Duration::hours(13);
        let window = vec![entry(-9.0, 1), entry(-8.0, 2)];
        let outcome = evaluate(
            &window,
            -6.0,
            now(),
            CrisisState::Cooldown,
            Some(raised_at),
            &config(),
        );

        assert!(outcome.alert_raised);
        assert_eq!(outcome.state, CrisisState::Crisis);
        assert_eq!(outcome.last_crisis_at, Some(now()));
    }

    #[test]
    fn test_elevated_between_thresholds() {
        let cfg = config();
        // Moderate swings: risk above elevated but below crisis, small net drop.
        let window = vec![entry(5.0, 4), entry(-5.5, 3), entry(5.0, 2)];
        let outcome = evaluate(&window, -4.5, now(), CrisisState::Calm, None, &cfg);

        assert!(!outcome.alert_raised);
        assert!(outcome.impact.crisis_risk >= cfg.elevated_threshold);
        assert!(outcome.impact.crisis_risk < cfg.risk_threshold);
        assert_eq!(outcome.state, CrisisState::Elevated);
    }

    #[test]
    fn test_pulse_level_bands() {
        assert_eq!(pulse_level(0.0), PulseLevel::Stable);
        assert_eq!(pulse_level(0.3), PulseLevel::Rippling);
        assert_eq!(pulse_level(0.6), PulseLevel::Turbulent);
        assert_eq!(pulse_level(0.9), PulseLevel::Quaking);
    }

    #[test]
    fn test_risk_needs_two_deltas() {
        assert_eq!(crisis_risk(&[5.0], &config()), 0.0);
        assert_eq!(crisis_risk(&[], &config()), 0.0);
    }
}
