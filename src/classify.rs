//! Tier classification
//!
//! Maps a composite score onto the configured category bands. Bands are
//! sorted ascending by `min_score`; the last band at or below the score wins,
//! except at an exact tie between bands, where the lower tier wins to bias
//! conservatively.

use crate::config::{Benefits, CategoryConfig};
use crate::error::EngineError;
use crate::types::Tier;

/// Resolve the tier and benefits for a composite score.
///
/// Scores below every band's `min_score` fall into the first (lowest) band.
pub fn classify(composite: f64, config: &CategoryConfig) -> (Tier, Benefits) {
    let mut selected = &config.bands[0];
    for band in &config.bands[1..] {
        // Strict `>` keeps the earlier (lower) band on an exact min_score tie.
        if band.min_score <= composite && band.min_score > selected.min_score {
            selected = band;
        }
    }
    (selected.tier, selected.benefits.clone())
}

/// Classify against a config snapshot the caller believes is current.
///
/// Fails with `StaleConfigVersion` instead of silently classifying against a
/// table the caller has not seen; callers must re-fetch and retry.
pub fn classify_versioned(
    composite: f64,
    config: &CategoryConfig,
    expected_version: &str,
) -> Result<(Tier, Benefits), EngineError> {
    if config.version != expected_version {
        return Err(EngineError::StaleConfigVersion {
            held: expected_version.to_string(),
            live: config.version.clone(),
        });
    }
    Ok(classify(composite, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryBand, CategoryConfig};

    fn config() -> CategoryConfig {
        CategoryConfig::default_table()
    }

    #[test]
    fn test_band_selection() {
        let config = config();
        assert_eq!(classify(0.0, &config).0, Tier::Bronze);
        assert_eq!(classify(29.99, &config).0, Tier::Bronze);
        assert_eq!(classify(30.0, &config).0, Tier::Silver);
        assert_eq!(classify(61.0, &config).0, Tier::Gold);
        assert_eq!(classify(100.0, &config).0, Tier::Legendary);
    }

    #[test]
    fn test_exact_boundary_lands_in_higher_band() {
        let config = config();
        assert_eq!(classify(60.0, &config).0, Tier::Gold);
        assert_eq!(classify(92.0, &config).0, Tier::Legendary);
    }

    #[test]
    fn test_tie_between_bands_picks_lower_tier() {
        let mut config = config();
        // Two bands sharing a min_score: the lower tier must win the tie.
        config.bands[2].min_score = 30.0;
        assert_eq!(config.bands[1].tier, Tier::Silver);
        assert_eq!(classify(30.0, &config).0, Tier::Silver);
    }

    #[test]
    fn test_monotone_in_score() {
        let config = config();
        let mut previous = classify(0.0, &config).0;
        let mut score = 0.0;
        while score <= 100.0 {
            let (tier, _) = classify(score, &config);
            assert!(tier >= previous, "tier regressed at score {score}");
            previous = tier;
            score += 0.5;
        }
    }

    #[test]
    fn test_stale_version_rejected() {
        let config = config();
        let err = classify_versioned(50.0, &config, "v-old").unwrap_err();
        assert!(matches!(err, EngineError::StaleConfigVersion { .. }));

        let ok = classify_versioned(50.0, &config, "builtin-1").unwrap();
        assert_eq!(ok.0, Tier::Silver);
    }

    #[test]
    fn test_benefits_follow_band() {
        let config = config();
        let (_, bronze) = classify(5.0, &config);
        let (_, legendary) = classify(99.0, &config);
        assert!(!bronze.exclusive_contracts);
        assert!(legendary.exclusive_contracts);
        assert!(legendary.commission_discount_pct > bronze.commission_discount_pct);
    }

    #[test]
    fn test_single_band_config() {
        let mut config = config();
        config.bands = vec![CategoryBand {
            min_score: 0.0,
            tier: Tier::Bronze,
            benefits: config.bands[0].benefits.clone(),
        }];
        assert_eq!(classify(99.0, &config).0, Tier::Bronze);
    }
}
