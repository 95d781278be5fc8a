//! Weighted dimension aggregation
//!
//! Combines stored per-dimension samples into a single composite score. The
//! configured weights sum to 1.0 across all dimensions, but a relationship
//! rarely has samples for every dimension: the weight mass of missing
//! dimensions is redistributed proportionally among the present ones, so a
//! sparse relationship is not silently dragged toward zero.

use crate::types::{DimensionContribution, MetricValue};
use std::collections::BTreeMap;

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    /// `None` when no dimension carries samples; the caller keeps the
    /// previous persisted composite and flags `insufficient_data`.
    pub composite: Option<f64>,
    /// Per-dimension explainability rows; their weighted contributions sum
    /// to the composite (within floating-point epsilon).
    pub contributions: Vec<DimensionContribution>,
}

impl AggregateOutcome {
    pub fn insufficient_data(&self) -> bool {
        self.composite.is_none()
    }
}

/// Aggregate present samples under the configured weights.
///
/// Dimensions present in the samples but absent from the weight table carry
/// zero weight and contribute nothing; validation upstream keeps that case an
/// error on the write path.
pub fn aggregate(
    per_dimension: &BTreeMap<String, MetricValue>,
    weights: &BTreeMap<String, f64>,
) -> AggregateOutcome {
    let present_mass: f64 = per_dimension
        .keys()
        .filter_map(|code| weights.get(code))
        .sum();

    if per_dimension.is_empty() || present_mass <= 0.0 {
        return AggregateOutcome {
            composite: None,
            contributions: Vec::new(),
        };
    }

    let mut composite = 0.0;
    let mut contributions = Vec::with_capacity(per_dimension.len());

    for (code, sample) in per_dimension {
        let weight = weights.get(code).copied().unwrap_or(0.0);
        let effective_weight = weight / present_mass;
        let weighted_contribution = sample.normalized_value * effective_weight;
        composite += weighted_contribution;
        contributions.push(DimensionContribution {
            dimension_code: code.clone(),
            normalized_value: sample.normalized_value,
            effective_weight,
            weighted_contribution,
            sample_size: sample.sample_size,
        });
    }

    AggregateOutcome {
        composite: Some(composite.clamp(0.0, 100.0)),
        contributions,
    }
}
