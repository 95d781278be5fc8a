//! Error types for the TrustPulse engine

use thiserror::Error;

/// Errors that can occur while scoring, classifying, or projecting relationships.
///
/// `InsufficientData` is deliberately absent: it is surfaced as a flag on the
/// score output rather than a failure, since an empty relationship is a valid
/// state. Clock skew on the decay path is likewise non-fatal: elapsed time is
/// clamped to zero and logged, never returned as an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("metric value {0} outside [0, 100]")]
    InvalidMetricValue(f64),

    #[error("unknown dimension code: {0}")]
    UnknownDimension(String),

    #[error("unknown cause code: {0}")]
    UnknownCause(String),

    #[error("forecast horizon {0}h unsupported (expected 24 or 72)")]
    InvalidHorizon(u32),

    #[error("config version mismatch: caller holds {held}, live table is {live}")]
    StaleConfigVersion { held: String, live: String },

    #[error("version conflict on relationship {0}: concurrent writer won, retry with fresh state")]
    VersionConflict(String),

    #[error("invalid category config: {0}")]
    InvalidConfig(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("failed to parse event payload: {0}")]
    ParseError(String),

    #[error("invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
