//! TrustPulse - Trust/resonance scoring and forecast engine
//!
//! TrustPulse turns raw relationship interaction events into a composite
//! trust score per entity pair through a deterministic pipeline:
//! time decay → weighted aggregation → crisis evaluation → mood and tier
//! classification → ledger append. A read-only projector extrapolates
//! future score points with horizon-decaying confidence.
//!
//! ## Modules
//!
//! - **Write path**: `apply_update` runs the whole pipeline as one logical
//!   transaction per relationship
//! - **Read path**: current score, forecasts, and history over committed
//!   snapshots, never blocking writers

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod crisis;
pub mod decay;
pub mod engine;
pub mod error;
pub mod event;
pub mod forecast;
pub mod history;
pub mod mood;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::{CategoryConfig, ConfigHandle};
pub use engine::{TrustEngine, SUPPORTED_HORIZONS};
pub use error::EngineError;
pub use event::{CauseCode, RawUpdateEvent, RelationshipUpdateEvent, SCHEMA_VERSION};
pub use snapshot::EngineSnapshot;
pub use store::{MemoryStore, RelationshipStore};
pub use types::{
    RelationshipId, RelationshipScoreState, RelationshipUpdateResult, ScoreView, TrustForecast,
};

/// Engine version embedded in all emitted payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for emitted payloads
pub const PRODUCER_NAME: &str = "trustpulse";
