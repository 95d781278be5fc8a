//! pulse.update_event.v1 intake schema
//!
//! The engine accepts one normalized event shape from relationship/gameplay
//! services. Intake validates numeric bounds and known cause codes only; the
//! business legitimacy of a cause is the sender's problem. Free-form metadata
//! is deliberately not carried into scoring math: causes are explicit tagged
//! variants, and truly unknown shapes are rejected at this boundary.

use crate::error::EngineError;
use crate::types::RelationshipId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Current intake schema version
pub const SCHEMA_VERSION: &str = "pulse.update_event.v1";

/// Known interaction causes. Each variant names one gameplay interaction the
/// scoring engine understands; anything else fails intake with
/// [`EngineError::UnknownCause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCode {
    TradeCompleted,
    TradeDefaulted,
    GiftGiven,
    QuestShared,
    ContractFulfilled,
    ContractBreached,
    FavorRepaid,
    InsultExchanged,
    BetrayalExposed,
    AdminAdjustment,
}

impl CauseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CauseCode::TradeCompleted => "trade_completed",
            CauseCode::TradeDefaulted => "trade_defaulted",
            CauseCode::GiftGiven => "gift_given",
            CauseCode::QuestShared => "quest_shared",
            CauseCode::ContractFulfilled => "contract_fulfilled",
            CauseCode::ContractBreached => "contract_breached",
            CauseCode::FavorRepaid => "favor_repaid",
            CauseCode::InsultExchanged => "insult_exchanged",
            CauseCode::BetrayalExposed => "betrayal_exposed",
            CauseCode::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl FromStr for CauseCode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trade_completed" => Ok(CauseCode::TradeCompleted),
            "trade_defaulted" => Ok(CauseCode::TradeDefaulted),
            "gift_given" => Ok(CauseCode::GiftGiven),
            "quest_shared" => Ok(CauseCode::QuestShared),
            "contract_fulfilled" => Ok(CauseCode::ContractFulfilled),
            "contract_breached" => Ok(CauseCode::ContractBreached),
            "favor_repaid" => Ok(CauseCode::FavorRepaid),
            "insult_exchanged" => Ok(CauseCode::InsultExchanged),
            "betrayal_exposed" => Ok(CauseCode::BetrayalExposed),
            "admin_adjustment" => Ok(CauseCode::AdminAdjustment),
            other => Err(EngineError::UnknownCause(other.to_string())),
        }
    }
}

/// Normalized relationship update consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdateEvent {
    pub relationship_id: RelationshipId,
    pub dimension_code: String,
    /// Normalized observation, 0-100. Checked before any mutation.
    pub raw_value: f64,
    pub cause: CauseCode,
    pub timestamp: DateTime<Utc>,
}

impl RelationshipUpdateEvent {
    /// Reject out-of-range values before they can touch state.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.raw_value.is_finite() || !(0.0..=100.0).contains(&self.raw_value) {
            return Err(EngineError::InvalidMetricValue(self.raw_value));
        }
        Ok(())
    }
}

/// Wire shape of one intake line, before cause-code resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUpdateEvent {
    /// Must equal [`SCHEMA_VERSION`] when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema_version: Option<String>,
    pub subject_id: String,
    pub target_id: String,
    pub dimension_code: String,
    pub raw_value: f64,
    pub cause: String,
    pub timestamp: DateTime<Utc>,
}

impl RawUpdateEvent {
    /// Parse one JSON line into a raw event.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::ParseError(e.to_string()))
    }

    /// Resolve the wire shape into a normalized event, rejecting unknown
    /// schema versions, unknown causes, and out-of-range values.
    pub fn normalize(self) -> Result<RelationshipUpdateEvent, EngineError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(EngineError::ParseError(format!(
                    "unsupported schema version: {version}"
                )));
            }
        }
        let event = RelationshipUpdateEvent {
            relationship_id: RelationshipId::new(self.subject_id, self.target_id),
            dimension_code: self.dimension_code,
            raw_value: self.raw_value,
            cause: self.cause.parse()?,
            timestamp: self.timestamp,
        };
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(cause: &str, value: f64) -> RawUpdateEvent {
        RawUpdateEvent {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            subject_id: "player-1".to_string(),
            target_id: "npc-9".to_string(),
            dimension_code: "reliability".to_string(),
            raw_value: value,
            cause: cause.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_known_cause() {
        let event = raw("gift_given", 72.0).normalize().unwrap();
        assert_eq!(event.cause, CauseCode::GiftGiven);
        assert_eq!(event.relationship_id.subject, "player-1");
    }

    #[test]
    fn test_rejects_unknown_cause() {
        let err = raw("mysterious_ritual", 50.0).normalize().unwrap_err();
        assert!(matches!(err, EngineError::UnknownCause(_)));
    }

    #[test]
    fn test_rejects_out_of_range_value() {
        assert!(matches!(
            raw("gift_given", 120.0).normalize().unwrap_err(),
            EngineError::InvalidMetricValue(_)
        ));
        assert!(matches!(
            raw("gift_given", -0.1).normalize().unwrap_err(),
            EngineError::InvalidMetricValue(_)
        ));
        assert!(matches!(
            raw("gift_given", f64::NAN).normalize().unwrap_err(),
            EngineError::InvalidMetricValue(_)
        ));
    }

    #[test]
    fn test_rejects_wrong_schema_version() {
        let mut event = raw("gift_given", 50.0);
        event.schema_version = Some("pulse.update_event.v999".to_string());
        assert!(matches!(
            event.normalize().unwrap_err(),
            EngineError::ParseError(_)
        ));
    }

    #[test]
    fn test_cause_round_trip() {
        for cause in [
            CauseCode::TradeCompleted,
            CauseCode::BetrayalExposed,
            CauseCode::AdminAdjustment,
        ] {
            assert_eq!(cause.as_str().parse::<CauseCode>().unwrap(), cause);
        }
    }

    #[test]
    fn test_wire_json_parse() {
        let line = r#"{
            "schema_version": "pulse.update_event.v1",
            "subject_id": "player-1",
            "target_id": "guild-emberfall",
            "dimension_code": "generosity",
            "raw_value": 64.5,
            "cause": "quest_shared",
            "timestamp": "2026-08-01T12:00:00Z"
        }"#;
        let event = RawUpdateEvent::from_json(line).unwrap().normalize().unwrap();
        assert_eq!(event.dimension_code, "generosity");
        assert_eq!(event.cause, CauseCode::QuestShared);
    }
}
