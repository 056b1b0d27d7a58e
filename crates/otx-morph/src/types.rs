//! Shared types for morph plans, targets, and the persisted plan record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use otx_schemas::order::Side;
use otx_schemas::position::{LegClass, OptionType};
pub use otx_schemas::morph::MorphPlanStatus;
use otx_schemas::strategy::StrategyKind;

use otx_persistence::KvRecord;

/// A leg the target strategy wants to open fresh (not retained from the
/// source). Strike selection, if required, must already be resolved —
/// see [`crate::rules::MorphError::RequiresStrikeSelection`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLegDefinition {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub side: Side,
    pub quantity: i64,
}

/// One requested target of a morph: a new strategy kind plus the legs it
/// retains from the source and the legs it opens fresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphTarget {
    pub target_kind: StrategyKind,
    pub retained_legs: Vec<LegClass>,
    pub new_legs: Vec<NewLegDefinition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegClose {
    pub position_id: Uuid,
    pub instrument_token: i64,
    pub side: Side,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegReassignment {
    pub position_id: Uuid,
    pub instrument_token: i64,
    pub leg_class: LegClass,
    pub target_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOpen {
    pub target_index: usize,
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub side: Side,
    pub quantity: i64,
}

/// The ordered set of actions a morph execution must perform, computed
/// from the source strategy's current positions and the requested
/// targets. Building this plan is idempotent and side-effect-free.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphExecutionPlan {
    pub source_strategy_id: Uuid,
    pub legs_to_close: Vec<LegClose>,
    pub legs_to_reassign: Vec<LegReassignment>,
    pub legs_to_open: Vec<LegOpen>,
    pub strategies_to_create: Vec<MorphTarget>,
}

impl MorphExecutionPlan {
    pub fn total_close_count(&self) -> usize {
        self.legs_to_close.len()
    }
}

/// Extract the option type from a trading symbol's `CE`/`PE` suffix.
pub fn option_type_of(trading_symbol: &str) -> Option<OptionType> {
    if trading_symbol.ends_with("CE") {
        Some(OptionType::Call)
    } else if trading_symbol.ends_with("PE") {
        Some(OptionType::Put)
    } else {
        None
    }
}

/// The persisted record tracking a morph execution's lifecycle, so a
/// crash mid-execution can be recovered at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MorphPlanEntry {
    pub id: Uuid,
    pub source_strategy_id: Uuid,
    pub status: MorphPlanStatus,
    pub created_at_epoch_ms: i64,
    pub advisory_message: Option<String>,
}

impl MorphPlanEntry {
    pub fn new_executing(id: Uuid, source_strategy_id: Uuid, now_epoch_ms: i64) -> Self {
        Self {
            id,
            source_strategy_id,
            status: MorphPlanStatus::Executing,
            created_at_epoch_ms: now_epoch_ms,
            advisory_message: None,
        }
    }
}

impl KvRecord for MorphPlanEntry {
    fn record_id(&self) -> Uuid {
        self.id
    }

    fn is_pending(&self) -> bool {
        matches!(self.status, MorphPlanStatus::Executing)
    }
}
