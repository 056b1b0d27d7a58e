//! Morph lineage edge type, shared by the morph engine and audit trail.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::strategy::StrategyKind;

/// One edge in the morph lineage DAG: a parent strategy converted into one
/// child. A parent may have many children; a child has at most one parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphHistoryEntry {
    pub parent_strategy_id: Uuid,
    pub child_strategy_id: Uuid,
    pub parent_kind: StrategyKind,
    pub child_kind: StrategyKind,
    /// Parent's realized+unrealized P&L at the moment of the morph, if known.
    pub parent_pnl_at_morph_micros: Option<i64>,
    pub reason: String,
    pub at_epoch_ms: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MorphPlanStatus {
    Executing,
    Completed,
    PartiallyDone,
    Failed,
}
