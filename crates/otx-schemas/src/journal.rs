//! Write-ahead journal entries for multi-leg execution groups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::Side;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOperation {
    Sequential,
    Parallel,
    BuyFirstThenSell,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One entry per leg of one multi-leg operation. Written strictly before
/// the leg is routed (write-ahead).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionJournalEntry {
    pub strategy_id: Uuid,
    pub execution_group_id: Uuid,
    pub operation: ExecutionOperation,
    pub leg_index: u32,
    pub total_legs: u32,
    pub instrument_token: i64,
    pub side: Side,
    pub quantity: i64,
    pub status: LegStatus,
    pub created_at_epoch_ms: i64,
    pub updated_at_epoch_ms: i64,
    pub failure_reason: Option<String>,
}

impl ExecutionJournalEntry {
    pub fn new_pending(
        strategy_id: Uuid,
        execution_group_id: Uuid,
        operation: ExecutionOperation,
        leg_index: u32,
        total_legs: u32,
        instrument_token: i64,
        side: Side,
        quantity: i64,
        now_epoch_ms: i64,
    ) -> Self {
        Self {
            strategy_id,
            execution_group_id,
            operation,
            leg_index,
            total_legs,
            instrument_token,
            side,
            quantity,
            status: LegStatus::Pending,
            created_at_epoch_ms: now_epoch_ms,
            updated_at_epoch_ms: now_epoch_ms,
            failure_reason: None,
        }
    }
}
