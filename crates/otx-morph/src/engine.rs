//! Morph execution: the nine-step order from plan persistence through
//! lineage recording, plus the startup recovery pass for crashes mid-run.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use otx_persistence::{AuditStore, KvStore};
use otx_schemas::morph::MorphHistoryEntry;
use otx_schemas::strategy::{StrategyKind, StrategyStatus};

use crate::rules::MorphError;
use crate::types::{LegClose, LegOpen, LegReassignment, MorphExecutionPlan, MorphPlanEntry, MorphPlanStatus, MorphTarget};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MorphLimits {
    pub max_total_close: usize,
    pub morphing_enabled: bool,
}

/// Everything outside this crate that a morph execution needs to touch:
/// strategy lifecycle, order routing, and the position ownership index.
/// Kept as a trait so this crate never depends on the execution/strategy
/// crates directly.
pub trait MorphExecutionContext {
    fn strategy_status(&self, strategy_id: Uuid) -> Option<StrategyStatus>;
    fn strategy_kind(&self, strategy_id: Uuid) -> Option<StrategyKind>;
    fn strategy_pnl_micros(&self, strategy_id: Uuid) -> Option<i64>;
    fn pause_strategy(&mut self, strategy_id: Uuid) -> Result<(), MorphError>;
    fn create_strategy(&mut self, target: &MorphTarget) -> Uuid;
    fn route_close(&mut self, leg: &LegClose) -> Result<(), MorphError>;
    fn reassign_position(&mut self, reassignment: &LegReassignment, new_strategy_id: Uuid) -> Result<(), MorphError>;
    fn route_open(&mut self, leg: &LegOpen, owning_strategy_id: Uuid) -> Result<(), MorphError>;
    fn close_strategy(&mut self, strategy_id: Uuid) -> Result<(), MorphError>;
    fn now_epoch_ms(&self) -> i64;
}

pub struct MorphEngine {
    plan_store: Arc<dyn KvStore<MorphPlanEntry>>,
    audit: Arc<dyn AuditStore>,
}

impl MorphEngine {
    pub fn new(plan_store: Arc<dyn KvStore<MorphPlanEntry>>, audit: Arc<dyn AuditStore>) -> Self {
        Self { plan_store, audit }
    }

    /// Execute a previously-built plan against `ctx`, following the
    /// spec's nine-step order. Any mid-execution failure leaves the plan
    /// entry in EXECUTING for the recovery pass to find; callers are not
    /// expected to retry the same plan automatically.
    pub fn execute(
        &self,
        plan_id: Uuid,
        plan: &MorphExecutionPlan,
        limits: &MorphLimits,
        ctx: &mut dyn MorphExecutionContext,
    ) -> Result<Vec<Uuid>, MorphError> {
        match ctx.strategy_status(plan.source_strategy_id) {
            Some(StrategyStatus::Active) | Some(StrategyStatus::Paused) => {}
            _ => return Err(MorphError::SourceNotActiveOrPaused),
        }
        if plan.total_close_count() > limits.max_total_close {
            return Err(MorphError::TooManyCloses {
                requested: plan.total_close_count(),
                limit: limits.max_total_close,
            });
        }
        if !limits.morphing_enabled {
            return Err(MorphError::MorphingDisabled);
        }

        let now = ctx.now_epoch_ms();

        // (1) persist the plan as EXECUTING.
        self.plan_store
            .save(MorphPlanEntry::new_executing(plan_id, plan.source_strategy_id, now))
            .map_err(|e| MorphError::PlanPersistenceFailed { reason: e.to_string() })?;

        // (2) pause the source strategy.
        ctx.pause_strategy(plan.source_strategy_id)?;

        // (3) create new strategy instances, one per target.
        let mut new_strategy_ids: HashMap<usize, Uuid> = HashMap::new();
        for (index, target) in plan.strategies_to_create.iter().enumerate() {
            new_strategy_ids.insert(index, ctx.create_strategy(target));
        }

        // (4) route close orders.
        for leg in &plan.legs_to_close {
            ctx.route_close(leg)?;
        }

        // (5) retarget reassigned positions to their new owning strategies.
        for reassignment in &plan.legs_to_reassign {
            let new_id = *new_strategy_ids
                .get(&reassignment.target_index)
                .expect("plan.strategies_to_create covers every target_index used");
            ctx.reassign_position(reassignment, new_id)?;
        }

        // (6) route open orders for fresh legs.
        for leg in &plan.legs_to_open {
            let new_id = *new_strategy_ids
                .get(&leg.target_index)
                .expect("plan.strategies_to_create covers every target_index used");
            ctx.route_open(leg, new_id)?;
        }

        // (7) close the source strategy.
        ctx.close_strategy(plan.source_strategy_id)?;

        // (8) write a MorphHistoryEntry edge per new child.
        let parent_kind = ctx.strategy_kind(plan.source_strategy_id);
        let parent_pnl = ctx.strategy_pnl_micros(plan.source_strategy_id);
        for (index, target) in plan.strategies_to_create.iter().enumerate() {
            let child_id = new_strategy_ids[&index];
            let entry = MorphHistoryEntry {
                parent_strategy_id: plan.source_strategy_id,
                child_strategy_id: child_id,
                parent_kind: parent_kind.unwrap_or(target.target_kind),
                child_kind: target.target_kind,
                parent_pnl_at_morph_micros: parent_pnl,
                reason: "morph".to_string(),
                at_epoch_ms: now,
            };
            let _ = self.audit.record_morph_history(&entry);
        }

        // (9) mark the plan COMPLETED.
        let mut completed = MorphPlanEntry::new_executing(plan_id, plan.source_strategy_id, now);
        completed.status = MorphPlanStatus::Completed;
        self.plan_store
            .save(completed)
            .map_err(|e| MorphError::PlanPersistenceFailed { reason: e.to_string() })?;

        Ok(new_strategy_ids.into_values().collect())
    }
}

/// Startup recovery: any plan still EXECUTING means the process crashed
/// mid-morph. Mark it PARTIALLY_DONE with an advisory message; no
/// automatic re-drive.
pub fn recover_incomplete(plan_store: &dyn KvStore<MorphPlanEntry>) -> usize {
    let pending = plan_store.find_pending();
    let count = pending.len();
    for mut entry in pending {
        entry.status = MorphPlanStatus::PartiallyDone;
        entry.advisory_message = Some(
            "recovered at startup: execution state unknown, no automatic re-drive".to_string(),
        );
        let _ = plan_store.save(entry);
    }
    count
}
