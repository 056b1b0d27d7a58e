//! Strategy Registry (C9): the multi-strategy lifecycle host.
//!
//! Where `StrategyHost` (Tier A) enforces "exactly one strategy, one
//! timeframe" for a single slot, `StrategyRegistry` owns many strategies at
//! once, keyed by id, each progressing independently through the lifecycle
//! state machine in `otx_schemas::strategy`. It also keeps the reverse index
//! a position belongs to one or more strategies needs for fanning a fill
//! back out to its owner(s).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use uuid::Uuid;

use otx_events::{DecisionEvent, EventBus, PositionEvent};
use otx_schemas::strategy::{apply_transition, AdjustmentAction, IllegalTransition, LifecycleTransition, StrategyKind, StrategyStatus};

/// A tick's worth of market data delivered to every eligible strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub instrument_token: i64,
    pub spot_price_micros: i64,
    pub timestamp_epoch_ms: i64,
}

/// A strategy managed by the registry. Deliberately decoupled from the
/// bar-history-based `Strategy` trait used by the Tier A host: the
/// registry's tick contract is a plain snapshot, not a recent-bars window.
pub trait RegisteredStrategy: Send {
    fn evaluate(&mut self, snapshot: &MarketSnapshot);
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    AlreadyRegistered(Uuid),
    UnknownStrategy(Uuid),
    IllegalTransition(IllegalTransition),
    NotActive(Uuid),
    NotClosed(Uuid),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::AlreadyRegistered(id) => write!(f, "strategy {id} already registered"),
            RegistryError::UnknownStrategy(id) => write!(f, "unknown strategy {id}"),
            RegistryError::IllegalTransition(e) => write!(f, "{e}"),
            RegistryError::NotActive(id) => write!(f, "strategy {id} is not ACTIVE"),
            RegistryError::NotClosed(id) => write!(f, "strategy {id} is not CLOSED"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<IllegalTransition> for RegistryError {
    fn from(e: IllegalTransition) -> Self {
        RegistryError::IllegalTransition(e)
    }
}

struct StrategyRecord {
    kind: StrategyKind,
    status: StrategyStatus,
    strategy: Box<dyn RegisteredStrategy>,
    positions: HashMap<Uuid, PositionEvent>,
}

/// Owns every live strategy, keyed by id, and the positionId -> strategy
/// ids reverse index used to route position events back to their owner(s).
pub struct StrategyRegistry {
    strategies: Mutex<HashMap<Uuid, StrategyRecord>>,
    position_index: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    decisions: Option<Arc<EventBus<DecisionEvent>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StrategyRegistry {
    pub fn new(decisions: Option<Arc<EventBus<DecisionEvent>>>) -> Self {
        Self {
            strategies: Mutex::new(HashMap::new()),
            position_index: RwLock::new(HashMap::new()),
            decisions,
        }
    }

    fn publish_decision(&self, category: &str, strategy_id: Uuid, detail: &[(&str, Value)]) {
        let Some(bus) = &self.decisions else { return };
        let mut ctx = BTreeMap::new();
        for (k, v) in detail {
            ctx.insert((*k).to_string(), v.clone());
        }
        bus.publish(&DecisionEvent::new(category, Some(strategy_id), &ctx));
    }

    pub fn register(&self, id: Uuid, kind: StrategyKind, strategy: Box<dyn RegisteredStrategy>) -> Result<(), RegistryError> {
        let mut strategies = self.strategies.lock().expect("registry lock poisoned");
        if strategies.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        strategies.insert(
            id,
            StrategyRecord {
                kind,
                status: StrategyStatus::Created,
                strategy,
                positions: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn status(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        let strategies = self.strategies.lock().expect("registry lock poisoned");
        strategies
            .get(&id)
            .map(|r| r.status)
            .ok_or(RegistryError::UnknownStrategy(id))
    }

    pub fn kind(&self, id: Uuid) -> Result<StrategyKind, RegistryError> {
        let strategies = self.strategies.lock().expect("registry lock poisoned");
        strategies
            .get(&id)
            .map(|r| r.kind)
            .ok_or(RegistryError::UnknownStrategy(id))
    }

    fn transition(&self, id: Uuid, transition: LifecycleTransition) -> Result<StrategyStatus, RegistryError> {
        let mut strategies = self.strategies.lock().expect("registry lock poisoned");
        let record = strategies.get_mut(&id).ok_or(RegistryError::UnknownStrategy(id))?;
        let from = record.status;
        let to = apply_transition(from, transition)?;
        record.status = to;
        drop(strategies);

        self.publish_decision(
            "strategy_lifecycle",
            id,
            &[
                ("from".into(), Value::from(format!("{from:?}"))),
                ("to".into(), Value::from(format!("{to:?}"))),
            ],
        );
        Ok(to)
    }

    pub fn arm(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::Arm)
    }

    pub fn entry_fills(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::EntryFills)
    }

    pub fn pause(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::Pause)
    }

    pub fn resume(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::Resume)
    }

    pub fn close(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::Close)
    }

    pub fn exit_complete(&self, id: Uuid) -> Result<StrategyStatus, RegistryError> {
        self.transition(id, LifecycleTransition::ExitComplete)
    }

    /// Pause every strategy currently ARMED or ACTIVE; strategies in any
    /// other state are left untouched. Returns the ids actually paused.
    pub fn pause_all(&self) -> Vec<Uuid> {
        let candidates: Vec<Uuid> = {
            let strategies = self.strategies.lock().expect("registry lock poisoned");
            strategies
                .iter()
                .filter(|(_, r)| r.status.accepts_ticks())
                .map(|(id, _)| *id)
                .collect()
        };

        let mut paused = Vec::new();
        for id in candidates {
            if self.pause(id).is_ok() {
                paused.push(id);
            }
        }
        paused
    }

    /// Apply a forced adjustment to an ACTIVE strategy. `CloseAll` drives
    /// the lifecycle's own Close transition; leg-level actions are recorded
    /// as a decision without moving the lifecycle (the execution layer acts
    /// on them independently).
    pub fn force_adjustment(&self, id: Uuid, action: AdjustmentAction) -> Result<(), RegistryError> {
        let status = self.status(id)?;
        if !status.accepts_force_adjustment() {
            return Err(RegistryError::NotActive(id));
        }

        match &action {
            AdjustmentAction::CloseAll => {
                self.close(id)?;
            }
            other => {
                self.publish_decision(
                    "force_adjustment",
                    id,
                    &[("action".into(), Value::from(format!("{other:?}")))],
                );
            }
        }
        Ok(())
    }

    /// Remove a CLOSED strategy from the registry, along with every
    /// reverse-index entry pointing at it.
    pub fn undeploy(&self, id: Uuid) -> Result<(), RegistryError> {
        let status = self.status(id)?;
        if !status.may_undeploy() {
            return Err(RegistryError::NotClosed(id));
        }

        self.strategies.lock().expect("registry lock poisoned").remove(&id);

        let mut index = self.position_index.write().expect("position index lock poisoned");
        for owners in index.values_mut() {
            owners.remove(&id);
        }
        index.retain(|_, owners| !owners.is_empty());

        self.publish_decision("strategy_undeployed", id, &[]);
        Ok(())
    }

    /// Link a position to a strategy. Idempotent: linking the same pair
    /// twice is a no-op.
    pub fn register_position_link(&self, position_id: Uuid, strategy_id: Uuid) {
        self.position_index
            .write()
            .expect("position index lock poisoned")
            .entry(position_id)
            .or_default()
            .insert(strategy_id);
    }

    /// Unlink a position from a strategy. Tolerant of unknown pairs.
    pub fn unregister_position_link(&self, position_id: Uuid, strategy_id: Uuid) {
        let mut index = self.position_index.write().expect("position index lock poisoned");
        if let Some(owners) = index.get_mut(&position_id) {
            owners.remove(&strategy_id);
            if owners.is_empty() {
                index.remove(&position_id);
            }
        }
    }

    /// Replace the entire reverse index from a fresh source-of-truth
    /// mapping (clear-and-rebuild), e.g. after a reconciliation pass.
    pub fn populate_position_index(&self, links: impl IntoIterator<Item = (Uuid, Uuid)>) {
        let mut index = self.position_index.write().expect("position index lock poisoned");
        index.clear();
        for (position_id, strategy_id) in links {
            index.entry(position_id).or_default().insert(strategy_id);
        }
    }

    pub fn owners_of(&self, position_id: Uuid) -> Vec<Uuid> {
        self.position_index
            .read()
            .expect("position index lock poisoned")
            .get(&position_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Update the stored position snapshot inside every strategy that owns
    /// `position_id`. Unlinked positions are silently ignored.
    pub fn on_position_event(&self, position_id: Uuid, event: PositionEvent) {
        let owners = self.owners_of(position_id);
        if owners.is_empty() {
            return;
        }
        let mut strategies = self.strategies.lock().expect("registry lock poisoned");
        for owner in owners {
            if let Some(record) = strategies.get_mut(&owner) {
                record.positions.insert(position_id, event.clone());
            }
        }
    }

    pub fn position_snapshot(&self, strategy_id: Uuid, position_id: Uuid) -> Option<PositionEvent> {
        let strategies = self.strategies.lock().expect("registry lock poisoned");
        strategies.get(&strategy_id)?.positions.get(&position_id).cloned()
    }

    /// Evaluate every strategy eligible to receive ticks (ARMED or ACTIVE).
    /// Each strategy runs inside `catch_unwind` so one panicking strategy
    /// cannot prevent the rest from being evaluated.
    pub fn dispatch_tick(&self, snapshot: &MarketSnapshot) {
        let mut strategies = self.strategies.lock().expect("registry lock poisoned");
        for (id, record) in strategies.iter_mut() {
            if !record.status.accepts_ticks() {
                continue;
            }
            let strategy = &mut record.strategy;
            let result = catch_unwind(AssertUnwindSafe(|| strategy.evaluate(snapshot)));
            if result.is_err() {
                tracing::error!(strategy_id = %id, "strategy evaluate() panicked during tick dispatch");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingStrategy {
        ticks: Arc<Mutex<u32>>,
    }

    impl RegisteredStrategy for CountingStrategy {
        fn evaluate(&mut self, _snapshot: &MarketSnapshot) {
            *self.ticks.lock().unwrap() += 1;
        }
    }

    struct PanicStrategy;
    impl RegisteredStrategy for PanicStrategy {
        fn evaluate(&mut self, _snapshot: &MarketSnapshot) {
            panic!("boom");
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument_token: 1,
            spot_price_micros: 100_000_000,
            timestamp_epoch_ms: 0,
        }
    }

    #[test]
    fn register_twice_is_rejected() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let err = reg
            .register(id, StrategyKind::Straddle, Box::new(PanicStrategy))
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(id));
    }

    #[test]
    fn many_strategies_progress_independently() {
        let reg = StrategyRegistry::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        reg.register(a, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        reg.register(b, StrategyKind::IronCondor, Box::new(PanicStrategy)).unwrap();

        reg.arm(a).unwrap();
        assert_eq!(reg.status(a).unwrap(), StrategyStatus::Armed);
        assert_eq!(reg.status(b).unwrap(), StrategyStatus::Created);
    }

    #[test]
    fn pause_all_only_touches_armed_and_active() {
        let reg = StrategyRegistry::default();
        let armed = Uuid::new_v4();
        let created = Uuid::new_v4();
        reg.register(armed, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        reg.register(created, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        reg.arm(armed).unwrap();

        let paused = reg.pause_all();
        assert_eq!(paused, vec![armed]);
        assert_eq!(reg.status(armed).unwrap(), StrategyStatus::Paused);
        assert_eq!(reg.status(created).unwrap(), StrategyStatus::Created);
    }

    #[test]
    fn force_adjustment_requires_active() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let err = reg.force_adjustment(id, AdjustmentAction::CloseAll).unwrap_err();
        assert_eq!(err, RegistryError::NotActive(id));
    }

    #[test]
    fn force_adjustment_close_all_drives_lifecycle() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        reg.arm(id).unwrap();
        reg.entry_fills(id).unwrap();

        reg.force_adjustment(id, AdjustmentAction::CloseAll).unwrap();
        assert_eq!(reg.status(id).unwrap(), StrategyStatus::Closing);
    }

    #[test]
    fn undeploy_requires_closed_and_clears_index() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let position = Uuid::new_v4();
        reg.register_position_link(position, id);

        assert_eq!(reg.undeploy(id).unwrap_err(), RegistryError::NotClosed(id));

        reg.arm(id).unwrap();
        reg.entry_fills(id).unwrap();
        reg.close(id).unwrap();
        reg.exit_complete(id).unwrap();
        reg.undeploy(id).unwrap();

        assert!(reg.owners_of(position).is_empty());
        assert_eq!(reg.status(id), Err(RegistryError::UnknownStrategy(id)));
    }

    #[test]
    fn position_link_is_idempotent_and_tolerant() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        let position = Uuid::new_v4();
        reg.register_position_link(position, id);
        reg.register_position_link(position, id);
        assert_eq!(reg.owners_of(position), vec![id]);

        reg.unregister_position_link(position, Uuid::new_v4()); // unknown strategy, no-op
        assert_eq!(reg.owners_of(position), vec![id]);

        reg.unregister_position_link(position, id);
        assert!(reg.owners_of(position).is_empty());
    }

    #[test]
    fn populate_position_index_rebuilds_from_scratch() {
        let reg = StrategyRegistry::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pos1 = Uuid::new_v4();
        reg.register_position_link(pos1, a);

        reg.populate_position_index(vec![(pos1, b)]);
        assert_eq!(reg.owners_of(pos1), vec![b]);
    }

    #[test]
    fn on_position_event_updates_snapshot_for_owning_strategy() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let position = Uuid::new_v4();
        reg.register_position_link(position, id);

        let event = PositionEvent {
            position_id: position,
            kind: otx_events::PositionEventKind::Opened,
            previous_pnl_micros: None,
            instrument_token: 1,
        };
        reg.on_position_event(position, event.clone());

        assert_eq!(reg.position_snapshot(id, position), Some(event));
    }

    #[test]
    fn on_position_event_on_unlinked_position_is_a_no_op() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let position = Uuid::new_v4();

        reg.on_position_event(
            position,
            PositionEvent {
                position_id: position,
                kind: otx_events::PositionEventKind::Opened,
                previous_pnl_micros: None,
                instrument_token: 1,
            },
        );
        assert_eq!(reg.position_snapshot(id, position), None);
    }

    #[test]
    fn dispatch_tick_only_reaches_armed_and_active_strategies() {
        let reg = StrategyRegistry::default();
        let armed = Uuid::new_v4();
        let created = Uuid::new_v4();
        let ticks = Arc::new(Mutex::new(0));

        reg.register(armed, StrategyKind::Straddle, Box::new(CountingStrategy { ticks: ticks.clone() }))
            .unwrap();
        reg.register(created, StrategyKind::Straddle, Box::new(CountingStrategy { ticks: ticks.clone() }))
            .unwrap();
        reg.arm(armed).unwrap();

        reg.dispatch_tick(&snapshot());
        assert_eq!(*ticks.lock().unwrap(), 1);
    }

    #[test]
    fn dispatch_tick_isolates_a_panicking_strategy() {
        let reg = StrategyRegistry::default();
        let panicking = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let ticks = Arc::new(Mutex::new(0));

        reg.register(panicking, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        reg.register(healthy, StrategyKind::Straddle, Box::new(CountingStrategy { ticks: ticks.clone() }))
            .unwrap();
        reg.arm(panicking).unwrap();
        reg.arm(healthy).unwrap();

        reg.dispatch_tick(&snapshot());
        assert_eq!(*ticks.lock().unwrap(), 1, "healthy strategy must still evaluate");
    }

    #[test]
    fn illegal_transition_surfaces_as_registry_error() {
        let reg = StrategyRegistry::default();
        let id = Uuid::new_v4();
        reg.register(id, StrategyKind::Straddle, Box::new(PanicStrategy)).unwrap();
        let err = reg.entry_fills(id).unwrap_err();
        assert!(matches!(err, RegistryError::IllegalTransition(_)));
    }
}
