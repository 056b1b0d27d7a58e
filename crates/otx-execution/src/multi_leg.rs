//! Multi-leg execution group: write one PENDING journal entry per leg
//! before ANY leg is routed, so a crash mid-group always leaves every leg
//! — dispatched or not — visible on replay.
//!
//! Three operation modes, chosen per strategy kind:
//! - `Sequential` — legs dispatch one at a time in declared order. The
//!   first failure marks every remaining leg FAILED ("skipped due to prior
//!   leg failure") without dispatching it, then rolls back every leg that
//!   had already completed.
//! - `Parallel` — legs dispatch concurrently. Any failure triggers the same
//!   rollback of the legs that did complete.
//! - `BuyFirstThenSell` — all BUY legs dispatch before any SELL leg, and the
//!   group waits on an `OrderFillTracker` for every BUY fill before routing
//!   a single SELL. A BUY timeout or rejection cancels the SELL legs
//!   (marked skipped, left unrouted) and leaves the BUY positions open for
//!   manual handling — no BUY rollback. A SELL failure after all BUYs
//!   filled rolls back only the SELL legs.
//!
//! Every terminal outcome publishes a `DecisionEvent` summarizing the group.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use otx_events::{DecisionEvent, EventBus};
use otx_schemas::{ExecutionJournalEntry, ExecutionOperation, LegStatus, Side};

/// Sink for journal entries. `otx-persistence` provides the durable
/// implementation; tests use an in-memory `Vec`.
pub trait JournalSink: Send {
    fn record(&mut self, entry: ExecutionJournalEntry);
}

impl JournalSink for Vec<ExecutionJournalEntry> {
    fn record(&mut self, entry: ExecutionJournalEntry) {
        self.push(entry);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegPlan {
    pub instrument_token: i64,
    pub side: Side,
    pub quantity: i64,
    /// Correlation tag for this leg's order; a rollback of this leg uses
    /// `"ROLLBACK-" + tag`.
    pub tag: String,
}

fn rollback_of(leg: &LegPlan) -> LegPlan {
    LegPlan {
        instrument_token: leg.instrument_token,
        side: leg.side.opposite(),
        quantity: leg.quantity,
        tag: format!("ROLLBACK-{}", leg.tag),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MultiLegResult {
    /// Instrument tokens that dispatched successfully.
    pub completed: Vec<i64>,
    /// The first leg that failed, if any, and why.
    pub failed_leg: Option<(i64, String)>,
    /// Instrument tokens whose completed leg was rolled back after a later
    /// failure in the group.
    pub rolled_back: Vec<i64>,
}

impl MultiLegResult {
    pub fn is_complete(&self, total_legs: usize) -> bool {
        self.failed_leg.is_none() && self.completed.len() == total_legs
    }
}

// ---------------------------------------------------------------------------
// OrderFillTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillAwaitError {
    Timeout,
    Rejected,
}

impl std::fmt::Display for FillAwaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillAwaitError::Timeout => write!(f, "fill await timed out"),
            FillAwaitError::Rejected => write!(f, "an order in the group was rejected"),
        }
    }
}

impl std::error::Error for FillAwaitError {}

struct FillState {
    expected: u32,
    filled: u32,
    rejected: bool,
}

/// Tracks per-group fill completion so a caller can block until every
/// expected fill has arrived. `register` must be called before any order in
/// the group is routed — registering after routing could race a fill that
/// arrives before anyone is waiting for it.
pub struct OrderFillTracker {
    groups: Mutex<HashMap<Uuid, FillState>>,
    cv: Condvar,
}

impl Default for OrderFillTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderFillTracker {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
        }
    }

    pub fn register(&self, group_id: Uuid, expected: u32) {
        self.groups
            .lock()
            .expect("fill tracker lock poisoned")
            .insert(group_id, FillState { expected, filled: 0, rejected: false });
    }

    /// Record a FILLED order event belonging to `group_id`. Fed by a
    /// subscription to broker order events, not by the dispatch call that
    /// routed the order — routing success only means the order was
    /// accepted, not that it has filled yet.
    pub fn on_fill(&self, group_id: Uuid) {
        {
            let mut groups = self.groups.lock().expect("fill tracker lock poisoned");
            if let Some(state) = groups.get_mut(&group_id) {
                state.filled += 1;
            }
        }
        self.cv.notify_all();
    }

    /// Record a REJECTED order event belonging to `group_id`; terminates
    /// any in-progress `await_fills` call for that group.
    pub fn on_reject(&self, group_id: Uuid) {
        {
            let mut groups = self.groups.lock().expect("fill tracker lock poisoned");
            if let Some(state) = groups.get_mut(&group_id) {
                state.rejected = true;
            }
        }
        self.cv.notify_all();
    }

    /// Block until every expected fill for `group_id` has arrived, a
    /// rejection is observed, or `timeout` elapses.
    pub fn await_fills(&self, group_id: Uuid, timeout: Duration) -> Result<(), FillAwaitError> {
        let groups = self.groups.lock().expect("fill tracker lock poisoned");
        let (mut groups, _timed_out) = self
            .cv
            .wait_timeout_while(groups, timeout, |groups| match groups.get(&group_id) {
                Some(state) => !state.rejected && state.filled < state.expected,
                None => false,
            })
            .expect("fill tracker lock poisoned");

        let outcome = match groups.get(&group_id) {
            Some(state) if state.rejected => Err(FillAwaitError::Rejected),
            Some(state) if state.filled >= state.expected => Ok(()),
            _ => Err(FillAwaitError::Timeout),
        };
        groups.remove(&group_id);
        outcome
    }

    pub fn cancel_await(&self, group_id: Uuid) {
        self.groups.lock().expect("fill tracker lock poisoned").remove(&group_id);
        self.cv.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Journal helpers
// ---------------------------------------------------------------------------

fn write_pending_entries<J: JournalSink>(
    journal: &Mutex<&mut J>,
    strategy_id: Uuid,
    group_id: Uuid,
    operation: ExecutionOperation,
    ordered_legs: &[&LegPlan],
    now_ms: i64,
) -> Vec<ExecutionJournalEntry> {
    let total = ordered_legs.len() as u32;
    let mut entries = Vec::with_capacity(ordered_legs.len());
    let mut sink = journal.lock().expect("journal lock poisoned");
    for (i, leg) in ordered_legs.iter().enumerate() {
        let entry = ExecutionJournalEntry::new_pending(
            strategy_id,
            group_id,
            operation,
            i as u32,
            total,
            leg.instrument_token,
            leg.side,
            leg.quantity,
            now_ms,
        );
        sink.record(entry.clone());
        entries.push(entry);
    }
    entries
}

fn dispatch_leg<F, J>(
    journal: &Mutex<&mut J>,
    mut entry: ExecutionJournalEntry,
    leg: &LegPlan,
    dispatch: &F,
    now_ms: i64,
) -> Result<(), String>
where
    F: Fn(&LegPlan) -> Result<(), String>,
    J: JournalSink,
{
    entry.status = LegStatus::InProgress;
    entry.updated_at_epoch_ms = now_ms;
    journal.lock().expect("journal lock poisoned").record(entry.clone());

    match dispatch(leg) {
        Ok(()) => {
            entry.status = LegStatus::Completed;
            entry.updated_at_epoch_ms = now_ms;
            journal.lock().expect("journal lock poisoned").record(entry);
            Ok(())
        }
        Err(reason) => {
            entry.status = LegStatus::Failed;
            entry.updated_at_epoch_ms = now_ms;
            entry.failure_reason = Some(reason.clone());
            journal.lock().expect("journal lock poisoned").record(entry);
            Err(reason)
        }
    }
}

fn mark_skipped<J: JournalSink>(journal: &Mutex<&mut J>, mut entry: ExecutionJournalEntry, now_ms: i64) {
    entry.status = LegStatus::Failed;
    entry.updated_at_epoch_ms = now_ms;
    entry.failure_reason = Some("skipped due to prior leg failure".to_string());
    journal.lock().expect("journal lock poisoned").record(entry);
}

fn rollback_completed<F: Fn(&LegPlan) -> Result<(), String>>(
    ordered: &[&LegPlan],
    completed: &[i64],
    dispatch: &F,
) -> Vec<i64> {
    let mut rolled_back = Vec::new();
    for leg in ordered.iter().filter(|l| completed.contains(&l.instrument_token)) {
        let rb = rollback_of(leg);
        if dispatch(&rb).is_ok() {
            rolled_back.push(leg.instrument_token);
        }
        // Rollback failures are logged by the caller's dispatch closure but
        // never halt the unwinding of the remaining legs.
    }
    rolled_back
}

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

fn execute_sequential<F, J>(
    strategy_id: Uuid,
    group_id: Uuid,
    legs: &[LegPlan],
    now_ms: i64,
    journal: &mut J,
    dispatch: F,
) -> MultiLegResult
where
    F: Fn(&LegPlan) -> Result<(), String>,
    J: JournalSink,
{
    let ordered: Vec<&LegPlan> = legs.iter().collect();
    let journal_mx = Mutex::new(journal);
    let entries = write_pending_entries(&journal_mx, strategy_id, group_id, ExecutionOperation::Sequential, &ordered, now_ms);

    let mut completed = Vec::new();
    let mut failed_leg = None;

    for (i, leg) in ordered.iter().enumerate() {
        if failed_leg.is_some() {
            mark_skipped(&journal_mx, entries[i].clone(), now_ms);
            continue;
        }
        match dispatch_leg(&journal_mx, entries[i].clone(), leg, &dispatch, now_ms) {
            Ok(()) => completed.push(leg.instrument_token),
            Err(reason) => failed_leg = Some((leg.instrument_token, reason)),
        }
    }

    let rolled_back = if failed_leg.is_some() {
        rollback_completed(&ordered, &completed, &dispatch)
    } else {
        Vec::new()
    };

    MultiLegResult { completed, failed_leg, rolled_back }
}

// ---------------------------------------------------------------------------
// Parallel
// ---------------------------------------------------------------------------

fn execute_parallel<F, J>(
    strategy_id: Uuid,
    group_id: Uuid,
    legs: &[LegPlan],
    now_ms: i64,
    journal: &mut J,
    dispatch: F,
) -> MultiLegResult
where
    F: Fn(&LegPlan) -> Result<(), String> + Sync,
    J: JournalSink,
{
    let ordered: Vec<&LegPlan> = legs.iter().collect();
    let journal_mx = Mutex::new(journal);
    let entries = write_pending_entries(&journal_mx, strategy_id, group_id, ExecutionOperation::Parallel, &ordered, now_ms);

    let results: Mutex<Vec<(i64, Result<(), String>)>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for (i, leg) in ordered.iter().enumerate() {
            let journal_mx = &journal_mx;
            let dispatch = &dispatch;
            let entry = entries[i].clone();
            let results = &results;
            scope.spawn(move || {
                let r = dispatch_leg(journal_mx, entry, leg, dispatch, now_ms);
                results.lock().expect("results lock poisoned").push((leg.instrument_token, r));
            });
        }
    });

    let results = results.into_inner().expect("results lock poisoned");
    let mut completed = Vec::new();
    let mut failed_leg = None;
    for (token, r) in results {
        match r {
            Ok(()) => completed.push(token),
            Err(reason) => {
                if failed_leg.is_none() {
                    failed_leg = Some((token, reason));
                }
            }
        }
    }

    let rolled_back = if failed_leg.is_some() {
        rollback_completed(&ordered, &completed, &dispatch)
    } else {
        Vec::new()
    };

    MultiLegResult { completed, failed_leg, rolled_back }
}

// ---------------------------------------------------------------------------
// BuyFirstThenSell
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn execute_buy_first_then_sell<F, J>(
    strategy_id: Uuid,
    group_id: Uuid,
    legs: &[LegPlan],
    now_ms: i64,
    journal: &mut J,
    dispatch: F,
    fill_tracker: &OrderFillTracker,
    fill_timeout: Duration,
) -> MultiLegResult
where
    F: Fn(&LegPlan) -> Result<(), String> + Sync,
    J: JournalSink,
{
    let buys: Vec<&LegPlan> = legs.iter().filter(|l| l.side == Side::Buy).collect();
    let sells: Vec<&LegPlan> = legs.iter().filter(|l| l.side == Side::Sell).collect();

    let mut ordered: Vec<&LegPlan> = buys.clone();
    ordered.extend(sells.iter().copied());

    let journal_mx = Mutex::new(journal);
    let entries = write_pending_entries(&journal_mx, strategy_id, group_id, ExecutionOperation::BuyFirstThenSell, &ordered, now_ms);
    let buy_entries = &entries[..buys.len()];
    let sell_entries = &entries[buys.len()..];

    // Register the fill-await BEFORE routing a single BUY leg.
    fill_tracker.register(group_id, buys.len() as u32);

    let buy_results: Mutex<Vec<(i64, Result<(), String>)>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for (i, leg) in buys.iter().enumerate() {
            let journal_mx = &journal_mx;
            let dispatch = &dispatch;
            let entry = buy_entries[i].clone();
            let buy_results = &buy_results;
            scope.spawn(move || {
                let r = dispatch_leg(journal_mx, entry, leg, dispatch, now_ms);
                if r.is_err() {
                    // A leg that never routed will never fill either; unblock
                    // any waiter immediately rather than waiting out the timeout.
                    fill_tracker.on_reject(group_id);
                }
                buy_results.lock().expect("results lock poisoned").push((leg.instrument_token, r));
            });
        }
    });

    let buy_results = buy_results.into_inner().expect("results lock poisoned");
    let mut completed = Vec::new();
    let mut failed_leg = None;
    for (token, r) in buy_results {
        match r {
            Ok(()) => completed.push(token),
            Err(reason) => {
                if failed_leg.is_none() {
                    failed_leg = Some((token, reason));
                }
            }
        }
    }

    if failed_leg.is_none() {
        if let Err(err) = fill_tracker.await_fills(group_id, fill_timeout) {
            let reference = buys.first().map(|l| l.instrument_token).unwrap_or(0);
            failed_leg = Some((reference, err.to_string()));
        }
    } else {
        fill_tracker.cancel_await(group_id);
    }

    if failed_leg.is_some() {
        // Do not place SELL legs; BUY positions remain open for manual
        // handling (no BUY rollback).
        for entry in sell_entries {
            mark_skipped(&journal_mx, entry.clone(), now_ms);
        }
        return MultiLegResult { completed, failed_leg, rolled_back: Vec::new() };
    }

    // All BUY legs filled; route SELL legs in parallel.
    let sell_results: Mutex<Vec<(i64, Result<(), String>)>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for (i, leg) in sells.iter().enumerate() {
            let journal_mx = &journal_mx;
            let dispatch = &dispatch;
            let entry = sell_entries[i].clone();
            let sell_results = &sell_results;
            scope.spawn(move || {
                let r = dispatch_leg(journal_mx, entry, leg, dispatch, now_ms);
                sell_results.lock().expect("results lock poisoned").push((leg.instrument_token, r));
            });
        }
    });

    let sell_results = sell_results.into_inner().expect("results lock poisoned");
    let mut sell_failed = None;
    for (token, r) in sell_results {
        match r {
            Ok(()) => completed.push(token),
            Err(reason) => {
                if sell_failed.is_none() {
                    sell_failed = Some((token, reason));
                }
            }
        }
    }

    let rolled_back = if sell_failed.is_some() {
        // Roll back SELL legs only; BUY positions remain open.
        rollback_completed(&sells, &completed, &dispatch)
    } else {
        Vec::new()
    };

    if sell_failed.is_some() {
        failed_leg = sell_failed;
    }

    MultiLegResult { completed, failed_leg, rolled_back }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Execute every leg in `legs` under `operation`. Writes one PENDING journal
/// entry per leg (in dispatch order) before any leg is routed, then runs
/// the mode-specific protocol. Publishes a terminal `DecisionEvent`
/// summarizing group id, operation, success, and leg count.
#[allow(clippy::too_many_arguments)]
pub fn execute_group<F, J>(
    strategy_id: Uuid,
    execution_group_id: Uuid,
    operation: ExecutionOperation,
    legs: &[LegPlan],
    now_ms: i64,
    journal: &mut J,
    dispatch: F,
    fill_tracker: &OrderFillTracker,
    fill_timeout: Duration,
    decisions: Option<&EventBus<DecisionEvent>>,
) -> MultiLegResult
where
    F: Fn(&LegPlan) -> Result<(), String> + Sync,
    J: JournalSink,
{
    let result = match operation {
        ExecutionOperation::Sequential => {
            execute_sequential(strategy_id, execution_group_id, legs, now_ms, journal, dispatch)
        }
        ExecutionOperation::Parallel => {
            execute_parallel(strategy_id, execution_group_id, legs, now_ms, journal, dispatch)
        }
        ExecutionOperation::BuyFirstThenSell => execute_buy_first_then_sell(
            strategy_id,
            execution_group_id,
            legs,
            now_ms,
            journal,
            dispatch,
            fill_tracker,
            fill_timeout,
        ),
    };

    if let Some(bus) = decisions {
        let mut ctx = BTreeMap::new();
        ctx.insert("execution_group_id".to_string(), Value::from(execution_group_id.to_string()));
        ctx.insert("operation".to_string(), Value::from(format!("{operation:?}")));
        ctx.insert("success".to_string(), Value::from(result.failed_leg.is_none()));
        ctx.insert("leg_count".to_string(), Value::from(legs.len()));
        bus.publish(&DecisionEvent::new("multi_leg_execution", Some(strategy_id), &ctx));
    }

    result
}
