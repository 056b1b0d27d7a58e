//! otx-schemas
//!
//! Shared, pure data-transfer types used across every crate in the
//! workspace: ticks/bars, orders/fills, positions, strategy lifecycle,
//! the write-ahead journal entry, risk limits, reconciliation mismatches,
//! and morph lineage. No IO, no broker wiring, no business rules beyond the
//! type-level invariants documented on each item.

pub mod fixedpoint;
pub mod journal;
pub mod market;
pub mod morph;
pub mod order;
pub mod position;
pub mod reconcile;
pub mod risk;
pub mod strategy;

pub use fixedpoint::Micros;
pub use journal::{ExecutionJournalEntry, ExecutionOperation, LegStatus};
pub use market::{Bar, BarSnapshot, Tick};
pub use morph::{MorphHistoryEntry, MorphPlanStatus};
pub use order::{vwap, Order, OrderFill, OrderRequest, OrderStatus, OrderType, Side};
pub use position::{underlying_of, LegClass, OptionType, Position};
pub use reconcile::{
    MismatchResolution, MismatchType, PositionMismatch, ReconcileTrigger, ReconciliationResult,
};
pub use risk::{RiskEventLevel, RiskLimits, UnderlyingRiskLimits, Violation};
pub use strategy::{
    apply_transition, AdjustmentAction, AdjustmentStatus, IllegalTransition,
    LifecycleTransition, StrategyKind, StrategyMeta, StrategyStatus,
};
