//! otx-risk
//!
//! Risk engine enforcement:
//! - Daily loss limit, max drawdown, reject storm, PDT auto mode, and the
//!   account-level sticky halt/flatten state machine (`engine`/`types`).
//! - The Risk Gate (C6): per-order position/account/underlying validation
//!   that every outgoing order passes through (`risk_gate`).
//! - The Margin Service (C10): cached broker margin snapshot and
//!   utilization monitor (`margin`).
//!
//! Deterministic, pure logic. No IO, no time, no broker calls.

mod engine;
mod types;

pub mod integrity;
pub mod margin;
pub mod pdt;
pub mod risk_gate;

pub use engine::{evaluate, tick, validate_equity_input, validate_order_qty}; // Patch L10
pub use integrity::{ArmState, DisarmReason};
pub use margin::{MarginCheckResult, MarginService, MarginSnapshot};
pub use pdt::{
    clear_pdt_flag, evaluate_pdt, record_day_trade, tick_pdt, to_pdt_context, PdtDecision,
    PdtInput, PdtPolicy, PdtReason, PdtState, PDT_DAY_TRADE_THRESHOLD, PDT_DEFAULT_WINDOW_DAYS,
    PDT_MIN_EQUITY_MICROS,
};
pub use risk_gate::{AccountRiskChecker, PositionRiskChecker, RiskGate, UnderlyingChecker};
pub use types::*;
