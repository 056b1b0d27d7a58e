//! Risk threshold snapshots shared by the risk gate and its checkers.

use serde::{Deserialize, Serialize};

/// Immutable-at-a-time snapshot of account/position thresholds.
/// `None` disables the corresponding check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RiskLimits {
    pub daily_loss_limit_micros: Option<i64>,
    pub daily_loss_warning_threshold_pct: Option<u32>, // fraction 0..100, e.g. 80 = 80%
    pub max_margin_utilization_pct: Option<u32>,
    pub max_open_positions: Option<u32>,
    pub max_open_orders: Option<u32>,
    pub max_active_strategies: Option<u32>,
    pub max_loss_per_position_micros: Option<i64>,
    pub max_profit_per_position_micros: Option<i64>,
    pub max_lots_per_position: Option<i64>,
    pub max_position_value_micros: Option<i64>,
    pub max_loss_per_strategy_micros: Option<i64>,
    pub max_legs_per_strategy: Option<u32>,
}

/// Same shape, keyed by underlying symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingRiskLimits {
    pub underlying: String,
    pub max_lots: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskEventLevel {
    Info,
    Warning,
    Critical,
}

/// A single risk-gate rejection reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    PositionSizeExceeded { quantity: i64, max_lots: i64 },
    PositionValueExceeded { value_micros: i64, max_micros: i64 },
    PositionLossBreached { unrealized_pnl_micros: i64, max_loss_micros: i64 },
    PositionProfitReached { unrealized_pnl_micros: i64, max_profit_micros: i64 },
    DailyLossBreached { daily_pnl_micros: i64, limit_micros: i64 },
    MaxOpenPositionsExceeded { count: u32, max: u32 },
    MaxOpenOrdersExceeded { count: u32, max: u32 },
    UnderlyingLotLimitExceeded { underlying: String, requested: i64, max_lots: i64 },
}

impl Violation {
    /// Stable code identifier, used as the rejection's primary message code.
    pub fn code(&self) -> &'static str {
        match self {
            Violation::PositionSizeExceeded { .. } => "POSITION_SIZE_EXCEEDED",
            Violation::PositionValueExceeded { .. } => "POSITION_VALUE_EXCEEDED",
            Violation::PositionLossBreached { .. } => "POSITION_LOSS_BREACHED",
            Violation::PositionProfitReached { .. } => "POSITION_PROFIT_REACHED",
            Violation::DailyLossBreached { .. } => "DAILY_LOSS_BREACHED",
            Violation::MaxOpenPositionsExceeded { .. } => "MAX_OPEN_POSITIONS_EXCEEDED",
            Violation::MaxOpenOrdersExceeded { .. } => "MAX_OPEN_ORDERS_EXCEEDED",
            Violation::UnderlyingLotLimitExceeded { .. } => "UNDERLYING_LOT_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
