//! Risk Gate (C6): the single validator every outgoing order passes
//! through before it can reach the broker.
//!
//! Composed of three independent checkers — position, account, underlying —
//! each evaluated unconditionally. `RiskGate::validate` never short-circuits:
//! a caller always sees every violation an order would trigger, not just the
//! first one found, so a rejection message can report the full picture.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::RwLock;

use otx_schemas::order::{OrderRequest, Side};
use otx_schemas::position::{underlying_of, Position};
use otx_schemas::risk::{RiskLimits, UnderlyingRiskLimits, Violation};

/// Signed quantity an order would add to (or subtract from) an existing
/// position's quantity.
fn signed_delta(req: &OrderRequest) -> i64 {
    match req.side {
        Side::Buy => req.quantity,
        Side::Sell => -req.quantity,
    }
}

/// Checks a single order against the position it would create or modify:
/// lot size, notional value, and — for an existing position — unrealized
/// loss/profit bounds.
pub struct PositionRiskChecker;

impl PositionRiskChecker {
    pub fn check(
        &self,
        req: &OrderRequest,
        limits: &RiskLimits,
        existing: Option<&Position>,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        let resulting_qty = existing.map(|p| p.quantity).unwrap_or(0) + signed_delta(req);

        if let Some(max_lots) = limits.max_lots_per_position {
            if resulting_qty.abs() > max_lots {
                violations.push(Violation::PositionSizeExceeded {
                    quantity: resulting_qty.abs(),
                    max_lots,
                });
            }
        }

        if let Some(max_value) = limits.max_position_value_micros {
            if let Some(notional) = req.notional() {
                let value = notional.raw().abs();
                if value > max_value {
                    violations.push(Violation::PositionValueExceeded {
                        value_micros: value,
                        max_micros: max_value,
                    });
                }
            }
        }

        if let Some(pos) = existing {
            if let Some(pnl) = pos.unrealized_pnl_micros {
                if pnl < 0 {
                    if let Some(max_loss) = limits.max_loss_per_position_micros {
                        if pnl.abs() > max_loss {
                            violations.push(Violation::PositionLossBreached {
                                unrealized_pnl_micros: pnl,
                                max_loss_micros: max_loss,
                            });
                        }
                    }
                } else if let Some(max_profit) = limits.max_profit_per_position_micros {
                    if pnl > max_profit {
                        violations.push(Violation::PositionProfitReached {
                            unrealized_pnl_micros: pnl,
                            max_profit_micros: max_profit,
                        });
                    }
                }
            }
        }

        violations
    }
}

/// Checks account-wide exposure: open position count, open order count,
/// and the day's realized P&L against the configured daily loss limit.
///
/// Realized P&L resets on day rollover the same way `otx_risk::RiskState`
/// does: the caller supplies a `day_id` each tick, and a mismatch against
/// the stored id zeroes the accumulator before the new day's losses accrue.
pub struct AccountRiskChecker {
    day_id: AtomicU32,
    realized_pnl_micros: AtomicI64,
    open_position_count: AtomicU32,
    open_order_count: AtomicU32,
}

impl Default for AccountRiskChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRiskChecker {
    pub fn new() -> Self {
        Self {
            day_id: AtomicU32::new(0),
            realized_pnl_micros: AtomicI64::new(0),
            open_position_count: AtomicU32::new(0),
            open_order_count: AtomicU32::new(0),
        }
    }

    /// Roll the realized P&L accumulator over to a new trading day if
    /// `day_id` differs from the last one observed.
    pub fn roll_day(&self, day_id: u32) {
        if self.day_id.swap(day_id, Ordering::SeqCst) != day_id {
            self.realized_pnl_micros.store(0, Ordering::SeqCst);
        }
    }

    pub fn record_realized_pnl(&self, delta_micros: i64) {
        self.realized_pnl_micros.fetch_add(delta_micros, Ordering::SeqCst);
    }

    pub fn set_open_position_count(&self, count: u32) {
        self.open_position_count.store(count, Ordering::SeqCst);
    }

    pub fn set_open_order_count(&self, count: u32) {
        self.open_order_count.store(count, Ordering::SeqCst);
    }

    pub fn daily_pnl_micros(&self) -> i64 {
        self.realized_pnl_micros.load(Ordering::SeqCst)
    }

    pub fn check(&self, limits: &RiskLimits) -> Vec<Violation> {
        let mut violations = Vec::new();

        if let Some(limit) = limits.daily_loss_limit_micros {
            let pnl = self.daily_pnl_micros();
            if pnl < 0 && pnl.abs() > limit {
                violations.push(Violation::DailyLossBreached {
                    daily_pnl_micros: pnl,
                    limit_micros: limit,
                });
            }
        }

        let open_positions = self.open_position_count.load(Ordering::SeqCst);
        if let Some(max) = limits.max_open_positions {
            if open_positions > max {
                violations.push(Violation::MaxOpenPositionsExceeded {
                    count: open_positions,
                    max,
                });
            }
        }

        let open_orders = self.open_order_count.load(Ordering::SeqCst);
        if let Some(max) = limits.max_open_orders {
            if open_orders > max {
                violations.push(Violation::MaxOpenOrdersExceeded {
                    count: open_orders,
                    max,
                });
            }
        }

        violations
    }
}

/// Checks aggregate lot exposure per underlying (e.g. all `NIFTY*` legs
/// share one limit regardless of strike/expiry), keyed by the leading
/// non-digit run of the trading symbol.
pub struct UnderlyingChecker;

impl UnderlyingChecker {
    pub fn check(
        &self,
        req: &OrderRequest,
        underlying_limits: &BTreeMap<String, UnderlyingRiskLimits>,
        positions_by_underlying: &BTreeMap<String, i64>,
    ) -> Vec<Violation> {
        let underlying = underlying_of(&req.trading_symbol).to_string();
        let Some(limit) = underlying_limits.get(&underlying) else {
            return Vec::new();
        };

        let existing = positions_by_underlying.get(&underlying).copied().unwrap_or(0);
        let requested = existing.abs() + req.quantity;

        if requested > limit.max_lots {
            vec![Violation::UnderlyingLotLimitExceeded {
                underlying,
                requested,
                max_lots: limit.max_lots,
            }]
        } else {
            Vec::new()
        }
    }
}

/// Aggregates the three checkers behind a single composed gate. Holds the
/// current limits and the account-level running counters; positions are
/// supplied per call since they change on every fill.
pub struct RiskGate {
    limits: RwLock<RiskLimits>,
    underlying_limits: RwLock<BTreeMap<String, UnderlyingRiskLimits>>,
    position: PositionRiskChecker,
    account: AccountRiskChecker,
    underlying: UnderlyingChecker,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits: RwLock::new(limits),
            underlying_limits: RwLock::new(BTreeMap::new()),
            position: PositionRiskChecker,
            account: AccountRiskChecker::new(),
            underlying: UnderlyingChecker,
        }
    }

    pub fn set_limits(&self, limits: RiskLimits) {
        *self.limits.write().expect("risk gate limits lock poisoned") = limits;
    }

    pub fn set_underlying_limit(&self, limit: UnderlyingRiskLimits) {
        self.underlying_limits
            .write()
            .expect("risk gate underlying limits lock poisoned")
            .insert(limit.underlying.clone(), limit);
    }

    pub fn account(&self) -> &AccountRiskChecker {
        &self.account
    }

    /// Evaluate all three checkers against a candidate order. Never
    /// short-circuits: every violation triggered is returned, in
    /// position/account/underlying order.
    pub fn validate(
        &self,
        req: &OrderRequest,
        existing_position: Option<&Position>,
        positions_by_underlying: &BTreeMap<String, i64>,
    ) -> Vec<Violation> {
        let limits = self.limits.read().expect("risk gate limits lock poisoned").clone();
        let underlying_limits = self
            .underlying_limits
            .read()
            .expect("risk gate underlying limits lock poisoned")
            .clone();

        let mut violations = self.position.check(req, &limits, existing_position);
        violations.extend(self.account.check(&limits));
        violations.extend(
            self.underlying
                .check(req, &underlying_limits, positions_by_underlying),
        );
        violations
    }

    pub fn allows(&self, req: &OrderRequest, existing_position: Option<&Position>) -> bool {
        self.validate(req, existing_position, &BTreeMap::new()).is_empty()
    }
}
