//! Deterministic in-memory `BrokerGateway` implementation.
//!
//! Design decisions (kept intentionally simple/deterministic, mirroring the
//! paper adapter this crate is grounded on):
//! - `broker_order_id` is exactly `correlation_id` from the request.
//! - No randomness, no wall-clock reads; callers supply timestamps.
//! - Orders are accepted immediately (`OrderStatus::Complete`) with no fill
//!   simulation — this satisfies the gateway contract for wiring/testing,
//!   not execution realism.
//! - Margin figures are a fixed per-lot multiple of notional, deterministic
//!   and good enough for risk-gate wiring tests.

use std::collections::BTreeMap;

use otx_schemas::fixedpoint::Micros;
use otx_schemas::market::Bar;
use otx_schemas::order::{Order, OrderRequest, OrderStatus};
use otx_schemas::position::Position;
use uuid::Uuid;

use crate::gateway::{BrokerGateway, BrokerGatewayError, HistoricalDataRequest, Margins};

#[derive(Clone, Debug)]
pub struct PaperBrokerGateway {
    orders: BTreeMap<String, Order>,
    positions: BTreeMap<i64, Position>,
    cash: Micros,
    used_margin: Micros,
}

impl PaperBrokerGateway {
    pub fn new(starting_cash: Micros) -> Self {
        Self {
            orders: BTreeMap::new(),
            positions: BTreeMap::new(),
            cash: starting_cash,
            used_margin: Micros::ZERO,
        }
    }

    /// Seed a position directly, for test setup.
    pub fn set_position(&mut self, position: Position) {
        self.positions.insert(position.instrument_token, position);
    }

    fn margin_for(&self, req: &OrderRequest) -> Micros {
        // Deterministic placeholder: 20% of notional, or a flat per-lot
        // figure for market orders carrying no price.
        match req.notional() {
            Some(notional) => Micros::new(notional.raw() / 5),
            None => Micros::new(req.quantity * 1_000_000),
        }
    }
}

impl BrokerGateway for PaperBrokerGateway {
    fn place_order(&mut self, req: &OrderRequest) -> Result<Order, BrokerGatewayError> {
        let broker_order_id = if req.correlation_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            req.correlation_id.clone()
        };

        if let Some(existing) = self.orders.get(&broker_order_id) {
            return Ok(existing.clone());
        }

        let order = Order {
            broker_order_id: broker_order_id.clone(),
            instrument_token: req.instrument_token,
            status: OrderStatus::Complete,
            filled_quantity: req.quantity,
            average_fill_price_micros: req.price_micros.unwrap_or(0),
            placed_at_epoch_ms: 0,
            updated_at_epoch_ms: 0,
        };

        self.used_margin = self.used_margin.saturating_add(self.margin_for(req));
        self.orders.insert(broker_order_id, order.clone());
        Ok(order)
    }

    fn cancel_order(&mut self, broker_order_id: &str) -> Result<(), BrokerGatewayError> {
        match self.orders.get_mut(broker_order_id) {
            Some(order) => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            None => Err(BrokerGatewayError::UnknownOrder {
                broker_order_id: broker_order_id.to_string(),
            }),
        }
    }

    fn get_margins(&self) -> Margins {
        Margins {
            cash: self.cash,
            available: self.cash.saturating_sub(self.used_margin),
            used: self.used_margin,
            collateral: Micros::ZERO,
        }
    }

    fn get_order_margin(&self, req: &OrderRequest) -> Micros {
        self.margin_for(req)
    }

    fn get_basket_margin(&self, reqs: &[OrderRequest]) -> Micros {
        reqs.iter()
            .map(|r| self.margin_for(r))
            .fold(Micros::ZERO, |acc, m| acc.saturating_add(m))
    }

    fn get_positions(&self) -> BTreeMap<String, Vec<Position>> {
        let mut out = BTreeMap::new();
        out.insert("net".to_string(), self.positions.values().cloned().collect());
        out
    }

    fn get_historical_data(&self, _req: &HistoricalDataRequest) -> Vec<Bar> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_schemas::order::Side;

    fn req(qty: i64, price_micros: Option<i64>) -> OrderRequest {
        OrderRequest {
            instrument_token: 256265,
            trading_symbol: "NIFTY24FEB22000CE".into(),
            exchange: "NFO".into(),
            side: Side::Buy,
            order_type: otx_schemas::order::OrderType::Limit,
            product_code: "NRML".into(),
            quantity: qty,
            price_micros,
            trigger_price_micros: None,
            strategy_id: Uuid::nil(),
            correlation_id: "corr-1".into(),
            is_kill_switch_order: false,
        }
    }

    #[test]
    fn place_order_is_idempotent_on_correlation_id() {
        let mut gw = PaperBrokerGateway::new(Micros::from_decimal_str("100000").unwrap());
        let first = gw.place_order(&req(75, Some(100_000_000))).unwrap();
        let second = gw.place_order(&req(75, Some(100_000_000))).unwrap();
        assert_eq!(first.broker_order_id, second.broker_order_id);
        assert_eq!(gw.orders.len(), 1);
    }

    #[test]
    fn cancel_unknown_order_is_an_error() {
        let mut gw = PaperBrokerGateway::new(Micros::ZERO);
        let err = gw.cancel_order("nope").unwrap_err();
        assert_eq!(
            err,
            BrokerGatewayError::UnknownOrder {
                broker_order_id: "nope".to_string()
            }
        );
    }

    #[test]
    fn cancel_known_order_marks_cancelled() {
        let mut gw = PaperBrokerGateway::new(Micros::from_decimal_str("100000").unwrap());
        let order = gw.place_order(&req(75, Some(100_000_000))).unwrap();
        gw.cancel_order(&order.broker_order_id).unwrap();
        assert_eq!(
            gw.orders[&order.broker_order_id].status,
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn basket_margin_sums_individual_margins() {
        let gw = PaperBrokerGateway::new(Micros::ZERO);
        let a = req(75, Some(100_000_000));
        let b = req(150, Some(50_000_000));
        let basket = gw.get_basket_margin(&[a.clone(), b.clone()]);
        assert_eq!(basket, gw.get_order_margin(&a) + gw.get_order_margin(&b));
    }

    #[test]
    fn margins_reflect_used_amount_after_an_order() {
        let mut gw = PaperBrokerGateway::new(Micros::from_decimal_str("100000").unwrap());
        let before = gw.get_margins();
        gw.place_order(&req(75, Some(100_000_000))).unwrap();
        let after = gw.get_margins();
        assert!(after.used.raw() > before.used.raw());
        assert!(after.available.raw() < before.available.raw());
    }

    #[test]
    fn positions_are_keyed_net() {
        let mut gw = PaperBrokerGateway::new(Micros::ZERO);
        gw.set_position(Position {
            id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            instrument_token: 256265,
            trading_symbol: "NIFTY24FEB22000CE".into(),
            exchange: "NFO".into(),
            quantity: 75,
            average_price_micros: 100_000_000,
            unrealized_pnl_micros: None,
        });
        let positions = gw.get_positions();
        assert_eq!(positions["net"].len(), 1);
    }
}
