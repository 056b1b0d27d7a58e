//! Building a [`MorphExecutionPlan`] from a source strategy's current
//! positions and the requested targets. Pure and side-effect-free.

use std::collections::BTreeSet;

use otx_schemas::order::Side;
use otx_schemas::position::{LegClass, Position};

use crate::types::{option_type_of, LegClose, LegOpen, LegReassignment, MorphExecutionPlan, MorphTarget};

/// A leg's classification is the side it was *opened* on, not its closing
/// side: a short put is `SELL_PE` even though closing it means buying.
fn leg_class_of(position: &Position) -> Option<LegClass> {
    let option_type = option_type_of(&position.trading_symbol)?;
    let side = if position.quantity < 0 { Side::Sell } else { Side::Buy };
    Some(LegClass { side, option_type })
}

/// Build the execution plan: legs whose classification is retained by some
/// target are reassigned to it (first match wins); everything else is
/// closed. New legs are attached to their owning target index.
pub fn build_plan(
    source_strategy_id: uuid::Uuid,
    positions: &[Position],
    targets: &[MorphTarget],
) -> MorphExecutionPlan {
    let mut legs_to_close = Vec::new();
    let mut legs_to_reassign = Vec::new();

    for position in positions {
        if position.is_closed() {
            continue;
        }

        let retained_target = leg_class_of(position).and_then(|class| {
            targets
                .iter()
                .position(|t| t.retained_legs.contains(&class))
                .map(|idx| (class, idx))
        });

        match retained_target {
            Some((leg_class, target_index)) => {
                legs_to_reassign.push(LegReassignment {
                    position_id: position.id,
                    instrument_token: position.instrument_token,
                    leg_class,
                    target_index,
                });
            }
            None => {
                let Some(side) = position.closing_side() else {
                    continue;
                };
                legs_to_close.push(LegClose {
                    position_id: position.id,
                    instrument_token: position.instrument_token,
                    side,
                    quantity: position.closing_quantity(),
                });
            }
        }
    }

    let legs_to_open = targets
        .iter()
        .enumerate()
        .flat_map(|(target_index, target)| {
            target.new_legs.iter().map(move |leg| LegOpen {
                target_index,
                instrument_token: leg.instrument_token,
                trading_symbol: leg.trading_symbol.clone(),
                side: leg.side,
                quantity: leg.quantity,
            })
        })
        .collect();

    MorphExecutionPlan {
        source_strategy_id,
        legs_to_close,
        legs_to_reassign,
        legs_to_open,
        strategies_to_create: targets.to_vec(),
    }
}

/// The union of every target's retained-leg set, used by callers that need
/// to know up front which classifications survive the morph.
pub fn retained_leg_classes(targets: &[MorphTarget]) -> BTreeSet<LegClass> {
    targets.iter().flat_map(|t| t.retained_legs.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_schemas::position::OptionType;
    use otx_schemas::strategy::StrategyKind;
    use uuid::Uuid;

    fn position(symbol: &str, qty: i64) -> Position {
        Position {
            id: Uuid::new_v4(),
            strategy_id: Uuid::nil(),
            instrument_token: 1,
            trading_symbol: symbol.to_string(),
            exchange: "NFO".to_string(),
            quantity: qty,
            average_price_micros: 0,
            unrealized_pnl_micros: None,
        }
    }

    fn bull_put_spread_target() -> MorphTarget {
        MorphTarget {
            target_kind: StrategyKind::Spread,
            retained_legs: vec![
                LegClass { side: Side::Sell, option_type: OptionType::Put },
                LegClass { side: Side::Buy, option_type: OptionType::Put },
            ],
            new_legs: vec![],
        }
    }

    #[test]
    fn iron_condor_to_bull_put_spread_retains_puts_and_closes_calls() {
        let source = Uuid::new_v4();
        let positions = vec![
            position("NIFTY24FEB22000PE", -75), // short put, retained
            position("NIFTY24FEB21800PE", 75),  // long put, retained
            position("NIFTY24FEB22500CE", -75), // short call, closed
            position("NIFTY24FEB22700CE", 75),  // long call, closed
        ];
        let targets = vec![bull_put_spread_target()];

        let plan = build_plan(source, &positions, &targets);

        assert_eq!(plan.legs_to_reassign.len(), 2);
        assert_eq!(plan.legs_to_close.len(), 2);
        assert!(plan.legs_to_open.is_empty());
        assert_eq!(plan.strategies_to_create.len(), 1);
    }

    #[test]
    fn close_side_is_opposite_of_position_side() {
        let source = Uuid::new_v4();
        let positions = vec![position("NIFTY24FEB22500CE", -75)];
        let plan = build_plan(source, &positions, &[]);

        assert_eq!(plan.legs_to_close.len(), 1);
        assert_eq!(plan.legs_to_close[0].side, Side::Buy);
        assert_eq!(plan.legs_to_close[0].quantity, 75);
    }

    #[test]
    fn closed_positions_are_skipped_entirely() {
        let positions = vec![position("NIFTY24FEB22500CE", 0)];
        let plan = build_plan(Uuid::new_v4(), &positions, &[]);
        assert!(plan.legs_to_close.is_empty());
        assert!(plan.legs_to_reassign.is_empty());
    }

    #[test]
    fn plan_building_is_idempotent() {
        let source = Uuid::new_v4();
        let positions = vec![position("NIFTY24FEB22000PE", -75)];
        let targets = vec![bull_put_spread_target()];

        let a = build_plan(source, &positions, &targets);
        let b = build_plan(source, &positions, &targets);
        assert_eq!(a, b);
    }
}
