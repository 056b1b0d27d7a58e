//! Position and option-leg classification types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fixedpoint::Micros;
use crate::order::Side;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

/// A leg classification, e.g. `SELL_PE`, used by the morph engine's retained-
/// leg sets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LegClass {
    pub side: Side,
    pub option_type: OptionType,
}

impl std::fmt::Display for LegClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match self.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let opt = match self.option_type {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
        };
        write!(f, "{side}_{opt}")
    }
}

// Manual PartialOrd/Ord derives need Side/OptionType to be orderable too.
impl PartialOrd for Side {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Side {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(s: &Side) -> u8 {
            match s {
                Side::Buy => 0,
                Side::Sell => 1,
            }
        }
        rank(self).cmp(&rank(other))
    }
}
impl PartialOrd for OptionType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OptionType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(o: &OptionType) -> u8 {
            match o {
                OptionType::Call => 0,
                OptionType::Put => 1,
            }
        }
        rank(self).cmp(&rank(other))
    }
}

/// Net holding per instrument per strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub strategy_id: Uuid,
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub exchange: String,
    /// Signed: positive = long, negative = short, 0 = closed.
    pub quantity: i64,
    pub average_price_micros: i64,
    /// `None` until a mark has been applied.
    pub unrealized_pnl_micros: Option<i64>,
}

impl Position {
    pub fn is_closed(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn average_price(&self) -> Micros {
        Micros::new(self.average_price_micros)
    }

    /// The side that closes this position (BUY closes a short, SELL closes
    /// a long). `None` when already flat.
    pub fn closing_side(&self) -> Option<Side> {
        if self.quantity > 0 {
            Some(Side::Sell)
        } else if self.quantity < 0 {
            Some(Side::Buy)
        } else {
            None
        }
    }

    /// The absolute quantity needed to fully close this position.
    pub fn closing_quantity(&self) -> i64 {
        self.quantity.abs()
    }

    /// The longest leading run of non-digit characters in the trading
    /// symbol — the "underlying" (e.g. `NIFTY24FEB22000CE` -> `NIFTY`).
    pub fn underlying(&self) -> &str {
        underlying_of(&self.trading_symbol)
    }
}

/// Extract the underlying symbol: the longest leading run of non-digit
/// characters.
pub fn underlying_of(trading_symbol: &str) -> &str {
    let end = trading_symbol
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(trading_symbol.len());
    &trading_symbol[..end]
}
