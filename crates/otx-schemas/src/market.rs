//! Market data types: ticks and OHLCV bars.
//!
//! `Bar`/`PendingBar` mechanics (finalization, ring eviction) live in
//! `otx-indicators`; this module defines only the immutable wire shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;

/// A snapshot from the broker feed. Immutable after construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument_token: i64,
    pub last_price_micros: i64,
    pub volume: i64,
    pub ts_epoch_ms: i64,
}

impl Tick {
    pub fn new(instrument_token: i64, last_price: Micros, volume: i64, ts_epoch_ms: i64) -> Self {
        Self {
            instrument_token,
            last_price_micros: last_price.raw(),
            volume,
            ts_epoch_ms,
        }
    }

    pub fn price(&self) -> Micros {
        Micros::new(self.last_price_micros)
    }
}

/// One finalized OHLCV interval.
///
/// Invariant: `low <= open,close <= high`; `volume` is the sum of every
/// contributing tick's volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
    pub open_time_epoch_ms: i64,
    pub close_time_epoch_ms: i64,
    pub period_secs: i64,
}

impl Bar {
    pub fn open(&self) -> Micros {
        Micros::new(self.open_micros)
    }
    pub fn high(&self) -> Micros {
        Micros::new(self.high_micros)
    }
    pub fn low(&self) -> Micros {
        Micros::new(self.low_micros)
    }
    pub fn close(&self) -> Micros {
        Micros::new(self.close_micros)
    }

    /// `true` when the OHLC ordering invariant holds for this bar.
    pub fn is_valid(&self) -> bool {
        self.low_micros <= self.open_micros
            && self.open_micros <= self.high_micros
            && self.low_micros <= self.close_micros
            && self.close_micros <= self.high_micros
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSnapshot {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub bars: Vec<Bar>,
    pub pending: Option<Bar>,
}

/// A wall-clock timestamp paired with its market-zone-formatted close time,
/// used only at the edges (display, persistence) — internal arithmetic
/// always uses the epoch-millis instant.
pub fn close_time_in_zone(epoch_ms: i64, tz: &chrono_tz::Tz) -> DateTime<chrono_tz::Tz> {
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms).unwrap_or_else(|| Utc::now());
    utc.with_timezone(tz)
}
