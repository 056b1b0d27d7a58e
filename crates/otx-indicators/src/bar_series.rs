//! Per-instrument bar series: the accumulating `PendingBar` plus a bounded
//! ring of finalized bars, guarded by a readers-writer lock.
//!
//! Writers: tick ingestion, historical seed. Readers: indicator recompute,
//! snapshot queries. The read lock is held for the whole indicator
//! recomputation so the series cannot change mid-calculation.

use std::collections::VecDeque;
use std::sync::RwLock;

use otx_schemas::fixedpoint::Micros;
use otx_schemas::market::{Bar, BarSnapshot};

/// The bar currently being accumulated from ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingBar {
    open_micros: i64,
    high_micros: i64,
    low_micros: i64,
    close_micros: i64,
    volume: i64,
    open_time_epoch_ms: i64,
    close_time_epoch_ms: i64,
}

impl PendingBar {
    fn start(price: Micros, volume: i64, ts_epoch_ms: i64) -> Self {
        Self {
            open_micros: price.raw(),
            high_micros: price.raw(),
            low_micros: price.raw(),
            close_micros: price.raw(),
            volume,
            open_time_epoch_ms: ts_epoch_ms,
            close_time_epoch_ms: ts_epoch_ms,
        }
    }

    fn update(&mut self, price: Micros, volume: i64, ts_epoch_ms: i64) {
        self.high_micros = self.high_micros.max(price.raw());
        self.low_micros = self.low_micros.min(price.raw());
        self.close_micros = price.raw();
        self.close_time_epoch_ms = ts_epoch_ms;
        self.volume += volume;
    }

    fn finalize(&self, period_secs: i64) -> Bar {
        Bar {
            open_micros: self.open_micros,
            high_micros: self.high_micros,
            low_micros: self.low_micros,
            close_micros: self.close_micros,
            volume: self.volume,
            open_time_epoch_ms: self.open_time_epoch_ms,
            close_time_epoch_ms: self.close_time_epoch_ms,
            period_secs,
        }
    }
}

struct Inner {
    bars: VecDeque<Bar>,
    pending: Option<PendingBar>,
}

/// Owns one instrument's bar ring plus its `PendingBar`.
pub struct BarSeriesManager {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub bar_duration_secs: i64,
    pub max_bars: usize,
    inner: RwLock<Inner>,
}

impl BarSeriesManager {
    pub fn new(
        instrument_token: i64,
        trading_symbol: impl Into<String>,
        bar_duration_secs: i64,
        max_bars: usize,
    ) -> Self {
        Self {
            instrument_token,
            trading_symbol: trading_symbol.into(),
            bar_duration_secs,
            max_bars,
            inner: RwLock::new(Inner {
                bars: VecDeque::with_capacity(max_bars),
                pending: None,
            }),
        }
    }

    /// Feed one tick. Returns `true` when the tick finalized a bar.
    ///
    /// Taken under the writer lock, as required by the readers-writer
    /// discipline: indicator recompute must never observe a half-updated
    /// pending bar.
    pub fn process_tick(&self, price: Micros, volume: i64, ts_epoch_ms: i64) -> bool {
        let mut inner = self.inner.write().expect("bar series lock poisoned");

        match &mut inner.pending {
            None => {
                inner.pending = Some(PendingBar::start(price, volume, ts_epoch_ms));
                false
            }
            Some(pending) => {
                let elapsed_ms = ts_epoch_ms - pending.open_time_epoch_ms;
                if elapsed_ms >= self.bar_duration_secs * 1000 {
                    let finalized = pending.finalize(self.bar_duration_secs);
                    if inner.bars.len() == self.max_bars {
                        inner.bars.pop_front();
                    }
                    inner.bars.push_back(finalized);
                    inner.pending = Some(PendingBar::start(price, volume, ts_epoch_ms));
                    true
                } else {
                    pending.update(price, volume, ts_epoch_ms);
                    false
                }
            }
        }
    }

    /// Push an already-finalized bar directly into the ring, bypassing the
    /// `PendingBar` path (historical seed).
    pub fn push_historical(&self, bar: Bar) {
        let mut inner = self.inner.write().expect("bar series lock poisoned");
        if inner.bars.len() == self.max_bars {
            inner.bars.pop_front();
        }
        inner.bars.push_back(bar);
    }

    /// Snapshot of finalized bars under the reader lock. Cloning keeps the
    /// lock scope tight — callers compute against an owned slice.
    pub fn bars_snapshot(&self) -> Vec<Bar> {
        let inner = self.inner.read().expect("bar series lock poisoned");
        inner.bars.iter().cloned().collect()
    }

    pub fn pending_snapshot(&self) -> Option<Bar> {
        let inner = self.inner.read().expect("bar series lock poisoned");
        inner
            .pending
            .as_ref()
            .map(|p| p.finalize(self.bar_duration_secs))
    }

    pub fn snapshot(&self) -> BarSnapshot {
        let inner = self.inner.read().expect("bar series lock poisoned");
        BarSnapshot {
            instrument_token: self.instrument_token,
            trading_symbol: self.trading_symbol.clone(),
            bars: inner.bars.iter().cloned().collect(),
            pending: inner
                .pending
                .as_ref()
                .map(|p| p.finalize(self.bar_duration_secs)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("bar series lock poisoned").bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
