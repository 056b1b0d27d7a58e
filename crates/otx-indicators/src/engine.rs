//! The Indicator Engine (C2), composed over the Bar Series Store (C1).
//!
//! One [`BarSeriesManager`] per tracked instrument, plus a registry of
//! [`IndicatorDefinition`]s to evaluate whenever that instrument's bar
//! finalizes. Ticks for untracked instruments are ignored with no work.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use otx_schemas::fixedpoint::Micros;

use crate::bar_series::BarSeriesManager;
use crate::cache::IndicatorCache;
use crate::indicators::{compute, ComputeSkipped, IndicatorDefinition};

/// Published once per completed bar, if at least one indicator produced a
/// value for it.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorUpdateEvent {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub snapshot: HashMap<String, Micros>,
}

/// Static metadata for UI enumeration: display name, output fields, default
/// period.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorMetadata {
    pub display_name: &'static str,
    pub output_fields: &'static [&'static str],
    pub default_period: Option<u32>,
}

struct Tracked {
    series: BarSeriesManager,
    definitions: Vec<IndicatorDefinition>,
}

/// Per-instrument configuration: bar duration, ring capacity, and the
/// indicators to evaluate on every completed bar.
pub struct InstrumentConfig {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub bar_duration_secs: i64,
    pub max_bars: usize,
    pub definitions: Vec<IndicatorDefinition>,
}

/// Owns every tracked instrument's bar series and indicator registry, plus
/// the shared cache and the lazy-calc active-instruments gate.
pub struct IndicatorEngine {
    tracked: RwLock<HashMap<i64, Tracked>>,
    cache: IndicatorCache,
    /// Empty means the gate is disabled (every tracked instrument computes).
    active_instruments: RwLock<HashSet<i64>>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            tracked: RwLock::new(HashMap::new()),
            cache: IndicatorCache::new(),
            active_instruments: RwLock::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    pub fn track(&self, config: InstrumentConfig) {
        let series = BarSeriesManager::new(
            config.instrument_token,
            config.trading_symbol.clone(),
            config.bar_duration_secs,
            config.max_bars,
        );
        let mut tracked = self.tracked.write().expect("engine lock poisoned");
        tracked.insert(
            config.instrument_token,
            Tracked {
                series,
                definitions: config.definitions,
            },
        );
    }

    pub fn is_tracked(&self, instrument_token: i64) -> bool {
        self.tracked
            .read()
            .expect("engine lock poisoned")
            .contains_key(&instrument_token)
    }

    /// Restrict recomputation to this set; pass an empty set to disable the
    /// gate (recompute for every tracked instrument).
    pub fn set_active_instruments(&self, active: HashSet<i64>) {
        *self.active_instruments.write().expect("engine lock poisoned") = active;
    }

    fn gate_allows(&self, instrument_token: i64) -> bool {
        let active = self.active_instruments.read().expect("engine lock poisoned");
        active.is_empty() || active.contains(&instrument_token)
    }

    /// Feed one tick. Returns the `IndicatorUpdateEvent` to publish, if the
    /// tick finalized a bar and at least one indicator produced a value.
    /// Untracked instruments are ignored (returns `None`, no work done).
    pub fn process_tick(
        &self,
        instrument_token: i64,
        price: Micros,
        volume: i64,
        ts_epoch_ms: i64,
    ) -> Option<IndicatorUpdateEvent> {
        let tracked = self.tracked.read().expect("engine lock poisoned");
        let entry = tracked.get(&instrument_token)?;

        let finalized = entry.series.process_tick(price, volume, ts_epoch_ms);
        if !finalized {
            return None;
        }

        if !self.gate_allows(instrument_token) {
            return None;
        }

        let bars = entry.series.bars_snapshot();
        let mut snapshot = HashMap::new();

        for def in &entry.definitions {
            match compute(def, &bars) {
                Ok(outputs) => {
                    for (field, value) in outputs {
                        let rounded = value.round_half_up(4);
                        let key = def.cache_key(field);
                        self.cache.set(instrument_token, key.clone(), rounded);
                        snapshot.insert(key, rounded);
                    }
                }
                Err(ComputeSkipped::InsufficientBars { needed, have }) => {
                    tracing::debug!(
                        instrument_token,
                        indicator = def.kind.display_name(),
                        needed,
                        have,
                        "indicator skipped: insufficient bars"
                    );
                }
            }
        }

        if snapshot.is_empty() {
            return None;
        }

        Some(IndicatorUpdateEvent {
            instrument_token,
            trading_symbol: entry.series.trading_symbol.clone(),
            snapshot,
        })
    }
}

/// Enumerable metadata for every indicator type, for UI consumption.
pub fn all_metadata() -> Vec<(crate::indicators::IndicatorType, IndicatorMetadata)> {
    use crate::indicators::IndicatorType::*;
    [
        Rsi, Ema, Sma, Macd, Bollinger, Supertrend, Vwap, Atr, Stochastic, Ltp,
    ]
    .into_iter()
    .map(|kind| {
        (
            kind,
            IndicatorMetadata {
                display_name: kind.display_name(),
                output_fields: kind.output_fields(),
                default_period: kind.default_period(),
            },
        )
    })
    .collect()
}
