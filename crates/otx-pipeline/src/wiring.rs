//! Tick-to-indicator-update wiring: owns the indicator engine and its
//! event bus, and optionally mirrors every published snapshot into a
//! time-series store for later charting/backtesting.

use std::sync::Arc;

use otx_events::EventBus;
use otx_indicators::{IndicatorEngine, IndicatorUpdateEvent, InstrumentConfig};
use otx_persistence::{ts_key, TimeSeriesStore};
use otx_schemas::fixedpoint::Micros;

/// Composition root for the event pipeline: market ticks flow through the
/// indicator engine, and every resulting snapshot is published on the
/// indicator bus for whatever downstream consumers (strategy host, UI,
/// risk gate) have subscribed.
pub struct Pipeline {
    pub indicators: IndicatorEngine,
    pub indicator_bus: EventBus<IndicatorUpdateEvent>,
    time_series: Option<Arc<dyn TimeSeriesStore>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Pipeline {
    pub fn new(time_series: Option<Arc<dyn TimeSeriesStore>>) -> Self {
        Self {
            indicators: IndicatorEngine::new(),
            indicator_bus: EventBus::new(),
            time_series,
        }
    }

    /// Register an instrument with the indicator engine.
    pub fn track(&self, config: InstrumentConfig) {
        self.indicators.track(config);
    }

    /// Subscribe to every published indicator snapshot.
    pub fn subscribe_indicator_updates<F>(&self, priority: i32, name: &'static str, handler: F)
    where
        F: Fn(&IndicatorUpdateEvent) + Send + Sync + 'static,
    {
        self.indicator_bus.subscribe(priority, name, handler);
    }

    /// Feed one tick through the indicator engine. If it finalizes a bar
    /// with at least one indicator value, the resulting update is
    /// published on the bus and, if configured, mirrored into the
    /// time-series store keyed `algo:ts:<field>:<instrument>`.
    pub fn ingest_tick(
        &self,
        instrument_token: i64,
        price: Micros,
        volume: i64,
        ts_epoch_ms: i64,
    ) -> Option<IndicatorUpdateEvent> {
        let event = self.indicators.process_tick(instrument_token, price, volume, ts_epoch_ms)?;
        self.indicator_bus.publish(&event);

        if let Some(store) = &self.time_series {
            for (field, value) in &event.snapshot {
                let key = ts_key(field, instrument_token);
                store.append(&key, ts_epoch_ms, *value);
            }
        }

        Some(event)
    }
}
