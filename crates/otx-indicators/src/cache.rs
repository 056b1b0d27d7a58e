//! `IndicatorCache`: `(instrumentToken, indicatorKey) -> decimal value`,
//! updated at most once per completed bar for that instrument.

use std::collections::HashMap;
use std::sync::RwLock;

use otx_schemas::fixedpoint::Micros;

#[derive(Default)]
pub struct IndicatorCache {
    values: RwLock<HashMap<(i64, String), Micros>>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, instrument_token: i64, key: impl Into<String>, value: Micros) {
        let mut v = self.values.write().expect("indicator cache lock poisoned");
        v.insert((instrument_token, key.into()), value);
    }

    pub fn get(&self, instrument_token: i64, key: &str) -> Option<Micros> {
        let v = self.values.read().expect("indicator cache lock poisoned");
        v.get(&(instrument_token, key.to_string())).copied()
    }

    /// All cached values for one instrument, keyed by cache key.
    pub fn snapshot_for(&self, instrument_token: i64) -> HashMap<String, Micros> {
        let v = self.values.read().expect("indicator cache lock poisoned");
        v.iter()
            .filter(|((token, _), _)| *token == instrument_token)
            .map(|((_, key), value)| (key.clone(), *value))
            .collect()
    }
}
