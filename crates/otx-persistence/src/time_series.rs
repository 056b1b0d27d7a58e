//! Time-series store (C13, metrics half): PnL curves, margin utilization,
//! indicator history and the like, keyed `algo:ts:<metric>:<instrument>`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use otx_schemas::fixedpoint::Micros;

/// Builds the canonical key for a metric/instrument pair.
pub fn ts_key(metric: &str, instrument_token: i64) -> String {
    format!("algo:ts:{metric}:{instrument_token}")
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Aggregator {
    Avg,
    Sum,
    Min,
    Max,
    Last,
}

impl Aggregator {
    fn apply(self, values: &[i64]) -> i64 {
        match self {
            Aggregator::Avg => {
                let sum: i128 = values.iter().map(|v| *v as i128).sum();
                (sum / values.len() as i128) as i64
            }
            Aggregator::Sum => values.iter().sum(),
            Aggregator::Min => *values.iter().min().expect("non-empty bucket"),
            Aggregator::Max => *values.iter().max().expect("non-empty bucket"),
            Aggregator::Last => *values.last().expect("non-empty bucket"),
        }
    }
}

pub trait TimeSeriesStore: Send + Sync {
    fn append(&self, key: &str, timestamp_epoch_ms: i64, value: Micros);
    fn range(
        &self,
        key: &str,
        from_epoch_ms: i64,
        to_epoch_ms: i64,
        aggregator: Aggregator,
        bucket_ms: i64,
    ) -> Vec<(i64, Micros)>;
}

/// In-memory reference implementation. Each key's series is pruned on
/// append to drop points older than `retention_ms` relative to the point
/// just inserted.
pub struct InMemoryTimeSeriesStore {
    retention_ms: i64,
    series: Mutex<HashMap<String, VecDeque<(i64, i64)>>>,
}

impl InMemoryTimeSeriesStore {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            retention_ms,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self, key: &str) -> usize {
        self.series
            .lock()
            .expect("time series lock poisoned")
            .get(key)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl TimeSeriesStore for InMemoryTimeSeriesStore {
    fn append(&self, key: &str, timestamp_epoch_ms: i64, value: Micros) {
        let mut series = self.series.lock().expect("time series lock poisoned");
        let points = series.entry(key.to_string()).or_default();
        points.push_back((timestamp_epoch_ms, value.raw()));

        let cutoff = timestamp_epoch_ms - self.retention_ms;
        while let Some((ts, _)) = points.front() {
            if *ts < cutoff {
                points.pop_front();
            } else {
                break;
            }
        }
    }

    fn range(
        &self,
        key: &str,
        from_epoch_ms: i64,
        to_epoch_ms: i64,
        aggregator: Aggregator,
        bucket_ms: i64,
    ) -> Vec<(i64, Micros)> {
        assert!(bucket_ms > 0, "bucket_ms must be positive");
        let series = self.series.lock().expect("time series lock poisoned");
        let Some(points) = series.get(key) else {
            return Vec::new();
        };

        let mut buckets: HashMap<i64, Vec<i64>> = HashMap::new();
        for (ts, value) in points.iter() {
            if *ts < from_epoch_ms || *ts > to_epoch_ms {
                continue;
            }
            let bucket_start = ts - ts.rem_euclid(bucket_ms);
            buckets.entry(bucket_start).or_default().push(*value);
        }

        let mut out: Vec<(i64, Micros)> = buckets
            .into_iter()
            .map(|(bucket_start, values)| (bucket_start, Micros::new(aggregator.apply(&values))))
            .collect();
        out.sort_by_key(|(bucket_start, _)| *bucket_start);
        out
    }
}
