//! Margin Service (C10): a cached broker margin snapshot with a configurable
//! refresh interval, plus a utilization monitor feeding
//! `RiskLimits::max_margin_utilization_pct`.
//!
//! The snapshot shape mirrors `otx_broker::Margins` so a caller can copy a
//! `get_margins()` result here directly without remapping fields.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use otx_schemas::fixedpoint::Micros;
use otx_schemas::risk::RiskEventLevel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarginSnapshot {
    pub cash: Micros,
    pub available: Micros,
    pub used: Micros,
    pub collateral: Micros,
}

impl MarginSnapshot {
    pub fn zero() -> Self {
        Self {
            cash: Micros::ZERO,
            available: Micros::ZERO,
            used: Micros::ZERO,
            collateral: Micros::ZERO,
        }
    }

    /// Used margin as a percentage of total capital (cash + collateral),
    /// rounded down. `0` when there is no capital to divide by.
    pub fn utilization_pct(&self) -> u32 {
        let total = self.cash.raw().saturating_add(self.collateral.raw());
        if total <= 0 {
            return 0;
        }
        ((self.used.raw().max(0) as i128 * 100) / total as i128) as u32
    }
}

/// Verdict from checking a snapshot's utilization against configured
/// thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarginCheckResult {
    Ok,
    Warning { utilization_pct: u32, threshold_pct: u32 },
    Breached { utilization_pct: u32, limit_pct: u32 },
}

impl MarginCheckResult {
    pub fn level(&self) -> Option<RiskEventLevel> {
        match self {
            MarginCheckResult::Ok => None,
            MarginCheckResult::Warning { .. } => Some(RiskEventLevel::Warning),
            MarginCheckResult::Breached { .. } => Some(RiskEventLevel::Critical),
        }
    }
}

/// Caches the last-fetched margin snapshot and its fetch time, so callers
/// on the hot path read a local value instead of hitting the broker on
/// every check. `refresh_interval_ms` governs how stale a cached value is
/// allowed to get before `needs_refresh` says so.
pub struct MarginService {
    snapshot: RwLock<MarginSnapshot>,
    last_refreshed_ms: AtomicI64,
    refresh_interval_ms: i64,
    warning_threshold_pct: RwLock<Option<u32>>,
    max_utilization_pct: RwLock<Option<u32>>,
}

impl MarginService {
    pub fn new(refresh_interval_ms: i64) -> Self {
        Self {
            snapshot: RwLock::new(MarginSnapshot::zero()),
            last_refreshed_ms: AtomicI64::new(i64::MIN),
            refresh_interval_ms,
            warning_threshold_pct: RwLock::new(None),
            max_utilization_pct: RwLock::new(None),
        }
    }

    pub fn set_thresholds(&self, max_utilization_pct: Option<u32>, warning_threshold_pct: Option<u32>) {
        *self.max_utilization_pct.write().expect("margin thresholds lock poisoned") = max_utilization_pct;
        *self.warning_threshold_pct.write().expect("margin thresholds lock poisoned") = warning_threshold_pct;
    }

    /// Replace the cached snapshot, stamping the refresh time.
    pub fn refresh(&self, snapshot: MarginSnapshot, now_ms: i64) {
        *self.snapshot.write().expect("margin snapshot lock poisoned") = snapshot;
        self.last_refreshed_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MarginSnapshot {
        *self.snapshot.read().expect("margin snapshot lock poisoned")
    }

    /// `true` once the cached snapshot is older than `refresh_interval_ms`,
    /// or no snapshot has ever been fetched.
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        let last = self.last_refreshed_ms.load(Ordering::SeqCst);
        last == i64::MIN || now_ms.saturating_sub(last) > self.refresh_interval_ms
    }

    /// Check the cached snapshot's utilization against the configured
    /// `max_margin_utilization_pct` (breach) and the warning threshold
    /// fraction of it (e.g. 80 means "warn at 80% of the limit").
    pub fn check_utilization(&self) -> MarginCheckResult {
        let utilization_pct = self.snapshot().utilization_pct();
        let max = *self.max_utilization_pct.read().expect("margin thresholds lock poisoned");

        let Some(limit_pct) = max else {
            return MarginCheckResult::Ok;
        };

        if utilization_pct >= limit_pct {
            return MarginCheckResult::Breached { utilization_pct, limit_pct };
        }

        if let Some(warn_fraction_pct) = *self.warning_threshold_pct.read().expect("margin thresholds lock poisoned") {
            let threshold_pct = (limit_pct as u64 * warn_fraction_pct as u64 / 100) as u32;
            if utilization_pct >= threshold_pct {
                return MarginCheckResult::Warning { utilization_pct, threshold_pct };
            }
        }

        MarginCheckResult::Ok
    }
}
