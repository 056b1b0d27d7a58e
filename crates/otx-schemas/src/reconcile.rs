//! Reconciliation mismatch classification shared between the reconcile
//! engine and the events it publishes.

use serde::{Deserialize, Serialize};

use crate::risk::RiskEventLevel;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchType {
    QuantityMismatch,
    MissingLocal,
    MissingBroker,
    PriceDrift,
}

impl MismatchType {
    /// Per-mismatch notification severity, per spec §4.7 step 5.
    pub fn severity(self) -> RiskEventLevel {
        match self {
            MismatchType::MissingBroker => RiskEventLevel::Critical,
            MismatchType::QuantityMismatch | MismatchType::MissingLocal => RiskEventLevel::Warning,
            MismatchType::PriceDrift => RiskEventLevel::Info,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchResolution {
    AutoSync,
    AlertOnly,
}

impl MismatchType {
    /// Every mismatch type resolves the same way regardless of instance
    /// data — see spec §4.7 step 4.
    pub fn default_resolution(self) -> MismatchResolution {
        match self {
            MismatchType::QuantityMismatch
            | MismatchType::MissingLocal
            | MismatchType::MissingBroker => MismatchResolution::AutoSync,
            MismatchType::PriceDrift => MismatchResolution::AlertOnly,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMismatch {
    pub instrument_token: i64,
    pub trading_symbol: String,
    pub mismatch_type: MismatchType,
    pub resolution: MismatchResolution,
    pub broker_quantity: Option<i64>,
    pub local_quantity: Option<i64>,
    pub broker_avg_price_micros: Option<i64>,
    pub local_avg_price_micros: Option<i64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileTrigger {
    Manual,
    Scheduled,
    Startup,
}

/// Outcome of one reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub trigger: ReconcileTrigger,
    pub mismatches: Vec<PositionMismatch>,
    pub checked_at_epoch_ms: i64,
}

impl ReconciliationResult {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}
