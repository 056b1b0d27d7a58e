//! Strategy instance metadata and the lifecycle state machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyStatus {
    Created,
    Armed,
    Active,
    Paused,
    Closing,
    Closed,
}

impl StrategyStatus {
    /// Only ARMED or ACTIVE strategies accept ticks.
    pub fn accepts_ticks(self) -> bool {
        matches!(self, StrategyStatus::Armed | StrategyStatus::Active)
    }

    /// Only ACTIVE strategies accept forced adjustments.
    pub fn accepts_force_adjustment(self) -> bool {
        matches!(self, StrategyStatus::Active)
    }

    /// Only CLOSED strategies may be undeployed.
    pub fn may_undeploy(self) -> bool {
        matches!(self, StrategyStatus::Closed)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    IronCondor,
    Straddle,
    Strangle,
    Spread,
    Scalping,
}

/// An action requested via `forceAdjustment`, valid only on an ACTIVE
/// strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentAction {
    CloseAll,
    CloseLeg { instrument_token: i64 },
    RollStrike { instrument_token: i64, new_strike: i64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentStatus {
    Pending,
    Applied,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMeta {
    pub id: Uuid,
    pub name: String,
    pub kind: StrategyKind,
    pub status: StrategyStatus,
}

/// The one legal transition graph for strategy lifecycle.
///
/// ```text
/// CREATED --arm-->  ARMED  --entry-fills--> ACTIVE
/// ARMED/ACTIVE  --pause--> PAUSED  --resume--> ACTIVE
/// ACTIVE  --close-->  CLOSING  --exit-complete-->  CLOSED
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleTransition {
    Arm,
    EntryFills,
    Pause,
    Resume,
    Close,
    ExitComplete,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: StrategyStatus,
    pub transition: LifecycleTransition,
}

impl std::fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal strategy transition: {:?} + {:?}",
            self.from, self.transition
        )
    }
}
impl std::error::Error for IllegalTransition {}

/// Apply one lifecycle transition; returns the new status or an error
/// describing the illegal edge.
pub fn apply_transition(
    from: StrategyStatus,
    transition: LifecycleTransition,
) -> Result<StrategyStatus, IllegalTransition> {
    use LifecycleTransition::*;
    use StrategyStatus::*;

    let to = match (from, transition) {
        (Created, Arm) => Armed,
        (Armed, EntryFills) => Active,
        (Armed, Pause) | (Active, Pause) => Paused,
        (Paused, Resume) => Active,
        (Active, Close) => Closing,
        (Closing, ExitComplete) => Closed,
        _ => {
            return Err(IllegalTransition { from, transition });
        }
    };
    Ok(to)
}
