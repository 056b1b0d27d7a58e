//! Simple morph rules: a fixed table mapping (source kind, target) pairs
//! to a target sketch, and the error type shared by plan resolution and
//! execution.

use otx_schemas::order::Side;
use otx_schemas::position::{LegClass, OptionType};
use otx_schemas::strategy::StrategyKind;

use crate::types::MorphTarget;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimpleMorphTarget {
    BullPutSpread,
    IronButterfly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MorphError {
    SourceNotActiveOrPaused,
    TooManyCloses { requested: usize, limit: usize },
    MorphingDisabled,
    UnsupportedRule { from: StrategyKind, to: SimpleMorphTarget },
    /// The rule needs strike selection (e.g. new ATM legs) that this
    /// resolver cannot perform; it cannot be auto-converted into a full
    /// plan without an external strike-selection step.
    RequiresStrikeSelection,
    PlanPersistenceFailed { reason: String },
}

impl std::fmt::Display for MorphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MorphError::SourceNotActiveOrPaused => write!(f, "source strategy is not ACTIVE or PAUSED"),
            MorphError::TooManyCloses { requested, limit } => {
                write!(f, "morph would close {requested} legs, limit is {limit}")
            }
            MorphError::MorphingDisabled => write!(f, "morphing is globally disabled"),
            MorphError::UnsupportedRule { from, to } => {
                write!(f, "no simple morph rule from {from:?} to {to:?}")
            }
            MorphError::RequiresStrikeSelection => {
                write!(f, "target requires strike selection and cannot be auto-converted")
            }
            MorphError::PlanPersistenceFailed { reason } => {
                write!(f, "failed to persist morph plan: {reason}")
            }
        }
    }
}

impl std::error::Error for MorphError {}

/// Resolve a fixed (source, target) pair to a target sketch. Only the
/// `IRON_CONDOR -> BULL_PUT_SPREAD` pair is fully auto-convertible today;
/// `IRON_CONDOR -> IRON_BUTTERFLY` needs strike selection, and every other
/// pair is simply unsupported.
pub fn resolve_simple_rule(
    from: StrategyKind,
    to: SimpleMorphTarget,
) -> Result<MorphTarget, MorphError> {
    match (from, to) {
        (StrategyKind::IronCondor, SimpleMorphTarget::BullPutSpread) => Ok(MorphTarget {
            target_kind: StrategyKind::Spread,
            retained_legs: vec![
                LegClass { side: Side::Sell, option_type: OptionType::Put },
                LegClass { side: Side::Buy, option_type: OptionType::Put },
            ],
            new_legs: vec![],
        }),
        (StrategyKind::IronCondor, SimpleMorphTarget::IronButterfly) => {
            Err(MorphError::RequiresStrikeSelection)
        }
        _ => Err(MorphError::UnsupportedRule { from, to }),
    }
}
