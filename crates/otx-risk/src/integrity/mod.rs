//! Data integrity + kill switch: anti-lookahead, gap/stale-feed detection,
//! and the fail-closed arm/disarm state that gates all execution.

mod arm_state;
mod engine;
mod types;

pub use arm_state::{ArmState, DisarmReason};
pub use engine::{evaluate_bar, tick_feed};
pub use types::*;
