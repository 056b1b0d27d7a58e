//! Morph engine (C12): converting one strategy into one or more
//! successors while retaining the legs that survive the conversion,
//! tracking lineage across the morph DAG, and resolving a fixed table of
//! simple morph rules.

pub mod engine;
pub mod lineage;
pub mod plan;
pub mod rules;
pub mod types;

pub use engine::{recover_incomplete, MorphEngine, MorphExecutionContext, MorphLimits};
pub use lineage::{get_cumulative_pnl, get_lineage_tree, LineageTree};
pub use plan::{build_plan, retained_leg_classes};
pub use rules::{resolve_simple_rule, MorphError, SimpleMorphTarget};
pub use types::{
    option_type_of, LegClose, LegOpen, LegReassignment, MorphExecutionPlan, MorphPlanEntry,
    MorphPlanStatus, MorphTarget, NewLegDefinition,
};

