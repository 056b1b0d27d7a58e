//! PATCH 26 — Unused-key detection.
//!
//! Config files often accumulate keys no code path actually reads. This
//! module cross-references a loaded config against a per-mode registry of
//! the JSON pointers the engine is known to consume, and reports any leaf
//! that isn't covered — as a warning or a hard failure, depending on policy.
//!
//! The consumed-pointer registry must reflect what code ACTUALLY reads
//! today; a pointer that names an object consumes its whole subtree, while
//! a pointer that names a scalar leaf consumes only that exact key (siblings
//! still need their own entry).

use anyhow::{bail, Result};
use serde_json::Value;

/// Which run mode a config is being validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Backtest,
    Paper,
    Live,
}

fn consumed_pointers(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Backtest => BACKTEST,
        ConfigMode::Paper => PAPER,
        ConfigMode::Live => LIVE,
    }
}

static BACKTEST: &[&str] = &[
    "/engine/engine_id",
    "/data/timeframe",
    "/backtest",
    "/execution/slippage",
];

static PAPER: &[&str] = &[
    "/engine/engine_id",
    "/broker",
    "/risk/max_gross_exposure",
    "/execution",
];

static LIVE: &[&str] = &[
    "/engine/engine_id",
    "/broker",
    "/risk/max_gross_exposure",
    "/execution",
    "/integrity",
    "/reconcile",
];

/// How to treat unused keys once detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    /// Report unused keys but do not error.
    Warn,
    /// Error if any unused key is found.
    Fail,
}

/// Result of scanning a config for unused keys.
#[derive(Debug, Clone, Default)]
pub struct UnusedKeyReport {
    /// JSON pointers of every leaf key not covered by the mode's consumed
    /// registry, sorted for deterministic output.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

fn is_consumed(pointer: &str, consumed: &[&str]) -> bool {
    consumed
        .iter()
        .any(|c| pointer == *c || pointer.starts_with(&format!("{c}/")))
}

/// Collect every leaf (non-object, non-array-of-objects-container) JSON
/// pointer under `v`.
fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            if map.is_empty() {
                out.push(prefix.to_string());
                return;
            }
            for (k, val) in map {
                collect_leaf_pointers(val, &format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) => {
            if arr.is_empty() {
                out.push(prefix.to_string());
                return;
            }
            for (i, val) in arr.iter().enumerate() {
                collect_leaf_pointers(val, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

/// Cross-reference `config_json` against the consumed-pointer registry for
/// `mode` and report every leaf key that registry doesn't cover.
///
/// Under [`UnusedKeyPolicy::Fail`], returns `Err` (message contains
/// `CONFIG_UNUSED_KEYS`) if any unused key is found; under
/// [`UnusedKeyPolicy::Warn`], always returns `Ok` with the report populated.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers(mode);

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|p| !p.is_empty() && !is_consumed(p, consumed))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused key(s) found: {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers,
        );
    }

    Ok(report)
}
