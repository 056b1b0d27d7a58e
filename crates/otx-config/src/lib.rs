use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub mod consumption;
pub mod secrets;

pub use consumption::{report_unused_keys, ConfigMode, UnusedKeyPolicy, UnusedKeyReport};

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut sources = Vec::with_capacity(paths.len());
    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        sources.push(s);
    }
    let refs: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Same as [`load_layered_yaml`] but takes already-loaded YAML strings in
/// merge order, rather than file paths. Used by tests and any caller that
/// already has config content in memory.
pub fn load_layered_yaml_from_strings(yamls: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for s in yamls {
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(s).context("parse yaml")?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    if let Some(pointer) = find_secret_leaf(&merged, String::new()) {
        anyhow::bail!(
            "CONFIG_SECRET_DETECTED: literal secret-like value found at '{}'; \
             config must store an env var NAME (e.g. '*_env' fields), never the secret itself",
            pointer,
        );
    }

    // Canonicalize (stable key order) by round-tripping through serde_json::to_string,
    // which orders keys deterministically for maps (BTreeMap) only if we ensure sorting.
    // So we implement a manual canonicalization step that sorts object keys.
    let canonical = canonicalize_json(&merged);

    // Hash canonical bytes
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting compact JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

/// Recursively scan a merged config tree for string values that look like a
/// resolved secret rather than an env var name, returning the JSON pointer
/// of the first offender found.
fn find_secret_leaf(v: &Value, pointer: String) -> Option<String> {
    match v {
        Value::Object(map) => {
            for (k, val) in map {
                if let Some(p) = find_secret_leaf(val, format!("{pointer}/{k}")) {
                    return Some(p);
                }
            }
            None
        }
        Value::Array(arr) => {
            for (i, val) in arr.iter().enumerate() {
                if let Some(p) = find_secret_leaf(val, format!("{pointer}/{i}")) {
                    return Some(p);
                }
            }
            None
        }
        Value::String(s) => {
            if looks_like_secret(s) {
                Some(pointer)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Heuristic check for literal secret values accidentally committed to config.
/// Env var NAMES (e.g. `ALPACA_API_KEY_MAIN`) never match these patterns.
fn looks_like_secret(s: &str) -> bool {
    s.starts_with("sk-")
        || s.starts_with("AKIA")
        || s.contains("-----BEGIN")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
