//! Plugin Registry — catalogue of available strategies + metadata.
//!
//! # Purpose
//! [`StrategyHost`](crate::StrategyHost) manages a single *active* strategy.
//! `PluginRegistry` is the step before that: a catalogue of *available*
//! strategies, each represented by:
//!
//! - [`StrategyMeta`] — static metadata (name, version, timeframe, description).
//! - A [`StrategyFactory`] — a `Send + Sync` closure that produces a fresh
//!   `Box<dyn Strategy>` on demand.
//!
//! This separation means the runtime can enumerate registered strategies,
//! select one by name, instantiate it, and hand it to `StrategyHost::register`
//! without coupling discovery to execution.  It also lays the foundation for a
//! future dynamic plugin model (e.g. loading `.so`/`.dll` plugins at runtime).
//!
//! # Usage
//! ```ignore
//! let mut reg = PluginRegistry::new();
//! reg.register(
//!     StrategyMeta::new("my_strategy", "1.0.0", 60, "Simple momentum"),
//!     || Box::new(MyStrategy::default()),
//! ).unwrap();
//!
//! let strategy = reg.instantiate("my_strategy").unwrap();
//! host.register(strategy).unwrap();
//! ```
//!
//! # Determinism
//! The registry itself is deterministic — insertion order is preserved in
//! `list()` output.  Factory closures must be deterministic if reproducible
//! backtest replay is required (seed injection is the caller's responsibility).

use crate::{Strategy, StrategySpec};

// ---------------------------------------------------------------------------
// Factory type alias
// ---------------------------------------------------------------------------

/// A thread-safe factory closure that produces a fresh strategy instance.
///
/// `Send + Sync` is required so the registry can be shared across threads
/// (e.g. held in an `Arc` by the daemon).  The closure must not capture
/// non-`Send` state.
pub type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Static metadata for a registered strategy.
///
/// Metadata is stored separately from the strategy instance so it can be
/// queried without instantiating the strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMeta {
    /// Unique name used as the registry key.  Must be non-empty and contain
    /// only ASCII alphanumeric characters, hyphens, or underscores.
    pub name: String,

    /// Semver-style version string (e.g. `"1.0.0"`).  Not validated beyond
    /// non-empty; caller is responsible for format.
    pub version: String,

    /// The timeframe this strategy operates on, in seconds.
    /// Must match the `StrategySpec` returned by the instantiated strategy.
    pub timeframe_secs: i64,

    /// Human-readable description of the strategy.
    pub description: String,
}

impl StrategyMeta {
    /// Construct metadata, validating the name and timeframe.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        timeframe_secs: i64,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        debug_assert!(
            !name.trim().is_empty(),
            "StrategyMeta name must not be empty"
        );
        debug_assert!(
            timeframe_secs > 0,
            "StrategyMeta timeframe_secs must be > 0"
        );
        Self {
            name,
            version: version.into(),
            timeframe_secs,
            description: description.into(),
        }
    }

    /// Derive metadata directly from an instantiated strategy's spec.
    ///
    /// Useful when the strategy struct already carries its own identity.
    pub fn from_spec(
        spec: &StrategySpec,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            version: version.into(),
            timeframe_secs: spec.timeframe_secs,
            description: description.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by [`PluginRegistry`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A strategy with the given name is already registered.
    DuplicateName { name: String },
    /// No strategy with the given name is registered.
    UnknownStrategy { name: String },
    /// The strategy name is empty or contains only whitespace.
    EmptyName,
    /// The timeframe in the metadata does not match the instantiated strategy's spec.
    TimeframeMismatch {
        name: String,
        meta_secs: i64,
        spec_secs: i64,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name } => {
                write!(f, "strategy '{name}' is already registered")
            }
            Self::UnknownStrategy { name } => {
                write!(f, "no strategy named '{name}' is registered")
            }
            Self::EmptyName => write!(f, "strategy name must not be empty"),
            Self::TimeframeMismatch {
                name,
                meta_secs,
                spec_secs,
            } => write!(
                f,
                "strategy '{name}': metadata timeframe {meta_secs}s != spec timeframe {spec_secs}s"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// Registry entry (internal)
// ---------------------------------------------------------------------------

struct RegistryEntry {
    meta: StrategyMeta,
    factory: StrategyFactory,
}

// ---------------------------------------------------------------------------
// PluginRegistry
// ---------------------------------------------------------------------------

/// Catalogue of available strategies and their factories.
///
/// Maintains insertion order for deterministic `list()` output.
/// Names are compared case-sensitively.
pub struct PluginRegistry {
    /// Entries in insertion order.
    entries: Vec<RegistryEntry>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a strategy by metadata and factory closure.
    ///
    /// # Errors
    /// - [`RegistryError::EmptyName`] if `meta.name` is empty/whitespace.
    /// - [`RegistryError::DuplicateName`] if a strategy with the same name is
    ///   already registered.
    pub fn register<F>(&mut self, meta: StrategyMeta, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        if meta.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.contains(&meta.name) {
            return Err(RegistryError::DuplicateName {
                name: meta.name.clone(),
            });
        }
        self.entries.push(RegistryEntry {
            meta,
            factory: Box::new(factory),
        });
        Ok(())
    }

    /// Return `true` if a strategy with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.meta.name == name)
    }

    /// Return the number of registered strategies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` if no strategies are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return metadata for all registered strategies in insertion order.
    pub fn list(&self) -> Vec<&StrategyMeta> {
        self.entries.iter().map(|e| &e.meta).collect()
    }

    /// Look up metadata for a strategy by name.
    ///
    /// # Errors
    /// [`RegistryError::UnknownStrategy`] if the name is not found.
    pub fn lookup(&self, name: &str) -> Result<&StrategyMeta, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.meta.name == name)
            .map(|e| &e.meta)
            .ok_or_else(|| RegistryError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    /// Instantiate a strategy by name using its registered factory.
    ///
    /// Each call produces a **fresh** strategy instance — the factory is
    /// called anew every time.  This is intentional: strategies may carry
    /// mutable state (bar history, signals) that must not leak across runs.
    ///
    /// # Errors
    /// [`RegistryError::UnknownStrategy`] if the name is not found.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.meta.name == name)
            .ok_or_else(|| RegistryError::UnknownStrategy {
                name: name.to_string(),
            })?;
        Ok((entry.factory)())
    }

    /// Instantiate a strategy and verify that its `spec().timeframe_secs`
    /// matches the registered metadata.
    ///
    /// Use this when strict consistency between metadata and implementation is
    /// required (e.g. at promotion / live-arm time).
    ///
    /// # Errors
    /// - [`RegistryError::UnknownStrategy`] if the name is not found.
    /// - [`RegistryError::TimeframeMismatch`] if the spec doesn't match.
    pub fn instantiate_verified(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.meta.name == name)
            .ok_or_else(|| RegistryError::UnknownStrategy {
                name: name.to_string(),
            })?;

        let strategy = (entry.factory)();
        let spec = strategy.spec();

        if spec.timeframe_secs != entry.meta.timeframe_secs {
            return Err(RegistryError::TimeframeMismatch {
                name: name.to_string(),
                meta_secs: entry.meta.timeframe_secs,
                spec_secs: spec.timeframe_secs,
            });
        }

        Ok(strategy)
    }

    /// Remove a registered strategy by name.
    ///
    /// Returns `true` if the strategy was found and removed, `false` if it
    /// was not registered.  Preserves insertion order of remaining entries.
    pub fn deregister(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.meta.name != name);
        self.entries.len() < before
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
