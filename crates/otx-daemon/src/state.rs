//! Shared runtime state for otx-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use otx_risk::integrity::IntegrityState;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::api_types::TradingSnapshot;

// ---------------------------------------------------------------------------
// BusMsg â€” SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub active_run_id: Option<Uuid>,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub notes: Option<String>,
    /// Reflects `IntegrityState::is_execution_blocked()` negation: true = armed.
    pub integrity_armed: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable run/status state.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Integrity engine state (arm / disarm).
    pub integrity: Arc<RwLock<IntegrityState>>,
    /// Last broker snapshot ingested via POST /v1/trading/snapshot, if any.
    pub broker_snapshot: Arc<RwLock<Option<TradingSnapshot>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            active_run_id: None,
            state: "idle".to_string(),
            notes: Some("boot default: disarmed, awaiting explicit operator arm".to_string()),
            integrity_armed: false, // fail-closed boot — mirrors ArmState::boot()
        };

        // Fail-closed boot (Patch C1): never trust a previously-armed state.
        // Explicit `POST /v1/integrity/arm` is required every process start.
        let mut integrity = IntegrityState::new();
        integrity.disarmed = true;

        Self {
            bus,
            build: BuildInfo {
                service: "otx-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            integrity: Arc::new(RwLock::new(integrity)),
            broker_snapshot: Arc::new(RwLock::new(None)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

// ---------------------------------------------------------------------------
// Periodic reconcile tick (Patch R3-1)
// ---------------------------------------------------------------------------

/// Spawn a background task that calls `otx_reconcile::reconcile_tick` on every
/// `interval`, using `local_fn`/`broker_fn` to fetch the latest snapshots.
///
/// On [`otx_reconcile::DriftAction::HaltAndDisarm`], integrity is disarmed and
/// the run status flips to `"halted"` — this is the only path that disarms on
/// reconcile drift rather than an operator-issued `/v1/integrity/disarm`.
/// When `broker_fn` returns `None` the tick is skipped (no broker snapshot yet).
pub fn spawn_reconcile_tick<L, B>(
    state: Arc<AppState>,
    local_fn: L,
    broker_fn: B,
    interval: Duration,
) where
    L: Fn() -> otx_reconcile::LocalSnapshot + Send + 'static,
    B: Fn() -> Option<otx_reconcile::BrokerSnapshot> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let Some(broker) = broker_fn() else {
                continue;
            };
            let local = local_fn();

            let action = otx_reconcile::reconcile_tick(&local, &broker);
            if action.is_safe_to_continue() {
                continue;
            }

            {
                let mut ig = state.integrity.write().await;
                ig.disarmed = true;
            }
            let mut s = state.status.write().await;
            s.state = "halted".to_string();
            s.notes = Some("reconcile drift detected; auto-disarmed".to_string());
            s.integrity_armed = false;
            s.daemon_uptime_secs = uptime_secs();
            let snap = s.clone();
            drop(s);
            let _ = state.bus.send(BusMsg::Status(snap));
        }
    });
}
