//! Shared runtime state for fxt-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use fxt_config::Config;
use fxt_pricing::PricingConfig;
use fxt_strategy::EmaCrossAtrConfig;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{broadcast, RwLock};

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
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
// WorkerState — the single process-wide mutable control flag (spec §9)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Stopped,
    Running,
    Error,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Running => "running",
            WorkerState::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub symbol: String,
    pub timeframe: String,
    pub worker_state: WorkerState,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers. One serial worker
/// flag for the whole process: this system drives exactly one
/// `(symbol, timeframe)` pair, so there is no per-pair map to manage.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
    pub cfg: Arc<Config>,
    pub pricing: PricingConfig,
    pub strategy_cfg: EmaCrossAtrConfig,
}

impl AppState {
    pub fn new(pool: PgPool, cfg: Config) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let pricing = PricingConfig {
            spread_pips: cfg.execution_spread_pips,
            slippage_pips: cfg.execution_slippage_pips,
            pip_size: cfg.pip_size,
        };
        let strategy_cfg = EmaCrossAtrConfig {
            fast_period: cfg.strat_ema_fast,
            slow_period: cfg.strat_ema_slow,
            atr_period: cfg.strat_atr_period,
            stop_loss_atr_mult: cfg.strat_atr_sl_mult,
            take_profit_atr_mult: cfg.strat_atr_tp_mult,
        };

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            symbol: cfg.symbol.clone(),
            timeframe: cfg.timeframe.clone(),
            worker_state: WorkerState::Stopped,
            notes: None,
        };

        Self {
            pool,
            bus,
            build: BuildInfo {
                service: "fxt-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            cfg: Arc::new(cfg),
            pricing,
            strategy_cfg,
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
