//! Request and response types for all fxt-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded by
//! Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use fxt_candles::IntegrityReport;
use fxt_schemas::{AccountingSnapshot, Candle, NettingPosition, Order, RiskDecision, RiskLimits, RunReport, Side, StrategyIntent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ---------------------------------------------------------------------------
// /v1/candles/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CandleRangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_range_limit")]
    pub limit: i64,
}

fn default_range_limit() -> i64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntegrityQuery {
    #[serde(default = "default_integrity_days")]
    pub days: i64,
}

fn default_integrity_days() -> i64 {
    7
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityResponseBody {
    pub report: IntegrityReport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackfillRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub written: u64,
    pub report: IntegrityReport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PruneRequest {
    #[serde(default = "default_prune_days")]
    pub before_days: u32,
}

fn default_prune_days() -> u32 {
    365
}

#[derive(Debug, Clone, Serialize)]
pub struct PruneResponse {
    pub deleted_count: u64,
    pub cutoff_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// /paper/order*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderBody {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub filled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListQuery {
    pub symbol: Option<String>,
    #[serde(default = "default_order_list_limit")]
    pub limit: i64,
}

fn default_order_list_limit() -> i64 {
    100
}

// ---------------------------------------------------------------------------
// /v6/risk/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RiskStatusResponse {
    pub limits: Option<RiskLimits>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskCheckRequest {
    pub side: Side,
    pub requested_qty: i64,
    pub stop_loss_price: Option<fxt_schemas::Micros>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskCheckResponse {
    pub decision: RiskDecision,
}

// ---------------------------------------------------------------------------
// /v7/account/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AccountStatusResponse {
    pub snapshot: AccountingSnapshot,
    pub positions: Vec<NettingPosition>,
}

// ---------------------------------------------------------------------------
// /orchestrator/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub report: RunReport,
    pub newly_processed: bool,
}

/// `candle_ts` targets a specific closed candle; omitted, the handler runs
/// against the latest one stored.
#[derive(Debug, Clone, Deserialize)]
pub struct RunQuery {
    pub candle_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunsQuery {
    #[serde(default = "default_runs_limit")]
    pub limit: i64,
}

fn default_runs_limit() -> i64 {
    50
}

// ---------------------------------------------------------------------------
// /strategy/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StrategyCatalogEntry {
    pub name: &'static str,
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyCatalogResponse {
    pub strategies: Vec<StrategyCatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRunQuery {
    #[serde(default = "default_strategy_window")]
    pub window: i64,
}

fn default_strategy_window() -> i64 {
    200
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRunResponse {
    pub intent: StrategyIntent,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunControlResponse {
    pub worker_state: String,
    pub active_run_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandleResponse {
    pub candle: Option<Candle>,
}
