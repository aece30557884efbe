//! Axum router and all HTTP handlers for fxt-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use fxt_accounting::{mark_to_market, AccountingStore};
use fxt_candles::{CandleStore, MockCandleProvider};
use fxt_execution::OrderStore;
use fxt_orchestrator::{run_cycle, CycleConfig, RunReportStore, SINGLETON_ACCOUNT_ID};
use fxt_risk::{RiskLimitsStore, RiskRequest};
use fxt_schemas::{EngineError, OrderStatus, PlaceOrderRequest, Side};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::*,
    state::{uptime_secs, AppState, BusMsg, WorkerState},
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/run/start", post(run_start))
        .route("/v1/run/stop", post(run_stop))
        .route("/v1/candles/latest", get(candles_latest))
        .route("/v1/candles", get(candles_range))
        .route("/v1/candles/integrity", get(candles_integrity))
        .route("/v1/candles/admin/ingest", post(candles_admin_ingest))
        .route("/v1/candles/admin/backfill", post(candles_admin_backfill))
        .route("/v1/candles/admin/prune", post(candles_admin_prune))
        .route("/paper/order", post(paper_place_order))
        .route("/paper/orders", get(paper_list_orders))
        .route("/paper/orders/:id", get(paper_get_order))
        .route("/paper/orders/:id/cancel", post(paper_cancel_order))
        .route("/v6/risk/status", get(risk_status))
        .route("/v6/risk/check", post(risk_check))
        .route("/v7/account/status", get(account_status))
        .route("/v7/account/recompute", post(account_recompute))
        .route("/orchestrator/run", post(orchestrator_run))
        .route("/orchestrator/runs", get(orchestrator_runs))
        .route("/orchestrator/runs/:id", get(orchestrator_run_by_id))
        .route("/strategy/strategies", get(strategy_catalog))
        .route("/strategy/run", post(strategy_dry_run))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping: EngineError -> HTTP status, anyhow -> 500
// ---------------------------------------------------------------------------

fn engine_error_response(e: EngineError) -> Response {
    let status = match &e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::DeterministicSafety(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::RiskRejected(_) => StatusCode::FORBIDDEN,
        EngineError::InvalidStateTransition(_) => StatusCode::CONFLICT,
        EngineError::IdempotencyConflict(_) => StatusCode::CONFLICT,
        EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::VendorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse { error: e.to_string(), code: e.code().to_string() }),
    )
        .into_response()
}

fn anyhow_error_response(e: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string(), code: "STORE_UNAVAILABLE".to_string() }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse { ok: true, service: st.build.service, version: st.build.version }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/run/start, /v1/run/stop — toggle the serial worker flag (spec §9)
// ---------------------------------------------------------------------------

pub(crate) async fn run_start(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut s = st.status.write().await;
    s.worker_state = WorkerState::Running;
    s.notes = Some("worker running".to_string());
    s.daemon_uptime_secs = uptime_secs();
    let snap = s.clone();
    drop(s);
    info!(worker_state = snap.worker_state.as_str(), "run/start");
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

pub(crate) async fn run_stop(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut s = st.status.write().await;
    s.worker_state = WorkerState::Stopped;
    s.notes = Some("worker stopped".to_string());
    s.daemon_uptime_secs = uptime_secs();
    let snap = s.clone();
    drop(s);
    info!("run/stop");
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// GET /v1/candles/latest, /v1/candles, /v1/candles/integrity
// ---------------------------------------------------------------------------

pub(crate) async fn candles_latest(State(st): State<Arc<AppState>>) -> Response {
    let store = CandleStore::new(st.pool.clone());
    match store.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
        Ok(candle) => (StatusCode::OK, Json(CandleResponse { candle })).into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn candles_range(
    State(st): State<Arc<AppState>>,
    Query(q): Query<CandleRangeQuery>,
) -> Response {
    let store = CandleStore::new(st.pool.clone());
    match store.range(&st.cfg.symbol, &st.cfg.timeframe, q.start, q.end, q.limit).await {
        Ok(candles) => (StatusCode::OK, Json(candles)).into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn candles_integrity(
    State(st): State<Arc<AppState>>,
    Query(q): Query<IntegrityQuery>,
) -> Response {
    let store = CandleStore::new(st.pool.clone());
    let end = Utc::now();
    let start = end - chrono::Duration::days(q.days.max(1));
    let stored = match store.open_times_in_window(&st.cfg.symbol, &st.cfg.timeframe, start, end).await {
        Ok(v) => v,
        Err(e) => return anyhow_error_response(e),
    };
    match fxt_candles::build_report(&stored, start, end, &st.cfg.timeframe) {
        Ok(report) => (StatusCode::OK, Json(IntegrityResponseBody { report })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e, code: "VALIDATION_ERROR".to_string() }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/candles/admin/ingest, /backfill, /prune
// ---------------------------------------------------------------------------

pub(crate) async fn candles_admin_ingest(State(st): State<Arc<AppState>>) -> Response {
    let store = CandleStore::new(st.pool.clone());
    let provider = MockCandleProvider;
    let now = Utc::now();
    match fxt_candles::ingest(
        &store,
        &provider,
        &st.cfg.symbol,
        &st.cfg.timeframe,
        now,
        st.cfg.ingest_overlap_candles,
        st.cfg.initial_backfill_days,
    )
    .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IngestResponse {
                fetched: outcome.fetched,
                accepted: outcome.accepted,
                rejected: outcome.rejected,
                written: outcome.written,
                report: outcome.integrity,
            }),
        )
            .into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn candles_admin_backfill(
    State(st): State<Arc<AppState>>,
    Json(body): Json<BackfillRequest>,
) -> Response {
    let store = CandleStore::new(st.pool.clone());
    let provider = MockCandleProvider;
    match fxt_candles::backfill(&store, &provider, &st.cfg.symbol, &st.cfg.timeframe, body.start, body.end).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(IngestResponse {
                fetched: outcome.fetched,
                accepted: outcome.accepted,
                rejected: outcome.rejected,
                written: outcome.written,
                report: outcome.integrity,
            }),
        )
            .into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn candles_admin_prune(
    State(st): State<Arc<AppState>>,
    Json(body): Json<PruneRequest>,
) -> Response {
    let store = CandleStore::new(st.pool.clone());
    match fxt_retention::prune(&store, Utc::now(), body.before_days).await {
        Ok((deleted_count, cutoff_time)) => {
            (StatusCode::OK, Json(PruneResponse { deleted_count, cutoff_time })).into_response()
        }
        Err(e) => anyhow_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// /paper/order*
// ---------------------------------------------------------------------------

pub(crate) async fn paper_place_order(
    State(st): State<Arc<AppState>>,
    Json(body): Json<PlaceOrderBody>,
) -> Response {
    let candles = CandleStore::new(st.pool.clone());
    let latest = match candles.latest(&body.symbol, &st.cfg.timeframe).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return engine_error_response(EngineError::DeterministicSafety(
                "no candle stored for symbol; cannot price a fill".to_string(),
            ))
        }
        Err(e) => return anyhow_error_response(e),
    };

    let orders = OrderStore::new(st.pool.clone());
    let req = PlaceOrderRequest {
        symbol: body.symbol,
        side: body.side,
        qty: body.qty,
        idempotency_key: body.idempotency_key,
        stop_loss: None,
        take_profit: None,
    };
    match fxt_execution::place(&orders, &req, latest.open_time).await {
        Ok(order) => {
            let filled = matches!(order.status, OrderStatus::Filled);
            (StatusCode::OK, Json(PlaceOrderResponse { order, filled })).into_response()
        }
        Err(e) => engine_error_response(e),
    }
}

pub(crate) async fn paper_list_orders(
    State(st): State<Arc<AppState>>,
    Query(q): Query<OrderListQuery>,
) -> Response {
    let orders = OrderStore::new(st.pool.clone());
    match orders.list(q.symbol.as_deref(), None::<OrderStatus>, q.limit).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn paper_get_order(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let orders = OrderStore::new(st.pool.clone());
    match orders.get(id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(order)).into_response(),
        Ok(None) => engine_error_response(EngineError::NotFound(format!("order {id}"))),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn paper_cancel_order(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let orders = OrderStore::new(st.pool.clone());
    match fxt_execution::cancel(&orders, id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => engine_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// /v6/risk/*
// ---------------------------------------------------------------------------

pub(crate) async fn risk_status(State(st): State<Arc<AppState>>) -> Response {
    let store = RiskLimitsStore::new(st.pool.clone());
    match store.get(SINGLETON_ACCOUNT_ID).await {
        Ok(limits) => (StatusCode::OK, Json(RiskStatusResponse { limits })).into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn risk_check(
    State(st): State<Arc<AppState>>,
    Json(body): Json<RiskCheckRequest>,
) -> Response {
    let risk_store = RiskLimitsStore::new(st.pool.clone());
    let accounting = AccountingStore::new(st.pool.clone());
    let candles = CandleStore::new(st.pool.clone());

    let limits = match risk_store.get(SINGLETON_ACCOUNT_ID).await {
        Ok(Some(l)) => l,
        Ok(None) => return engine_error_response(EngineError::NotFound("risk_limits not seeded".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let account = match accounting.get_account(SINGLETON_ACCOUNT_ID).await {
        Ok(Some(a)) => a,
        Ok(None) => return engine_error_response(EngineError::NotFound("account not seeded".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let position = match accounting.get_position(SINGLETON_ACCOUNT_ID, &st.cfg.symbol).await {
        Ok(p) => p.unwrap_or_else(|| fxt_schemas::NettingPosition::flat(SINGLETON_ACCOUNT_ID, &st.cfg.symbol, Utc::now())),
        Err(e) => return anyhow_error_response(e),
    };
    let latest = match candles.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
        Ok(Some(c)) => c,
        Ok(None) => return engine_error_response(EngineError::DeterministicSafety("no candle stored".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let day = latest.open_time.date_naive();
    let baseline_store_result = accounting.get_daily_baseline(SINGLETON_ACCOUNT_ID, day).await;
    let existing_baseline = match baseline_store_result {
        Ok(b) => b,
        Err(e) => return anyhow_error_response(e),
    };

    let mark_side = if position.net_qty >= 0 { Side::Buy } else { Side::Sell };
    let mark_price = st.pricing.mark_price(&latest, mark_side);
    let positions = if position.is_flat() { Vec::new() } else { vec![position.clone()] };
    let snapshot = mark_to_market(&account, &positions, mark_price, latest.open_time);
    let baseline = fxt_accounting::advance_daily_baseline(existing_baseline, SINGLETON_ACCOUNT_ID, day, snapshot.equity);

    let req = RiskRequest {
        symbol: st.cfg.symbol.clone(),
        side: body.side,
        requested_qty: body.requested_qty,
        reference_price: latest.close,
        stop_loss_price: body.stop_loss_price,
        open_positions_count: if position.is_flat() { 0 } else { 1 },
        open_positions_count_for_symbol: if position.is_flat() { 0 } else { 1 },
        open_notional_total: fxt_accounting::notional(&position, mark_price),
        open_notional_for_symbol: fxt_accounting::notional(&position, mark_price),
    };
    let decision = fxt_risk::evaluate(&limits, &snapshot, &baseline, &req);
    (StatusCode::OK, Json(RiskCheckResponse { decision })).into_response()
}

// ---------------------------------------------------------------------------
// /v7/account/*
// ---------------------------------------------------------------------------

pub(crate) async fn account_status(State(st): State<Arc<AppState>>) -> Response {
    let accounting = AccountingStore::new(st.pool.clone());
    let candles = CandleStore::new(st.pool.clone());

    let account = match accounting.get_account(SINGLETON_ACCOUNT_ID).await {
        Ok(Some(a)) => a,
        Ok(None) => return engine_error_response(EngineError::NotFound("account not seeded".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let positions = match accounting.list_positions(SINGLETON_ACCOUNT_ID).await {
        Ok(p) => p,
        Err(e) => return anyhow_error_response(e),
    };
    let latest = match candles.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
        Ok(c) => c,
        Err(e) => return anyhow_error_response(e),
    };
    let mark_price = match &latest {
        Some(c) => {
            let side = positions.first().map(|p| if p.net_qty >= 0 { Side::Buy } else { Side::Sell }).unwrap_or(Side::Buy);
            st.pricing.mark_price(c, side)
        }
        None => fxt_schemas::Micros::ZERO,
    };
    let snapshot = mark_to_market(&account, &positions, mark_price, latest.map(|c| c.open_time).unwrap_or_else(Utc::now));
    (StatusCode::OK, Json(AccountStatusResponse { snapshot, positions })).into_response()
}

pub(crate) async fn account_recompute(State(st): State<Arc<AppState>>) -> Response {
    let accounting = AccountingStore::new(st.pool.clone());
    let candles = CandleStore::new(st.pool.clone());

    let account = match accounting.get_account(SINGLETON_ACCOUNT_ID).await {
        Ok(Some(a)) => a,
        Ok(None) => return engine_error_response(EngineError::NotFound("account not seeded".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let positions = match accounting.list_positions(SINGLETON_ACCOUNT_ID).await {
        Ok(p) => p,
        Err(e) => return anyhow_error_response(e),
    };
    let latest = match candles.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
        Ok(Some(c)) => c,
        Ok(None) => return engine_error_response(EngineError::DeterministicSafety("no candle stored".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let side = positions.first().map(|p| if p.net_qty >= 0 { Side::Buy } else { Side::Sell }).unwrap_or(Side::Buy);
    let mark_price = st.pricing.mark_price(&latest, side);
    let snapshot = mark_to_market(&account, &positions, mark_price, latest.open_time);
    if let Err(e) = accounting.insert_snapshot(&snapshot).await {
        return anyhow_error_response(e);
    }
    (StatusCode::OK, Json(AccountStatusResponse { snapshot, positions })).into_response()
}

// ---------------------------------------------------------------------------
// /orchestrator/*
// ---------------------------------------------------------------------------

pub(crate) async fn orchestrator_run(State(st): State<Arc<AppState>>, Query(q): Query<RunQuery>) -> Response {
    let candle_ts = match q.candle_ts {
        Some(ts) => ts,
        None => {
            let candles = CandleStore::new(st.pool.clone());
            match candles.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
                Ok(Some(c)) => c.open_time,
                Ok(None) => {
                    return engine_error_response(EngineError::DeterministicSafety("no candle stored".to_string()))
                }
                Err(e) => return anyhow_error_response(e),
            }
        }
    };

    let cfg = CycleConfig {
        symbol: st.cfg.symbol.clone(),
        timeframe: st.cfg.timeframe.clone(),
        window_len: (st.cfg.strat_ema_slow.max(st.cfg.strat_atr_period) as i64 + 5).max(50),
        base_order_qty: st.cfg.oms_min_qty,
        pricing: st.pricing,
        strategy: st.strategy_cfg,
    };
    match run_cycle(&st.pool, &cfg, candle_ts).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(RunResponse { report: outcome.report, newly_processed: outcome.newly_processed }),
        )
            .into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn orchestrator_runs(State(st): State<Arc<AppState>>, Query(q): Query<RunsQuery>) -> Response {
    let reports = RunReportStore::new(st.pool.clone());
    match reports.list_recent(q.limit).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => anyhow_error_response(e),
    }
}

pub(crate) async fn orchestrator_run_by_id(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let reports = RunReportStore::new(st.pool.clone());
    match reports.get(id).await {
        Ok(Some(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(None) => engine_error_response(EngineError::NotFound(format!("run {id}"))),
        Err(e) => anyhow_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// /strategy/*
// ---------------------------------------------------------------------------

pub(crate) async fn strategy_catalog(State(st): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        Json(StrategyCatalogResponse {
            strategies: vec![StrategyCatalogEntry {
                name: "ema_cross_atr",
                fast_period: st.strategy_cfg.fast_period,
                slow_period: st.strategy_cfg.slow_period,
                atr_period: st.strategy_cfg.atr_period,
            }],
        }),
    )
        .into_response()
}

pub(crate) async fn strategy_dry_run(
    State(st): State<Arc<AppState>>,
    Query(q): Query<StrategyRunQuery>,
) -> Response {
    let candles = CandleStore::new(st.pool.clone());
    let latest = match candles.latest(&st.cfg.symbol, &st.cfg.timeframe).await {
        Ok(Some(c)) => c,
        Ok(None) => return engine_error_response(EngineError::DeterministicSafety("no candle stored".to_string())),
        Err(e) => return anyhow_error_response(e),
    };
    let window = match candles.range(&st.cfg.symbol, &st.cfg.timeframe, None, Some(latest.open_time), q.window).await {
        Ok(w) => w,
        Err(e) => return anyhow_error_response(e),
    };
    let intent = fxt_strategy::evaluate(&window, &st.strategy_cfg);
    (StatusCode::OK, Json(StrategyRunResponse { intent })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(rx: broadcast::Receiver<BusMsg>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
