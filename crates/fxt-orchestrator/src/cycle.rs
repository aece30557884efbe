//! Orchestrator (C9): one `run_cycle` per closed candle, composing
//! candles -> execution (next-open fills) -> strategy -> risk -> execution
//! (new order) -> accounting into a single idempotent, retry-safe step.
//! Mirrors the teacher's bars -> integrity -> strategy -> execution ->
//! broker -> portfolio -> risk composition order, adapted to this system's
//! stores instead of an in-memory loop.

use chrono::{DateTime, Utc};
use fxt_accounting::{AccountingStore, advance_daily_baseline, apply_fill as ledger_apply_fill, mark_to_market, notional};
use fxt_candles::CandleStore;
use fxt_execution::OrderStore;
use fxt_pricing::PricingConfig;
use fxt_risk::{RiskLimitsStore, RiskRequest};
use fxt_schemas::{Candle, ExitReason, Fill, NettingPosition, PlaceOrderRequest, RunReport, RunStatus, Side, StrategyAction};
use fxt_strategy::EmaCrossAtrConfig;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::reports::RunReportStore;

/// This system carries exactly one account; every store keys off this id
/// rather than a lookup, which keeps single-account idempotency trivial.
pub const SINGLETON_ACCOUNT_ID: Uuid = Uuid::nil();

/// Fixed namespace for every uuid5 id this crate derives (run ids, order
/// idempotency keys) — arbitrary but stable; changing it changes every id
/// this engine has ever produced.
const RUN_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8b, 0x4e, 0x1a, 0x3f, 0x2d, 0x77, 0x4a, 0x0c, 0x9a, 0x61, 0xe3, 0x52, 0xf1, 0x0d, 0x6c, 0x84,
]);

/// `run_id = uuid5(namespace, "symbol|tf|candle_ts")` — calling `run_cycle`
/// twice for the same candle yields the same id from a clean store, not
/// merely via the report table's unique-index short-circuit.
fn derive_run_id(symbol: &str, timeframe: &str, candle_ts: DateTime<Utc>) -> Uuid {
    let name = format!("{symbol}|{timeframe}|{}", candle_ts.to_rfc3339());
    Uuid::new_v5(&RUN_NAMESPACE, name.as_bytes())
}

/// Order idempotency key = `uuid5(namespace, "symbol|tf|candle_ts|side")`.
fn derive_order_idempotency_key(symbol: &str, timeframe: &str, candle_ts: DateTime<Utc>, side: Side) -> String {
    let name = format!("{symbol}|{timeframe}|{}|{}", candle_ts.to_rfc3339(), side.as_str());
    Uuid::new_v5(&RUN_NAMESPACE, name.as_bytes()).to_string()
}

/// This engine has no stop-loss/take-profit trigger path distinct from a
/// plain reversal, so a fill against an existing opposite-direction
/// position is always reported as a flip; same-direction fills open or
/// extend and never realize a trade.
fn infer_exit_reason(position_before: &NettingPosition, fill: &Fill) -> ExitReason {
    let delta_sign: i64 = match fill.side {
        Side::Buy => 1,
        Side::Sell => -1,
    };
    if position_before.net_qty == 0 || position_before.net_qty.signum() == delta_sign {
        ExitReason::Manual
    } else {
        ExitReason::Flip
    }
}

fn build_telegram_text(run_id: Uuid, status: RunStatus, symbol: &str, timeframe: &str, candle_ts: DateTime<Utc>, summary: &str) -> String {
    format!("run_id={run_id} status={}\nsymbol={symbol} tf={timeframe} candle_ts={candle_ts}\n{summary}", status.as_str())
}

#[derive(Clone, Debug)]
pub struct CycleConfig {
    pub symbol: String,
    pub timeframe: String,
    pub window_len: i64,
    pub base_order_qty: i64,
    pub pricing: PricingConfig,
    pub strategy: EmaCrossAtrConfig,
}

pub struct CycleOutcome {
    pub report: RunReport,
    pub newly_processed: bool,
}

/// Run one orchestrator cycle for the closed candle at exactly `candle_ts`.
/// Fails fast with no report written if that candle isn't stored yet.
/// Re-running against the same `(symbol, timeframe, candle_ts)` returns the
/// previously written report untouched — the unique index on that triple,
/// plus a deterministic `run_id`, is what makes this safe to retry from a
/// clean process.
pub async fn run_cycle(pool: &PgPool, cfg: &CycleConfig, candle_ts: DateTime<Utc>) -> anyhow::Result<CycleOutcome> {
    let candles = CandleStore::new(pool.clone());
    let reports = RunReportStore::new(pool.clone());
    let accounting = AccountingStore::new(pool.clone());
    let risk_limits_store = RiskLimitsStore::new(pool.clone());
    let orders = OrderStore::new(pool.clone());

    let candle: Candle = candles
        .get_at(&cfg.symbol, &cfg.timeframe, candle_ts)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no candle stored for {}/{} at {candle_ts}", cfg.symbol, cfg.timeframe))?;

    if let Some(existing) = reports.find_for_cycle(&cfg.symbol, &cfg.timeframe, candle.open_time).await? {
        return Ok(CycleOutcome { report: existing, newly_processed: false });
    }

    let run_id = derive_run_id(&cfg.symbol, &cfg.timeframe, candle.open_time);

    let mut account = match accounting.get_account(SINGLETON_ACCOUNT_ID).await? {
        Some(a) => a,
        None => {
            let report = error_report(run_id, &cfg.symbol, &cfg.timeframe, candle.open_time, None, "account_not_seeded");
            reports.insert_once(&report).await?;
            return Ok(CycleOutcome { report, newly_processed: true });
        }
    };

    let mut position = accounting
        .get_position(SINGLETON_ACCOUNT_ID, &cfg.symbol)
        .await?
        .unwrap_or_else(|| NettingPosition::flat(SINGLETON_ACCOUNT_ID, &cfg.symbol, candle.open_time));

    // Resolve any NEW order whose required next candle is exactly this one
    // (C4) before computing a fresh intent — an order placed at an earlier
    // candle fills here, never at its own placement candle.
    let due_fills = fxt_execution::process_new_orders_for_candle(
        &orders,
        &candles,
        &cfg.pricing,
        &cfg.symbol,
        &cfg.timeframe,
        candle.open_time,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    for fill in &due_fills {
        let exit_reason = infer_exit_reason(&position, fill);
        let (new_pos, trade) = ledger_apply_fill(&position, fill, exit_reason);
        accounting.upsert_position(&new_pos).await?;
        if let Some(trade) = &trade {
            accounting.insert_trade(trade).await?;
            account.balance = account.balance + trade.pnl - fill.fee;
            accounting.update_account_balance(account.id, account.balance, candle.open_time).await?;
        }
        info!(order_id = %fill.order_id, symbol = %cfg.symbol, side = fill.side.as_str(), qty = fill.qty, price = %fill.price, "next-open fill applied in cycle");
        position = new_pos;
    }
    let fill_json = if due_fills.is_empty() { None } else { serde_json::to_value(&due_fills).ok() };

    let window = candles
        .range(&cfg.symbol, &cfg.timeframe, None, Some(candle.open_time), cfg.window_len)
        .await?;

    let intent = fxt_strategy::evaluate(&window, &cfg.strategy);
    let intent_json = serde_json::to_value(&intent).ok();

    let mark_side = if position.net_qty >= 0 { Side::Buy } else { Side::Sell };
    let mark_price = cfg.pricing.mark_price(&candle, mark_side);
    let all_positions: Vec<NettingPosition> = if position.is_flat() { Vec::new() } else { vec![position.clone()] };
    let pre_snapshot = mark_to_market(&account, &all_positions, mark_price, candle.open_time);

    let day = candle.open_time.date_naive();
    let existing_baseline = accounting.get_daily_baseline(SINGLETON_ACCOUNT_ID, day).await?;
    let baseline = advance_daily_baseline(existing_baseline, SINGLETON_ACCOUNT_ID, day, pre_snapshot.equity);
    accounting.upsert_daily_baseline(&baseline).await?;

    if matches!(intent.action, StrategyAction::Hold) {
        let report = noop_report(
            run_id,
            &cfg.symbol,
            &cfg.timeframe,
            candle.open_time,
            intent_json,
            fill_json.clone(),
            serde_json::to_value(&all_positions).ok(),
            serde_json::to_value(&pre_snapshot).ok(),
            format!("HOLD: {}", intent.reason),
        );
        reports.insert_once(&report).await?;
        return Ok(CycleOutcome { report, newly_processed: true });
    }

    let (side, qty, is_close) = match intent.action {
        StrategyAction::Buy if position.net_qty < 0 => (Side::Buy, position.net_qty.unsigned_abs() as i64, false),
        StrategyAction::Sell if position.net_qty > 0 => (Side::Sell, position.net_qty.unsigned_abs() as i64, false),
        StrategyAction::Buy => (Side::Buy, cfg.base_order_qty, false),
        StrategyAction::Sell => (Side::Sell, cfg.base_order_qty, false),
        StrategyAction::Close => {
            if position.is_flat() {
                let report = noop_report(
                    run_id,
                    &cfg.symbol,
                    &cfg.timeframe,
                    candle.open_time,
                    intent_json,
                    fill_json.clone(),
                    serde_json::to_value(&all_positions).ok(),
                    serde_json::to_value(&pre_snapshot).ok(),
                    "CLOSE requested on flat position, no-op".to_string(),
                );
                reports.insert_once(&report).await?;
                return Ok(CycleOutcome { report, newly_processed: true });
            }
            let closing_side = if position.net_qty > 0 { Side::Sell } else { Side::Buy };
            (closing_side, position.net_qty.unsigned_abs() as i64, true)
        }
        StrategyAction::Hold => unreachable!(),
    };

    let risk_json;
    let approved_qty;
    if is_close {
        risk_json = None;
        approved_qty = qty;
    } else {
        let limits = match risk_limits_store.get(SINGLETON_ACCOUNT_ID).await? {
            Some(l) => l,
            None => {
                let report = error_report(run_id, &cfg.symbol, &cfg.timeframe, candle.open_time, intent_json, "risk_limits_not_seeded");
                reports.insert_once(&report).await?;
                return Ok(CycleOutcome { report, newly_processed: true });
            }
        };
        let req = RiskRequest {
            symbol: cfg.symbol.clone(),
            side,
            requested_qty: qty,
            reference_price: candle.close,
            stop_loss_price: intent.risk_hints.stop_loss_price,
            open_positions_count: if position.is_flat() { 0 } else { 1 },
            open_positions_count_for_symbol: if position.is_flat() { 0 } else { 1 },
            open_notional_total: notional(&position, mark_price),
            open_notional_for_symbol: notional(&position, mark_price),
        };
        let decision = fxt_risk::evaluate(&limits, &pre_snapshot, &baseline, &req);
        risk_json = serde_json::to_value(&decision).ok();
        if !decision.allowed {
            warn!(symbol = %cfg.symbol, reason = %decision.reason, "risk gate rejected intent");
            let report = ok_report(
                run_id,
                &cfg.symbol,
                &cfg.timeframe,
                candle.open_time,
                intent_json,
                risk_json,
                None,
                fill_json.clone(),
                serde_json::to_value(&all_positions).ok(),
                serde_json::to_value(&pre_snapshot).ok(),
                format!("REJECTED by risk: {}", decision.reason),
            );
            reports.insert_once(&report).await?;
            return Ok(CycleOutcome { report, newly_processed: true });
        }
        approved_qty = decision.approved_qty;
    }

    let place_req = PlaceOrderRequest {
        symbol: cfg.symbol.clone(),
        side,
        qty: approved_qty,
        idempotency_key: Some(derive_order_idempotency_key(&cfg.symbol, &cfg.timeframe, candle.open_time, side)),
        stop_loss: intent.risk_hints.stop_loss_price,
        take_profit: intent.risk_hints.take_profit_price,
    };
    let order = match fxt_execution::place(&orders, &place_req, candle.open_time).await {
        Ok(order) => order,
        Err(e) => {
            warn!(symbol = %cfg.symbol, error = %e, "order placement failed");
            let report = error_report(run_id, &cfg.symbol, &cfg.timeframe, candle.open_time, intent_json, &e.to_string());
            reports.insert_once(&report).await?;
            return Ok(CycleOutcome { report, newly_processed: true });
        }
    };
    let order_json = serde_json::to_value(&order).ok();
    info!(order_id = %order.id, symbol = %cfg.symbol, side = side.as_str(), qty = approved_qty, "cycle placed order, awaiting next-open fill");

    let post_account = accounting.get_account(SINGLETON_ACCOUNT_ID).await?.unwrap_or(account);
    let post_mark_side = all_positions.first().map(|p| if p.net_qty >= 0 { Side::Buy } else { Side::Sell }).unwrap_or(Side::Buy);
    let post_mark_price = cfg.pricing.mark_price(&candle, post_mark_side);
    let post_snapshot = mark_to_market(&post_account, &all_positions, post_mark_price, candle.open_time);
    accounting.insert_snapshot(&post_snapshot).await?;

    let report = ok_report(
        run_id,
        &cfg.symbol,
        &cfg.timeframe,
        candle.open_time,
        intent_json,
        risk_json,
        order_json,
        fill_json,
        serde_json::to_value(&all_positions).ok(),
        serde_json::to_value(&post_snapshot).ok(),
        format!("{} {} {} placed NEW @ {}, awaiting next-open fill", side.as_str(), approved_qty, cfg.symbol, candle.close),
    );
    reports.insert_once(&report).await?;
    Ok(CycleOutcome { report, newly_processed: true })
}

#[allow(clippy::too_many_arguments)]
fn ok_report(
    run_id: Uuid,
    symbol: &str,
    timeframe: &str,
    candle_ts: DateTime<Utc>,
    intent: Option<serde_json::Value>,
    risk: Option<serde_json::Value>,
    order: Option<serde_json::Value>,
    fill: Option<serde_json::Value>,
    positions: Option<serde_json::Value>,
    account: Option<serde_json::Value>,
    summary_text: String,
) -> RunReport {
    let telegram_text = build_telegram_text(run_id, RunStatus::Ok, symbol, timeframe, candle_ts, &summary_text);
    RunReport {
        run_id,
        status: RunStatus::Ok,
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        candle_ts,
        intent,
        risk,
        order,
        fill,
        positions,
        account,
        telegram_text,
        summary_text,
        error_text: None,
    }
}

#[allow(clippy::too_many_arguments)]
fn noop_report(
    run_id: Uuid,
    symbol: &str,
    timeframe: &str,
    candle_ts: DateTime<Utc>,
    intent: Option<serde_json::Value>,
    fill: Option<serde_json::Value>,
    positions: Option<serde_json::Value>,
    account: Option<serde_json::Value>,
    summary_text: String,
) -> RunReport {
    let telegram_text = build_telegram_text(run_id, RunStatus::Noop, symbol, timeframe, candle_ts, &summary_text);
    RunReport {
        run_id,
        status: RunStatus::Noop,
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        candle_ts,
        intent,
        risk: None,
        order: None,
        fill,
        positions,
        account,
        telegram_text,
        summary_text,
        error_text: None,
    }
}

fn error_report(
    run_id: Uuid,
    symbol: &str,
    timeframe: &str,
    candle_ts: DateTime<Utc>,
    intent: Option<serde_json::Value>,
    error: &str,
) -> RunReport {
    let summary_text = format!("ERROR: {error}");
    let telegram_text = build_telegram_text(run_id, RunStatus::Error, symbol, timeframe, candle_ts, &summary_text);
    RunReport {
        run_id,
        status: RunStatus::Error,
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        candle_ts,
        intent,
        risk: None,
        order: None,
        fill: None,
        positions: None,
        account: None,
        telegram_text,
        summary_text,
        error_text: Some(error.to_string()),
    }
}
