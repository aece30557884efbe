//! Shared fixtures for scenario tests: a sample [`Config`], and seed/reset
//! helpers for the singleton account, risk limits, and candle tables.
//! Pulled out of the daemon/orchestrator test files so every scenario test
//! builds its database fixture the same way.

use anyhow::Result;
use fxt_config::{Config, MarketDataProvider};
use fxt_schemas::Micros;
use sqlx::PgPool;
use uuid::Uuid;

/// A complete [`Config`] with reasonable defaults for a single EURUSD/M5
/// test instrument. Override individual fields with struct-update syntax
/// when a scenario needs something different.
pub fn sample_config() -> Config {
    Config {
        symbol: "EURUSD".to_string(),
        timeframe: "M5".to_string(),
        ingest_overlap_candles: 3,
        initial_backfill_days: 1,
        market_data_provider: MarketDataProvider::Mock,
        execution_spread_pips: 1.0,
        execution_slippage_pips: 0.0,
        pip_size: 0.0001,
        contract_size: 100_000.0,
        account_currency: "USD".to_string(),
        account_leverage: 30,
        initial_balance: Micros::parse_decimal("10000").unwrap(),
        candle_retention_days: 365,
        oms_min_qty: 1000,
        oms_allowed_symbols: vec!["EURUSD".to_string()],
        strat_ema_fast: 5,
        strat_ema_slow: 10,
        strat_atr_period: 7,
        strat_atr_sl_mult: 1.5,
        strat_atr_tp_mult: 2.0,
        strat_cooldown_candles: 0,
        risk_max_open_positions: 5,
        risk_max_open_positions_per_symbol: 2,
        risk_max_total_notional: Micros::parse_decimal("1000000").unwrap(),
        risk_max_symbol_notional: Micros::parse_decimal("1000000").unwrap(),
        risk_per_trade_pct: 1.0,
        risk_daily_loss_limit_pct: 5.0,
        risk_daily_loss_limit_amount: Micros::parse_decimal("500").unwrap(),
        risk_lot_step: 1000,
    }
}

/// Wipe every table a scenario test might have touched, in FK-safe order.
pub async fn truncate_all(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "truncate table candles, account, orders, fills, netting_positions, trades, \
         accounting_snapshots, risk_limits, daily_equity_baseline, run_reports restart identity",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed the singleton account row (`account_id = Uuid::nil()`).
pub async fn seed_account(pool: &PgPool, account_id: Uuid, balance: Micros, leverage: i64) -> Result<()> {
    sqlx::query(
        "insert into account (id, balance_micros, currency, leverage, updated_at) \
         values ($1, $2, $3, $4, now())",
    )
    .bind(account_id)
    .bind(balance.raw())
    .bind("USD")
    .bind(leverage)
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed a generous default [`fxt_schemas::RiskLimits`] row for `account_id`,
/// permissive enough that scenario tests don't trip the gate unless they
/// mean to.
pub async fn seed_permissive_risk_limits(pool: &PgPool, account_id: Uuid) -> Result<()> {
    sqlx::query(
        "insert into risk_limits \
         (account_id, max_open_positions, max_open_positions_per_symbol, max_total_notional_micros, \
          max_symbol_notional_micros, risk_per_trade_pct, daily_loss_limit_pct, \
          daily_loss_limit_amount_micros, leverage, lot_step) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(account_id)
    .bind(5_i32)
    .bind(2_i32)
    .bind(1_000_000_000_000_i64)
    .bind(1_000_000_000_000_i64)
    .bind(1.0_f64)
    .bind(5.0_f64)
    .bind(500_000_000_i64)
    .bind(30_i64)
    .bind(1000_i64)
    .execute(pool)
    .await?;
    Ok(())
}
