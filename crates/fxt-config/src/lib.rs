//! Environment-driven configuration.
//!
//! Every tunable named in the control-surface configuration table is a flat
//! environment variable; there is no layered file format to merge. Local
//! development bootstraps `.env.local` via `dotenvy` before reading the
//! process environment.

use std::env;

use anyhow::{Context, Result};
use fxt_schemas::Micros;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataProvider {
    Mock,
    Real,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub timeframe: String,
    pub ingest_overlap_candles: u32,
    pub initial_backfill_days: u32,
    pub market_data_provider: MarketDataProvider,

    pub execution_spread_pips: f64,
    pub execution_slippage_pips: f64,
    pub pip_size: f64,
    pub contract_size: f64,

    pub account_currency: String,
    pub account_leverage: i64,
    pub initial_balance: Micros,

    pub candle_retention_days: u32,

    pub oms_min_qty: i64,
    pub oms_allowed_symbols: Vec<String>,

    pub strat_ema_fast: usize,
    pub strat_ema_slow: usize,
    pub strat_atr_period: usize,
    pub strat_atr_sl_mult: f64,
    pub strat_atr_tp_mult: f64,
    pub strat_cooldown_candles: u32,

    pub risk_max_open_positions: i32,
    pub risk_max_open_positions_per_symbol: i32,
    pub risk_max_total_notional: Micros,
    pub risk_max_symbol_notional: Micros,
    pub risk_per_trade_pct: f64,
    pub risk_daily_loss_limit_pct: f64,
    pub risk_daily_loss_limit_amount: Micros,
    pub risk_lot_step: i64,
}

fn req(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("missing required env var {key}"))
}

fn opt_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value for {key} = '{raw}': {e}"))
}

impl Config {
    /// Bootstrap `.env.local` (if present) then read the enumerated
    /// environment variables. Missing required variables are reported by
    /// name; malformed values are reported with the offending value.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let market_data_provider = match opt_or("MARKET_DATA_PROVIDER", "mock").as_str() {
            "mock" => MarketDataProvider::Mock,
            "real" => MarketDataProvider::Real,
            other => anyhow::bail!("MARKET_DATA_PROVIDER must be 'mock' or 'real', got '{other}'"),
        };

        let oms_allowed_symbols = req("OMS_ALLOWED_SYMBOLS")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        Ok(Config {
            symbol: req("SYMBOL")?,
            timeframe: req("TIMEFRAME")?,
            ingest_overlap_candles: parse("INGEST_OVERLAP_CANDLES", &opt_or("INGEST_OVERLAP_CANDLES", "3"))?,
            initial_backfill_days: parse("INITIAL_BACKFILL_DAYS", &opt_or("INITIAL_BACKFILL_DAYS", "30"))?,
            market_data_provider,

            execution_spread_pips: parse("EXECUTION_SPREAD_PIPS", &req("EXECUTION_SPREAD_PIPS")?)?,
            execution_slippage_pips: parse("EXECUTION_SLIPPAGE_PIPS", &req("EXECUTION_SLIPPAGE_PIPS")?)?,
            pip_size: parse("PIP_SIZE", &req("PIP_SIZE")?)?,
            contract_size: parse("CONTRACT_SIZE", &opt_or("CONTRACT_SIZE", "100000"))?,

            account_currency: opt_or("ACCOUNT_CURRENCY", "USD"),
            account_leverage: parse("ACCOUNT_LEVERAGE", &req("ACCOUNT_LEVERAGE")?)?,
            initial_balance: Micros::parse_decimal(&req("INITIAL_BALANCE")?)
                .map_err(|e| anyhow::anyhow!("invalid INITIAL_BALANCE: {e}"))?,

            candle_retention_days: parse("CANDLE_RETENTION_DAYS", &opt_or("CANDLE_RETENTION_DAYS", "365"))?,

            oms_min_qty: parse("OMS_MIN_QTY", &req("OMS_MIN_QTY")?)?,
            oms_allowed_symbols,

            strat_ema_fast: parse("STRAT_SMA_FAST", &req("STRAT_SMA_FAST")?)?,
            strat_ema_slow: parse("STRAT_SMA_SLOW", &req("STRAT_SMA_SLOW")?)?,
            strat_atr_period: parse("STRAT_ATR_PERIOD", &req("STRAT_ATR_PERIOD")?)?,
            strat_atr_sl_mult: parse("STRAT_ATR_SL_MULT", &opt_or("STRAT_ATR_SL_MULT", "1.5"))?,
            strat_atr_tp_mult: parse("STRAT_ATR_TP_MULT", &opt_or("STRAT_ATR_TP_MULT", "2.0"))?,
            strat_cooldown_candles: parse("STRAT_COOLDOWN_CANDLES", &opt_or("STRAT_COOLDOWN_CANDLES", "0"))?,

            risk_max_open_positions: parse("RISK_MAX_OPEN_POSITIONS", &req("RISK_MAX_OPEN_POSITIONS")?)?,
            risk_max_open_positions_per_symbol: parse(
                "RISK_MAX_OPEN_POSITIONS_PER_SYMBOL",
                &req("RISK_MAX_OPEN_POSITIONS_PER_SYMBOL")?,
            )?,
            risk_max_total_notional: Micros::parse_decimal(&req("RISK_MAX_TOTAL_NOTIONAL")?)
                .map_err(|e| anyhow::anyhow!("invalid RISK_MAX_TOTAL_NOTIONAL: {e}"))?,
            risk_max_symbol_notional: Micros::parse_decimal(&req("RISK_MAX_SYMBOL_NOTIONAL")?)
                .map_err(|e| anyhow::anyhow!("invalid RISK_MAX_SYMBOL_NOTIONAL: {e}"))?,
            risk_per_trade_pct: parse("RISK_PER_TRADE_PCT", &req("RISK_PER_TRADE_PCT")?)?,
            risk_daily_loss_limit_pct: parse("RISK_DAILY_LOSS_LIMIT_PCT", &req("RISK_DAILY_LOSS_LIMIT_PCT")?)?,
            risk_daily_loss_limit_amount: Micros::parse_decimal(&req("RISK_DAILY_LOSS_LIMIT_AMOUNT")?)
                .map_err(|e| anyhow::anyhow!("invalid RISK_DAILY_LOSS_LIMIT_AMOUNT: {e}"))?,
            risk_lot_step: parse("RISK_LOT_STEP", &opt_or("RISK_LOT_STEP", "1"))?,
        })
    }

    /// Deterministic SHA-256 over a canonical `KEY=value` listing, recorded
    /// on every run report so two runs can be checked for config parity.
    pub fn config_hash(&self) -> String {
        let lines = vec![
            format!("SYMBOL={}", self.symbol),
            format!("TIMEFRAME={}", self.timeframe),
            format!("INGEST_OVERLAP_CANDLES={}", self.ingest_overlap_candles),
            format!("INITIAL_BACKFILL_DAYS={}", self.initial_backfill_days),
            format!("MARKET_DATA_PROVIDER={:?}", self.market_data_provider),
            format!("EXECUTION_SPREAD_PIPS={}", self.execution_spread_pips),
            format!("EXECUTION_SLIPPAGE_PIPS={}", self.execution_slippage_pips),
            format!("PIP_SIZE={}", self.pip_size),
            format!("CONTRACT_SIZE={}", self.contract_size),
            format!("ACCOUNT_CURRENCY={}", self.account_currency),
            format!("ACCOUNT_LEVERAGE={}", self.account_leverage),
            format!("INITIAL_BALANCE={}", self.initial_balance),
            format!("CANDLE_RETENTION_DAYS={}", self.candle_retention_days),
            format!("OMS_MIN_QTY={}", self.oms_min_qty),
            format!("OMS_ALLOWED_SYMBOLS={}", self.oms_allowed_symbols.join(",")),
            format!("STRAT_SMA_FAST={}", self.strat_ema_fast),
            format!("STRAT_SMA_SLOW={}", self.strat_ema_slow),
            format!("STRAT_ATR_PERIOD={}", self.strat_atr_period),
            format!("STRAT_ATR_SL_MULT={}", self.strat_atr_sl_mult),
            format!("STRAT_ATR_TP_MULT={}", self.strat_atr_tp_mult),
            format!("STRAT_COOLDOWN_CANDLES={}", self.strat_cooldown_candles),
            format!("RISK_MAX_OPEN_POSITIONS={}", self.risk_max_open_positions),
            format!(
                "RISK_MAX_OPEN_POSITIONS_PER_SYMBOL={}",
                self.risk_max_open_positions_per_symbol
            ),
            format!("RISK_MAX_TOTAL_NOTIONAL={}", self.risk_max_total_notional),
            format!("RISK_MAX_SYMBOL_NOTIONAL={}", self.risk_max_symbol_notional),
            format!("RISK_PER_TRADE_PCT={}", self.risk_per_trade_pct),
            format!("RISK_DAILY_LOSS_LIMIT_PCT={}", self.risk_daily_loss_limit_pct),
            format!("RISK_DAILY_LOSS_LIMIT_AMOUNT={}", self.risk_daily_loss_limit_amount),
            format!("RISK_LOT_STEP={}", self.risk_lot_step),
        ];
        let canonical = lines.join("\n");
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_minimal_env() {
        env::set_var("SYMBOL", "EURUSD");
        env::set_var("TIMEFRAME", "M5");
        env::set_var("EXECUTION_SPREAD_PIPS", "1.0");
        env::set_var("EXECUTION_SLIPPAGE_PIPS", "0.5");
        env::set_var("PIP_SIZE", "0.00010");
        env::set_var("ACCOUNT_LEVERAGE", "30");
        env::set_var("INITIAL_BALANCE", "10000");
        env::set_var("OMS_MIN_QTY", "1");
        env::set_var("OMS_ALLOWED_SYMBOLS", "EURUSD");
        env::set_var("STRAT_SMA_FAST", "12");
        env::set_var("STRAT_SMA_SLOW", "26");
        env::set_var("STRAT_ATR_PERIOD", "14");
        env::set_var("RISK_MAX_OPEN_POSITIONS", "5");
        env::set_var("RISK_MAX_OPEN_POSITIONS_PER_SYMBOL", "1");
        env::set_var("RISK_MAX_TOTAL_NOTIONAL", "50000");
        env::set_var("RISK_MAX_SYMBOL_NOTIONAL", "50000");
        env::set_var("RISK_PER_TRADE_PCT", "0.01");
        env::set_var("RISK_DAILY_LOSS_LIMIT_PCT", "0.05");
        env::set_var("RISK_DAILY_LOSS_LIMIT_AMOUNT", "500");
    }

    #[test]
    fn loads_minimal_config() {
        set_minimal_env();
        let cfg = Config::from_env().expect("config should load");
        assert_eq!(cfg.symbol, "EURUSD");
        assert_eq!(cfg.account_leverage, 30);
        assert_eq!(cfg.initial_balance, Micros::parse_decimal("10000").unwrap());
    }

    #[test]
    fn config_hash_is_deterministic() {
        set_minimal_env();
        let a = Config::from_env().unwrap().config_hash();
        let b = Config::from_env().unwrap().config_hash();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_provider() {
        set_minimal_env();
        env::set_var("MARKET_DATA_PROVIDER", "carrier-pigeon");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("MARKET_DATA_PROVIDER"));
        env::set_var("MARKET_DATA_PROVIDER", "mock");
    }
}
