use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fixedpoint::Micros;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Filled,
    Rejected,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::New)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Sl,
    Tp,
    Manual,
    Flip,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Noop,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "OK",
            RunStatus::Noop => "NOOP",
            RunStatus::Error => "ERROR",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyAction {
    Buy,
    Sell,
    Hold,
    Close,
}

/// Closed OHLCV bar. `(symbol, timeframe, open_time)` is the natural key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub open: Micros,
    pub high: Micros,
    pub low: Micros,
    pub close: Micros,
    pub volume: Micros,
    pub source: String,
    pub ingested_at: DateTime<Utc>,
}

impl Candle {
    /// OHLC sanity: high dominates, low is dominated.
    pub fn is_sane(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Singleton account row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub balance: Micros,
    pub currency: String,
    pub leverage: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: i64,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub requested_price: Option<Micros>,
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub price: Micros,
    pub fee: Micros,
    pub slippage: Micros,
    pub accounted_at_open_time: Option<DateTime<Utc>>,
}

/// Netted position for one `(account, symbol)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NettingPosition {
    pub account_id: Uuid,
    pub symbol: String,
    pub net_qty: i64,
    pub avg_entry_price: Micros,
    pub updated_open_time: DateTime<Utc>,
    pub stop_loss: Option<Micros>,
    pub take_profit: Option<Micros>,
    pub realized_pnl_cum: Micros,
    pub entry_order_id: Option<Uuid>,
}

impl NettingPosition {
    pub fn flat(account_id: Uuid, symbol: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            net_qty: 0,
            avg_entry_price: Micros::ZERO,
            updated_open_time: at,
            stop_loss: None,
            take_profit: None,
            realized_pnl_cum: Micros::ZERO,
            entry_order_id: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.net_qty == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub symbol: String,
    pub qty: i64,
    pub entry_price: Micros,
    pub exit_price: Micros,
    pub pnl: Micros,
    pub exit_reason: ExitReason,
    pub entry_order_id: Uuid,
    pub exit_order_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountingSnapshot {
    pub account_id: Uuid,
    pub asof_open_time: DateTime<Utc>,
    pub balance: Micros,
    pub equity: Micros,
    pub unrealized_pnl: Micros,
    pub margin_used: Micros,
    pub free_margin: Micros,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub account_id: Uuid,
    pub max_open_positions: i32,
    pub max_open_positions_per_symbol: i32,
    pub max_total_notional: Micros,
    pub max_symbol_notional: Micros,
    pub risk_per_trade_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub daily_loss_limit_amount: Micros,
    pub leverage: i64,
    pub lot_step: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyEquityBaseline {
    pub account_id: Uuid,
    pub day: NaiveDate,
    pub day_start_equity: Micros,
    pub min_equity: Micros,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub symbol: String,
    pub timeframe: String,
    pub candle_ts: DateTime<Utc>,
    pub intent: Option<serde_json::Value>,
    pub risk: Option<serde_json::Value>,
    pub order: Option<serde_json::Value>,
    pub fill: Option<serde_json::Value>,
    pub positions: Option<serde_json::Value>,
    pub account: Option<serde_json::Value>,
    pub summary_text: String,
    pub telegram_text: String,
    pub error_text: Option<String>,
}

/// Indicator snapshot produced alongside a strategy intent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub atr: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskHints {
    pub stop_loss_price: Option<Micros>,
    pub take_profit_price: Option<Micros>,
}

/// Output of the pure strategy map: candle window -> intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyIntent {
    pub action: StrategyAction,
    pub reason: String,
    pub symbol: String,
    pub tf: String,
    pub ts: DateTime<Utc>,
    pub indicators: Option<Indicators>,
    pub risk_hints: RiskHints,
    pub summary: String,
}

/// An order placement request handed from the orchestrator/control surface
/// into order management.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub idempotency_key: Option<String>,
    pub stop_loss: Option<Micros>,
    pub take_profit: Option<Micros>,
}

/// Outcome of a risk pre-trade evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub allowed: bool,
    pub approved_qty: i64,
    pub reason: String,
    pub snapshot: AccountingSnapshot,
}
