//! Reference strategy (C5): a pure map from a closed-candle window to a
//! `StrategyIntent`. No account, position, or order state is read here —
//! sizing and admission live downstream in risk and execution.

mod indicators;

use chrono::{DateTime, Utc};
use fxt_schemas::{Candle, Indicators, RiskHints, StrategyAction, StrategyIntent};

fn to_f64(m: fxt_schemas::Micros) -> f64 {
    m.raw() as f64 / fxt_schemas::Micros::SCALE as f64
}

/// EMA-cross + ATR parameters. Defaults follow spec §4.5's reference
/// strategy: fast/slow EMA crossover, Wilder ATR for protective hints.
#[derive(Clone, Copy, Debug)]
pub struct EmaCrossAtrConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
    pub stop_loss_atr_mult: f64,
    pub take_profit_atr_mult: f64,
}

impl Default for EmaCrossAtrConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            atr_period: 14,
            stop_loss_atr_mult: 1.5,
            take_profit_atr_mult: 2.0,
        }
    }
}

/// Evaluate the reference strategy over `window`, a slice of closed candles
/// ordered oldest-first for one `(symbol, timeframe)` series. The last
/// element is the most recently closed bar the decision is made on.
pub fn evaluate(window: &[Candle], cfg: &EmaCrossAtrConfig) -> StrategyIntent {
    let (symbol, tf, ts) = match window.last() {
        Some(c) => (c.symbol.clone(), c.timeframe.clone(), c.open_time),
        None => {
            return hold_intent(
                String::new(),
                String::new(),
                Utc::now(),
                "insufficient_data",
                "empty candle window",
            )
        }
    };

    let warmup = cfg.slow_period.max(cfg.atr_period) + 1;
    if window.len() < warmup {
        return hold_intent(
            symbol,
            tf,
            ts,
            "insufficient_data",
            &format!("need {warmup} closed bars, have {}", window.len()),
        );
    }

    let closes: Vec<f64> = window.iter().map(|c| to_f64(c.close)).collect();
    let highs: Vec<f64> = window.iter().map(|c| to_f64(c.high)).collect();
    let lows: Vec<f64> = window.iter().map(|c| to_f64(c.low)).collect();

    let ema_fast = indicators::ema_series(&closes, cfg.fast_period);
    let ema_slow = indicators::ema_series(&closes, cfg.slow_period);
    let atr = indicators::atr_series(&highs, &lows, &closes, cfg.atr_period);

    let n = window.len();
    let (fast_last, fast_prev) = (ema_fast[n - 1], ema_fast[n - 2]);
    let (slow_last, slow_prev) = (ema_slow[n - 1], ema_slow[n - 2]);
    let atr_last = atr[n - 1];

    let crossed_up = fast_prev <= slow_prev && fast_last > slow_last;
    let crossed_down = fast_prev >= slow_prev && fast_last < slow_last;

    let entry = closes[n - 1];
    let indicator_snapshot = Indicators {
        ema_fast: fast_last,
        ema_slow: slow_last,
        atr: atr_last,
    };

    let mut action = StrategyAction::Hold;
    let mut reason = "no_crossover".to_string();
    let mut risk_hints = RiskHints {
        stop_loss_price: None,
        take_profit_price: None,
    };

    if crossed_up {
        action = StrategyAction::Buy;
        reason = "ema_cross_up".to_string();
        risk_hints.stop_loss_price = Some(price_from_f64(entry - cfg.stop_loss_atr_mult * atr_last));
        risk_hints.take_profit_price =
            Some(price_from_f64(entry + cfg.take_profit_atr_mult * atr_last));
    } else if crossed_down {
        action = StrategyAction::Sell;
        reason = "ema_cross_down".to_string();
        risk_hints.stop_loss_price = Some(price_from_f64(entry + cfg.stop_loss_atr_mult * atr_last));
        risk_hints.take_profit_price =
            Some(price_from_f64(entry - cfg.take_profit_atr_mult * atr_last));
    }

    if has_gap(window) {
        reason.push_str(",data_gap_detected");
    }

    let summary = format!(
        "{} {}@{} ema_fast={:.5} ema_slow={:.5} atr={:.5} ({reason})",
        symbol, action_label(action), tf, fast_last, slow_last, atr_last
    );

    StrategyIntent {
        action,
        reason,
        symbol,
        tf,
        ts,
        indicators: Some(indicator_snapshot),
        risk_hints,
        summary,
    }
}

fn price_from_f64(v: f64) -> fxt_schemas::Micros {
    let raw = (v * fxt_schemas::Micros::SCALE as f64).round() as i64;
    fxt_schemas::Micros::new(raw)
}

fn action_label(action: StrategyAction) -> &'static str {
    match action {
        StrategyAction::Buy => "BUY",
        StrategyAction::Sell => "SELL",
        StrategyAction::Hold => "HOLD",
        StrategyAction::Close => "CLOSE",
    }
}

fn hold_intent(
    symbol: String,
    tf: String,
    ts: DateTime<Utc>,
    reason: &str,
    summary: &str,
) -> StrategyIntent {
    StrategyIntent {
        action: StrategyAction::Hold,
        reason: reason.to_string(),
        symbol,
        tf,
        ts,
        indicators: None,
        risk_hints: RiskHints {
            stop_loss_price: None,
            take_profit_price: None,
        },
        summary: summary.to_string(),
    }
}

/// A gap exists when consecutive bars aren't spaced by the series' own
/// modal step (derived from the window itself, not an external timeframe
/// table, so this stays a pure function of the window).
fn has_gap(window: &[Candle]) -> bool {
    if window.len() < 2 {
        return false;
    }
    let mut steps: Vec<i64> = window
        .windows(2)
        .map(|pair| (pair[1].open_time - pair[0].open_time).num_seconds())
        .collect();
    steps.sort_unstable();
    let modal = steps[steps.len() / 2];
    steps.iter().any(|s| *s != modal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candle(symbol: &str, tf: &str, open_time: DateTime<Utc>, close: f64, h: f64, l: f64) -> Candle {
        let c = price_from_f64(close);
        Candle {
            symbol: symbol.to_string(),
            timeframe: tf.to_string(),
            open_time,
            open: c,
            high: price_from_f64(h),
            low: price_from_f64(l),
            close: c,
            volume: fxt_schemas::Micros::ZERO,
            source: "test".to_string(),
            ingested_at: open_time,
        }
    }

    fn make_window(closes: &[f64]) -> Vec<Candle> {
        let t0 = Utc::now();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                candle(
                    "EURUSD",
                    "M5",
                    t0 + Duration::seconds(300 * i as i64),
                    c,
                    c + 0.0010,
                    c - 0.0010,
                )
            })
            .collect()
    }

    #[test]
    fn insufficient_data_below_warmup_holds() {
        let cfg = EmaCrossAtrConfig::default();
        let window = make_window(&[1.1000; 5]);
        let intent = evaluate(&window, &cfg);
        assert_eq!(intent.action, StrategyAction::Hold);
        assert_eq!(intent.reason, "insufficient_data");
        assert!(intent.indicators.is_none());
    }

    #[test]
    fn crossover_up_emits_buy_with_risk_hints() {
        let cfg = EmaCrossAtrConfig {
            fast_period: 3,
            slow_period: 5,
            atr_period: 3,
            ..EmaCrossAtrConfig::default()
        };
        let mut closes = vec![1.1000; 6];
        closes.extend_from_slice(&[1.1010, 1.1030, 1.1060, 1.1100]);
        let window = make_window(&closes);
        let intent = evaluate(&window, &cfg);
        assert_eq!(intent.action, StrategyAction::Buy);
        assert!(intent.risk_hints.stop_loss_price.is_some());
        assert!(intent.risk_hints.take_profit_price.is_some());
        let sl = intent.risk_hints.stop_loss_price.unwrap();
        let entry = window.last().unwrap().close;
        assert!(sl < entry);
    }

    #[test]
    fn gap_in_window_is_flagged_but_intent_still_emitted() {
        let cfg = EmaCrossAtrConfig {
            fast_period: 3,
            slow_period: 5,
            atr_period: 3,
            ..EmaCrossAtrConfig::default()
        };
        let t0 = Utc::now();
        let mut window = make_window(&vec![1.1000; 10]);
        for c in window.iter_mut().skip(5) {
            c.open_time += Duration::seconds(300);
        }
        let _ = t0;
        let intent = evaluate(&window, &cfg);
        assert!(intent.reason.contains("data_gap_detected"));
    }

    #[test]
    fn same_window_twice_is_deterministic() {
        let cfg = EmaCrossAtrConfig::default();
        let window = make_window(&[1.10, 1.11, 1.09, 1.12, 1.13, 1.08, 1.14, 1.15, 1.16, 1.17, 1.18, 1.19, 1.20, 1.21, 1.22, 1.23, 1.24, 1.25, 1.26, 1.27, 1.28, 1.29, 1.30, 1.31, 1.32, 1.33, 1.34, 1.35]);
        let a = evaluate(&window, &cfg);
        let b = evaluate(&window, &cfg);
        assert_eq!(a.action, b.action);
        assert_eq!(a.reason, b.reason);
        assert_eq!(a.risk_hints.stop_loss_price, b.risk_hints.stop_loss_price);
    }
}
