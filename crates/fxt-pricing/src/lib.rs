//! Deterministic bid/ask/slippage derivation from a candle's open.
//!
//! No randomness, no dependence on quantity or wall time. `pip_size` and the
//! spread/slippage multipliers arrive from configuration as `f64` (they are
//! small fixed per-instrument constants, not accumulating money state); the
//! candle's `open` and every returned price stay in [`fxt_schemas::Micros`]
//! so downstream accounting never round-trips through a float.

use fxt_schemas::{Candle, Micros, Side};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricingConfig {
    pub spread_pips: f64,
    pub slippage_pips: f64,
    pub pip_size: f64,
}

/// The bid/ask quote derived from a single candle's open.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quote {
    pub mid: Micros,
    pub bid: Micros,
    pub ask: Micros,
}

fn pips_to_micros(pips: f64, pip_size: f64) -> Micros {
    let units = pips * pip_size;
    Micros::new((units * Micros::SCALE as f64).round() as i64)
}

impl PricingConfig {
    /// `mid = candle.open`, `bid = mid - half_spread`, `ask = mid + half_spread`.
    pub fn quote(&self, candle: &Candle) -> Quote {
        let half_spread = pips_to_micros(self.spread_pips / 2.0, self.pip_size);
        Quote {
            mid: candle.open,
            bid: candle.open - half_spread,
            ask: candle.open + half_spread,
        }
    }

    /// `BUY fill = ask + slippage`, `SELL fill = bid - slippage`.
    pub fn fill_price(&self, candle: &Candle, side: Side) -> Micros {
        let quote = self.quote(candle);
        let slippage = pips_to_micros(self.slippage_pips, self.pip_size);
        match side {
            Side::Buy => quote.ask + slippage,
            Side::Sell => quote.bid - slippage,
        }
    }

    /// Signed slippage magnitude applied to a fill at this side (always
    /// non-negative — slippage works against the trader by construction).
    pub fn slippage_amount(&self) -> Micros {
        pips_to_micros(self.slippage_pips, self.pip_size)
    }

    /// Mark-to-market reference price: longs value on bid, shorts on ask.
    pub fn mark_price(&self, candle: &Candle, position_side: Side) -> Micros {
        let quote = self.quote(candle);
        match position_side {
            Side::Buy => quote.bid,
            Side::Sell => quote.ask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle_at(open: &str) -> Candle {
        Candle {
            symbol: "EURUSD".into(),
            timeframe: "M5".into(),
            open_time: Utc::now(),
            open: Micros::parse_decimal(open).unwrap(),
            high: Micros::parse_decimal(open).unwrap(),
            low: Micros::parse_decimal(open).unwrap(),
            close: Micros::parse_decimal(open).unwrap(),
            volume: Micros::ZERO,
            source: "test".into(),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn deterministic_fill_pricing_seed_scenario() {
        let cfg = PricingConfig {
            spread_pips: 1.0,
            slippage_pips: 0.5,
            pip_size: 0.00010,
        };
        let candle = candle_at("1.10000");
        let quote = cfg.quote(&candle);
        assert_eq!(quote.bid, Micros::parse_decimal("1.09995").unwrap());
        assert_eq!(quote.ask, Micros::parse_decimal("1.10005").unwrap());
        assert_eq!(
            cfg.fill_price(&candle, Side::Buy),
            Micros::parse_decimal("1.10010").unwrap()
        );
        assert_eq!(
            cfg.fill_price(&candle, Side::Sell),
            Micros::parse_decimal("1.09990").unwrap()
        );
    }

    #[test]
    fn no_randomness_same_inputs_same_outputs() {
        let cfg = PricingConfig {
            spread_pips: 1.2,
            slippage_pips: 0.3,
            pip_size: 0.00010,
        };
        let candle = candle_at("1.23456");
        assert_eq!(cfg.quote(&candle), cfg.quote(&candle));
        assert_eq!(
            cfg.fill_price(&candle, Side::Buy),
            cfg.fill_price(&candle, Side::Buy)
        );
    }

    #[test]
    fn mark_price_uses_bid_for_long_ask_for_short() {
        let cfg = PricingConfig {
            spread_pips: 2.0,
            slippage_pips: 0.0,
            pip_size: 0.00010,
        };
        let candle = candle_at("1.00000");
        let quote = cfg.quote(&candle);
        assert_eq!(cfg.mark_price(&candle, Side::Buy), quote.bid);
        assert_eq!(cfg.mark_price(&candle, Side::Sell), quote.ask);
    }
}
