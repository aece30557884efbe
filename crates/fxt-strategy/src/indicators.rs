//! Pure indicator math. `f64` is acceptable here — indicators feed strategy
//! decisions and risk hints, not the accounting ledger, so no `Micros`
//! round-tripping is required.

/// Exponential moving average series, one value per input price, seeded by
/// the simple average of the first `period` prices.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() || period == 0 {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(prices.len());
    let seed_len = period.min(prices.len());
    let seed = prices[..seed_len].iter().sum::<f64>() / seed_len as f64;
    let mut prev = seed;
    for (i, &p) in prices.iter().enumerate() {
        let v = if i == 0 { seed } else { p * alpha + prev * (1.0 - alpha) };
        out.push(v);
        prev = v;
    }
    out
}

/// True range for one bar given the prior bar's close (`None` for the
/// first bar in a series, where TR collapses to `high - low`).
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => high - low,
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
    }
}

/// Wilder-smoothed ATR series, one value per input bar, seeded by the
/// simple average of the first `period` true ranges.
pub fn atr_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = highs.len();
    if n == 0 || period == 0 {
        return Vec::new();
    }
    let trs: Vec<f64> = (0..n)
        .map(|i| {
            let prev_close = if i == 0 { None } else { Some(closes[i - 1]) };
            true_range(highs[i], lows[i], prev_close)
        })
        .collect();

    let mut out = Vec::with_capacity(n);
    let seed_len = period.min(n);
    let seed = trs[..seed_len].iter().sum::<f64>() / seed_len as f64;
    let mut prev = seed;
    for (i, &tr) in trs.iter().enumerate() {
        let v = if i == 0 {
            seed
        } else {
            (prev * (period as f64 - 1.0) + tr) / period as f64
        };
        out.push(v);
        prev = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_series_reacts_to_trend() {
        let prices = vec![1.0, 1.0, 1.0, 2.0, 3.0, 4.0];
        let ema = ema_series(&prices, 3);
        assert_eq!(ema.len(), prices.len());
        assert!(ema.last().unwrap() > &ema[2]);
    }

    #[test]
    fn atr_series_is_nonnegative() {
        let highs = vec![1.2, 1.3, 1.25, 1.4];
        let lows = vec![1.0, 1.1, 1.05, 1.2];
        let closes = vec![1.1, 1.2, 1.15, 1.3];
        let atr = atr_series(&highs, &lows, &closes, 2);
        assert!(atr.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn true_range_uses_prev_close_when_present() {
        assert_eq!(true_range(10.0, 9.0, None), 1.0);
        assert_eq!(true_range(10.0, 9.5, Some(8.0)), 2.0);
    }
}
