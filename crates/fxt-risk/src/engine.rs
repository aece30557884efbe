use fxt_schemas::{AccountingSnapshot, DailyEquityBaseline, Micros, RiskDecision, RiskLimits};

use crate::types::RiskRequest;

fn floor_to_step(qty: i64, step: i64) -> i64 {
    if step <= 1 {
        return qty.max(0);
    }
    (qty.max(0) / step) * step
}

fn reject(reason: impl Into<String>, snapshot: &AccountingSnapshot) -> RiskDecision {
    RiskDecision {
        allowed: false,
        approved_qty: 0,
        reason: reason.into(),
        snapshot: snapshot.clone(),
    }
}

/// Pre-trade risk gate (C6): size by per-trade risk budget, clamp to the
/// account's open-position and notional caps, check the daily loss
/// baseline, then gate on free margin. Pure function of its inputs —
/// gathering the book state is the caller's job.
pub fn evaluate(
    limits: &RiskLimits,
    snapshot: &AccountingSnapshot,
    baseline: &DailyEquityBaseline,
    req: &RiskRequest,
) -> RiskDecision {
    if req.requested_qty <= 0 {
        return reject("requested_qty must be positive", snapshot);
    }

    // 1) Daily loss baseline: halt new risk once equity has fallen through
    // either the percentage or absolute floor derived from day-start equity.
    if limits.daily_loss_limit_pct > 0.0 {
        let floor_raw =
            (baseline.day_start_equity.raw() as f64) * (1.0 - limits.daily_loss_limit_pct);
        if (snapshot.equity.raw() as f64) <= floor_raw {
            return reject("daily_loss_limit_pct_breached", snapshot);
        }
    }
    if limits.daily_loss_limit_amount > Micros::ZERO {
        match baseline
            .day_start_equity
            .raw()
            .checked_sub(limits.daily_loss_limit_amount.raw())
        {
            None => return reject("daily_loss_limit_amount_overflow", snapshot),
            Some(floor_raw) => {
                if snapshot.equity.raw() <= floor_raw {
                    return reject("daily_loss_limit_amount_breached", snapshot);
                }
            }
        }
    }

    // 2) Position-count caps.
    if limits.max_open_positions > 0 && req.open_positions_count >= limits.max_open_positions {
        return reject("max_open_positions_reached", snapshot);
    }
    if limits.max_open_positions_per_symbol > 0
        && req.open_positions_count_for_symbol >= limits.max_open_positions_per_symbol
    {
        return reject("max_open_positions_per_symbol_reached", snapshot);
    }

    // 3) Sizing: risk_amount is the micros the account is willing to lose
    // on this trade; max_units is how many lots that buys given the
    // stop distance. No stop hint means sizing is unbounded here — the
    // strategy is expected to always supply one, so this is a permissive
    // fallback, not the common path.
    let risk_amount = (snapshot.equity.raw() as f64) * limits.risk_per_trade_pct;
    let max_units_by_risk = match req.stop_loss_price {
        Some(sl) => {
            let stop_distance = (req.reference_price.raw() - sl.raw()).unsigned_abs() as f64;
            if stop_distance <= 0.0 {
                return reject("zero_stop_distance", snapshot);
            }
            (risk_amount / stop_distance).floor() as i64
        }
        None => i64::MAX,
    };

    let mut approved_qty = floor_to_step(
        req.requested_qty.min(max_units_by_risk),
        limits.lot_step.max(1),
    );
    if approved_qty <= 0 {
        return reject("sized_qty_rounds_to_zero", snapshot);
    }

    // 4) Notional caps: clamp qty down to what remains of the allowance
    // rather than reject outright, matching spec's clamp-then-check flow.
    if limits.max_total_notional > Micros::ZERO {
        let remaining = limits
            .max_total_notional
            .raw()
            .saturating_sub(req.open_notional_total.raw());
        approved_qty = clamp_by_notional(approved_qty, req.reference_price, remaining, limits.lot_step.max(1));
    }
    if approved_qty <= 0 {
        return reject("max_total_notional_reached", snapshot);
    }
    if limits.max_symbol_notional > Micros::ZERO {
        let remaining = limits
            .max_symbol_notional
            .raw()
            .saturating_sub(req.open_notional_for_symbol.raw());
        approved_qty = clamp_by_notional(approved_qty, req.reference_price, remaining, limits.lot_step.max(1));
    }
    if approved_qty <= 0 {
        return reject("max_symbol_notional_reached", snapshot);
    }

    // 5) Margin gate: the position's required margin must fit inside
    // free margin at the account's configured leverage.
    if limits.leverage > 0 {
        let notional = req.reference_price.raw() as i128 * approved_qty as i128;
        let required_margin = notional / limits.leverage as i128;
        let free = snapshot.free_margin.raw() as i128;
        if required_margin > free {
            let max_qty_by_margin = if req.reference_price.raw() > 0 {
                ((free * limits.leverage as i128) / req.reference_price.raw() as i128) as i64
            } else {
                0
            };
            approved_qty = floor_to_step(approved_qty.min(max_qty_by_margin), limits.lot_step.max(1));
        }
    }
    if approved_qty <= 0 {
        return reject("insufficient_free_margin", snapshot);
    }

    RiskDecision {
        allowed: true,
        approved_qty,
        reason: "approved".to_string(),
        snapshot: snapshot.clone(),
    }
}

fn clamp_by_notional(qty: i64, price: Micros, remaining_notional_raw: i64, lot_step: i64) -> i64 {
    if remaining_notional_raw <= 0 || price.raw() <= 0 {
        return 0;
    }
    let max_qty_by_notional = remaining_notional_raw / price.raw();
    floor_to_step(qty.min(max_qty_by_notional), lot_step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fxt_schemas::Side;
    use uuid::Uuid;

    fn limits() -> RiskLimits {
        RiskLimits {
            account_id: Uuid::nil(),
            max_open_positions: 5,
            max_open_positions_per_symbol: 2,
            max_total_notional: Micros::new(1_000_000_000_000),
            max_symbol_notional: Micros::new(1_000_000_000_000),
            risk_per_trade_pct: 0.01,
            daily_loss_limit_pct: 0.05,
            daily_loss_limit_amount: Micros::ZERO,
            leverage: 30,
            lot_step: 1,
        }
    }

    fn snapshot(equity: i64, free_margin: i64) -> AccountingSnapshot {
        AccountingSnapshot {
            account_id: Uuid::nil(),
            asof_open_time: Utc::now(),
            balance: Micros::new(equity),
            equity: Micros::new(equity),
            unrealized_pnl: Micros::ZERO,
            margin_used: Micros::ZERO,
            free_margin: Micros::new(free_margin),
        }
    }

    fn baseline(day_start_equity: i64) -> DailyEquityBaseline {
        DailyEquityBaseline {
            account_id: Uuid::nil(),
            day: Utc::now().date_naive(),
            day_start_equity: Micros::new(day_start_equity),
            min_equity: Micros::new(day_start_equity),
        }
    }

    fn req(qty: i64, stop: Option<Micros>) -> RiskRequest {
        RiskRequest {
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            requested_qty: qty,
            reference_price: Micros::new(1_100_000),
            stop_loss_price: stop,
            open_positions_count: 0,
            open_positions_count_for_symbol: 0,
            open_notional_total: Micros::ZERO,
            open_notional_for_symbol: Micros::ZERO,
        }
    }

    #[test]
    fn sizes_down_to_risk_budget() {
        let lim = limits();
        let snap = snapshot(10_000_000_000, 10_000_000_000);
        let base = baseline(10_000_000_000);
        let r = req(1_000_000, Some(Micros::new(1_095_000)));
        let d = evaluate(&lim, &snap, &base, &r);
        assert!(d.allowed);
        assert!(d.approved_qty < 1_000_000);
    }

    #[test]
    fn daily_loss_limit_breach_rejects() {
        let lim = limits();
        let snap = snapshot(9_400_000_000, 9_400_000_000);
        let base = baseline(10_000_000_000);
        let r = req(100, Some(Micros::new(1_095_000)));
        let d = evaluate(&lim, &snap, &base, &r);
        assert!(!d.allowed);
        assert_eq!(d.reason, "daily_loss_limit_pct_breached");
    }

    #[test]
    fn max_open_positions_rejects() {
        let mut lim = limits();
        lim.max_open_positions = 1;
        let snap = snapshot(10_000_000_000, 10_000_000_000);
        let base = baseline(10_000_000_000);
        let mut r = req(100, Some(Micros::new(1_095_000)));
        r.open_positions_count = 1;
        let d = evaluate(&lim, &snap, &base, &r);
        assert!(!d.allowed);
        assert_eq!(d.reason, "max_open_positions_reached");
    }

    #[test]
    fn insufficient_margin_clamps_or_rejects() {
        let mut lim = limits();
        lim.leverage = 1;
        lim.risk_per_trade_pct = 1.0;
        let snap = snapshot(1_000_000, 100_000);
        let base = baseline(1_000_000);
        let r = req(1_000, None);
        let d = evaluate(&lim, &snap, &base, &r);
        if d.allowed {
            let notional = d.approved_qty * 1_100_000;
            assert!(notional as i64 <= 100_000);
        } else {
            assert_eq!(d.reason, "insufficient_free_margin");
        }
    }
}
