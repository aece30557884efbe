//! Netting position ledger (C8): one position per `(account, symbol)`,
//! weighted-average entry price, realized PnL on any reduction or flip.
//! Pure logic — no IO, no time beyond the timestamps handed in.

use chrono::{DateTime, Utc};
use fxt_schemas::{ExitReason, Fill, Micros, NettingPosition, Side, Trade};

fn signed_qty(side: Side, qty: i64) -> i64 {
    match side {
        Side::Buy => qty,
        Side::Sell => -qty,
    }
}

fn mul_clamped(a: i64, b: i64) -> i64 {
    let wide = a as i128 * b as i128;
    wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Apply one fill to a position. Returns the updated position and, when the
/// fill closed or reduced an existing exposure, the realized [`Trade`].
///
/// Weighted-average entry price on same-direction adds; realized PnL priced
/// against the existing average entry on any opposite-direction fill,
/// covering first the existing exposure and then opening the flipped side
/// at the fill price if the fill overshoots it.
pub fn apply_fill(
    position: &NettingPosition,
    fill: &Fill,
    exit_reason: ExitReason,
) -> (NettingPosition, Option<Trade>) {
    let mut pos = position.clone();
    let delta = signed_qty(fill.side, fill.qty);

    if pos.net_qty == 0 || pos.net_qty.signum() == delta.signum() {
        // Opening or extending in the same direction: roll the average.
        let old_abs = pos.net_qty.unsigned_abs() as i64;
        let add_abs = fill.qty;
        let new_abs = old_abs + add_abs;
        let weighted = mul_clamped(old_abs, pos.avg_entry_price.raw())
            .saturating_add(mul_clamped(add_abs, fill.price.raw()));
        pos.avg_entry_price = Micros::new(if new_abs > 0 { weighted / new_abs } else { 0 });
        pos.net_qty += delta;
        pos.updated_open_time = fill.ts;
        if pos.entry_order_id.is_none() {
            pos.entry_order_id = Some(fill.order_id);
        }
        return (pos, None);
    }

    // Opposite direction: realize PnL on the overlap against the existing average.
    let existing_abs = pos.net_qty.unsigned_abs() as i64;
    let overlap = existing_abs.min(fill.qty);
    let entry_order_id = pos.entry_order_id.unwrap_or(fill.order_id);

    let pnl_per_unit = if pos.net_qty > 0 {
        fill.price.raw() - pos.avg_entry_price.raw()
    } else {
        pos.avg_entry_price.raw() - fill.price.raw()
    };
    let realized = Micros::new(mul_clamped(pnl_per_unit, overlap));

    let trade = Trade {
        entry_ts: pos.updated_open_time,
        exit_ts: fill.ts,
        symbol: pos.symbol.clone(),
        qty: overlap,
        entry_price: pos.avg_entry_price,
        exit_price: fill.price,
        pnl: realized,
        exit_reason,
        entry_order_id,
        exit_order_id: fill.order_id,
    };

    pos.realized_pnl_cum = pos.realized_pnl_cum + realized;
    pos.net_qty += delta;
    pos.updated_open_time = fill.ts;

    let remaining_fill = fill.qty - overlap;
    if pos.net_qty == 0 {
        pos.avg_entry_price = Micros::ZERO;
        pos.entry_order_id = None;
        pos.stop_loss = None;
        pos.take_profit = None;
    } else if remaining_fill > 0 {
        // The fill overshot the existing exposure and flipped the position.
        pos.avg_entry_price = fill.price;
        pos.entry_order_id = Some(fill.order_id);
    }

    (pos, Some(trade))
}

/// Unrealized PnL of `position` marked at `mark_price`. Zero for a flat
/// position regardless of a stale average entry price.
pub fn unrealized_pnl(position: &NettingPosition, mark_price: Micros) -> Micros {
    if position.net_qty == 0 {
        return Micros::ZERO;
    }
    let per_unit = if position.net_qty > 0 {
        mark_price.raw() - position.avg_entry_price.raw()
    } else {
        position.avg_entry_price.raw() - mark_price.raw()
    };
    Micros::new(mul_clamped(per_unit, position.net_qty.unsigned_abs() as i64))
}

/// Notional exposure of `position` marked at `mark_price`, always non-negative.
pub fn notional(position: &NettingPosition, mark_price: Micros) -> Micros {
    Micros::new(mul_clamped(position.net_qty.unsigned_abs() as i64, mark_price.raw()).abs())
}

pub fn now_or(ts: Option<DateTime<Utc>>) -> DateTime<Utc> {
    ts.unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn flat() -> NettingPosition {
        NettingPosition::flat(Uuid::nil(), "EURUSD", Utc::now())
    }

    fn fill(side: Side, qty: i64, price: f64) -> Fill {
        Fill {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            ts: Utc::now(),
            symbol: "EURUSD".to_string(),
            side,
            qty,
            price: Micros::new((price * 1_000_000.0).round() as i64),
            fee: Micros::ZERO,
            slippage: Micros::ZERO,
            accounted_at_open_time: None,
        }
    }

    #[test]
    fn opening_buy_sets_avg_entry() {
        let (pos, trade) = apply_fill(&flat(), &fill(Side::Buy, 1000, 1.1000), ExitReason::Manual);
        assert_eq!(pos.net_qty, 1000);
        assert_eq!(pos.avg_entry_price, Micros::new(1_100_000));
        assert!(trade.is_none());
    }

    #[test]
    fn adding_same_direction_reweights_average() {
        let (pos, _) = apply_fill(&flat(), &fill(Side::Buy, 1000, 1.1000), ExitReason::Manual);
        let (pos2, trade) = apply_fill(&pos, &fill(Side::Buy, 1000, 1.2000), ExitReason::Manual);
        assert_eq!(pos2.net_qty, 2000);
        assert_eq!(pos2.avg_entry_price, Micros::new(1_150_000));
        assert!(trade.is_none());
    }

    #[test]
    fn full_close_realizes_pnl_and_flattens() {
        let (pos, _) = apply_fill(&flat(), &fill(Side::Buy, 1000, 1.1000), ExitReason::Manual);
        let (pos2, trade) = apply_fill(&pos, &fill(Side::Sell, 1000, 1.1050), ExitReason::Tp);
        assert!(pos2.is_flat());
        let trade = trade.unwrap();
        assert_eq!(trade.pnl, Micros::new(5_000_000));
        assert_eq!(trade.exit_reason, ExitReason::Tp);
    }

    #[test]
    fn overshoot_flips_position_at_fill_price() {
        let (pos, _) = apply_fill(&flat(), &fill(Side::Buy, 1000, 1.1000), ExitReason::Manual);
        let (pos2, trade) = apply_fill(&pos, &fill(Side::Sell, 1500, 1.1050), ExitReason::Flip);
        assert_eq!(pos2.net_qty, -500);
        assert_eq!(pos2.avg_entry_price, Micros::new(1_105_000));
        assert!(trade.is_some());
    }

    #[test]
    fn unrealized_pnl_zero_when_flat() {
        assert_eq!(unrealized_pnl(&flat(), Micros::new(1_100_000)), Micros::ZERO);
    }
}
