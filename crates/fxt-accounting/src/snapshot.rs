//! Mark-to-market (C8): fold an account's open positions into an
//! [`AccountingSnapshot`] at a given candle close, and maintain the
//! idempotent daily equity baseline used by the risk gate.

use chrono::{DateTime, NaiveDate, Utc};
use fxt_schemas::{Account, AccountingSnapshot, DailyEquityBaseline, Micros, NettingPosition};
use uuid::Uuid;

use crate::ledger;

/// Mark every position in `positions` at `mark_price` and fold the result
/// into a point-in-time snapshot. Single-instrument system: all positions
/// share the one mark price for the candle being processed.
pub fn mark_to_market(
    account: &Account,
    positions: &[NettingPosition],
    mark_price: Micros,
    asof_open_time: DateTime<Utc>,
) -> AccountingSnapshot {
    let mut unrealized = Micros::ZERO;
    let mut gross_notional = Micros::ZERO;
    for pos in positions {
        unrealized = unrealized + ledger::unrealized_pnl(pos, mark_price);
        gross_notional = gross_notional + ledger::notional(pos, mark_price);
    }

    let equity = account.balance + unrealized;
    let margin_used = if account.leverage > 0 {
        gross_notional.checked_div(account.leverage).unwrap_or(Micros::ZERO)
    } else {
        Micros::ZERO
    };
    let free_margin = equity.saturating_sub(margin_used);

    AccountingSnapshot {
        account_id: account.id,
        asof_open_time,
        balance: account.balance,
        equity,
        unrealized_pnl: unrealized,
        margin_used,
        free_margin,
    }
}

/// Idempotently advance the daily equity baseline: a new day starts a new
/// baseline at the current equity; the same day only ever tightens
/// `min_equity` downward, never resets it.
pub fn advance_daily_baseline(
    existing: Option<DailyEquityBaseline>,
    account_id: Uuid,
    day: NaiveDate,
    current_equity: Micros,
) -> DailyEquityBaseline {
    match existing {
        Some(mut baseline) if baseline.day == day => {
            if current_equity < baseline.min_equity {
                baseline.min_equity = current_equity;
            }
            baseline
        }
        _ => DailyEquityBaseline {
            account_id,
            day,
            day_start_equity: current_equity,
            min_equity: current_equity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64) -> Account {
        Account {
            id: Uuid::nil(),
            balance: Micros::new(balance),
            currency: "USD".to_string(),
            leverage: 30,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn flat_book_has_zero_unrealized() {
        let snap = mark_to_market(&account(10_000_000_000), &[], Micros::new(1_100_000), Utc::now());
        assert_eq!(snap.unrealized_pnl, Micros::ZERO);
        assert_eq!(snap.equity, snap.balance);
    }

    #[test]
    fn open_long_contributes_unrealized_gain() {
        let pos = NettingPosition {
            account_id: Uuid::nil(),
            symbol: "EURUSD".to_string(),
            net_qty: 1000,
            avg_entry_price: Micros::new(1_090_000),
            updated_open_time: Utc::now(),
            stop_loss: None,
            take_profit: None,
            realized_pnl_cum: Micros::ZERO,
            entry_order_id: None,
        };
        let snap = mark_to_market(&account(10_000_000_000), &[pos], Micros::new(1_100_000), Utc::now());
        assert_eq!(snap.unrealized_pnl, Micros::new(10_000_000));
        assert!(snap.equity > snap.balance);
    }

    #[test]
    fn baseline_first_observation_seeds_both_fields() {
        let day = Utc::now().date_naive();
        let b = advance_daily_baseline(None, Uuid::nil(), day, Micros::new(10_000_000_000));
        assert_eq!(b.day_start_equity, Micros::new(10_000_000_000));
        assert_eq!(b.min_equity, Micros::new(10_000_000_000));
    }

    #[test]
    fn baseline_same_day_only_tightens_minimum() {
        let day = Utc::now().date_naive();
        let b0 = advance_daily_baseline(None, Uuid::nil(), day, Micros::new(10_000_000_000));
        let b1 = advance_daily_baseline(Some(b0.clone()), Uuid::nil(), day, Micros::new(10_500_000_000));
        assert_eq!(b1.min_equity, Micros::new(10_000_000_000));
        let b2 = advance_daily_baseline(Some(b1), Uuid::nil(), day, Micros::new(9_800_000_000));
        assert_eq!(b2.min_equity, Micros::new(9_800_000_000));
        assert_eq!(b2.day_start_equity, Micros::new(10_000_000_000));
    }
}
