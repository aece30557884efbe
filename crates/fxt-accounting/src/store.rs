//! Accounting persistence (C8): account, positions, trades, snapshots, and
//! the daily equity baseline. Raw-query style, same as the candle store.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use fxt_schemas::{Account, AccountingSnapshot, DailyEquityBaseline, ExitReason, Micros, NettingPosition, Trade};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct AccountingStore {
    pool: PgPool,
}

fn row_to_account(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        balance: Micros::new(row.try_get("balance_micros")?),
        currency: row.try_get("currency")?,
        leverage: row.try_get("leverage")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_position(row: &PgRow) -> Result<NettingPosition> {
    Ok(NettingPosition {
        account_id: row.try_get("account_id")?,
        symbol: row.try_get("symbol")?,
        net_qty: row.try_get("net_qty")?,
        avg_entry_price: Micros::new(row.try_get("avg_entry_price_micros")?),
        updated_open_time: row.try_get("updated_open_time")?,
        stop_loss: row.try_get::<Option<i64>, _>("stop_loss_micros")?.map(Micros::new),
        take_profit: row.try_get::<Option<i64>, _>("take_profit_micros")?.map(Micros::new),
        realized_pnl_cum: Micros::new(row.try_get("realized_pnl_cum_micros")?),
        entry_order_id: row.try_get("entry_order_id")?,
    })
}

fn exit_reason_str(r: ExitReason) -> &'static str {
    match r {
        ExitReason::Sl => "SL",
        ExitReason::Tp => "TP",
        ExitReason::Manual => "MANUAL",
        ExitReason::Flip => "FLIP",
    }
}

impl AccountingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query("select * from account where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("accounting store unavailable (get_account)")?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn update_account_balance(&self, id: Uuid, balance: Micros, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("update account set balance_micros = $2, updated_at = $3 where id = $1")
            .bind(id)
            .bind(balance.raw())
            .bind(at)
            .execute(&self.pool)
            .await
            .context("accounting store unavailable (update_account_balance)")?;
        Ok(())
    }

    pub async fn get_position(&self, account_id: Uuid, symbol: &str) -> Result<Option<NettingPosition>> {
        let row = sqlx::query("select * from netting_positions where account_id = $1 and symbol = $2")
            .bind(account_id)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .context("accounting store unavailable (get_position)")?;
        row.as_ref().map(row_to_position).transpose()
    }

    pub async fn list_positions(&self, account_id: Uuid) -> Result<Vec<NettingPosition>> {
        let rows = sqlx::query("select * from netting_positions where account_id = $1 and net_qty <> 0")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .context("accounting store unavailable (list_positions)")?;
        rows.iter().map(row_to_position).collect()
    }

    pub async fn upsert_position(&self, pos: &NettingPosition) -> Result<()> {
        sqlx::query(
            "insert into netting_positions \
             (account_id, symbol, net_qty, avg_entry_price_micros, updated_open_time, \
              stop_loss_micros, take_profit_micros, realized_pnl_cum_micros, entry_order_id) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             on conflict (account_id, symbol) do update set \
               net_qty = excluded.net_qty, \
               avg_entry_price_micros = excluded.avg_entry_price_micros, \
               updated_open_time = excluded.updated_open_time, \
               stop_loss_micros = excluded.stop_loss_micros, \
               take_profit_micros = excluded.take_profit_micros, \
               realized_pnl_cum_micros = excluded.realized_pnl_cum_micros, \
               entry_order_id = excluded.entry_order_id",
        )
        .bind(pos.account_id)
        .bind(&pos.symbol)
        .bind(pos.net_qty)
        .bind(pos.avg_entry_price.raw())
        .bind(pos.updated_open_time)
        .bind(pos.stop_loss.map(|p| p.raw()))
        .bind(pos.take_profit.map(|p| p.raw()))
        .bind(pos.realized_pnl_cum.raw())
        .bind(pos.entry_order_id)
        .execute(&self.pool)
        .await
        .context("accounting store unavailable (upsert_position)")?;
        Ok(())
    }

    pub async fn insert_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            "insert into trades \
             (id, entry_ts, exit_ts, symbol, qty, entry_price_micros, exit_price_micros, \
              pnl_micros, exit_reason, entry_order_id, exit_order_id) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::new_v4())
        .bind(trade.entry_ts)
        .bind(trade.exit_ts)
        .bind(&trade.symbol)
        .bind(trade.qty)
        .bind(trade.entry_price.raw())
        .bind(trade.exit_price.raw())
        .bind(trade.pnl.raw())
        .bind(exit_reason_str(trade.exit_reason))
        .bind(trade.entry_order_id)
        .bind(trade.exit_order_id)
        .execute(&self.pool)
        .await
        .context("accounting store unavailable (insert_trade)")?;
        Ok(())
    }

    pub async fn insert_snapshot(&self, snap: &AccountingSnapshot) -> Result<()> {
        sqlx::query(
            "insert into accounting_snapshots \
             (account_id, asof_open_time, balance_micros, equity_micros, unrealized_pnl_micros, \
              margin_used_micros, free_margin_micros) \
             values ($1, $2, $3, $4, $5, $6, $7) \
             on conflict (account_id, asof_open_time) do update set \
               balance_micros = excluded.balance_micros, \
               equity_micros = excluded.equity_micros, \
               unrealized_pnl_micros = excluded.unrealized_pnl_micros, \
               margin_used_micros = excluded.margin_used_micros, \
               free_margin_micros = excluded.free_margin_micros \
             where accounting_snapshots.equity_micros <> excluded.equity_micros",
        )
        .bind(snap.account_id)
        .bind(snap.asof_open_time)
        .bind(snap.balance.raw())
        .bind(snap.equity.raw())
        .bind(snap.unrealized_pnl.raw())
        .bind(snap.margin_used.raw())
        .bind(snap.free_margin.raw())
        .execute(&self.pool)
        .await
        .context("accounting store unavailable (insert_snapshot)")?;
        Ok(())
    }

    pub async fn get_daily_baseline(&self, account_id: Uuid, day: NaiveDate) -> Result<Option<DailyEquityBaseline>> {
        let row = sqlx::query("select * from daily_equity_baseline where account_id = $1 and day = $2")
            .bind(account_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await
            .context("accounting store unavailable (get_daily_baseline)")?;
        row.as_ref()
            .map(|r| {
                Ok::<_, anyhow::Error>(DailyEquityBaseline {
                    account_id: r.try_get("account_id")?,
                    day: r.try_get("day")?,
                    day_start_equity: Micros::new(r.try_get("day_start_equity_micros")?),
                    min_equity: Micros::new(r.try_get("min_equity_micros")?),
                })
            })
            .transpose()
    }

    pub async fn upsert_daily_baseline(&self, baseline: &DailyEquityBaseline) -> Result<()> {
        sqlx::query(
            "insert into daily_equity_baseline (account_id, day, day_start_equity_micros, min_equity_micros) \
             values ($1, $2, $3, $4) \
             on conflict (account_id, day) do update set \
               min_equity_micros = excluded.min_equity_micros",
        )
        .bind(baseline.account_id)
        .bind(baseline.day)
        .bind(baseline.day_start_equity.raw())
        .bind(baseline.min_equity.raw())
        .execute(&self.pool)
        .await
        .context("accounting store unavailable (upsert_daily_baseline)")?;
        Ok(())
    }
}
