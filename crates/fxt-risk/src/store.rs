//! Risk limits persistence (C6): one row per account, read by the
//! orchestrator before every [`crate::evaluate`] call.

use anyhow::{Context, Result};
use fxt_schemas::{Micros, RiskLimits};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct RiskLimitsStore {
    pool: PgPool,
}

impl RiskLimitsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, account_id: Uuid) -> Result<Option<RiskLimits>> {
        let row = sqlx::query("select * from risk_limits where account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .context("risk limits store unavailable (get)")?;
        row.map(|r| {
            Ok::<_, anyhow::Error>(RiskLimits {
                account_id: r.try_get("account_id")?,
                max_open_positions: r.try_get("max_open_positions")?,
                max_open_positions_per_symbol: r.try_get("max_open_positions_per_symbol")?,
                max_total_notional: Micros::new(r.try_get("max_total_notional_micros")?),
                max_symbol_notional: Micros::new(r.try_get("max_symbol_notional_micros")?),
                risk_per_trade_pct: r.try_get("risk_per_trade_pct")?,
                daily_loss_limit_pct: r.try_get("daily_loss_limit_pct")?,
                daily_loss_limit_amount: Micros::new(r.try_get("daily_loss_limit_amount_micros")?),
                leverage: r.try_get("leverage")?,
                lot_step: r.try_get("lot_step")?,
            })
        })
        .transpose()
    }

    pub async fn upsert(&self, limits: &RiskLimits) -> Result<()> {
        sqlx::query(
            "insert into risk_limits \
             (account_id, max_open_positions, max_open_positions_per_symbol, max_total_notional_micros, \
              max_symbol_notional_micros, risk_per_trade_pct, daily_loss_limit_pct, \
              daily_loss_limit_amount_micros, leverage, lot_step) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             on conflict (account_id) do update set \
               max_open_positions = excluded.max_open_positions, \
               max_open_positions_per_symbol = excluded.max_open_positions_per_symbol, \
               max_total_notional_micros = excluded.max_total_notional_micros, \
               max_symbol_notional_micros = excluded.max_symbol_notional_micros, \
               risk_per_trade_pct = excluded.risk_per_trade_pct, \
               daily_loss_limit_pct = excluded.daily_loss_limit_pct, \
               daily_loss_limit_amount_micros = excluded.daily_loss_limit_amount_micros, \
               leverage = excluded.leverage, \
               lot_step = excluded.lot_step",
        )
        .bind(limits.account_id)
        .bind(limits.max_open_positions)
        .bind(limits.max_open_positions_per_symbol)
        .bind(limits.max_total_notional.raw())
        .bind(limits.max_symbol_notional.raw())
        .bind(limits.risk_per_trade_pct)
        .bind(limits.daily_loss_limit_pct)
        .bind(limits.daily_loss_limit_amount.raw())
        .bind(limits.leverage)
        .bind(limits.lot_step)
        .execute(&self.pool)
        .await
        .context("risk limits store unavailable (upsert)")?;
        Ok(())
    }
}
