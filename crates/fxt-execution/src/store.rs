//! Order and fill persistence (C7). Mirrors the candle store's raw-query
//! style: `sqlx::query` + manual `row.try_get`, no compile-time macros.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fxt_schemas::{Fill, Micros, Order, OrderStatus, OrderType, Side};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct OrderStore {
    pool: PgPool,
}

fn parse_side(s: &str) -> Side {
    match s {
        "BUY" => Side::Buy,
        _ => Side::Sell,
    }
}

fn parse_status(s: &str) -> OrderStatus {
    match s {
        "NEW" => OrderStatus::New,
        "FILLED" => OrderStatus::Filled,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::Canceled,
    }
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        ts: row.try_get("ts")?,
        symbol: row.try_get("symbol")?,
        side: parse_side(row.try_get("side")?),
        order_type: OrderType::Market,
        qty: row.try_get("qty")?,
        status: parse_status(row.try_get("status")?),
        reason: row.try_get("reason")?,
        requested_price: row
            .try_get::<Option<i64>, _>("requested_price_micros")?
            .map(Micros::new),
        idempotency_key: row.try_get("idempotency_key")?,
    })
}

fn row_to_fill(row: &PgRow) -> Result<Fill> {
    Ok(Fill {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        ts: row.try_get("ts")?,
        symbol: row.try_get("symbol")?,
        side: parse_side(row.try_get("side")?),
        qty: row.try_get("qty")?,
        price: Micros::new(row.try_get("price_micros")?),
        fee: Micros::new(row.try_get("fee_micros")?),
        slippage: Micros::new(row.try_get("slippage_micros")?),
        accounted_at_open_time: row.try_get("accounted_at_open_time")?,
    })
}

impl OrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query("select * from orders where idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("order store unavailable (find_by_idempotency_key)")?;
        row.as_ref().map(row_to_order).transpose()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query("select * from orders where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("order store unavailable (get)")?;
        row.as_ref().map(row_to_order).transpose()
    }

    pub async fn list(&self, symbol: Option<&str>, status: Option<OrderStatus>, limit: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "select * from orders \
             where ($1::text is null or symbol = $1) \
               and ($2::text is null or status = $2) \
             order by ts desc limit $3",
        )
        .bind(symbol)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("order store unavailable (list)")?;
        rows.iter().map(row_to_order).collect()
    }

    pub async fn insert_new(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "insert into orders \
             (id, ts, symbol, side, order_type, qty, status, reason, requested_price_micros, idempotency_key) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id)
        .bind(order.ts)
        .bind(&order.symbol)
        .bind(order.side.as_str())
        .bind("MARKET")
        .bind(order.qty)
        .bind(order.status.as_str())
        .bind(&order.reason)
        .bind(order.requested_price.map(|p| p.raw()))
        .bind(&order.idempotency_key)
        .execute(&self.pool)
        .await
        .context("order store unavailable (insert_new)")?;
        Ok(())
    }

    pub async fn mark_filled(&self, order_id: Uuid, fill: &Fill) -> Result<()> {
        let mut tx = self.pool.begin().await.context("order store unavailable (mark_filled begin)")?;
        sqlx::query("update orders set status = 'FILLED' where id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .context("order store unavailable (mark_filled update)")?;
        sqlx::query(
            "insert into fills (id, order_id, ts, symbol, side, qty, price_micros, fee_micros, slippage_micros) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(fill.id)
        .bind(fill.order_id)
        .bind(fill.ts)
        .bind(&fill.symbol)
        .bind(fill.side.as_str())
        .bind(fill.qty)
        .bind(fill.price.raw())
        .bind(fill.fee.raw())
        .bind(fill.slippage.raw())
        .execute(&mut *tx)
        .await
        .context("order store unavailable (mark_filled insert fill)")?;
        tx.commit().await.context("order store unavailable (mark_filled commit)")?;
        Ok(())
    }

    pub async fn mark_rejected(&self, order_id: Uuid, reason: &str) -> Result<()> {
        sqlx::query("update orders set status = 'REJECTED', reason = $2 where id = $1")
            .bind(order_id)
            .bind(reason)
            .execute(&self.pool)
            .await
            .context("order store unavailable (mark_rejected)")?;
        Ok(())
    }

    pub async fn mark_canceled(&self, order_id: Uuid) -> Result<()> {
        sqlx::query("update orders set status = 'CANCELED' where id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .context("order store unavailable (mark_canceled)")?;
        Ok(())
    }

    pub async fn unaccounted_fills(&self) -> Result<Vec<Fill>> {
        let rows = sqlx::query(
            "select * from fills where accounted_at_open_time is null order by ts asc",
        )
        .fetch_all(&self.pool)
        .await
        .context("order store unavailable (unaccounted_fills)")?;
        rows.iter().map(row_to_fill).collect()
    }

    pub async fn mark_fill_accounted(&self, fill_id: Uuid, at_open_time: DateTime<Utc>) -> Result<()> {
        sqlx::query("update fills set accounted_at_open_time = $2 where id = $1")
            .bind(fill_id)
            .bind(at_open_time)
            .execute(&self.pool)
            .await
            .context("order store unavailable (mark_fill_accounted)")?;
        Ok(())
    }
}
