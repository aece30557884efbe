//! Candle store (C1): persistence for closed OHLCV bars.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fxt_schemas::{Candle, Micros};
use sqlx::{PgPool, Row};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub struct CandleStore {
    pool: PgPool,
}

fn row_to_candle(row: &sqlx::postgres::PgRow) -> Result<Candle> {
    Ok(Candle {
        symbol: row.try_get("symbol")?,
        timeframe: row.try_get("timeframe")?,
        open_time: row.try_get("open_time")?,
        open: Micros::new(row.try_get("open_micros")?),
        high: Micros::new(row.try_get("high_micros")?),
        low: Micros::new(row.try_get("low_micros")?),
        close: Micros::new(row.try_get("close_micros")?),
        volume: Micros::new(row.try_get("volume_micros")?),
        source: row.try_get("source")?,
        ingested_at: row.try_get("ingested_at")?,
    })
}

impl CandleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest stored candle for `(symbol, timeframe)`, if any.
    pub async fn latest(&self, symbol: &str, timeframe: &str) -> Result<Option<Candle>> {
        let row = sqlx::query(
            "select * from candles where symbol = $1 and timeframe = $2 \
             order by open_time desc limit 1",
        )
        .bind(symbol)
        .bind(timeframe)
        .fetch_optional(&self.pool)
        .await
        .context("candle store unavailable (latest)")?;

        row.as_ref().map(row_to_candle).transpose()
    }

    /// The single candle at exactly `open_time`, if stored.
    pub async fn get_at(&self, symbol: &str, timeframe: &str, open_time: DateTime<Utc>) -> Result<Option<Candle>> {
        let row = sqlx::query(
            "select * from candles where symbol = $1 and timeframe = $2 and open_time = $3",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(open_time)
        .fetch_optional(&self.pool)
        .await
        .context("candle store unavailable (get_at)")?;

        row.as_ref().map(row_to_candle).transpose()
    }

    /// The first stored candle with `open_time` strictly after `after`, if
    /// any — the next-open fill rule's reference lookup (C4).
    pub async fn next_after(&self, symbol: &str, timeframe: &str, after: DateTime<Utc>) -> Result<Option<Candle>> {
        let row = sqlx::query(
            "select * from candles where symbol = $1 and timeframe = $2 and open_time > $3 \
             order by open_time asc limit 1",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(after)
        .fetch_optional(&self.pool)
        .await
        .context("candle store unavailable (next_after)")?;

        row.as_ref().map(row_to_candle).transpose()
    }

    /// History in `[start, end]` (both optional), UTC, ordered by `open_time`.
    pub async fn range(
        &self,
        symbol: &str,
        timeframe: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            "select * from candles \
             where symbol = $1 and timeframe = $2 \
               and ($3::timestamptz is null or open_time >= $3) \
               and ($4::timestamptz is null or open_time <= $4) \
             order by open_time asc \
             limit $5",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("candle store unavailable (range)")?;

        rows.iter().map(row_to_candle).collect()
    }

    /// Idempotent upsert on `(symbol, timeframe, open_time)`: equal values
    /// are a no-op; differing OHLC overwrites (last writer by
    /// `ingested_at`). Returns the number of rows actually written/changed.
    pub async fn upsert_many(&self, candles: &[Candle]) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("candle store unavailable (upsert begin)")?;
        let mut changed = 0u64;
        for c in candles {
            let result = sqlx::query(
                "insert into candles \
                 (symbol, timeframe, open_time, open_micros, high_micros, low_micros, \
                  close_micros, volume_micros, source, ingested_at) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 on conflict (symbol, timeframe, open_time) do update set \
                   open_micros = excluded.open_micros, \
                   high_micros = excluded.high_micros, \
                   low_micros = excluded.low_micros, \
                   close_micros = excluded.close_micros, \
                   volume_micros = excluded.volume_micros, \
                   source = excluded.source, \
                   ingested_at = excluded.ingested_at \
                 where candles.open_micros <> excluded.open_micros \
                    or candles.high_micros <> excluded.high_micros \
                    or candles.low_micros <> excluded.low_micros \
                    or candles.close_micros <> excluded.close_micros \
                    or candles.volume_micros <> excluded.volume_micros",
            )
            .bind(&c.symbol)
            .bind(&c.timeframe)
            .bind(c.open_time)
            .bind(c.open.raw())
            .bind(c.high.raw())
            .bind(c.low.raw())
            .bind(c.close.raw())
            .bind(c.volume.raw())
            .bind(&c.source)
            .bind(c.ingested_at)
            .execute(&mut *tx)
            .await
            .context("candle store unavailable (upsert)")?;
            changed += result.rows_affected();
        }
        tx.commit().await.context("candle store unavailable (upsert commit)")?;
        Ok(changed)
    }

    /// Delete candles with `open_time < now - before_days`. Returns
    /// `(deleted_count, cutoff_time)`.
    pub async fn prune(&self, now: DateTime<Utc>, before_days: u32) -> Result<(u64, DateTime<Utc>)> {
        let cutoff = now - chrono::Duration::days(before_days as i64);
        let result = sqlx::query("delete from candles where open_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("candle store unavailable (prune)")?;
        Ok((result.rows_affected(), cutoff))
    }

    /// Raw `open_time`s stored for `(symbol, timeframe)` in `[start, end]`,
    /// used to build an integrity report.
    pub async fn open_times_in_window(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let rows = sqlx::query(
            "select open_time from candles \
             where symbol = $1 and timeframe = $2 and open_time between $3 and $4",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("candle store unavailable (open_times_in_window)")?;

        rows.iter().map(|r| r.try_get::<DateTime<Utc>, _>("open_time").map_err(Into::into)).collect()
    }
}
