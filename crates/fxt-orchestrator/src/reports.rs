//! Run report persistence (C9): one row per `(symbol, timeframe, candle_ts)`
//! cycle, written once and never mutated — re-running the same cycle is a
//! no-op against the unique index, which is what makes the orchestrator
//! retry-safe.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fxt_schemas::{RunReport, RunStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct RunReportStore {
    pool: PgPool,
}

fn parse_status(s: &str) -> RunStatus {
    match s {
        "OK" => RunStatus::Ok,
        "ERROR" => RunStatus::Error,
        _ => RunStatus::Noop,
    }
}

impl RunReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_for_cycle(
        &self,
        symbol: &str,
        timeframe: &str,
        candle_ts: DateTime<Utc>,
    ) -> Result<Option<RunReport>> {
        let row = sqlx::query(
            "select * from run_reports where symbol = $1 and timeframe = $2 and candle_ts = $3",
        )
        .bind(symbol)
        .bind(timeframe)
        .bind(candle_ts)
        .fetch_optional(&self.pool)
        .await
        .context("run report store unavailable (find_for_cycle)")?;
        row.map(|r| {
            Ok::<_, anyhow::Error>(RunReport {
                run_id: r.try_get("run_id")?,
                status: parse_status(r.try_get("status")?),
                symbol: r.try_get("symbol")?,
                timeframe: r.try_get("timeframe")?,
                candle_ts: r.try_get("candle_ts")?,
                intent: r.try_get("intent")?,
                risk: r.try_get("risk")?,
                order: r.try_get("order")?,
                fill: r.try_get("fill")?,
                positions: r.try_get("positions")?,
                account: r.try_get("account")?,
                summary_text: r.try_get("summary_text")?,
                telegram_text: r.try_get("telegram_text")?,
                error_text: r.try_get("error_text")?,
            })
        })
        .transpose()
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunReport>> {
        let row = sqlx::query("select * from run_reports where run_id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .context("run report store unavailable (get)")?;
        row.map(|r| {
            Ok::<_, anyhow::Error>(RunReport {
                run_id: r.try_get("run_id")?,
                status: parse_status(r.try_get("status")?),
                symbol: r.try_get("symbol")?,
                timeframe: r.try_get("timeframe")?,
                candle_ts: r.try_get("candle_ts")?,
                intent: r.try_get("intent")?,
                risk: r.try_get("risk")?,
                order: r.try_get("order")?,
                fill: r.try_get("fill")?,
                positions: r.try_get("positions")?,
                account: r.try_get("account")?,
                summary_text: r.try_get("summary_text")?,
                telegram_text: r.try_get("telegram_text")?,
                error_text: r.try_get("error_text")?,
            })
        })
        .transpose()
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<RunReport>> {
        let rows = sqlx::query("select * from run_reports order by created_at desc limit $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("run report store unavailable (list_recent)")?;
        rows.iter()
            .map(|r| {
                Ok::<_, anyhow::Error>(RunReport {
                    run_id: r.try_get("run_id")?,
                    status: parse_status(r.try_get("status")?),
                    symbol: r.try_get("symbol")?,
                    timeframe: r.try_get("timeframe")?,
                    candle_ts: r.try_get("candle_ts")?,
                    intent: r.try_get("intent")?,
                    risk: r.try_get("risk")?,
                    order: r.try_get("order")?,
                    fill: r.try_get("fill")?,
                    positions: r.try_get("positions")?,
                    account: r.try_get("account")?,
                    summary_text: r.try_get("summary_text")?,
                    telegram_text: r.try_get("telegram_text")?,
                    error_text: r.try_get("error_text")?,
                })
            })
            .collect()
    }

    /// Insert-once: a second write for the same `(symbol, timeframe,
    /// candle_ts)` is silently dropped by the unique index, so replaying a
    /// cycle after a crash never produces a second report.
    pub async fn insert_once(&self, report: &RunReport) -> Result<bool> {
        let result = sqlx::query(
            "insert into run_reports \
             (run_id, status, symbol, timeframe, candle_ts, intent, risk, \"order\", fill, \
              positions, account, summary_text, telegram_text, error_text) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             on conflict (symbol, timeframe, candle_ts) do nothing",
        )
        .bind(report.run_id)
        .bind(report.status.as_str())
        .bind(&report.symbol)
        .bind(&report.timeframe)
        .bind(report.candle_ts)
        .bind(&report.intent)
        .bind(&report.risk)
        .bind(&report.order)
        .bind(&report.fill)
        .bind(&report.positions)
        .bind(&report.account)
        .bind(&report.summary_text)
        .bind(&report.telegram_text)
        .bind(&report.error_text)
        .execute(&self.pool)
        .await
        .context("run report store unavailable (insert_once)")?;
        Ok(result.rows_affected() > 0)
    }
}
