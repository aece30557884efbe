//! Retention (C10): prune candles older than a configured horizon.
//!
//! The only place wall-clock enters the core. Pruned candles are never
//! referenced by a live cycle (the orchestrator only ever reads the latest
//! closed candle and a bounded trailing window), so this never touches
//! positions or equity.

use chrono::{DateTime, Utc};
use fxt_candles::CandleStore;
use tracing::info;

/// Delete candles for `symbol`/`timeframe` with `open_time < now - before_days`.
/// Returns `(deleted_count, cutoff_time)`.
pub async fn prune(
    store: &CandleStore,
    now: DateTime<Utc>,
    before_days: u32,
) -> anyhow::Result<(u64, DateTime<Utc>)> {
    let (deleted, cutoff) = store.prune(now, before_days).await?;
    info!(deleted, %cutoff, before_days, "retention prune complete");
    Ok((deleted, cutoff))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_before_days_prior_to_now() {
        let now = DateTime::parse_from_rfc3339("2026-01-10T00:00:00Z").unwrap().with_timezone(&Utc);
        let cutoff = now - chrono::Duration::days(7);
        assert_eq!(cutoff.date_naive().to_string(), "2026-01-03");
    }
}
