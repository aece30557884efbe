//! Orchestration (C9): drives one deterministic cycle per closed candle
//! through candles -> strategy -> risk -> execution -> accounting, and
//! persists a retry-safe run report for every cycle attempted.

mod cycle;
mod reports;

pub use cycle::{run_cycle, CycleConfig, CycleOutcome, SINGLETON_ACCOUNT_ID};
pub use reports::RunReportStore;
