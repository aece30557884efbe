//! Candle store (C1) and ingestion/integrity (C2).

pub mod ingest;
pub mod integrity;
pub mod provider;
pub mod store;
pub mod timeframe;
pub mod validate;

pub use ingest::{backfill, ingest, IngestOutcome};
pub use integrity::{build_report, IntegrityReport, MissingRange};
pub use provider::{CandleProvider, HttpCandleProvider, MockCandleProvider};
pub use store::{CandleStore, StoreError};
pub use validate::{validate, RawCandle, ValidationError};
