//! Typed domain errors shared by every engine crate.
//!
//! Plumbing code (DB connections, config loading, vendor fetches) uses
//! `anyhow::Result` and narrates failures with `.context(...)`. Errors that
//! cross an engine boundary and need to be matched on by a caller (the
//! orchestrator deciding a run-report status, the daemon deciding an HTTP
//! status) use this enum instead, so the match is exhaustive and explicit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("deterministic safety error: {0}")]
    DeterministicSafety(String),

    #[error("risk rejected: {0}")]
    RiskRejected(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("idempotency conflict: {0}")]
    IdempotencyConflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("vendor unavailable: {0}")]
    VendorUnavailable(String),
}

impl EngineError {
    /// Stable machine-readable code, used in API error bodies and run reports.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::DeterministicSafety(_) => "DETERMINISTIC_SAFETY_ERROR",
            EngineError::RiskRejected(_) => "RISK_REJECTED",
            EngineError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            EngineError::IdempotencyConflict(_) => "IDEMPOTENCY_CONFLICT",
            EngineError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            EngineError::VendorUnavailable(_) => "VENDOR_UNAVAILABLE",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
