//! Validation and normalization of raw vendor bars into stored [`Candle`]s.
//!
//! Prices arrive from a vendor as decimal strings; they are converted to
//! [`Micros`] via [`Micros::parse_decimal`] (rejecting ambiguous >6-decimal
//! inputs) and then checked for OHLC sanity and timeframe-grid alignment.
//! A row that fails validation is skipped, not fatal to the batch (spec C1).

use chrono::{DateTime, Utc};
use fxt_schemas::{Candle, Micros};

use crate::timeframe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandle {
    pub symbol: String,
    pub timeframe: String,
    pub open_time: DateTime<Utc>,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BadPrice { field: &'static str, detail: String },
    OhlcViolation(String),
    NotAligned { open_time: DateTime<Utc>, timeframe: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::BadPrice { field, detail } => {
                write!(f, "invalid price field '{field}': {detail}")
            }
            ValidationError::OhlcViolation(msg) => write!(f, "OHLC sanity violation: {msg}"),
            ValidationError::NotAligned { open_time, timeframe } => {
                write!(f, "open_time {open_time} not aligned to timeframe {timeframe}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse and sanity-check one raw bar, producing a storable [`Candle`].
pub fn validate(raw: &RawCandle, ingested_at: DateTime<Utc>) -> Result<Candle, ValidationError> {
    let open = Micros::parse_decimal(&raw.open).map_err(|detail| ValidationError::BadPrice {
        field: "open",
        detail,
    })?;
    let high = Micros::parse_decimal(&raw.high).map_err(|detail| ValidationError::BadPrice {
        field: "high",
        detail,
    })?;
    let low = Micros::parse_decimal(&raw.low).map_err(|detail| ValidationError::BadPrice {
        field: "low",
        detail,
    })?;
    let close = Micros::parse_decimal(&raw.close).map_err(|detail| ValidationError::BadPrice {
        field: "close",
        detail,
    })?;
    let volume = Micros::parse_decimal(&raw.volume).map_err(|detail| ValidationError::BadPrice {
        field: "volume",
        detail,
    })?;

    if !timeframe::is_aligned(raw.open_time.timestamp(), &raw.timeframe) {
        return Err(ValidationError::NotAligned {
            open_time: raw.open_time,
            timeframe: raw.timeframe.clone(),
        });
    }

    let candle = Candle {
        symbol: raw.symbol.clone(),
        timeframe: raw.timeframe.clone(),
        open_time: raw.open_time,
        open,
        high,
        low,
        close,
        volume,
        source: raw.source.clone(),
        ingested_at,
    };

    if !candle.is_sane() {
        return Err(ValidationError::OhlcViolation(format!(
            "open={open} high={high} low={low} close={close}"
        )));
    }

    Ok(candle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(open: &str, high: &str, low: &str, close: &str) -> RawCandle {
        RawCandle {
            symbol: "EURUSD".into(),
            timeframe: "M5".into(),
            open_time: Utc.timestamp_opt(300, 0).unwrap(),
            open: open.into(),
            high: high.into(),
            low: low.into(),
            close: close.into(),
            volume: "100".into(),
            source: "test".into(),
        }
    }

    #[test]
    fn valid_bar_passes() {
        let r = raw("1.1000", "1.1010", "1.0990", "1.1005");
        assert!(validate(&r, Utc::now()).is_ok());
    }

    #[test]
    fn high_below_open_is_rejected() {
        let r = raw("1.1000", "1.0999", "1.0990", "1.0995");
        assert!(matches!(validate(&r, Utc::now()), Err(ValidationError::OhlcViolation(_))));
    }

    #[test]
    fn misaligned_open_time_is_rejected() {
        let mut r = raw("1.1000", "1.1010", "1.0990", "1.1005");
        r.open_time = Utc.timestamp_opt(301, 0).unwrap();
        assert!(matches!(validate(&r, Utc::now()), Err(ValidationError::NotAligned { .. })));
    }

    #[test]
    fn excess_precision_is_rejected() {
        let r = raw("1.12345678", "1.1010", "1.0990", "1.1005");
        assert!(matches!(validate(&r, Utc::now()), Err(ValidationError::BadPrice { .. })));
    }
}
