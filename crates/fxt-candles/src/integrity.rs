//! Integrity reporting over a stored candle window (spec C2).
//!
//! The grid is continuous: exchange sessions are not modeled, so "expected
//! count" is simply the number of timeframe slots between `start` and `end`
//! inclusive.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissingRange {
    pub first_missing_open_time: DateTime<Utc>,
    pub last_missing_open_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub expected: u64,
    pub actual: u64,
    pub missing_ranges: Vec<MissingRange>,
    pub duplicates_count: u64,
    pub is_complete: bool,
}

/// Build an integrity report for `[start, end]` given the set of `open_time`
/// values currently stored for `(symbol, timeframe)` inside that window.
///
/// `stored_open_times` need not be sorted or deduplicated; duplicates are
/// counted and collapsed before gap detection runs.
pub fn build_report(
    stored_open_times: &[DateTime<Utc>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeframe_label: &str,
) -> Result<IntegrityReport, String> {
    let step = timeframe::step_secs(timeframe_label)
        .ok_or_else(|| format!("unknown timeframe '{timeframe_label}'"))?;
    if end < start {
        return Err(format!("end {end} precedes start {start}"));
    }

    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for t in stored_open_times {
        let secs = t.timestamp();
        if secs >= start.timestamp() && secs <= end.timestamp() {
            *counts.entry(secs).or_insert(0) += 1;
        }
    }

    let duplicates_count: u64 = counts.values().filter(|&&c| c > 1).map(|c| c - 1).sum();

    let start_slot = start.timestamp() - start.timestamp().rem_euclid(step);
    let end_slot = end.timestamp() - end.timestamp().rem_euclid(step);
    let expected: u64 = (((end_slot - start_slot) / step) + 1).max(0) as u64;

    let actual = counts.len() as u64;

    let mut missing_ranges = Vec::new();
    let mut run_start: Option<i64> = None;
    let mut prev_missing: Option<i64> = None;
    let mut slot = start_slot;
    while slot <= end_slot {
        let present = counts.contains_key(&slot);
        if !present {
            if run_start.is_none() {
                run_start = Some(slot);
            }
            prev_missing = Some(slot);
        } else if let (Some(rs), Some(pm)) = (run_start, prev_missing) {
            missing_ranges.push(MissingRange {
                first_missing_open_time: DateTime::from_timestamp(rs, 0).unwrap(),
                last_missing_open_time: DateTime::from_timestamp(pm, 0).unwrap(),
            });
            run_start = None;
            prev_missing = None;
        }
        slot += step;
    }
    if let (Some(rs), Some(pm)) = (run_start, prev_missing) {
        missing_ranges.push(MissingRange {
            first_missing_open_time: DateTime::from_timestamp(rs, 0).unwrap(),
            last_missing_open_time: DateTime::from_timestamp(pm, 0).unwrap(),
        });
    }

    let earliest = stored_open_times.iter().min().copied();
    let latest = stored_open_times.iter().max().copied();
    let is_complete = missing_ranges.is_empty() && duplicates_count == 0;

    Ok(IntegrityReport {
        earliest,
        latest,
        expected,
        actual,
        missing_ranges,
        duplicates_count,
        is_complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn contiguous_window_is_complete() {
        let times: Vec<_> = (0..5).map(|i| at(i * 300)).collect();
        let report = build_report(&times, at(0), at(1200), "M5").unwrap();
        assert!(report.is_complete);
        assert_eq!(report.expected, 5);
        assert_eq!(report.actual, 5);
        assert!(report.missing_ranges.is_empty());
    }

    #[test]
    fn single_missing_slot_is_reported() {
        let times: Vec<_> = [0, 300, 900, 1200].iter().map(|&s| at(s)).collect();
        let report = build_report(&times, at(0), at(1200), "M5").unwrap();
        assert!(!report.is_complete);
        assert_eq!(report.missing_ranges.len(), 1);
        assert_eq!(report.missing_ranges[0].first_missing_open_time, at(600));
        assert_eq!(report.missing_ranges[0].last_missing_open_time, at(600));
    }

    #[test]
    fn duplicate_timestamp_is_counted_and_not_doubled_in_actual() {
        let times: Vec<_> = [0, 0, 300].iter().map(|&s| at(s)).collect();
        let report = build_report(&times, at(0), at(300), "M5").unwrap();
        assert_eq!(report.duplicates_count, 1);
        assert_eq!(report.actual, 2);
        assert!(!report.is_complete);
    }
}
