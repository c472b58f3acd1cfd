//! Timestamp normalization
//!
//! The cache stores timestamps as epoch seconds, epoch milliseconds or
//! ISO-8601 text depending on the table and upstream version. Everything
//! funnels through [`parse_timestamp`], which normalizes to fractional
//! epoch seconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

/// Parse a raw timestamp value to fractional epoch seconds.
///
/// Numbers are epoch seconds, or epoch milliseconds when the magnitude
/// says so. Strings are ISO-8601, with or without an offset (naive values
/// are read as UTC). Anything unparsable is `None`.
pub fn parse_timestamp(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => {
            let ts = n.as_f64()?;
            if ts > MILLIS_THRESHOLD {
                Some(ts / 1000.0)
            } else {
                Some(ts)
            }
        }
        Value::String(s) => parse_iso(s),
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64 / 1000.0);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis() as f64 / 1000.0);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp() as f64);
    }
    None
}
