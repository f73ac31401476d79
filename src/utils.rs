//! # Utility Functions
//!
//! Timestamp helpers shared by the producer and consumer roles, and small
//! formatters used by the report.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp as nanoseconds since Unix epoch
///
/// Producers send this value as the message token and consumers subtract it
/// from their own clock reading, so both sides must use the wall clock
/// rather than a monotonic one.
///
/// If the system time is before the Unix epoch (very rare), returns 0
/// to provide a safe fallback rather than panicking.
pub fn current_timestamp_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

/// Seconds since the Unix epoch, used to name sample files
pub fn unix_time_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Latency in whole microseconds between a sent timestamp and now.
///
/// Integer division truncates toward zero, so sub-microsecond deliveries
/// record as 0.
pub fn latency_micros(sent_ns: i64, received_ns: i64) -> i64 {
    received_ns.saturating_sub(sent_ns) / 1000
}

/// Format an average latency the way the report prints it, e.g. `175.0μs`
pub fn format_avg_micros(micros: f64) -> String {
    format!("{:.1}μs", micros)
}

/// Format a slowdown ratio, e.g. `4.0x`
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.1}x", ratio)
}
