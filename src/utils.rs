//! Utility functions
//!
//! Small formatting helpers shared by progress reporting and the run summary.

use std::time::Duration;

/// Integer percentage of `part` in `total`, capped at 100
///
/// An empty total counts as complete.
#[inline]
pub fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (part.saturating_mul(100) / total).min(100)
}

/// Format duration as a human-readable string
#[inline]
pub fn format_duration_verbose(dur: Duration) -> String {
    let secs = dur.as_secs();
    if secs >= 60 {
        format!("{} min {} sec", secs / 60, secs % 60)
    } else {
        format!("{:.1} sec", dur.as_secs_f64())
    }
}
