//! Injectable time source and timestamp formatting.

use chrono::{DateTime, SecondsFormat, Utc};

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

/// Source of the current wall-clock instant.
///
/// The client never reads the system clock directly; it goes through this
/// trait so tests can pin time to a fixed instant.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Format an instant as an RFC3339 UTC string with fixed-width nanosecond
/// precision and a `Z` suffix.
///
/// Fixed width keeps lexicographic order on stored timestamps identical to
/// chronological order, which the queue index sort key relies on.
pub fn format_rfc3339_nano(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an RFC3339 timestamp back into a UTC instant.
///
/// Accepts any valid RFC3339 input, not only the output of
/// [`format_rfc3339_nano`].
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}
