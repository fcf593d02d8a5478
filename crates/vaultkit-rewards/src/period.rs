//! Period numbering.
//!
//! A period is `unix_time / period_secs`. Each distribution carries the
//! period it belongs to.

/// Default period length in seconds (24 hours).
pub const DEFAULT_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Period containing `unix_secs`.
pub fn period_at(unix_secs: u64, period_secs: u64) -> u64 {
    unix_secs.checked_div(period_secs).unwrap_or(0)
}

/// Seconds since the Unix epoch.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Seconds until the next period boundary.
pub fn seconds_until_next_period(unix_secs: u64, period_secs: u64) -> u64 {
    if period_secs == 0 {
        return 0;
    }
    period_secs - (unix_secs % period_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_at() {
        assert_eq!(period_at(0, DEFAULT_PERIOD_SECS), 0);
        assert_eq!(period_at(86_399, DEFAULT_PERIOD_SECS), 0);
        assert_eq!(period_at(86_400, DEFAULT_PERIOD_SECS), 1);
        assert_eq!(period_at(1_700_000_000, 3_600), 472_222);
        assert_eq!(period_at(5, 0), 0);
    }

    #[test]
    fn test_seconds_until_next() {
        assert_eq!(seconds_until_next_period(86_400, DEFAULT_PERIOD_SECS), 86_400);
        assert_eq!(seconds_until_next_period(86_399, DEFAULT_PERIOD_SECS), 1);
    }
}
