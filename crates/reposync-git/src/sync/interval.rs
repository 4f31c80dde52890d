//! Poll interval normalization.

use std::time::Duration;

/// Raw values at or above this are milliseconds; below it, seconds.
pub const MILLIS_THRESHOLD: u64 = 1000;

/// Converts a record's raw `sync_interval` into a sleep duration.
///
/// Values `>= 1000` are milliseconds and are truncated to whole seconds, so
/// `5000` is five seconds and `1000` is one second. Smaller values are already
/// seconds: `500` is five hundred seconds. A missing or zero value falls back
/// to `default`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use reposync_git::sync::normalize_interval;
///
/// let default = Duration::from_secs(30);
/// assert_eq!(normalize_interval(Some(3000), default), Duration::from_secs(3));
/// assert_eq!(normalize_interval(Some(45), default), Duration::from_secs(45));
/// assert_eq!(normalize_interval(None, default), default);
/// ```
pub fn normalize_interval(raw: Option<u64>, default: Duration) -> Duration {
    match raw {
        None | Some(0) => default,
        Some(raw) if raw >= MILLIS_THRESHOLD => Duration::from_secs(raw / 1000),
        Some(secs) => Duration::from_secs(secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(30);

    #[test]
    fn test_below_threshold_is_seconds() {
        assert_eq!(normalize_interval(Some(500), DEFAULT), Duration::from_secs(500));
        assert_eq!(normalize_interval(Some(999), DEFAULT), Duration::from_secs(999));
        assert_eq!(normalize_interval(Some(1), DEFAULT), Duration::from_secs(1));
    }

    #[test]
    fn test_at_or_above_threshold_is_millis() {
        assert_eq!(normalize_interval(Some(5000), DEFAULT), Duration::from_secs(5));
        assert_eq!(normalize_interval(Some(3000), DEFAULT), Duration::from_secs(3));
        assert_eq!(normalize_interval(Some(1500), DEFAULT), Duration::from_secs(1));
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(normalize_interval(Some(1000), DEFAULT), Duration::from_secs(1));
        assert_eq!(normalize_interval(Some(999), DEFAULT), Duration::from_secs(999));
    }

    #[test]
    fn test_missing_or_zero_uses_default() {
        assert_eq!(normalize_interval(None, DEFAULT), DEFAULT);
        assert_eq!(normalize_interval(Some(0), DEFAULT), DEFAULT);
    }
}
