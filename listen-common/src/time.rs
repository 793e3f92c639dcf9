//! Timestamp utilities

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Timestamp `days` days before `from`
pub fn days_before(from: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    from - ChronoDuration::days(days)
}

/// Calendar day (UTC) of a timestamp, formatted `YYYY-MM-DD`
///
/// Used as the bucket key for per-day play counts.
pub fn day_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_days_before_crosses_month() {
        let from = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let earlier = days_before(from, 30);
        assert_eq!(day_key(&earlier), "2024-01-31");
    }

    #[test]
    fn test_day_key_uses_utc_date() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(day_key(&ts), "2024-12-31");
    }
}
