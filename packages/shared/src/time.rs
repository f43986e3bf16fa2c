//! Wall-clock helpers for timestamp fields and CLI display.

use chrono::{DateTime, Utc};

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond Unix timestamp as RFC 3339 (UTC).
///
/// Out-of-range values fall back to the raw number rather than panicking;
/// timestamps arrive from remote peers and are not validated by the relay.
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.to_rfc3339(),
        None => timestamp_millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_timestamp() {
        assert_eq!(millis_to_rfc3339(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn keeps_millisecond_precision() {
        let rendered = millis_to_rfc3339(1_500);
        assert!(rendered.starts_with("1970-01-01T00:00:01.5"), "{rendered}");
    }

    #[test]
    fn out_of_range_falls_back_to_raw() {
        assert_eq!(millis_to_rfc3339(i64::MAX), i64::MAX.to_string());
    }
}
