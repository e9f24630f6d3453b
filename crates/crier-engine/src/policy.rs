//! Retry policy and reference-timezone handling.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};

use crier_roster::TIMESTAMP_FORMAT;

use crate::error::EngineError;

/// Default delay before a busy/no-answer recipient is tried again.
pub const DEFAULT_RETRY_DELAY_MINUTES: i64 = 30;

/// Default cap on placed-call attempts per recipient per day.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default reference timezone offset for persisted instants.
pub const DEFAULT_REFERENCE_OFFSET: &str = "+05:30";

/// When and how often a recipient is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between a retryable outcome and the next attempt.
    pub retry_delay: Duration,
    /// Maximum placed-call attempts before a recipient is finalized as Failed.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY_MINUTES, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Create a policy with the given delay in minutes and attempts cap.
    pub fn new(retry_delay_minutes: i64, max_attempts: u32) -> Self {
        Self {
            retry_delay: Duration::minutes(retry_delay_minutes),
            max_attempts,
        }
    }

    /// The instant the next retry is due, counted from now.
    pub fn next_retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.retry_delay
    }

    /// Whether a recipient with this many placed attempts may be tried again.
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// The single fixed timezone in which all persisted instants are formatted
/// and parsed. In-memory arithmetic stays in UTC; this only governs the
/// read/write boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::parse(DEFAULT_REFERENCE_OFFSET).expect("default offset is valid")
    }
}

impl ReferenceZone {
    /// Create a reference zone from a fixed offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parse an offset of the form `+05:30` or `-08:00`.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidZone(s.to_string());

        let (sign, rest) = match s.split_at_checked(1) {
            Some(("+", rest)) => (1i32, rest),
            Some(("-", rest)) => (-1i32, rest),
            _ => return Err(invalid()),
        };

        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if hours > 14 || minutes > 59 {
            return Err(invalid());
        }

        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(invalid)?;
        Ok(Self { offset })
    }

    /// The underlying fixed offset.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Format an instant as a persisted timestamp cell.
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Parse a persisted timestamp cell back into an instant.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>, EngineError> {
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|e| {
            EngineError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            }
        })?;

        // A fixed offset maps every local time to exactly one instant.
        naive
            .and_local_timezone(self.offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| EngineError::InvalidTimestamp {
                value: s.to_string(),
                reason: "ambiguous local time".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_parse_offsets() {
        assert_eq!(
            ReferenceZone::parse("+05:30").unwrap().offset(),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
        );
        assert_eq!(
            ReferenceZone::parse("-08:00").unwrap().offset(),
            FixedOffset::west_opt(8 * 3600).unwrap()
        );
        assert_eq!(
            ReferenceZone::parse("+00:00").unwrap().offset(),
            FixedOffset::east_opt(0).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for s in ["", "05:30", "+5", "+25:00", "+05:75", "+aa:bb"] {
            assert!(ReferenceZone::parse(s).is_err(), "{s}");
        }
    }

    #[test]
    fn test_default_zone_is_ist() {
        let zone = ReferenceZone::default();
        assert_eq!(
            zone.offset(),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
        );
    }

    #[test]
    fn test_format_shifts_into_zone() {
        let zone = ReferenceZone::default();
        // 03:30 UTC is 09:00 IST
        let instant = Utc.with_ymd_and_hms(2026, 8, 1, 3, 30, 0).unwrap();
        assert_eq!(zone.format(instant), "2026-08-01 09:00:00");
    }

    #[test]
    fn test_parse_timestamp_interprets_in_zone() {
        let zone = ReferenceZone::default();
        let instant = zone.parse_timestamp("2026-08-01 09:00:00").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 8, 1, 3, 30, 0).unwrap());
    }

    #[test]
    fn test_retry_policy_arithmetic() {
        let policy = RetryPolicy::new(30, 4);
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        assert_eq!(
            policy.next_retry_at(now),
            Utc.with_ymd_and_hms(2026, 8, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_attempts_cap() {
        let policy = RetryPolicy::new(30, 4);
        assert!(!policy.attempts_exhausted(0));
        assert!(!policy.attempts_exhausted(3));
        assert!(policy.attempts_exhausted(4));
        assert!(policy.attempts_exhausted(5));
    }

    proptest! {
        // Every second-precision instant survives the write/read boundary
        #[test]
        fn timestamp_codec_roundtrip(secs in 0i64..4_102_444_800) {
            let zone = ReferenceZone::default();
            let instant = Utc.timestamp_opt(secs, 0).unwrap();

            let cell = zone.format(instant);
            let parsed = zone.parse_timestamp(&cell).unwrap();

            prop_assert_eq!(parsed, instant);
        }

        // Formatting is injective down to the second in any parseable zone
        #[test]
        fn timestamp_format_is_stable_across_zones(
            secs in 0i64..4_102_444_800,
            east in proptest::bool::ANY,
            hours in 0i32..14,
            minutes in 0i32..60,
        ) {
            let offset = format!("{}{:02}:{:02}", if east { "+" } else { "-" }, hours, minutes);
            let zone = ReferenceZone::parse(&offset).unwrap();
            let instant = Utc.timestamp_opt(secs, 0).unwrap();

            let parsed = zone.parse_timestamp(&zone.format(instant)).unwrap();
            prop_assert_eq!(parsed, instant);
        }

        // Retry delay never moves the due time backwards
        #[test]
        fn retry_is_strictly_later(delay_minutes in 1i64..1440) {
            let policy = RetryPolicy::new(delay_minutes, 4);
            let now = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
            prop_assert!(policy.next_retry_at(now) > now);
        }
    }
}
