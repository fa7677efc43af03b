//! Deterministic clock abstraction for testable expiry logic.

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `start + days * day_length`, or `None` if that is not representable.
pub fn days_after(
    start: DateTime<Utc>,
    day_length: chrono::Duration,
    days: i64,
) -> Option<DateTime<Utc>> {
    let span_ms = day_length.num_milliseconds().checked_mul(days)?;
    let span = chrono::Duration::try_milliseconds(span_ms)?;
    start.checked_add_signed(span)
}

/// Mock clock for deterministic testing.
///
/// Interior mutability lets a test keep advancing a clock that has
/// already been handed to an engine behind an `Arc`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::RwLock<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::RwLock::new(now),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.write().expect("mock clock lock");
        *now = *now + duration;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write().expect("mock clock lock") = instant;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().expect("mock clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn system_clock_returns_time() {
        let clock = SystemClock;
        let now = clock.now_utc();
        assert!(now.year() >= 2024);
    }

    #[test]
    fn mock_clock_is_deterministic() {
        let clock = MockClock::from_rfc3339("2025-08-21T00:00:00Z");
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-08-21T00:00:00+00:00");
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-08-21T00:00:00+00:00");
    }

    #[test]
    fn mock_clock_advances_through_shared_reference() {
        let clock = std::sync::Arc::new(MockClock::from_rfc3339("2025-08-21T00:00:00Z"));
        let shared: std::sync::Arc<dyn Clock> = clock.clone();
        clock.advance(chrono::Duration::days(30));
        assert_eq!(shared.now_utc().to_rfc3339(), "2025-09-20T00:00:00+00:00");
    }

    #[test]
    fn days_after_is_absolute() {
        let start = MockClock::from_rfc3339("2025-08-21T00:00:00Z").now_utc();
        let end = days_after(start, chrono::Duration::days(1), 30).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-09-20T00:00:00+00:00");
    }

    #[test]
    fn days_after_overflow_is_none() {
        let start = MockClock::from_rfc3339("2025-08-21T00:00:00Z").now_utc();
        assert!(days_after(start, chrono::Duration::days(1), i64::MAX).is_none());
        assert!(days_after(start, chrono::Duration::days(1), 1_000_000_000).is_none());
    }

    #[test]
    fn mock_clock_set_jumps() {
        let clock = MockClock::from_rfc3339("2025-08-21T00:00:00Z");
        let target = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        clock.set(target);
        assert_eq!(clock.now_utc(), target);
    }
}
