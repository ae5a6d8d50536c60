use std::cell::Cell;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Source of the current instant. Core operations take `now` as a parameter;
/// only the outer loops read a clock.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Fires at most once per period, measured on the monotonic clock.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    last: Option<Instant>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Ticker {
            period: period.max(Duration::from_millis(10)),
            last: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True on the first call and then whenever a full period has passed
    /// since the last tick.
    pub fn poll(&mut self, at: Instant) -> bool {
        match self.last {
            Some(last) if at.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(at);
                true
            }
        }
    }

    /// Time left until `poll` would fire, zero when it is already due
    pub fn until_next(&self, at: Instant) -> Duration {
        match self.last {
            Some(last) => self
                .period
                .saturating_sub(at.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::from_millis(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock() {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), t0 + chrono::Duration::seconds(90));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }

    #[test]
    fn test_ticker_fires_once_per_period() {
        let start = Instant::now();
        let mut ticker = Ticker::from_millis(1000);
        assert_eq!(ticker.until_next(start), Duration::ZERO);
        assert!(ticker.poll(start));
        assert!(!ticker.poll(start));
        assert!(!ticker.poll(start + Duration::from_millis(999)));
        assert_eq!(
            ticker.until_next(start + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        assert!(ticker.poll(start + Duration::from_millis(1000)));
        assert!(!ticker.poll(start + Duration::from_millis(1500)));
        assert_eq!(
            ticker.until_next(start + Duration::from_millis(2500)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_ticker_minimum_period() {
        assert_eq!(Ticker::from_millis(0).period(), Duration::from_millis(10));
        assert_eq!(Ticker::default().period(), Duration::from_secs(1));
    }
}
