//! Severity throttling for repeated transport failures.
//!
//! During a collector outage every tick fails the same way. The first
//! failure, and the first one after each quiet window, goes out at `ERROR`;
//! the rest go out at `DEBUG` so they stay available without flooding logs.

use std::time::Duration;
use tokio::time::Instant;
use tracing::Level;

/// Picks the log level for each failure.
#[derive(Debug, Clone)]
pub struct ErrorLogLimiter {
    interval: Duration,
    last_error: Option<Instant>,
}

impl ErrorLogLimiter {
    /// Creates a limiter allowing one `ERROR` line per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_error: None,
        }
    }

    /// Level for a failure observed at `now`.
    ///
    /// Returns `ERROR` (and starts a new window) if no error-level line was
    /// emitted yet or the window since the last one has fully elapsed.
    pub fn level(&mut self, now: Instant) -> Level {
        let loud = match self.last_error {
            None => true,
            Some(last) => now > last + self.interval,
        };
        if loud {
            self.last_error = Some(now);
            Level::ERROR
        } else {
            Level::DEBUG
        }
    }

    /// The cooldown window.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// `tracing` macros need a constant level; dispatch on a runtime one.
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level: ::tracing::Level = $level;
        if level == ::tracing::Level::ERROR {
            ::tracing::error!($($arg)+)
        } else if level == ::tracing::Level::WARN {
            ::tracing::warn!($($arg)+)
        } else if level == ::tracing::Level::INFO {
            ::tracing::info!($($arg)+)
        } else if level == ::tracing::Level::DEBUG {
            ::tracing::debug!($($arg)+)
        } else {
            ::tracing::trace!($($arg)+)
        }
    }};
}

pub(crate) use log_at;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_is_loud() {
        let mut limiter = ErrorLogLimiter::new(Duration::from_secs(60));
        assert_eq!(limiter.level(Instant::now()), Level::ERROR);
    }

    #[test]
    fn test_sustained_outage() {
        // One failure per second for 70 seconds, starting at t=1.
        let start = Instant::now();
        let mut limiter = ErrorLogLimiter::new(Duration::from_secs(60));
        let loud: Vec<u64> = (1..=70)
            .filter(|t| limiter.level(start + Duration::from_secs(*t)) == Level::ERROR)
            .collect();
        assert_eq!(loud, vec![1, 62]);
    }

    #[test]
    fn test_zero_interval_is_always_loud() {
        let start = Instant::now();
        let mut limiter = ErrorLogLimiter::new(Duration::ZERO);
        for ms in 1..5 {
            assert_eq!(limiter.level(start + Duration::from_millis(ms)), Level::ERROR);
        }
    }
}
