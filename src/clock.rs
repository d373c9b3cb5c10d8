//! Time source for freshness decisions.
//!
//! Responses are stamped and expiry is judged against a [`Clock`] carried in
//! [`Options`](crate::options::Options), so tests can move time forward
//! without sleeping.

use std::fmt;

use chrono::{DateTime, Utc};

/// Supplies the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clock({})", self.now())
    }
}
