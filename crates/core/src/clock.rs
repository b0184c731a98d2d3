//! Injectable clock
//!
//! Every timestamp the core writes goes through a `Clock` so tests can force
//! `updated_at` into the past without sleeping (see the decay scenario in
//! spec §8).

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns a fixed instant, advanced explicitly by
/// tests. Not part of the public API surface beyond `#[cfg(test)]`/dev use,
/// but exported so integration tests in the workspace can use it too.
#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock fixed at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            inner: std::sync::Mutex::new(at),
        }
    }

    /// Move the clock forward (or backward) by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.inner.lock().expect("FixedClock lock poisoned");
        *guard = *guard + delta;
    }

    /// Set the clock to an explicit instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.inner.lock().expect("FixedClock lock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().expect("FixedClock lock poisoned")
    }
}
