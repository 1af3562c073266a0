//! Wall-clock abstraction.
//!
//! Ledger entries and engine events are timestamped through this trait so
//! tests can pin time with a fixed clock.

use chrono::{DateTime, Utc};

/// Source of timestamps for ledger entries and event envelopes.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
