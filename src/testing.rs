//! Test helpers

use crate::cache::Clock;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        *self.now.lock() += step;
    }
}

impl Default for ManualClock {
    /// Starts at 2025-01-01T00:00:00Z
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
