//! Time-bounded cache for the last risk summary
//!
//! One slot, overwritten on every fresh computation and never persisted.
//! Time comes from an injected [`Clock`] so callers control expiry.

use crate::types::RiskSummary;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cached summary and when it was computed
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub summary: RiskSummary,
    pub computed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.computed_at
    }
}

pub struct SummaryCache {
    ttl: chrono::Duration,
    slot: Mutex<Option<CacheEntry>>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            slot: Mutex::new(None),
        }
    }

    /// Last entry regardless of age
    pub fn get(&self) -> Option<CacheEntry> {
        self.slot.lock().clone()
    }

    /// Replace the slot
    pub fn set(&self, summary: RiskSummary, computed_at: DateTime<Utc>) {
        *self.slot.lock() = Some(CacheEntry {
            summary,
            computed_at,
        });
    }

    /// Entry younger than the TTL at `now`
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.slot
            .lock()
            .as_ref()
            .filter(|entry| entry.age(now) < self.ttl)
            .cloned()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}
