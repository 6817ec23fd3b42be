//! Source of the processing instant.

use chrono::Duration;
use crmsync_types::SyncTimestamp;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> SyncTimestamp;
}

/// Wall clock, UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SyncTimestamp {
        SyncTimestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<SyncTimestamp>,
}

impl FixedClock {
    pub fn new(now: SyncTimestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: SyncTimestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = SyncTimestamp::from_datetime(now.to_datetime() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SyncTimestamp {
        self.now.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
