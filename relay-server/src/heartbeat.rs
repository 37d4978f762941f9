//! Tracks last-activity time for a single relay connection without a
//! mutex, so both the read loop and the heartbeat ticker can touch/check
//! it cheaply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ActivityTracker {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        })
    }

    pub fn touch(&self) {
        self.last_ms
            .store(self.origin.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    pub fn is_stale(&self, timeout: Duration) -> bool {
        let now_ms = self.origin.elapsed().as_millis() as u64;
        let last_ms = self.last_ms.load(Ordering::Relaxed);
        now_ms.saturating_sub(last_ms) > timeout.as_millis() as u64
    }
}
