//! # Rate Limiting Stage
//!
//! Fixed-window request admission control per client key. Each key owns an
//! ordered window of admission timestamps; on every check, entries older
//! than the window are pruned lazily, then the request is admitted iff the
//! remaining count is below capacity.
//!
//! This is a fixed window, not sliding-window or token-bucket: bursts at
//! window boundaries can briefly reach 2x capacity across the boundary.
//! That is a documented characteristic of the algorithm, not a bug.
//!
//! The prune+count+append sequence for a key runs under that key's dashmap
//! entry guard, so concurrent admission checks for the same key serialize
//! and can never both observe `count < capacity` at capacity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

/// Per-key ordered window of admission timestamps
///
/// Timestamps are pushed in order, so pruning pops from the front until the
/// first unexpired entry.
#[derive(Debug, Default)]
struct RateWindow {
    admissions: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admissions.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Fixed-window rate limiter
///
/// Safe to share across tasks; all methods take `&self`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    windows: DashMap<String, RateWindow>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            windows: DashMap::new(),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Check whether a request for `key` is admitted at `now`
    ///
    /// On admission, `now` is appended to the key's window. The whole
    /// prune+count+append sequence holds the key's entry guard, making the
    /// check atomic per key.
    pub fn admit(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        let window = entry.value_mut();
        window.prune(now, self.window);

        if (window.admissions.len() as u32) < self.capacity {
            window.admissions.push_back(now);
            self.admitted.fetch_add(1, Ordering::Relaxed);
            debug!(
                key,
                in_window = window.admissions.len(),
                capacity = self.capacity,
                "request admitted"
            );
            true
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(key, capacity = self.capacity, "request throttled");
            false
        }
    }

    /// Number of unexpired admissions currently held for `key`
    pub fn in_window(&self, key: &str, now: Instant) -> usize {
        match self.windows.get_mut(key) {
            Some(mut entry) => {
                entry.value_mut().prune(now, self.window);
                entry.admissions.len()
            }
            None => 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Total admissions and rejections since construction
    pub fn counters(&self) -> (u64, u64) {
        (
            self.admitted.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }
}
