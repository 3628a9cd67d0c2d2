//! Per-sender sliding-window rate limiter.

use crate::clock::Clock;
use alloy::primitives::Address;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Admission store for the rate-limit gate.
pub trait RateLimitStore: Send + Sync {
    /// Record an attempt for `sender`; `false` when the window is full.
    fn admit(&self, sender: Address) -> bool;

    /// Drop stale timestamps and empty senders. Returns senders removed.
    fn purge_expired(&self) -> usize;

    /// Number of senders currently tracked.
    fn tracked(&self) -> usize;
}

/// In-memory limiter: one mutex over all windows, reset on restart.
pub struct MemoryRateLimiter {
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<Address, VecDeque<Duration>>>,
}

impl MemoryRateLimiter {
    pub fn new(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn prune(window: &mut VecDeque<Duration>, now: Duration, span: Duration) {
        while let Some(&oldest) = window.front() {
            if now.saturating_sub(oldest) >= span {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimitStore for MemoryRateLimiter {
    fn admit(&self, sender: Address) -> bool {
        let now = self.clock.now();
        // Check and append under one lock so concurrent callers cannot overshoot.
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(sender).or_default();
        Self::prune(window, now, self.window);
        if window.len() >= self.max_requests {
            return false;
        }
        window.push_back(now);
        true
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, window| {
            Self::prune(window, now, self.window);
            !window.is_empty()
        });
        before - windows.len()
    }

    fn tracked(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
