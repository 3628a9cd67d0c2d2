//! Duplicate-submission guard keyed by authorization slot.
//!
//! The mark happens at admission, before execution. A request that later
//! fails or times out still holds its key until the TTL lapses.

use crate::authorization::RequestKey;
use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replay-protection store.
pub trait IdempotencyStore: Send + Sync {
    /// Atomic test-and-set: `true` if `key` was absent (or expired) and is
    /// now marked, `false` if it is already held.
    fn try_mark_pending(&self, key: &RequestKey) -> bool;

    /// Remove expired records. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory guard; records carry their first-acceptance time.
pub struct MemoryIdempotencyStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<RequestKey, Duration>>,
}

impl MemoryIdempotencyStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn is_live(&self, accepted_at: Duration, now: Duration) -> bool {
        now.saturating_sub(accepted_at) < self.ttl
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn try_mark_pending(&self, key: &RequestKey) -> bool {
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&accepted_at) = records.get(key) {
            if self.is_live(accepted_at, now) {
                return false;
            }
        }
        records.insert(key.clone(), now);
        true
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|_, accepted_at| self.is_live(*accepted_at, now));
        before - records.len()
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
