//! Per-merchant sliding-window velocity fraud checks.
//!
//! Each merchant gets an independent window of recent transaction
//! timestamps. Admission is denied once the window holds `max_events`
//! unexpired entries. Windows live only in memory; after a restart every
//! merchant starts with a clean window, which is acceptable for a soft
//! anti-abuse control.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// Sliding-window admission control, keyed by merchant.
///
/// Windows are entries in a sharded concurrent map, so unrelated merchants
/// never contend on a common lock. Entries are created lazily on first use
/// and never removed; merchant cardinality is bounded by onboarding, not by
/// request traffic.
///
/// Purging is fully lazy: expired timestamps are trimmed inline during
/// [`is_allowed`](Self::is_allowed) and [`record`](Self::record) calls,
/// so no sweep task is needed and memory stays bounded per merchant.
pub struct VelocityGuard {
    max_events: usize,
    window: Duration,
    windows: DashMap<Uuid, VecDeque<Instant>>,
}

impl VelocityGuard {
    /// Create a guard admitting at most `max_events` transactions per
    /// merchant within the trailing `window`. Both limits apply uniformly
    /// to every merchant.
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            windows: DashMap::new(),
        }
    }

    /// Whether the merchant may attempt another transaction right now.
    ///
    /// Trims the merchant's expired entries as a side effect, even though
    /// this is a read-style query.
    pub fn is_allowed(&self, merchant_id: Uuid) -> bool {
        let mut entry = self.windows.entry(merchant_id).or_default();
        self.purge_expired(entry.value_mut(), Instant::now());
        entry.len() < self.max_events
    }

    /// Record an admitted transaction for the merchant.
    ///
    /// Call this only after the transaction has been durably persisted, so
    /// attempts rejected for unrelated reasons leave no trace in the window.
    pub fn record(&self, merchant_id: Uuid) {
        let now = Instant::now();
        let mut entry = self.windows.entry(merchant_id).or_default();
        entry.push_back(now);
        self.purge_expired(entry.value_mut(), now);
    }

    /// Number of unexpired entries currently held for a merchant.
    pub fn recorded_count(&self, merchant_id: Uuid) -> usize {
        match self.windows.get_mut(&merchant_id) {
            Some(mut entry) => {
                self.purge_expired(entry.value_mut(), Instant::now());
                entry.len()
            }
            None => 0,
        }
    }

    fn purge_expired(&self, window: &mut VecDeque<Instant>, now: Instant) {
        // Timestamps are appended in non-decreasing order, so the oldest
        // entry is always at the front; stop at the first unexpired one.
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) > self.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
