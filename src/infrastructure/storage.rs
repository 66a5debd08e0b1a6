//! Concurrent storage for dedup entries.
//!
//! Sharded map keyed by `DedupKey`, hashed with `ahash`. Every mutation of a
//! single key happens under that key's shard lock, which is what makes
//! check-and-insert atomic.

use crate::application::ports::Clock;
use crate::domain::action::{DedupEntry, DedupKey};
use crate::infrastructure::eviction::{EvictionCandidate, OldestFirstEviction};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Thread-safe sharded table of admitted keys backed by DashMap.
#[derive(Debug, Default)]
pub struct DedupTable {
    map: DashMap<DedupKey, DedupEntry, RandomState>,
}

impl DedupTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Create an empty table sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    /// Admit `key` unless a live entry for it exists.
    ///
    /// The clock is read while the key's shard is locked, so the stored
    /// `inserted_at` is never earlier than the start of a sweep that has not
    /// yet visited this shard. An expired entry is overwritten in place.
    pub fn try_admit(&self, key: DedupKey, clock: &dyn Clock, ttl: Duration) -> bool {
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                let now = clock.now();
                if occupied.get().is_live(now, ttl) {
                    false
                } else {
                    occupied.insert(DedupEntry::new(now));
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(DedupEntry::new(clock.now()));
                true
            }
        }
    }

    /// Whether `key` currently has a live entry.
    pub fn contains_live(&self, key: &str, clock: &dyn Clock, ttl: Duration) -> bool {
        self.map
            .get(key)
            .is_some_and(|entry| entry.is_live(clock.now(), ttl))
    }

    /// Remove every entry that expired at or before `cutoff`.
    ///
    /// Returns the number of removed entries.
    pub fn sweep_expired(&self, cutoff: Instant, ttl: Duration) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            let keep = entry.is_live(cutoff, ttl);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Once the table is over the policy's bound, drop the oldest entries
    /// down to its low-water mark.
    ///
    /// A candidate is only removed if its `inserted_at` is unchanged since it
    /// was collected, so an entry re-admitted in the meantime survives.
    pub fn evict_oldest(&self, policy: &OldestFirstEviction) -> usize {
        let len = self.map.len();
        if !policy.should_evict(len) {
            return 0;
        }

        let candidates: Vec<EvictionCandidate> = self
            .map
            .iter()
            .map(|entry| EvictionCandidate {
                key: entry.key().clone(),
                inserted_at: entry.value().inserted_at,
            })
            .collect();

        policy
            .select_victims(candidates, len)
            .into_iter()
            .filter(|victim| {
                self.map
                    .remove_if(&victim.key, |_, entry| {
                        entry.inserted_at == victim.inserted_at
                    })
                    .is_some()
            })
            .count()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.map.clear();
    }
}
