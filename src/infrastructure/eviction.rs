//! Size-based eviction for the dedup table.
//!
//! Age-based expiry is the primary policy and lives in the table's sweep.
//! This module covers the secondary policy: when the table is still over its
//! bound after expired entries are gone, the oldest admissions are dropped
//! until it is back down to a low-water mark below the bound. Trimming past
//! the bound leaves headroom, so a table pinned at its limit does not pay for
//! a full scan on every admit.

use crate::domain::action::DedupKey;
use std::time::Instant;

/// Candidate entry for eviction consideration.
///
/// Keys are cloned out of the map so no shard lock is held while victims
/// are selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// The key of the entry
    pub key: DedupKey,
    /// Admission time observed when the candidate was collected
    pub inserted_at: Instant,
}

/// Oldest-first eviction with an entry count limit.
#[derive(Debug, Clone, Copy)]
pub struct OldestFirstEviction {
    /// Maximum number of entries the table may hold
    max_entries: usize,
}

impl OldestFirstEviction {
    /// Create a policy with the given entry limit.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// The configured entry limit.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Size a forced eviction trims down to: 90% of the limit, at least 1.
    pub fn low_water_mark(&self) -> usize {
        (self.max_entries / 10 * 9 + self.max_entries % 10 * 9 / 10).max(1)
    }

    /// Whether a table of `current_entries` is over the bound.
    pub fn should_evict(&self, current_entries: usize) -> bool {
        current_entries > self.max_entries
    }

    /// Pick the oldest candidates so that a table over the bound drops to
    /// the low-water mark. Nothing is selected while within the bound.
    pub fn select_victims(
        &self,
        mut candidates: Vec<EvictionCandidate>,
        current_entries: usize,
    ) -> Vec<EvictionCandidate> {
        if !self.should_evict(current_entries) || candidates.is_empty() {
            return Vec::new();
        }
        let excess = current_entries.saturating_sub(self.low_water_mark());
        if excess == 0 {
            return Vec::new();
        }
        candidates.sort_by_key(|candidate| candidate.inserted_at);
        candidates.truncate(excess);
        candidates
    }
}
