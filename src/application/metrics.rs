//! Observability counters for the gates.
//!
//! All counters use atomic operations so they can be read at any time,
//! concurrently with ongoing `acquire` and `admit` calls. Reads may be
//! momentarily stale relative to each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for a `TokenBucketLimiter`.
#[derive(Debug, Clone)]
pub struct LimiterMetrics {
    inner: Arc<LimiterMetricsInner>,
}

#[derive(Debug)]
struct LimiterMetricsInner {
    /// Tokens handed out
    granted: AtomicU64,
    /// Acquisitions that had to wait for a token
    waited: AtomicU64,
    /// Total time spent waiting, in microseconds
    wait_micros: AtomicU64,
    /// Token level after the last mutation, as `f64` bits
    tokens_bits: AtomicU64,
}

impl LimiterMetrics {
    /// Create limiter counters with an initial token level.
    pub fn new(initial_tokens: f64) -> Self {
        Self {
            inner: Arc::new(LimiterMetricsInner {
                granted: AtomicU64::new(0),
                waited: AtomicU64::new(0),
                wait_micros: AtomicU64::new(0),
                tokens_bits: AtomicU64::new(initial_tokens.to_bits()),
            }),
        }
    }

    pub(crate) fn record_grant(&self) {
        self.inner.granted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self, wait: Duration) {
        let micros = u64::try_from(wait.as_micros()).unwrap_or(u64::MAX);
        self.inner.waited.fetch_add(1, Ordering::Relaxed);
        self.inner.wait_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn publish_tokens(&self, tokens: f64) {
        self.inner
            .tokens_bits
            .store(tokens.to_bits(), Ordering::Release);
    }

    /// Total tokens granted.
    pub fn granted(&self) -> u64 {
        self.inner.granted.load(Ordering::Relaxed)
    }

    /// Number of acquisitions that had to wait.
    pub fn waited(&self) -> u64 {
        self.inner.waited.load(Ordering::Relaxed)
    }

    /// Cumulative wait time.
    pub fn total_wait(&self) -> Duration {
        Duration::from_micros(self.inner.wait_micros.load(Ordering::Relaxed))
    }

    /// Token level published by the last mutation.
    pub fn tokens(&self) -> f64 {
        f64::from_bits(self.inner.tokens_bits.load(Ordering::Acquire))
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> LimiterStats {
        LimiterStats {
            granted: self.granted(),
            waited: self.waited(),
            total_wait: self.total_wait(),
            tokens: self.tokens(),
        }
    }

    /// Reset the counters to zero. The token level is left as is.
    pub fn reset(&self) {
        self.inner.granted.store(0, Ordering::Relaxed);
        self.inner.waited.store(0, Ordering::Relaxed);
        self.inner.wait_micros.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time view of limiter counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterStats {
    /// Total tokens granted
    pub granted: u64,
    /// Acquisitions that had to wait
    pub waited: u64,
    /// Cumulative wait time
    pub total_wait: Duration,
    /// Current token level
    pub tokens: f64,
}

impl LimiterStats {
    /// Mean wait across the acquisitions that waited.
    pub fn average_wait(&self) -> Duration {
        if self.waited == 0 {
            Duration::ZERO
        } else {
            self.total_wait / u32::try_from(self.waited).unwrap_or(u32::MAX)
        }
    }
}

/// Counters for an `ActionDeduplicator`.
#[derive(Debug, Clone, Default)]
pub struct DedupMetrics {
    inner: Arc<DedupMetricsInner>,
}

#[derive(Debug, Default)]
struct DedupMetricsInner {
    /// Calls to `admit`
    processed: AtomicU64,
    /// Calls to `admit` that were suppressed
    deduplicated: AtomicU64,
    /// Entries removed by sweeps and forced eviction
    evicted: AtomicU64,
}

impl DedupMetrics {
    /// Create zeroed deduplicator counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_processed(&self) {
        self.inner.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.inner.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner
            .evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Total calls to `admit`.
    pub fn processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    /// Total suppressed calls.
    pub fn deduplicated(&self) -> u64 {
        self.inner.deduplicated.load(Ordering::Relaxed)
    }

    /// Total entries removed from the table.
    pub fn evicted(&self) -> u64 {
        self.inner.evicted.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters along with the current table size.
    pub fn snapshot(&self, size: usize) -> DedupStats {
        DedupStats {
            processed: self.processed(),
            deduplicated: self.deduplicated(),
            evicted: self.evicted(),
            size,
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.processed.store(0, Ordering::Relaxed);
        self.inner.deduplicated.store(0, Ordering::Relaxed);
        self.inner.evicted.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time view of deduplicator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    /// Calls to `admit`
    pub processed: u64,
    /// Suppressed calls
    pub deduplicated: u64,
    /// Entries removed from the table
    pub evicted: u64,
    /// Current table size
    pub size: usize,
}

impl DedupStats {
    /// Fraction of processed actions that were duplicates (0.0 to 1.0).
    pub fn duplicate_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.deduplicated as f64 / self.processed as f64
        }
    }

    /// Number of actions that were admitted.
    pub fn admitted(&self) -> u64 {
        self.processed.saturating_sub(self.deduplicated)
    }
}
