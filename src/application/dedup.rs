//! Inbound action deduplication.
//!
//! Transports redeliver interactive actions: users double-tap, clients retry
//! when an acknowledgment is slow. `ActionDeduplicator` lets exactly one
//! delivery of a logical action through per TTL window.
//!
//! ## Table bound
//!
//! Entries expire by age, and a background sweeper (see `spawn_sweeper`)
//! removes them. If the table grows past `max_size` between sweeps, the
//! admitting call cleans up synchronously: expired entries first, then the
//! oldest live ones until the table is down to 90% of `max_size`. The
//! headroom means the next few admits skip cleanup entirely.

use crate::application::metrics::{DedupMetrics, DedupStats};
use crate::application::ports::Clock;
use crate::application::sweeper::{self, SweeperHandle};
use crate::domain::action::DedupKey;
use crate::domain::config::{ConfigurationError, DedupConfig};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::eviction::OldestFirstEviction;
use crate::infrastructure::storage::DedupTable;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Suppresses repeated processing of the same logical action.
///
/// # Example
/// ```
/// use escrow_gate::{ActionDeduplicator, DedupConfig};
///
/// let dedup = ActionDeduplicator::new(DedupConfig::default()).unwrap();
///
/// assert!(dedup.admit("42:like:100"));
/// assert!(!dedup.admit("42:like:100"));
/// assert_eq!(dedup.stats().deduplicated, 1);
/// ```
#[derive(Debug)]
pub struct ActionDeduplicator {
    table: DedupTable,
    eviction: OldestFirstEviction,
    ttl: Duration,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
    metrics: DedupMetrics,
}

impl ActionDeduplicator {
    /// Create a deduplicator with the given configuration and the system
    /// clock.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` if the configuration is invalid.
    pub fn new(config: DedupConfig) -> Result<Self, ConfigurationError> {
        Self::builder().with_config(config).build()
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> ActionDeduplicatorBuilder {
        ActionDeduplicatorBuilder::default()
    }

    /// Admit an action key.
    ///
    /// Returns `true` for the first call per key within the TTL window and
    /// `false` for every repeat inside it. Check and insert are atomic per
    /// key, so concurrent deliveries of the same action see one `true`.
    pub fn admit(&self, key: impl Into<DedupKey>) -> bool {
        let key = key.into();
        self.metrics.record_processed();

        if !self.table.try_admit(key.clone(), self.clock.as_ref(), self.ttl) {
            self.metrics.record_duplicate();
            debug!(key = %key, "duplicate action suppressed");
            return false;
        }

        if self.eviction.should_evict(self.table.len()) {
            self.evict();
        }
        true
    }

    /// Remove expired entries, then, if the table is still over `max_size`,
    /// the oldest live ones down to the low-water mark.
    ///
    /// Returns the number of entries removed. Entries admitted after the
    /// call started are never removed by the age pass.
    pub fn evict(&self) -> usize {
        let cutoff = self.clock.now();
        let expired = self.table.sweep_expired(cutoff, self.ttl);
        let overflow = self.table.evict_oldest(&self.eviction);
        let removed = expired + overflow;

        self.metrics.record_evictions(removed);
        if overflow > 0 {
            warn!(
                removed = overflow,
                max_size = self.eviction.max_entries(),
                low_water = self.eviction.low_water_mark(),
                "dedup table over capacity, evicted oldest live entries"
            );
        }
        if expired > 0 {
            debug!(removed = expired, size = self.table.len(), "expired dedup entries swept");
        }
        removed
    }

    /// Whether `key` would currently be suppressed.
    pub fn contains_live(&self, key: &str) -> bool {
        self.table.contains_live(key, self.clock.as_ref(), self.ttl)
    }

    /// Start a background task that calls `evict` every configured sweep
    /// interval.
    ///
    /// The task holds only a weak reference and exits once the deduplicator
    /// is dropped. Must be called within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        self.spawn_sweeper_every(self.sweep_interval)
    }

    /// Like `spawn_sweeper`, with an explicit interval.
    pub fn spawn_sweeper_every(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let dedup = Arc::downgrade(self);
        sweeper::spawn(interval, move || match dedup.upgrade() {
            Some(dedup) => {
                dedup.evict();
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(()),
        })
    }

    /// Snapshot of counters and current table size.
    pub fn stats(&self) -> DedupStats {
        self.metrics.snapshot(self.table.len())
    }

    /// Get a reference to the counters.
    pub fn metrics(&self) -> &DedupMetrics {
        &self.metrics
    }

    /// Number of entries in the table, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop every entry. The next delivery of any action is admitted.
    pub fn clear(&self) {
        self.table.clear();
    }

    /// Suppression window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Table bound.
    pub fn max_size(&self) -> usize {
        self.eviction.max_entries()
    }

    /// Configured background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

/// Builder for constructing an `ActionDeduplicator`.
#[derive(Debug, Default)]
pub struct ActionDeduplicatorBuilder {
    config: DedupConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl ActionDeduplicatorBuilder {
    /// Use all settings from a configuration.
    pub fn with_config(mut self, config: DedupConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the suppression window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the table bound.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    /// Set the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set a custom clock (useful for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the deduplicator.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<ActionDeduplicator, ConfigurationError> {
        self.config.validate()?;

        Ok(ActionDeduplicator {
            table: DedupTable::with_capacity(self.config.max_size.saturating_add(1)),
            eviction: OldestFirstEviction::new(self.config.max_size),
            ttl: self.config.ttl,
            sweep_interval: self.config.sweep_interval,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            metrics: DedupMetrics::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::InboundAction;
    use crate::infrastructure::mocks::{CaptureLayer, MockClock};
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn dedup_with_mock(ttl_ms: u64, max_size: usize) -> (ActionDeduplicator, MockClock) {
        let clock = MockClock::starting_now();
        let dedup = ActionDeduplicator::builder()
            .with_ttl(Duration::from_millis(ttl_ms))
            .with_max_size(max_size)
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (dedup, clock)
    }

    #[test]
    fn test_like_button_double_tap() {
        let (dedup, clock) = dedup_with_mock(3_000, 10_000);

        assert!(dedup.admit("42:like:100"));
        assert!(!dedup.admit("42:like:100"));

        clock.advance_millis(3_100);
        assert!(dedup.admit("42:like:100"));

        let stats = dedup.stats();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.deduplicated, 1);
    }

    #[test]
    fn test_window_boundary() {
        let (dedup, clock) = dedup_with_mock(3_000, 10_000);
        let key = InboundAction::new(7, "release_funds", 555).dedup_key();

        assert!(dedup.admit(key.clone()));
        clock.advance_millis(2_999);
        assert!(!dedup.admit(key.clone()));
        clock.advance_millis(1);
        assert!(dedup.admit(key));
    }

    #[test]
    fn test_independent_contexts() {
        let (dedup, _clock) = dedup_with_mock(3_000, 10_000);

        assert!(dedup.admit(InboundAction::new(42, "like", 100).dedup_key()));
        assert!(dedup.admit(InboundAction::new(42, "like", 101).dedup_key()));
        assert!(dedup.admit(InboundAction::new(43, "like", 100).dedup_key()));
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn test_replay_after_expiry_is_fresh() {
        let (dedup, clock) = dedup_with_mock(1_000, 10_000);

        assert!(dedup.admit("k"));
        clock.advance_millis(5_000);
        assert!(!dedup.contains_live("k"));

        assert!(dedup.admit("k"));
        assert!(dedup.contains_live("k"));
        assert!(!dedup.admit("k"));
    }

    #[test]
    fn test_overflow_cleans_expired_first() {
        let (dedup, clock) = dedup_with_mock(1_000, 4);

        for i in 0..4 {
            assert!(dedup.admit(DedupKey::new(i, "tap", 1)));
        }
        clock.advance_millis(1_500);

        // Fifth key pushes the table over; the four expired ones go
        assert!(dedup.admit("fresh"));
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.stats().evicted, 4);
    }

    #[test]
    fn test_overflow_evicts_oldest_live() {
        let (dedup, clock) = dedup_with_mock(60_000, 5);

        for i in 0..20 {
            assert!(dedup.admit(DedupKey::new(i, "tap", 1)));
            clock.advance_millis(1);
            assert!(dedup.len() <= 5);
        }

        // Each overflow trims to four, so the newest four survive
        assert_eq!(dedup.len(), 4);
        assert!(dedup.contains_live("19:tap:1"));
        assert!(dedup.contains_live("16:tap:1"));
        assert!(!dedup.contains_live("15:tap:1"));
        assert!(!dedup.contains_live("0:tap:1"));
        assert_eq!(dedup.stats().evicted, 16);
    }

    #[test]
    fn test_overflow_leaves_headroom() {
        let (dedup, clock) = dedup_with_mock(60_000, 100);

        for i in 0..101 {
            dedup.admit(DedupKey::new(i, "tap", 1));
            clock.advance_millis(1);
        }
        assert_eq!(dedup.len(), 90);
        assert_eq!(dedup.stats().evicted, 11);

        // Ten more fit before the next forced eviction
        for i in 101..111 {
            dedup.admit(DedupKey::new(i, "tap", 1));
        }
        assert_eq!(dedup.len(), 100);
        assert_eq!(dedup.stats().evicted, 11);
    }

    #[test]
    fn test_evict_removes_only_expired() {
        let (dedup, clock) = dedup_with_mock(3_000, 10_000);

        dedup.admit("old");
        clock.advance_millis(2_000);
        dedup.admit("young");
        clock.advance_millis(1_000);

        assert_eq!(dedup.evict(), 1);
        assert!(dedup.contains_live("young"));
        assert_eq!(dedup.stats().size, 1);
    }

    #[test]
    fn test_clear_and_accessors() {
        let (dedup, _clock) = dedup_with_mock(3_000, 100);
        assert_eq!(dedup.ttl(), Duration::from_millis(3_000));
        assert_eq!(dedup.max_size(), 100);
        assert_eq!(dedup.sweep_interval(), Duration::from_secs(60));

        dedup.admit("a");
        dedup.clear();
        assert!(dedup.is_empty());
        assert!(dedup.admit("a"));
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        assert_eq!(
            ActionDeduplicator::builder()
                .with_ttl(Duration::ZERO)
                .build()
                .unwrap_err(),
            ConfigurationError::ZeroTtl
        );
        assert_eq!(
            ActionDeduplicator::builder()
                .with_max_size(0)
                .build()
                .unwrap_err(),
            ConfigurationError::ZeroMaxSize
        );
        assert_eq!(
            ActionDeduplicator::builder()
                .with_sweep_interval(Duration::ZERO)
                .build()
                .unwrap_err(),
            ConfigurationError::ZeroSweepInterval
        );
    }

    #[test]
    fn test_logging() {
        let capture = CaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let (dedup, _clock) = dedup_with_mock(60_000, 2);

        tracing::subscriber::with_default(subscriber, || {
            dedup.admit("42:like:100");
            dedup.admit("42:like:100");
            dedup.admit("a");
            dedup.admit("b");
        });

        let duplicates = capture.matching("duplicate action suppressed");
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].level, Level::DEBUG);
        assert_eq!(duplicates[0].field("key"), Some("42:like:100"));

        let overflow = capture.matching("over capacity");
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].level, Level::WARN);
        assert_eq!(overflow[0].field("removed"), Some("2"));
        assert_eq!(overflow[0].field("low_water"), Some("1"));
    }

    #[test]
    fn test_concurrent_deliveries_single_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        let dedup = Arc::new(ActionDeduplicator::new(DedupConfig::default()).unwrap());
        let winners = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..32 {
            let dedup = Arc::clone(&dedup);
            let winners = Arc::clone(&winners);
            handles.push(thread::spawn(move || {
                if dedup.admit(InboundAction::new(42, "confirm_deal", 9).dedup_key()) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        let stats = dedup.stats();
        assert_eq!(stats.processed, 32);
        assert_eq!(stats.deduplicated, 31);
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_dropped() {
        let clock = MockClock::starting_now();
        let dedup = Arc::new(
            ActionDeduplicator::builder()
                .with_clock(Arc::new(clock))
                .build()
                .unwrap(),
        );

        let handle = dedup.spawn_sweeper_every(Duration::from_millis(5));
        drop(dedup);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        handle.shutdown().await.unwrap();
    }
}
