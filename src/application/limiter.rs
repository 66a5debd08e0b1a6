//! Outbound call throttling.
//!
//! `TokenBucketLimiter` guards calls to a rate-limited external provider.
//! Call `acquire()` immediately before each provider call: it returns at once
//! while tokens are available and otherwise suspends the calling task for
//! exactly the time the missing fraction of a token takes to refill.
//!
//! ## Concurrency
//!
//! - Refill and consume happen in one critical section on a `std::sync::Mutex`
//!   that is never held across an `.await`.
//! - Callers that must wait line up on an async turn lock, so each waiter's
//!   sleep is computed from the deficit its predecessor left behind.
//! - `try_acquire()` decides from the bucket alone, except that it steps
//!   aside while a waiter is asleep for the next token.
//! - Dropping an `acquire()` future while it waits releases its turn and
//!   leaves the bucket untouched: all accounting is derived from timestamps.

use crate::application::metrics::{LimiterMetrics, LimiterStats};
use crate::application::ports::Clock;
use crate::domain::bucket::TokenBucket;
use crate::domain::config::{ConfigurationError, LimiterConfig};
use crate::infrastructure::clock::TokioClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Error returned by `acquire_timeout` when the caller's deadline passes
/// before a token is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no provider token granted within {limit:?}")]
pub struct AcquireTimeout {
    /// The deadline the caller imposed
    pub limit: Duration,
}

/// Token bucket limiter for calls to an external dependency.
///
/// # Example
/// ```
/// use escrow_gate::TokenBucketLimiter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), escrow_gate::ConfigurationError> {
/// let limiter = TokenBucketLimiter::new(8.0, 8.0)?;
///
/// limiter.acquire().await;
/// // call the provider here
///
/// assert_eq!(limiter.stats().granted, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenBucketLimiter {
    bucket: Mutex<TokenBucket>,
    turn: tokio::sync::Mutex<()>,
    waiter_asleep: AtomicBool,
    clock: Arc<dyn Clock>,
    metrics: LimiterMetrics,
}

/// Marks a waiter as asleep until dropped, so a cancelled `acquire` clears
/// the mark too.
struct SleepingWaiter<'a>(&'a AtomicBool);

impl<'a> SleepingWaiter<'a> {
    fn mark(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for SleepingWaiter<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TokenBucketLimiter {
    /// Create a limiter with the given burst capacity and refill rate
    /// (tokens per second), using `TokioClock`.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` unless `capacity` is at least 1 and
    /// `refill_rate` is a positive finite number.
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, ConfigurationError> {
        Self::builder()
            .with_config(LimiterConfig::new(capacity, refill_rate)?)
            .build()
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> TokenBucketLimiterBuilder {
        TokenBucketLimiterBuilder::default()
    }

    /// Wait for a token and consume it.
    ///
    /// Returns immediately when a token is available. Otherwise suspends the
    /// calling task for `ceil((1 - tokens) / refill_rate)` milliseconds,
    /// then re-derives the token level and consumes one.
    pub async fn acquire(&self) {
        let _turn = self.turn.lock().await;
        let mut asleep: Option<SleepingWaiter<'_>> = None;
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut bucket = self.lock_bucket();
                bucket.refill(self.clock.now());
                let granted = bucket.try_consume();
                self.metrics.publish_tokens(bucket.tokens());
                if granted {
                    None
                } else {
                    // Set under the bucket lock so no try_acquire can take
                    // the token this waiter is about to sleep for.
                    asleep.get_or_insert_with(|| SleepingWaiter::mark(&self.waiter_asleep));
                    Some(bucket.wait_for_token())
                }
            };

            let Some(wait) = wait else { break };
            debug!(
                wait_ms = wait.as_millis() as u64,
                "provider rate limit reached, waiting for token"
            );
            tokio::time::sleep(wait).await;
            waited += wait;
        }
        drop(asleep);

        if !waited.is_zero() {
            self.metrics.record_wait(waited);
        }
        self.metrics.record_grant();
        trace!(waited_ms = waited.as_millis() as u64, "provider token granted");
    }

    /// Like `acquire`, but gives up after `limit`.
    ///
    /// Giving up is not a failure of the limiter: no token is consumed and
    /// nothing needs cleaning up. Retrying is left to the caller.
    pub async fn acquire_timeout(&self, limit: Duration) -> Result<(), AcquireTimeout> {
        tokio::time::timeout(limit, self.acquire())
            .await
            .map_err(|_| AcquireTimeout { limit })
    }

    /// Consume a token if one is available right now.
    ///
    /// Never suspends. Returns `false` when the bucket is short of a whole
    /// token or an `acquire` caller is asleep waiting for the next one. An
    /// `acquire` that is being granted without waiting does not block it.
    /// The only side effect of a `false` is the refill bookkeeping.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock_bucket();
        bucket.refill(self.clock.now());
        let granted = !self.waiter_asleep.load(Ordering::SeqCst) && bucket.try_consume();
        self.metrics.publish_tokens(bucket.tokens());
        drop(bucket);

        if granted {
            self.metrics.record_grant();
            trace!("provider token granted without waiting");
        }
        granted
    }

    /// Current token level after refilling to now.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill(self.clock.now());
        self.metrics.publish_tokens(bucket.tokens());
        bucket.tokens()
    }

    /// Snapshot of grant and wait counters.
    ///
    /// Lock-free; may lag an in-flight `acquire` by one update.
    pub fn stats(&self) -> LimiterStats {
        self.metrics.snapshot()
    }

    /// Get a reference to the counters.
    pub fn metrics(&self) -> &LimiterMetrics {
        &self.metrics
    }

    /// Reset grant and wait counters to zero.
    pub fn reset_stats(&self) {
        self.metrics.reset();
    }

    /// Maximum token level.
    pub fn capacity(&self) -> f64 {
        self.lock_bucket().capacity()
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.lock_bucket().refill_rate()
    }

    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        // Bucket state is valid after any partial update, so a poisoned lock
        // is still usable.
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for constructing a `TokenBucketLimiter`.
#[derive(Debug, Default)]
pub struct TokenBucketLimiterBuilder {
    config: LimiterConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl TokenBucketLimiterBuilder {
    /// Set capacity and refill rate from a configuration.
    pub fn with_config(mut self, config: LimiterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the burst capacity.
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the refill rate in tokens per second.
    pub fn with_refill_rate(mut self, refill_rate: f64) -> Self {
        self.config.refill_rate = refill_rate;
        self
    }

    /// Set a custom clock (useful for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the limiter with a full bucket.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<TokenBucketLimiter, ConfigurationError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock::new()));
        let bucket = TokenBucket::from_config(self.config, clock.now())?;
        let metrics = LimiterMetrics::new(bucket.tokens());

        Ok(TokenBucketLimiter {
            bucket: Mutex::new(bucket),
            turn: tokio::sync::Mutex::new(()),
            waiter_asleep: AtomicBool::new(false),
            clock,
            metrics,
        })
    }
}
