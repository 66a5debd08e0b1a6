//! Token bucket accounting.
//!
//! Pure state machine with no locking and no clock of its own: callers pass
//! the current instant in. Tokens are continuous, so fractional amounts
//! accumulate between calls.

use crate::domain::config::{ConfigurationError, LimiterConfig};
use std::time::{Duration, Instant};

/// Tolerance for float drift when checking whether a whole token is present.
const TOKEN_EPSILON: f64 = 1e-9;

/// State of a single token bucket.
///
/// # Example
/// ```
/// use escrow_gate::domain::bucket::TokenBucket;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut bucket = TokenBucket::new(2.0, 1.0, start).unwrap();
///
/// assert!(bucket.try_consume());
/// assert!(bucket.try_consume());
/// assert!(!bucket.try_consume());
///
/// // One token per second
/// bucket.refill(start + Duration::from_secs(1));
/// assert!(bucket.try_consume());
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Errors
    /// Returns a `ConfigurationError` unless `capacity` is a finite number of
    /// at least 1 and `refill_rate` is a positive finite number.
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Result<Self, ConfigurationError> {
        Self::from_config(LimiterConfig::new(capacity, refill_rate)?, now)
    }

    /// Create a full bucket from a configuration.
    pub fn from_config(config: LimiterConfig, now: Instant) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            tokens: config.capacity,
            last_refill: now,
        })
    }

    /// Add the tokens accrued since the last refill, capped at capacity.
    ///
    /// An instant earlier than the last refill counts as zero elapsed time
    /// and leaves `last_refill` where it was.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token if a whole token is available.
    pub fn try_consume(&mut self) -> bool {
        if self.has_token() {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// How long until a whole token is available, rounded up to the
    /// millisecond. Zero when a token is already present.
    pub fn wait_for_token(&self) -> Duration {
        if self.has_token() {
            return Duration::ZERO;
        }
        let deficit = 1.0 - self.tokens;
        let millis = (deficit / self.refill_rate * 1000.0).ceil();
        Duration::from_millis(millis as u64)
    }

    /// Current token level as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Maximum token level.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Instant of the last refill.
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    fn has_token(&self) -> bool {
        self.tokens + TOKEN_EPSILON >= 1.0
    }
}
