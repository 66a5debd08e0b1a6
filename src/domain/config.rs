//! Configuration for the gates and its validation.
//!
//! All configuration types are plain data with `serde` support so they can be
//! loaded from whatever configuration source the host service uses. Durations
//! are (de)serialized as integer milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error returned when a gate is configured with invalid parameters.
///
/// Configuration errors are fatal: they are raised at construction time and
/// retrying with the same values will fail again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// Bucket capacity must be a finite number of at least one token
    #[error("capacity must be a finite number of at least 1, got {0}")]
    InvalidCapacity(f64),
    /// Refill rate must be a finite number greater than zero
    #[error("refill rate must be a finite number greater than 0, got {0}")]
    InvalidRefillRate(f64),
    /// Deduplication window must be longer than zero
    #[error("dedup ttl must be greater than 0")]
    ZeroTtl,
    /// Deduplication table bound must be at least one entry
    #[error("dedup max_size must be greater than 0")]
    ZeroMaxSize,
    /// Background sweep interval must be longer than zero
    #[error("sweep interval must be greater than 0")]
    ZeroSweepInterval,
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum number of tokens the bucket holds (burst size, at least 1)
    pub capacity: f64,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl LimiterConfig {
    /// Create a validated limiter configuration.
    ///
    /// # Errors
    /// Returns `ConfigurationError::InvalidCapacity` if `capacity` is not a
    /// finite number of at least 1 (a smaller bucket can never hold a whole
    /// token), or `ConfigurationError::InvalidRefillRate` if `refill_rate` is
    /// not a positive finite number.
    ///
    /// # Example
    /// ```
    /// use escrow_gate::LimiterConfig;
    ///
    /// assert!(LimiterConfig::new(8.0, 8.0).is_ok());
    /// assert!(LimiterConfig::new(0.0, 8.0).is_err());
    /// assert!(LimiterConfig::new(0.5, 8.0).is_err());
    /// ```
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, ConfigurationError> {
        let config = Self {
            capacity,
            refill_rate,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the capacity holds at least one token and the refill rate
    /// is a positive finite number.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.capacity.is_finite() && self.capacity >= 1.0) {
            return Err(ConfigurationError::InvalidCapacity(self.capacity));
        }
        if !(self.refill_rate.is_finite() && self.refill_rate > 0.0) {
            return Err(ConfigurationError::InvalidRefillRate(self.refill_rate));
        }
        Ok(())
    }
}

impl Default for LimiterConfig {
    /// Eight calls per second with a burst of eight.
    fn default() -> Self {
        Self {
            capacity: 8.0,
            refill_rate: 8.0,
        }
    }
}

/// Action deduplicator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How long an admitted key suppresses repeats
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
    /// Table size above which a synchronous cleanup runs
    pub max_size: usize,
    /// Period of the background eviction sweep
    #[serde(rename = "sweep_interval_ms", with = "duration_ms")]
    pub sweep_interval: Duration,
}

impl DedupConfig {
    /// Create a validated deduplicator configuration with the default sweep
    /// interval.
    pub fn new(ttl: Duration, max_size: usize) -> Result<Self, ConfigurationError> {
        let config = Self {
            ttl,
            max_size,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Check that the window, bound and sweep interval are non-zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ttl.is_zero() {
            return Err(ConfigurationError::ZeroTtl);
        }
        if self.max_size == 0 {
            return Err(ConfigurationError::ZeroMaxSize);
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigurationError::ZeroSweepInterval);
        }
        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(3_000),
            max_size: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Combined configuration for a service wiring up both in-memory gates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Outbound provider limiter
    pub limiter: LimiterConfig,
    /// Inbound action deduplicator
    pub dedup: DedupConfig,
}

impl GateConfig {
    /// Validate both sections.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.limiter.validate()?;
        self.dedup.validate()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
