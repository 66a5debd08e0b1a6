//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time, tokio time, mock)
//! - Dedup table storage (sharded maps) and its eviction policy
//! - Record stores for the unique-action guard

pub mod clock;
pub mod eviction;
pub mod record_store;
pub mod storage;

#[cfg(feature = "redis-storage")]
pub mod redis_store;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides a controllable clock, a log capture
/// layer and a record store that fails on demand.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// escrow-gate = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
