//! # escrow-gate
//!
//! Concurrency safety for a chat-bot escrow service: pacing of outbound
//! provider calls, suppression of duplicated interactive actions, and durable
//! once-per-actor accounting.
//!
//! The crate governs *whether* and *when* an operation may proceed. It never
//! performs the operation itself and never retries on the caller's behalf.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use escrow_gate::{
//!     ActionDeduplicator, ActionDispatcher, DedupConfig, Dispatched, InboundAction,
//!     TokenBucketLimiter,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 8 calls of burst, then 8 per second
//! let limiter = Arc::new(TokenBucketLimiter::new(8.0, 8.0)?);
//!
//! // Collapse redelivered button presses within 3 seconds
//! let dedup = Arc::new(ActionDeduplicator::new(DedupConfig::default())?);
//! let sweeper = dedup.spawn_sweeper();
//! let dispatcher = ActionDispatcher::new(Arc::clone(&dedup));
//!
//! let action = InboundAction::new(42, "confirm_deal", 7001);
//! let outcome = dispatcher
//!     .dispatch(
//!         &action,
//!         || async { /* answer the callback query */ },
//!         || async {
//!             limiter.acquire().await;
//!             // call the payment provider
//!         },
//!     )
//!     .await;
//! assert!(matches!(outcome, Dispatched::Executed(())));
//!
//! sweeper.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! ### Token bucket limiter
//! - Burst up to `capacity`, then a steady `refill_rate` tokens per second
//! - `acquire()` suspends only the calling task while the bucket refills
//! - `try_acquire()` never suspends
//! - Cancelling a waiting `acquire()` leaves no trace
//!
//! ### Action deduplicator
//! - One admission per `actor:action:context` key per TTL window (3s default)
//! - Atomic check-and-insert per key
//! - Bounded table: expired entries swept in the background, oldest entries
//!   dropped if the table still overflows `max_size`
//!
//! ### Unique-action guard
//! - `record_once(subject, actor)` counts an actor at most once per subject,
//!   across restarts and concurrent deliveries
//! - Atomicity comes from the store's uniqueness constraint
//! - The count is recomputed from the stored records, never incremented
//!
//! ## Record Stores
//!
//! | Store | Durability | Feature |
//! |-------|------------|---------|
//! | `InMemoryRecordStore` | process lifetime | always available |
//! | `RedisRecordStore` | shared, survives restarts | `redis-storage` |
//!
//! Any other backend with a uniqueness constraint can implement
//! `UniqueActionStore`.
//!
//! ## Configuration
//!
//! `GateConfig` deserializes with `serde`; durations are given in
//! milliseconds and every field has a default:
//!
//! ```rust
//! # use escrow_gate::GateConfig;
//! let config: GateConfig = serde_json::from_str(
//!     r#"{ "limiter": { "capacity": 30, "refill_rate": 30 }, "dedup": { "ttl_ms": 5000 } }"#,
//! ).unwrap();
//! config.validate().unwrap();
//! assert_eq!(config.dedup.max_size, 10_000);
//! ```
//!
//! ## Observability
//!
//! The crate emits `tracing` events and never installs a subscriber:
//!
//! | Level | Event |
//! |-------|-------|
//! | TRACE | provider token granted |
//! | DEBUG | wait for a token, duplicate suppressed, expired entries swept, first occurrence recorded |
//! | WARN | dedup table over capacity, evicted oldest live entries |
//!
//! `stats()` on the limiter and the deduplicator returns counter snapshots.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    action::{DedupEntry, DedupKey, InboundAction},
    bucket::TokenBucket,
    config::{ConfigurationError, DedupConfig, GateConfig, LimiterConfig},
    record::{ActorId, RecordOutcome, SubjectId, UniqueActionRecord},
};

pub use application::{
    dedup::{ActionDeduplicator, ActionDeduplicatorBuilder},
    dispatch::{ActionDispatcher, Dispatched},
    guard::UniqueActionGuard,
    limiter::{AcquireTimeout, TokenBucketLimiter, TokenBucketLimiterBuilder},
    metrics::{DedupMetrics, DedupStats, LimiterMetrics, LimiterStats},
    ports::{Clock, StoreError, UniqueActionStore},
    sweeper::{ShutdownError, SweeperHandle},
};

pub use infrastructure::{
    clock::{SystemClock, TokioClock},
    record_store::InMemoryRecordStore,
};

#[cfg(feature = "redis-storage")]
pub use infrastructure::redis_store::{RedisRecordStore, RedisRecordStoreConfig};
