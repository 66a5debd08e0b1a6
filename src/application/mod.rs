//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Token bucket limiter (outbound call pacing)
//! - Action deduplicator and its background sweeper
//! - Unique-action guard (durable once-per-actor accounting)
//! - Action dispatcher (inbound entry point)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod dedup;
pub mod dispatch;
pub mod guard;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod sweeper;
