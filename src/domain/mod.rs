//! Domain layer - pure types and rules with no I/O and no locking.
//!
//! This layer contains:
//! - Token bucket accounting
//! - Dedup key derivation for inbound actions
//! - Once-per-actor record types
//! - Gate configuration and its validation
//!
//! Time is always passed in by the caller, so everything here is
//! deterministic under test.

pub mod action;
pub mod bucket;
pub mod config;
pub mod record;
