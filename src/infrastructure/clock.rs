//! Clock adapters for time operations.
//!
//! Provides two production clocks:
//! - `SystemClock` reads `std::time::Instant` directly
//! - `TokioClock` reads tokio's clock, which follows paused and advanced
//!   time in tests (`#[tokio::test(start_paused = true)]`)
//!
//! Use `TokioClock` when the limiter's waits must line up with tokio timers
//! under a paused runtime. Outside of paused tests both report the same time.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a manually
//! advanced clock. Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! escrow-gate = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::Instant;

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock backed by `tokio::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    /// Create a new tokio clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
