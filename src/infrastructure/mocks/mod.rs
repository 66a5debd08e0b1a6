//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of application logic.

pub mod clock;
pub mod log;
pub mod store;

pub use clock::MockClock;
pub use log::{CaptureLayer, CapturedEvent};
pub use store::FailingStore;
