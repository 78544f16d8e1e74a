//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters and ports,
//! enabling controlled testing of throttling behavior.

pub mod clock;
pub mod layer;
pub mod listener;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use listener::{FlowEvent, MockThrottleListener};
