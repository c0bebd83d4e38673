// Shared test support code for integration tests.
// This module provides common utilities that all test files can use.

pub mod common;
pub mod endpoints;
pub mod rotator;

pub use common::*;
pub use endpoints::{ControlListener, EchoServer};
pub use rotator::RecordingRotator;
