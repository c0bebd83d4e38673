//! Control-channel client used to force circuit rotation.

pub mod client;


// Re-export main types
pub use client::{send_directive, ControlClient, ControlError, Rotator, NEWNYM_DIRECTIVE};
