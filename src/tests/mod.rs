//! Integration tests for torpool.
//!
//! End-to-end scenarios over the admin API and the full pool lifecycle
//! with real child processes.


pub mod support;
