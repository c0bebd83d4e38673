//! Deduplicated logging for hot-path failures such as dial errors.

pub mod log_entry;
pub mod sanitizer;

pub use log_entry::{err, start_dedup_logger, FLUSH_EVERY};

pub(crate) const COMPONENT: &str = "dedlog";

#[cfg(test)]
mod dedlog_test;
