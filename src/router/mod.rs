//! Client-facing TCP balancer: one session per accepted client, routed to
//! the least loaded worker and proxied byte-for-byte.

pub mod balancer;
pub mod proxy;

pub use balancer::{Balancer, DialError};
pub use proxy::{proxy, Transferred};

#[cfg(test)]
mod balancer_test;
