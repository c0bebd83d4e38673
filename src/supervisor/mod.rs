//! Process supervision: launches worker processes and restarts them when
//! they exit.

pub mod command;
pub mod supervisor;


// Re-export main types
pub use command::Launcher;
pub use supervisor::{Supervisor, SupervisorError};
