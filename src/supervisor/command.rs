// Builds the OS command for one worker.

use std::process::Stdio;
use tokio::process::Command;

use crate::config::{
    WorkerLayout, CONTROL_PORT_PLACEHOLDER, DATA_PORT_PLACEHOLDER, WORK_DIR_PLACEHOLDER,
};
use crate::pool::Worker;

/// Launcher maps a worker descriptor onto the worker binary's command line.
#[derive(Debug, Clone)]
pub struct Launcher {
    binary: String,
    args: Vec<String>,
}

impl Launcher {
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    pub fn from_layout(layout: &WorkerLayout) -> Self {
        Self::new(layout.binary.clone(), layout.args.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Argument list with the worker's ports and directory substituted.
    pub fn args_for(&self, worker: &Worker) -> Vec<String> {
        let data_port = worker.data_addr().port().to_string();
        let control_port = worker.control_addr().port().to_string();
        let work_dir = worker.work_dir().to_string_lossy();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(DATA_PORT_PLACEHOLDER, &data_port)
                    .replace(CONTROL_PORT_PLACEHOLDER, &control_port)
                    .replace(WORK_DIR_PLACEHOLDER, &work_dir)
            })
            .collect()
    }

    /// Command inheriting our stdout/stderr. The child is killed if its
    /// handle is dropped, so a handle never outlives its supervisor.
    pub fn command(&self, worker: &Worker) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args_for(worker))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}
