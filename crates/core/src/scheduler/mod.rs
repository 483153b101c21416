//! Scheduler: partitions accounts, launches and supervises workers, and
//! finalizes the run.

mod hook;
mod in_process;
mod launcher;
mod partition;
mod process;
mod supervisor;

pub use hook::run_post_run_command;
pub use in_process::InProcessLauncher;
pub use launcher::{WorkerEvent, WorkerHandle, WorkerLauncher};
pub use partition::{partition, stagger_delay};
pub use process::{ProcessLauncher, WORKER_ARG};
pub use supervisor::{Scheduler, ShutdownHandle};

use thiserror::Error;

use crate::ipc::IpcError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker launch failed: {0}")]
    Launch(String),

    #[error("IPC failure: {0}")]
    Ipc(#[from] IpcError),

    #[error("Post-run command failed: {0}")]
    Hook(String),
}
