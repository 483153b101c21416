//! Worker: owns one chunk of accounts and reports upward over IPC.

mod task;

pub use task::{Worker, WorkerOutcome};

use thiserror::Error;

use crate::ipc::IpcError;

/// Errors that end a worker with exit code 1.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("IPC channel to the scheduler closed")]
    ChannelClosed,

    #[error("IPC failure: {0}")]
    Ipc(#[from] IpcError),

    #[error("no assignment received")]
    NoAssignment,

    #[error("expected an assignment, got: {0}")]
    UnexpectedMessage(String),
}
