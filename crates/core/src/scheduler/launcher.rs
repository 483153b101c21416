use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::SchedulerError;
use crate::ipc::{WorkerAssignment, WorkerMessage};

/// Something a running worker reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Message(WorkerMessage),
    /// A stdout line that was not a protocol message.
    Output(String),
    /// Always the last event of a worker.
    Exited(i32),
}

/// A launched worker.
pub struct WorkerHandle {
    pub pid: u32,
    pub events: mpsc::Receiver<WorkerEvent>,
}

/// Starts workers. Implementations differ only in isolation: a child
/// process or a task in this process.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    fn name(&self) -> &str;

    /// Start one worker. A `()` on `shutdown` asks it to exit with code 0.
    async fn launch(
        &self,
        assignment: WorkerAssignment,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<WorkerHandle, SchedulerError>;
}
