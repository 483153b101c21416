use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use super::launcher::{WorkerEvent, WorkerHandle, WorkerLauncher};
use super::SchedulerError;
use crate::config::Config;
use crate::ipc::WorkerAssignment;
use crate::runner::Collaborators;
use crate::worker::Worker;

const CHANNEL_CAPACITY: usize = 256;

/// Runs each worker as a task of the current process.
pub struct InProcessLauncher {
    config: Arc<Config>,
    collaborators: Collaborators,
    verbose: bool,
}

impl InProcessLauncher {
    pub fn new(config: Arc<Config>, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn launch(
        &self,
        assignment: WorkerAssignment,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<WorkerHandle, SchedulerError> {
        let pid = std::process::id();
        let index = assignment.worker_index;
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (sink, mut messages) = mpsc::channel(CHANNEL_CAPACITY);

        let worker = Worker::new(self.config.clone(), self.collaborators.clone(), sink, pid)
            .with_verbose(self.verbose);

        let forward_tx = events_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if forward_tx.send(WorkerEvent::Message(message)).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut task = tokio::spawn(async move { worker.serve(assignment).await });

            let code = tokio::select! {
                joined = &mut task => match joined {
                    Ok(Ok(_)) => 0,
                    Ok(Err(e)) => {
                        error!("Worker {} failed: {}", index, e);
                        1
                    }
                    Err(e) => {
                        error!("Worker {} crashed: {}", index, e);
                        1
                    }
                },
                _ = shutdown.recv() => {
                    info!("Worker {} shutting down", index);
                    task.abort();
                    0
                }
            };

            // The worker's sink closes once its task is gone
            let _ = forward.await;
            let _ = events_tx.send(WorkerEvent::Exited(code)).await;
        });

        Ok(WorkerHandle {
            pid,
            events: events_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PhaseResult;
    use crate::ipc::WorkerMessage;
    use crate::phase::{PhaseError, PhaseKind};
    use crate::testing::{fixtures, MockNotifier, MockPhaseExecutor};
    use std::time::Duration;

    fn launcher(executor: Arc<MockPhaseExecutor>) -> InProcessLauncher {
        InProcessLauncher::new(
            Arc::new(fixtures::test_config()),
            fixtures::collaborators(executor, Arc::new(MockNotifier::new())),
        )
    }

    async fn collect(mut handle: WorkerHandle) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            let done = matches!(event, WorkerEvent::Exited(_));
            if !matches!(event, WorkerEvent::Message(WorkerMessage::Log { .. })) {
                events.push(event);
            }
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_worker_exits_zero() {
        let executor = Arc::new(MockPhaseExecutor::new());
        executor
            .respond("a@example.com", PhaseKind::Desktop, Ok(PhaseResult::new(10, 2)))
            .await;
        let (_tx, rx) = broadcast::channel(1);

        let handle = launcher(executor)
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await
            .unwrap();
        let events = collect(handle).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], WorkerEvent::Message(WorkerMessage::Summary { data }) if data[0].end_total == 12));
        assert_eq!(events[1], WorkerEvent::Exited(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_standby_hold() {
        let executor = Arc::new(MockPhaseExecutor::new());
        executor
            .respond("a@example.com", PhaseKind::Desktop, Err(PhaseError::failed("account banned")))
            .await;
        let (tx, rx) = broadcast::channel(1);

        let mut handle = launcher(executor)
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await
            .unwrap();

        // Wait for the standby message, then ask the held worker to leave
        loop {
            match handle.events.recv().await {
                Some(WorkerEvent::Message(WorkerMessage::Standby { reason })) => {
                    assert_eq!(reason, "account banned");
                    break;
                }
                Some(_) => continue,
                None => panic!("worker ended without standby"),
            }
        }
        tokio::time::sleep(Duration::from_secs(900)).await;
        tx.send(()).unwrap();

        let events = collect(handle).await;
        assert_eq!(events.last(), Some(&WorkerEvent::Exited(0)));
    }
}
