use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::WorkerError;
use crate::config::Config;
use crate::ipc::{WorkerAssignment, WorkerLogger, WorkerMessage};
use crate::runner::{AccountRunner, AccountStep, Collaborators};
use crate::standby::StandbyController;

/// How a worker's chunk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed {
        processed: usize,
        manual_review: Vec<String>,
    },
    Standby {
        reason: String,
    },
}

/// Runs one assignment sequentially, sending every message through `sink`.
pub struct Worker {
    config: Arc<Config>,
    collaborators: Collaborators,
    standby: StandbyController,
    sink: mpsc::Sender<WorkerMessage>,
    pid: u32,
    verbose: bool,
}

impl Worker {
    pub fn new(
        config: Arc<Config>,
        collaborators: Collaborators,
        sink: mpsc::Sender<WorkerMessage>,
        pid: u32,
    ) -> Self {
        Self {
            config,
            collaborators,
            standby: StandbyController::new(),
            sink,
            pid,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn standby(&self) -> &StandbyController {
        &self.standby
    }

    async fn send(&self, message: WorkerMessage) -> Result<(), WorkerError> {
        debug!("Worker {} sending {}", self.pid, message.message_type());
        self.sink
            .send(message)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Process the chunk, then the retry pass. Returns once the chunk is done
    /// or halted; see [`Worker::serve`] for the standby hold.
    pub async fn run(&self, assignment: WorkerAssignment) -> Result<WorkerOutcome, WorkerError> {
        let logger = WorkerLogger::new(self.sink.clone(), self.pid);

        if assignment.start_delay_ms > 0 {
            logger.info(
                false,
                "MAIN",
                format!(
                    "Worker {} waiting {} minute(s) before starting",
                    assignment.worker_index + 1,
                    assignment.start_delay_ms / 60_000
                ),
            );
            tokio::time::sleep(Duration::from_millis(assignment.start_delay_ms)).await;
        }

        logger.info(
            false,
            "MAIN",
            format!(
                "Worker {}/{} starting with {} account(s)",
                assignment.worker_index + 1,
                assignment.total_workers,
                assignment.chunk.len()
            ),
        );

        let mut runner = AccountRunner::new(
            self.config.clone(),
            self.collaborators.clone(),
            self.standby.clone(),
            logger.clone(),
            assignment.worker_index,
        )
        .with_verbose(self.verbose);

        let mut processed = 0;
        for (i, account) in assignment.chunk.iter().enumerate() {
            match runner.process(account).await {
                AccountStep::Finished(summary) => {
                    processed += 1;
                    self.send(WorkerMessage::Summary {
                        data: vec![summary],
                    })
                    .await?;
                }
                AccountStep::Halted(halt) => {
                    logger.warn(
                        false,
                        "MAIN",
                        format!(
                            "Halting, {} account(s) left unprocessed: {}",
                            assignment.chunk.len() - i,
                            halt
                        ),
                    );
                    break;
                }
            }
        }

        let retry = runner.retry_pending(&assignment.chunk).await;
        if !retry.exhausted.is_empty() {
            logger.warn(
                false,
                "RETRY",
                format!(
                    "{} account(s) need manual review: {}",
                    retry.exhausted.len(),
                    retry.exhausted.join(", ")
                ),
            );
            self.send(WorkerMessage::RetryExhausted {
                emails: retry.exhausted.clone(),
            })
            .await?;
        }

        if let Some(reason) = self.standby.reason() {
            let reason = reason.to_string();
            self.send(WorkerMessage::Standby {
                reason: reason.clone(),
            })
            .await?;
            return Ok(WorkerOutcome::Standby { reason });
        }

        logger.info(
            false,
            "MAIN",
            format!("Worker finished, {} account(s) processed", processed),
        );
        Ok(WorkerOutcome::Completed {
            processed,
            manual_review: retry.exhausted,
        })
    }

    /// [`Worker::run`], then hold forever if standby was engaged.
    pub async fn serve(&self, assignment: WorkerAssignment) -> Result<WorkerOutcome, WorkerError> {
        let outcome = self.run(assignment).await?;
        if matches!(outcome, WorkerOutcome::Standby { .. }) {
            self.standby
                .hold(Duration::from_secs(self.config.standby.heartbeat_interval_secs))
                .await;
        }
        Ok(outcome)
    }
}
