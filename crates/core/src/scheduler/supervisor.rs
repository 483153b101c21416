//! Worker supervision.
//!
//! The scheduler launches one worker per chunk, multiplexes their events onto
//! a single channel, and finalizes the run once the last worker has exited.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use super::hook::run_post_run_command;
use super::launcher::{WorkerEvent, WorkerLauncher};
use super::partition::{partition, stagger_delay};
use crate::account::Account;
use crate::config::Config;
use crate::ipc::{log_locally, WorkerAssignment, WorkerMessage};
use crate::report::{RunReport, SummaryAggregator};

const EVENT_CAPACITY: usize = 1024;

/// Requests a graceful stop of every worker.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // No receivers just means no worker is running
        let _ = self.tx.send(());
    }
}

/// An event tagged with the slot it came from.
struct SlotEvent {
    slot: usize,
    pid: u32,
    event: WorkerEvent,
}

/// One chunk and the bookkeeping of the workers that served it.
struct Slot {
    chunk: Vec<Account>,
    finished: HashSet<String>,
    restarts: u32,
}

impl Slot {
    fn unfinished(&self) -> Vec<Account> {
        self.chunk
            .iter()
            .filter(|a| !self.finished.contains(&a.email))
            .cloned()
            .collect()
    }
}

pub struct Scheduler {
    config: Arc<Config>,
    launcher: Arc<dyn WorkerLauncher>,
    aggregator: SummaryAggregator,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(
        config: Arc<Config>,
        launcher: Arc<dyn WorkerLauncher>,
        aggregator: SummaryAggregator,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            config,
            launcher,
            aggregator,
            shutdown_tx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Start one worker for `slot`. A failed launch is reported as an exit
    /// with code 1 so the respawn policy applies to it too.
    async fn launch(
        &self,
        slot: usize,
        assignment: WorkerAssignment,
        events: &mpsc::Sender<SlotEvent>,
    ) {
        let accounts = assignment.chunk.len();
        let delay = assignment.start_delay_ms;
        match self
            .launcher
            .launch(assignment, self.shutdown_tx.subscribe())
            .await
        {
            Ok(mut handle) => {
                info!(
                    "Launched worker {} (pid {}) via {}: {} account(s), starting in {}s",
                    slot,
                    handle.pid,
                    self.launcher.name(),
                    accounts,
                    delay / 1000
                );
                let events = events.clone();
                let pid = handle.pid;
                tokio::spawn(async move {
                    while let Some(event) = handle.events.recv().await {
                        let last = matches!(event, WorkerEvent::Exited(_));
                        if events.send(SlotEvent { slot, pid, event }).await.is_err() || last {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                error!("Failed to launch worker {}: {}", slot, e);
                // The run loop is the only consumer and is awaiting this call
                let events = events.clone();
                tokio::spawn(async move {
                    let _ = events
                        .send(SlotEvent {
                            slot,
                            pid: 0,
                            event: WorkerEvent::Exited(1),
                        })
                        .await;
                });
            }
        }
    }

    /// Run every account to completion and return the finalized report.
    pub async fn run(mut self, accounts: Vec<Account>) -> RunReport {
        let scheduler = &self.config.scheduler;
        let chunks = partition(accounts, scheduler.clusters);
        let total_workers = chunks.len();
        info!(
            "Scheduling {} account(s) across {} worker(s)",
            chunks.iter().map(Vec::len).sum::<usize>(),
            total_workers
        );

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CAPACITY);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut slots = Vec::with_capacity(total_workers);
        let mut active = 0usize;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let assignment = WorkerAssignment {
                chunk: chunk.clone(),
                start_delay_ms: stagger_delay(
                    index,
                    scheduler.stagger_min_minutes,
                    scheduler.stagger_max_minutes,
                ),
                worker_index: index,
                total_workers,
            };
            slots.push(Slot {
                chunk,
                finished: HashSet::new(),
                restarts: 0,
            });
            self.launch(index, assignment, &events_tx).await;
            active += 1;
        }

        let mut shutting_down = false;
        while active > 0 {
            let SlotEvent { slot, pid, event } = tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = shutdown_rx.recv(), if !shutting_down => {
                    info!("Shutdown requested, waiting for {} worker(s) to exit", active);
                    shutting_down = true;
                    continue;
                }
            };

            match event {
                WorkerEvent::Message(message) => {
                    self.handle_message(&mut slots[slot], pid, message);
                }
                WorkerEvent::Output(line) => info!("[{}] {}", pid, line),
                WorkerEvent::Exited(0) => {
                    active -= 1;
                    info!("Worker {} (pid {}) exited", slot, pid);
                }
                WorkerEvent::Exited(code) => {
                    active -= 1;
                    warn!("Worker {} (pid {}) exited with code {}", slot, pid, code);
                    if shutting_down {
                        continue;
                    }
                    if let Some(assignment) = self.respawn(&mut slots[slot], slot, total_workers) {
                        self.launch(slot, assignment, &events_tx).await;
                        active += 1;
                    }
                }
            }
        }

        info!("All workers exited, finalizing run");
        let report = self.aggregator.finalize().await;
        if let Err(e) = run_post_run_command(&self.config.scheduler.post_run_command).await {
            error!("{}", e);
        }
        report
    }

    fn handle_message(&mut self, slot: &mut Slot, pid: u32, message: WorkerMessage) {
        match message {
            WorkerMessage::Log { payload } => log_locally(&payload),
            WorkerMessage::Summary { data } => {
                for summary in data {
                    slot.finished.insert(summary.email.clone());
                    self.aggregator.accumulate(summary);
                }
            }
            WorkerMessage::RetryExhausted { emails } => {
                warn!("[{}] Accounts need manual review: {}", pid, emails.join(", "));
                self.aggregator.note_manual_review(emails);
            }
            WorkerMessage::Standby { reason } => {
                warn!("[{}] Worker is holding in standby: {}", pid, reason);
            }
        }
    }

    /// Decide whether a crashed slot gets a replacement worker.
    fn respawn(
        &self,
        slot: &mut Slot,
        index: usize,
        total_workers: usize,
    ) -> Option<WorkerAssignment> {
        let policy = &self.config.crash_recovery;
        if !policy.restart_failed_worker {
            return None;
        }
        if slot.restarts >= policy.restart_failed_worker_attempts {
            warn!(
                "Worker {} used all {} restart(s), not restarting",
                index, policy.restart_failed_worker_attempts
            );
            return None;
        }
        slot.restarts += 1;

        let unfinished = slot.unfinished();
        let chunk = if policy.reassign_chunk {
            info!(
                "Restarting worker {} with its {} unfinished account(s)",
                index,
                unfinished.len()
            );
            unfinished
        } else {
            if !unfinished.is_empty() {
                warn!(
                    "Restarting worker {} without its {} unfinished account(s): {}",
                    index,
                    unfinished.len(),
                    unfinished
                        .iter()
                        .map(|a| a.email.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Vec::new()
        };

        Some(WorkerAssignment {
            chunk,
            start_delay_ms: 0,
            worker_index: index,
            total_workers,
        })
    }
}
