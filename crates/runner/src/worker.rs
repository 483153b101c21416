//! Worker mode: one assignment in on stdin, JSON-line messages out on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use tally_core::ipc::{decode_line, write_lines, SchedulerMessage};
use tally_core::{load_config, validate_config, Worker, WorkerError, WorkerOutcome};

use crate::wiring;

const CHANNEL_CAPACITY: usize = 256;

pub async fn run() -> Result<()> {
    let pid = std::process::id();
    let config_path = wiring::config_path();
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    let config = Arc::new(config);
    let collaborators = wiring::collaborators(&config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let first = lines
        .next_line()
        .await
        .context("Failed to read assignment")?
        .ok_or(WorkerError::NoAssignment)?;
    let assignment = match decode_line::<SchedulerMessage>(&first)? {
        SchedulerMessage::Assign(assignment) => assignment,
        SchedulerMessage::Shutdown => {
            info!("Worker {} told to shut down before starting", pid);
            return Ok(());
        }
    };
    info!(
        "Worker {} received {} account(s) as worker {}",
        pid,
        assignment.chunk.len(),
        assignment.worker_index
    );

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let writer = tokio::spawn(write_lines(rx, tokio::io::stdout()));
    let worker = Worker::new(config, collaborators, tx, pid).with_verbose(wiring::verbose_from_env());

    let result = tokio::select! {
        result = worker.serve(assignment) => result.map(|outcome| match outcome {
            WorkerOutcome::Completed { processed, .. } => {
                info!("Worker {} done, {} account(s) processed", pid, processed);
            }
            WorkerOutcome::Standby { reason } => {
                info!("Worker {} left standby ({})", pid, reason);
            }
        }),
        _ = wait_for_shutdown(&mut lines) => {
            info!("Worker {} shutting down", pid);
            Ok(())
        }
        _ = signal::ctrl_c() => {
            info!("Worker {} interrupted", pid);
            Ok(())
        }
    };

    // Closing the last sender lets the writer flush and finish
    drop(worker);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Worker {} failed writing messages: {}", pid, e),
        Err(e) => warn!("Worker {} message writer stopped: {}", pid, e),
    }

    result.map_err(Into::into)
}

/// Resolves on a shutdown message or when the scheduler closes stdin.
async fn wait_for_shutdown(lines: &mut Lines<BufReader<Stdin>>) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match decode_line::<SchedulerMessage>(&line) {
                Ok(SchedulerMessage::Shutdown) => return,
                Ok(SchedulerMessage::Assign(_)) => warn!("Ignoring second assignment"),
                Err(e) => warn!("Ignoring unreadable control message: {}", e),
            },
            Ok(None) => {
                warn!("Scheduler closed stdin");
                return;
            }
            Err(e) => {
                warn!("Failed reading control messages: {}", e);
                return;
            }
        }
    }
}
