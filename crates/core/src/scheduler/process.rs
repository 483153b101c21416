use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::launcher::{WorkerEvent, WorkerHandle, WorkerLauncher};
use super::SchedulerError;
use crate::ipc::{decode_line, encode_line, SchedulerMessage, WorkerAssignment, WorkerMessage};

const CHANNEL_CAPACITY: usize = 256;

/// Argument that puts the binary into worker mode.
pub const WORKER_ARG: &str = "worker";

/// Re-executes a binary in worker mode, talking JSON lines over stdio.
///
/// The child's stderr is inherited so its local logs reach the terminal.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    config_path: PathBuf,
    verbose: bool,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config_path: config_path.into(),
            verbose: false,
        }
    }

    /// Arguments passed before the worker-mode argument.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Launch copies of the running executable.
    pub fn current_exe(config_path: impl Into<PathBuf>) -> Result<Self, SchedulerError> {
        let program = std::env::current_exe().map_err(SchedulerError::Spawn)?;
        Ok(Self::new(program, config_path))
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn parse_stdout_line(line: &str) -> WorkerEvent {
    match decode_line::<WorkerMessage>(line) {
        Ok(message) => WorkerEvent::Message(message),
        Err(_) => WorkerEvent::Output(line.to_string()),
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    fn name(&self) -> &str {
        "process"
    }

    async fn launch(
        &self,
        assignment: WorkerAssignment,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<WorkerHandle, SchedulerError> {
        let index = assignment.worker_index;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(WORKER_ARG)
            .env("TALLY_CONFIG", &self.config_path)
            .env("TALLY_VERBOSE", if self.verbose { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(SchedulerError::Spawn)?;

        let pid = child.id().unwrap_or(0);
        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SchedulerError::Launch(format!(
                "worker {} has no stdio pipes",
                index
            )));
        };

        let line = encode_line(&SchedulerMessage::Assign(assignment))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SchedulerError::Launch(format!("failed to send assignment: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| SchedulerError::Launch(format!("failed to send assignment: {}", e)))?;
        debug!("Worker {} started as pid {}", index, pid);

        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let reader_tx = events_tx.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        if reader_tx.send(parse_stdout_line(&line)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed reading worker {} output: {}", pid, e);
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = shutdown.recv() => {
                    info!("Relaying shutdown to worker {}", pid);
                    match encode_line(&SchedulerMessage::Shutdown) {
                        Ok(line) => {
                            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                                warn!("Failed to send shutdown to worker {}: {}", pid, e);
                            }
                            let _ = stdin.flush().await;
                        }
                        Err(e) => warn!("Failed to encode shutdown: {}", e),
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code().unwrap_or(1),
                Err(e) => {
                    warn!("Failed waiting for worker {}: {}", pid, e);
                    1
                }
            };
            let _ = reader.await;
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
    use crate::testing::fixtures;

    #[test]
    fn test_stdout_lines() {
        assert_eq!(
            parse_stdout_line(r#"{"type":"standby","reason":"banned"}"#),
            WorkerEvent::Message(WorkerMessage::Standby {
                reason: "banned".into()
            })
        );
        assert_eq!(
            parse_stdout_line("plain output"),
            WorkerEvent::Output("plain output".into())
        );
    }

    /// `sh -c <script> worker`: the script stands in for the worker binary.
    #[cfg(unix)]
    fn scripted(script: &str) -> ProcessLauncher {
        ProcessLauncher::new("sh", "config.toml").with_args(vec!["-c".into(), script.into()])
    }

    async fn events(mut handle: WorkerHandle) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            let done = matches!(event, WorkerEvent::Exited(_));
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_messages_and_exit_code() {
        let launcher = scripted(
            r#"read line; echo '{"type":"retry_exhausted","emails":["c@example.com"]}'; echo hello; exit 3"#,
        );
        let (_tx, rx) = broadcast::channel(1);

        let handle = launcher
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await
            .unwrap();
        assert_eq!(
            events(handle).await,
            vec![
                WorkerEvent::Message(WorkerMessage::RetryExhausted {
                    emails: vec!["c@example.com".into()]
                }),
                WorkerEvent::Output("hello".into()),
                WorkerEvent::Exited(3),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_assignment_is_first_stdin_line() {
        let launcher = scripted(r#"read line; echo "$line" | grep -q '"type":"assign"' && exit 0; exit 5"#);
        let (_tx, rx) = broadcast::channel(1);

        let handle = launcher
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await
            .unwrap();
        assert_eq!(events(handle).await, vec![WorkerEvent::Exited(0)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_is_relayed_on_stdin() {
        let launcher = scripted(
            r#"read assign; while read line; do case "$line" in *shutdown*) exit 0;; esac; done; exit 9"#,
        );
        let (tx, rx) = broadcast::channel(1);

        let handle = launcher
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        assert_eq!(events(handle).await.last(), Some(&WorkerEvent::Exited(0)));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let launcher = ProcessLauncher::new("/nonexistent/tally-worker", "config.toml");
        let (_tx, rx) = broadcast::channel(1);
        let result = launcher
            .launch(fixtures::assignment(&["a@example.com"], 0), rx)
            .await;
        assert!(matches!(result, Err(SchedulerError::Spawn(_))));
    }
}
