use chrono::Utc;
use tokio::sync::mpsc;

use super::messages::{LogLevel, LogPayload, WorkerMessage};

/// Handle for relaying account-level log lines to the scheduler.
///
/// Cheap to clone and shared by every phase task of a worker. Sending never
/// blocks: when the channel is full or closed the line is logged locally.
#[derive(Debug, Clone)]
pub struct WorkerLogger {
    tx: Option<mpsc::Sender<WorkerMessage>>,
    pid: u32,
}

impl WorkerLogger {
    pub fn new(tx: mpsc::Sender<WorkerMessage>, pid: u32) -> Self {
        Self { tx: Some(tx), pid }
    }

    /// A logger that only writes through `tracing`.
    pub fn local(pid: u32) -> Self {
        Self { tx: None, pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn log(&self, level: LogLevel, is_mobile: bool, tag: &str, message: impl Into<String>) {
        let payload = LogPayload {
            pid: self.pid,
            timestamp: Utc::now(),
            is_mobile,
            tag: tag.to_string(),
            message: message.into(),
            level,
            color: level.color().map(String::from),
        };

        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(WorkerMessage::Log { payload }) {
                if let WorkerMessage::Log { payload } = e.into_inner() {
                    log_locally(&payload);
                }
            }
            return;
        }
        log_locally(&payload);
    }

    pub fn debug(&self, is_mobile: bool, tag: &str, message: impl Into<String>) {
        self.log(LogLevel::Debug, is_mobile, tag, message);
    }

    pub fn info(&self, is_mobile: bool, tag: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, is_mobile, tag, message);
    }

    pub fn warn(&self, is_mobile: bool, tag: &str, message: impl Into<String>) {
        self.log(LogLevel::Warn, is_mobile, tag, message);
    }

    pub fn error(&self, is_mobile: bool, tag: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, is_mobile, tag, message);
    }
}

/// Write a log payload through `tracing`, keeping the worker's pid and platform.
pub(crate) fn log_locally(payload: &LogPayload) {
    let platform = if payload.is_mobile { "MOBILE" } else { "DESKTOP" };
    match payload.level {
        LogLevel::Debug => tracing::debug!(
            "[{}] [{}] [{}] [{}] {}",
            payload.pid,
            payload.timestamp.format("%H:%M:%S"),
            platform,
            payload.tag,
            payload.message
        ),
        LogLevel::Info => tracing::info!(
            "[{}] [{}] [{}] [{}] {}",
            payload.pid,
            payload.timestamp.format("%H:%M:%S"),
            platform,
            payload.tag,
            payload.message
        ),
        LogLevel::Warn => tracing::warn!(
            "[{}] [{}] [{}] [{}] {}",
            payload.pid,
            payload.timestamp.format("%H:%M:%S"),
            platform,
            payload.tag,
            payload.message
        ),
        LogLevel::Error => tracing::error!(
            "[{}] [{}] [{}] [{}] {}",
            payload.pid,
            payload.timestamp.format("%H:%M:%S"),
            platform,
            payload.tag,
            payload.message
        ),
    }
}
