use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountSummary};

/// One-shot work order for a worker. Never reused once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub chunk: Vec<Account>,
    pub start_delay_ms: u64,
    pub worker_index: usize,
    pub total_workers: usize,
}

/// Scheduler -> worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerMessage {
    Assign(WorkerAssignment),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Terminal color hint carried with relayed lines.
    pub fn color(&self) -> Option<&'static str> {
        match self {
            LogLevel::Debug => Some("gray"),
            LogLevel::Info => None,
            LogLevel::Warn => Some("yellow"),
            LogLevel::Error => Some("red"),
        }
    }
}

/// A worker-side log line relayed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub pid: u32,
    pub timestamp: DateTime<Utc>,
    pub is_mobile: bool,
    pub tag: String,
    pub message: String,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Worker -> scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Log { payload: LogPayload },
    /// Summaries of accounts that finished since the previous message.
    Summary { data: Vec<AccountSummary> },
    /// Accounts still failing login after their single retry.
    RetryExhausted { emails: Vec<String> },
    /// The worker engaged standby and is holding open.
    Standby { reason: String },
}

impl WorkerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Summary { .. } => "summary",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Standby { .. } => "standby",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::BanStatus;

    #[test]
    fn test_assign_wire_format() {
        let msg = SchedulerMessage::Assign(WorkerAssignment {
            chunk: vec![Account::new("a@example.com", "x")],
            start_delay_ms: 0,
            worker_index: 1,
            total_workers: 2,
        });
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "assign");
        assert_eq!(value["worker_index"], 1);
        assert_eq!(value["chunk"][0]["email"], "a@example.com");
    }

    #[test]
    fn test_shutdown_wire_format() {
        let json = serde_json::to_string(&SchedulerMessage::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn test_summary_wire_format() {
        let msg = WorkerMessage::Summary {
            data: vec![AccountSummary::new("a@example.com", 10, 20, 5, 100, vec![], BanStatus::default())],
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "summary");
        assert_eq!(value["data"][0]["end_total"], 125);
        assert_eq!(msg.message_type(), "summary");
    }

    #[test]
    fn test_log_payload_color_omitted_when_absent() {
        let payload = LogPayload {
            pid: 42,
            timestamp: Utc::now(),
            is_mobile: false,
            tag: "MAIN".to_string(),
            message: "hello".to_string(),
            level: LogLevel::Info,
            color: None,
        };
        let value = serde_json::to_value(WorkerMessage::Log { payload }).unwrap();
        assert_eq!(value["payload"]["level"], "info");
        assert!(value["payload"].get("color").is_none());
    }
}
