//! Scheduler <-> worker messages and their line-delimited JSON codec.
//!
//! Every message is one JSON object per line, tagged by `type`. The scheduler
//! writes to a worker's stdin; the worker writes to its stdout. Workers log to
//! stderr locally, so stdout carries nothing but these messages.

mod codec;
mod log;
mod messages;

pub use codec::{decode_line, encode_line, write_lines, IpcError};
pub(crate) use log::log_locally;
pub use log::WorkerLogger;
pub use messages::{LogLevel, LogPayload, SchedulerMessage, WorkerAssignment, WorkerMessage};
