//! Per-account processing: guards, pacing, phase execution, reconciliation
//! and the single-pass retry queue.

mod account_runner;
mod delay;
mod reconcile;
mod retry;
mod types;
mod windows;

pub use account_runner::AccountRunner;
pub use delay::{random_sleep, sample_delay};
pub use reconcile::{reconcile, Reconciled};
pub use retry::RetryQueue;
pub use types::{AccountStep, Collaborators, HaltReason, PhaseAttempt, PhaseRun, RetryReport};
pub use windows::{
    local_clock, parse_windows, time_until_allowed, wait_for_window, AllowedWindow, Clock,
    WindowParseError,
};
