pub mod account;
pub mod config;
pub mod heartbeat;
pub mod ipc;
pub mod phase;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod standby;
pub mod testing;
pub mod worker;

pub use account::{load_accounts, Account, AccountError, AccountSummary, PhaseResult};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use phase::{
    BanClassifier, BanVerdict, CommandPhaseExecutor, PatternBanClassifier, PhaseContext,
    PhaseError, PhaseExecutor, PhaseKind,
};
pub use report::{
    JsonReportStore, LogNotifier, Notifier, ReportStore, RunReport, SummaryAggregator,
    WebhookNotifier,
};
pub use runner::{AccountRunner, Collaborators};
pub use scheduler::{
    InProcessLauncher, ProcessLauncher, Scheduler, SchedulerError, ShutdownHandle, WorkerLauncher,
};
pub use standby::StandbyController;
pub use worker::{Worker, WorkerError, WorkerOutcome};
