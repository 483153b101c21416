use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// JSON file holding the account list
    #[serde(default = "default_accounts_path")]
    pub accounts_path: PathBuf,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub humanization: HumanizationConfig,
    #[serde(default)]
    pub crash_recovery: CrashRecoveryConfig,
    #[serde(default)]
    pub standby: StandbyConfig,
    #[serde(default)]
    pub phase: PhaseConfig,
    #[serde(default)]
    pub ban: BanConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_path: default_accounts_path(),
            scheduler: SchedulerConfig::default(),
            runner: RunnerConfig::default(),
            humanization: HumanizationConfig::default(),
            crash_recovery: CrashRecoveryConfig::default(),
            standby: StandbyConfig::default(),
            phase: PhaseConfig::default(),
            ban: BanConfig::default(),
            report: ReportConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

fn default_accounts_path() -> PathBuf {
    PathBuf::from("accounts.json")
}

/// Worker pool layout and launch staggering
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Number of workers the account list is split across
    #[serde(default = "default_clusters")]
    pub clusters: usize,
    /// Lower bound of the start delay for every chunk after the first
    #[serde(default = "default_stagger_min")]
    pub stagger_min_minutes: u64,
    /// Upper bound of the start delay for every chunk after the first
    #[serde(default = "default_stagger_max")]
    pub stagger_max_minutes: u64,
    /// Command run once after the report is finalized (program + args)
    #[serde(default)]
    pub post_run_command: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            stagger_min_minutes: default_stagger_min(),
            stagger_max_minutes: default_stagger_max(),
            post_run_command: Vec::new(),
        }
    }
}

fn default_clusters() -> usize {
    1
}

fn default_stagger_min() -> u64 {
    30
}

fn default_stagger_max() -> u64 {
    60
}

/// Per-account phase policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Run the desktop and mobile phases concurrently
    #[serde(default)]
    pub parallel: bool,
    /// Forwarded to phase executors: keep going when nothing is left to earn
    #[serde(default)]
    pub run_on_zero_points: bool,
}

/// Inclusive millisecond range for randomized waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// A range that never sleeps.
    pub const fn zero() -> Self {
        Self { min: 0, max: 0 }
    }
}

/// Pacing and stop conditions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HumanizationConfig {
    /// Stop the remaining accounts of a worker once a ban was detected
    #[serde(default = "default_true")]
    pub stop_on_ban: bool,
    /// Local time windows ("HH:mm-HH:mm") in which accounts may start
    #[serde(default)]
    pub allowed_windows: Vec<String>,
    #[serde(default = "default_pre_delay")]
    pub pre_delay_ms: DelayRange,
    #[serde(default = "default_post_delay")]
    pub post_delay_ms: DelayRange,
}

impl Default for HumanizationConfig {
    fn default() -> Self {
        Self {
            stop_on_ban: true,
            allowed_windows: Vec::new(),
            pre_delay_ms: default_pre_delay(),
            post_delay_ms: default_post_delay(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pre_delay() -> DelayRange {
    DelayRange::new(2000, 5000)
}

fn default_post_delay() -> DelayRange {
    DelayRange::new(1000, 3000)
}

/// Worker respawn policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrashRecoveryConfig {
    #[serde(default)]
    pub restart_failed_worker: bool,
    /// Replacement workers allowed per worker slot
    #[serde(default = "default_restart_attempts")]
    pub restart_failed_worker_attempts: u32,
    /// Hand the crashed worker's chunk to its replacement.
    /// Off by default: replacements start with an empty chunk.
    #[serde(default)]
    pub reassign_chunk: bool,
}

impl Default for CrashRecoveryConfig {
    fn default() -> Self {
        Self {
            restart_failed_worker: false,
            restart_failed_worker_attempts: default_restart_attempts(),
            reassign_chunk: false,
        }
    }
}

fn default_restart_attempts() -> u32 {
    1
}

/// Standby hold behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StandbyConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    300
}

/// External phase program
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseConfig {
    /// Program and arguments; empty means no phase program is configured
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_phase_timeout")]
    pub timeout_secs: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_phase_timeout(),
        }
    }
}

fn default_phase_timeout() -> u64 {
    1800
}

/// Ban detection patterns
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BanConfig {
    /// Case-insensitive regular expressions matched against phase errors
    #[serde(default = "default_ban_patterns")]
    pub patterns: Vec<String>,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            patterns: default_ban_patterns(),
        }
    }
}

fn default_ban_patterns() -> Vec<String> {
    [
        r"\bbann?ed\b",
        r"\bsuspend(ed|ion)?\b",
        r"account\s+(has\s+been\s+)?(locked|restricted|disabled)",
        r"security\s+(check|challenge|hold)",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Run report persistence and conclusion pagination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
    /// Dated report directories older than this are removed at run end
    #[serde(default)]
    pub retention_days: Option<u32>,
    /// Accounts listed per conclusion page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Conclusion pages sent at most
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
            retention_days: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_page_size() -> usize {
    10
}

fn default_max_pages() -> usize {
    10
}

/// Outbound notification channel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_notifier_timeout(),
        }
    }
}

fn default_notifier_timeout() -> u64 {
    15
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub accounts_path: PathBuf,
    pub scheduler: SchedulerConfig,
    pub runner: RunnerConfig,
    pub humanization: HumanizationConfig,
    pub crash_recovery: CrashRecoveryConfig,
    pub phase_command_configured: bool,
    pub report: ReportConfig,
    pub webhook_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            accounts_path: config.accounts_path.clone(),
            scheduler: config.scheduler.clone(),
            runner: config.runner.clone(),
            humanization: config.humanization.clone(),
            crash_recovery: config.crash_recovery.clone(),
            phase_command_configured: !config.phase.command.is_empty(),
            report: config.report.clone(),
            webhook_configured: config
                .notifier
                .webhook_url
                .as_ref()
                .is_some_and(|u| !u.is_empty()),
        }
    }
}
