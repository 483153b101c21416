use std::fmt;
use std::sync::Arc;

use crate::account::{AccountSummary, BanStatus, PhaseResult};
use crate::phase::{BanClassifier, PhaseExecutor, PhaseKind};
use crate::report::Notifier;

use super::reconcile::{reconcile, Reconciled};

/// External collaborators shared by every account of a worker.
#[derive(Clone)]
pub struct Collaborators {
    pub executor: Arc<dyn PhaseExecutor>,
    pub classifier: Arc<dyn BanClassifier>,
    pub notifier: Arc<dyn Notifier>,
}

/// Why the remaining chunk was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    Standby { reason: String },
    StopOnBan,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Standby { reason } => write!(f, "standby active ({})", reason),
            HaltReason::StopOnBan => f.write_str("a ban was detected and stop_on_ban is set"),
        }
    }
}

/// Outcome of offering one account to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStep {
    Finished(AccountSummary),
    /// The account was not started and nothing after it should be.
    Halted(HaltReason),
}

/// What one phase produced, with its error already contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseAttempt {
    pub kind: PhaseKind,
    pub result: Option<PhaseResult>,
    /// `"<phase>: <error>"` when the phase failed.
    pub error: Option<String>,
    /// Truncated ban reason when the failure was classified as a ban.
    pub ban: Option<String>,
    pub login_failed: bool,
    pub compromised: bool,
}

impl PhaseAttempt {
    pub fn completed(kind: PhaseKind, result: PhaseResult) -> Self {
        Self {
            kind,
            result: Some(result),
            error: None,
            ban: None,
            login_failed: false,
            compromised: false,
        }
    }

    pub fn failed(kind: PhaseKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            result: None,
            error: Some(error.into()),
            ban: None,
            login_failed: false,
            compromised: false,
        }
    }

    /// Why the other phase must not run after this one, if at all.
    pub fn blocks_next_phase(&self) -> Option<&'static str> {
        if self.ban.is_some() {
            Some("ban detected")
        } else if self.compromised {
            Some("account compromised")
        } else if self.login_failed {
            Some("login failed")
        } else {
            None
        }
    }
}

/// Both phases of one account. `mobile` is `None` when it was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRun {
    pub desktop: PhaseAttempt,
    pub mobile: Option<PhaseAttempt>,
}

impl PhaseRun {
    fn attempts(&self) -> impl Iterator<Item = &PhaseAttempt> {
        std::iter::once(&self.desktop).chain(self.mobile.as_ref())
    }

    pub fn errors(&self) -> Vec<String> {
        self.attempts().filter_map(|a| a.error.clone()).collect()
    }

    /// First ban reason, desktop before mobile.
    pub fn ban(&self) -> Option<&str> {
        self.attempts().find_map(|a| a.ban.as_deref())
    }

    pub fn login_failed(&self) -> bool {
        self.attempts().any(|a| a.login_failed)
    }

    pub fn reconcile(&self) -> Reconciled {
        reconcile(
            self.desktop.result.as_ref(),
            self.mobile.as_ref().and_then(|m| m.result.as_ref()),
        )
    }

    pub fn into_summary(self, email: &str, duration_ms: u64) -> AccountSummary {
        let points = self.reconcile();
        let banned = self.ban().map(BanStatus::banned).unwrap_or_default();
        AccountSummary::new(
            email,
            duration_ms,
            points.desktop_collected,
            points.mobile_collected,
            points.initial_total,
            self.errors(),
            banned,
        )
    }
}

/// Result of the retry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub retried: Vec<String>,
    /// Accounts that still need manual inspection.
    pub exhausted: Vec<String>,
    pub halted: Option<HaltReason>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_run() {
        let run = PhaseRun {
            desktop: PhaseAttempt::completed(PhaseKind::Desktop, PhaseResult::new(100, 20)),
            mobile: Some(PhaseAttempt::completed(PhaseKind::Mobile, PhaseResult::new(125, 5))),
        };
        let summary = run.into_summary("a@example.com", 42);
        assert_eq!(summary.initial_total, 100);
        assert_eq!(summary.total_collected, 25);
        assert_eq!(summary.end_total, 125);
        assert!(summary.is_success());
    }

    #[test]
    fn test_banned_run() {
        let mut desktop = PhaseAttempt::failed(PhaseKind::Desktop, "desktop: banned device");
        desktop.ban = Some("banned device".into());
        let run = PhaseRun { desktop, mobile: None };

        assert_eq!(run.desktop.blocks_next_phase(), Some("ban detected"));
        let summary = run.into_summary("a@example.com", 1);
        assert_eq!(summary.banned, BanStatus::banned("banned device"));
        assert_eq!(summary.errors, vec!["desktop: banned device"]);
        assert_eq!(summary.total_collected, 0);
    }

    #[test]
    fn test_errors_keep_phase_order() {
        let run = PhaseRun {
            desktop: PhaseAttempt::failed(PhaseKind::Desktop, "desktop: x"),
            mobile: Some(PhaseAttempt::failed(PhaseKind::Mobile, "mobile: y")),
        };
        assert_eq!(run.errors(), vec!["desktop: x", "mobile: y"]);
    }

    #[test]
    fn test_halt_reason_display() {
        let halt = HaltReason::Standby { reason: "banned".into() };
        assert_eq!(halt.to_string(), "standby active (banned)");
    }
}
