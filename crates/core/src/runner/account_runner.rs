//! Account runner.
//!
//! Drives one account at a time through:
//! - Guards: standby, stop-on-ban, allowed windows
//! - Pacing: random pre/post delays
//! - Phases: Desktop and Mobile, parallel or sequential
//! - Bookkeeping: reconciliation, ban handling, retry enrollment

use std::error::Error as _;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::warn;

use super::delay::random_sleep;
use super::retry::RetryQueue;
use super::types::{AccountStep, Collaborators, HaltReason, PhaseAttempt, PhaseRun, RetryReport};
use super::windows::{local_clock, parse_windows, wait_for_window, AllowedWindow, Clock};
use crate::account::Account;
use crate::config::Config;
use crate::ipc::WorkerLogger;
use crate::phase::{PhaseContext, PhaseError, PhaseKind};
use crate::report::Alert;
use crate::standby::StandbyController;

const BAN_REASON_MAX_CHARS: usize = 200;

/// Everything a single phase invocation needs. Cloned into each parallel task.
#[derive(Clone)]
struct PhaseDriver {
    config: Arc<Config>,
    collaborators: Collaborators,
    standby: StandbyController,
    logger: WorkerLogger,
    worker_index: usize,
    verbose: bool,
}

impl PhaseDriver {
    async fn attempt(&self, kind: PhaseKind, account: &Account) -> PhaseAttempt {
        let ctx = PhaseContext::new(
            kind,
            self.config.clone(),
            self.standby.clone(),
            account.proxy.clone(),
            self.worker_index,
            self.verbose,
        );

        self.logger.info(
            kind.is_mobile(),
            "PHASE",
            format!("Starting {} phase for {}", kind, account.email),
        );

        match self.collaborators.executor.execute(&ctx, account).await {
            Ok(result) => {
                self.logger.info(
                    kind.is_mobile(),
                    "PHASE",
                    format!(
                        "Finished {} phase for {}: {} collected (balance {})",
                        kind, account.email, result.collected_points, result.initial_points
                    ),
                );
                PhaseAttempt::completed(kind, result)
            }
            Err(error) => self.contain(kind, account, error),
        }
    }

    /// Turn a phase error into a recorded attempt, handling a ban on the way.
    fn contain(&self, kind: PhaseKind, account: &Account, error: PhaseError) -> PhaseAttempt {
        let text = format!("{}: {}", kind, describe_error(&error, self.verbose));
        self.logger.error(kind.is_mobile(), "PHASE", &text);

        let mut attempt = PhaseAttempt::failed(kind, text);
        attempt.login_failed = error.is_login_failure();
        attempt.compromised = error.is_compromised();

        let verdict = self.collaborators.classifier.classify(&error);
        if verdict.status {
            let reason = truncate_reason(verdict.reason.unwrap_or_else(|| error.to_string()));
            self.logger.error(
                kind.is_mobile(),
                "BAN",
                format!("Ban detected for {}: {}", account.email, reason),
            );
            self.raise_alert(Alert::ban(&account.email, kind, &reason));
            self.standby.engage(reason.clone());
            attempt.ban = Some(reason);
        }

        attempt
    }

    /// Fire-and-forget: the alert must never hold up the account.
    fn raise_alert(&self, alert: Alert) {
        let notifier = self.collaborators.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_alert(&alert).await {
                warn!("Failed to send ban alert via {}: {}", notifier.name(), e);
            }
        });
    }
}

fn describe_error(error: &PhaseError, verbose: bool) -> String {
    if !verbose {
        return error.to_string();
    }
    let mut text = format!("{} [{:?}]", error, error);
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    text
}

fn truncate_reason(reason: String) -> String {
    if reason.chars().count() <= BAN_REASON_MAX_CHARS {
        reason
    } else {
        reason.chars().take(BAN_REASON_MAX_CHARS).collect()
    }
}

/// Runs the accounts of one worker, one at a time.
pub struct AccountRunner {
    driver: PhaseDriver,
    windows: Vec<AllowedWindow>,
    clock: Clock,
    retry: RetryQueue,
    ban_triggered: bool,
}

impl AccountRunner {
    pub fn new(
        config: Arc<Config>,
        collaborators: Collaborators,
        standby: StandbyController,
        logger: WorkerLogger,
        worker_index: usize,
    ) -> Self {
        let (windows, invalid) = parse_windows(&config.humanization.allowed_windows);
        for e in invalid {
            warn!("Ignoring allowed window: {}", e);
        }

        Self {
            driver: PhaseDriver {
                config,
                collaborators,
                standby,
                logger,
                worker_index,
                verbose: false,
            },
            windows,
            clock: local_clock(),
            retry: RetryQueue::new(),
            ban_triggered: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.driver.verbose = verbose;
        self
    }

    /// Replace the time source used for the allowed-window check.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn standby(&self) -> &StandbyController {
        &self.driver.standby
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry
    }

    /// Whether this runner has seen a ban so far.
    pub fn ban_triggered(&self) -> bool {
        self.ban_triggered
    }

    fn check_guards(&self) -> Option<HaltReason> {
        if let Some(reason) = self.driver.standby.reason() {
            return Some(HaltReason::Standby {
                reason: reason.to_string(),
            });
        }
        if self.driver.config.humanization.stop_on_ban && self.ban_triggered {
            return Some(HaltReason::StopOnBan);
        }
        None
    }

    /// Guards, then the allowed-window wait.
    async fn admit(&self, account: &Account) -> Result<(), HaltReason> {
        if let Some(halt) = self.check_guards() {
            self.driver.logger.warn(
                false,
                "MAIN",
                format!("Not starting {}: {}", account.email, halt),
            );
            return Err(halt);
        }
        if !self.windows.is_empty() {
            wait_for_window(&self.windows, &self.driver.logger, &self.clock).await;
        }
        Ok(())
    }

    /// Process one account end to end.
    pub async fn process(&mut self, account: &Account) -> AccountStep {
        if let Err(halt) = self.admit(account).await {
            return AccountStep::Halted(halt);
        }

        let started = Instant::now();
        let logger = &self.driver.logger;
        logger.info(false, "MAIN", format!("Starting account {}", account.email));
        if self.driver.verbose {
            logger.debug(
                false,
                "MAIN",
                format!(
                    "Account {}: worker {}, proxy {}, mode {}",
                    account.email,
                    self.driver.worker_index,
                    account
                        .proxy
                        .as_ref()
                        .map(|p| format!("{}:{}", p.url, p.port))
                        .unwrap_or_else(|| "none".to_string()),
                    if self.driver.config.runner.parallel {
                        "parallel"
                    } else {
                        "sequential"
                    }
                ),
            );
        }

        let run = self.run_account_phases(account).await;

        if run.login_failed() && self.retry.enqueue(&account.email) {
            self.driver.logger.warn(
                false,
                "MAIN",
                format!("Login failed for {}, queued for retry", account.email),
            );
        }

        let summary = run.into_summary(&account.email, started.elapsed().as_millis() as u64);
        self.driver.logger.info(
            false,
            "MAIN",
            format!(
                "Finished account {} in {}s: +{} ({} -> {}), {} error(s)",
                summary.email,
                summary.duration_ms / 1000,
                summary.total_collected,
                summary.initial_total,
                summary.end_total,
                summary.errors.len()
            ),
        );
        AccountStep::Finished(summary)
    }

    /// Re-run every queued account once. Results are logged, not summarized.
    pub async fn retry_pending(&mut self, chunk: &[Account]) -> RetryReport {
        let pending = self.retry.take_pending();
        let mut report = RetryReport::default();
        if pending.is_empty() {
            return report;
        }

        self.driver.logger.info(
            false,
            "RETRY",
            format!("Retrying {} account(s) after login failures", pending.len()),
        );

        let mut remaining = pending.into_iter();
        while let Some(email) = remaining.next() {
            let Some(account) = chunk.iter().find(|a| a.email == email) else {
                warn!("Queued account {} is not part of this chunk", email);
                continue;
            };

            if let Err(halt) = self.admit(account).await {
                self.retry.mark_exhausted(&email);
                for rest in remaining.by_ref() {
                    self.retry.mark_exhausted(&rest);
                }
                report.halted = Some(halt);
                break;
            }

            let run = self.run_account_phases(account).await;
            let points = run.reconcile();
            if run.login_failed() {
                self.retry.enqueue(&email);
                self.driver.logger.error(
                    false,
                    "RETRY",
                    format!("Login failed again for {}, needs manual review", email),
                );
            } else {
                self.driver.logger.info(
                    false,
                    "RETRY",
                    format!(
                        "Retry of {} finished: +{} ({} -> {}), {} error(s)",
                        email,
                        points.total_collected(),
                        points.initial_total,
                        points.end_total(),
                        run.errors().len()
                    ),
                );
            }
            report.retried.push(email);
        }

        report.exhausted = self.retry.exhausted().to_vec();
        report
    }

    /// Pre-delay, phases, post-delay.
    async fn run_account_phases(&mut self, account: &Account) -> PhaseRun {
        let humanization = &self.driver.config.humanization;
        random_sleep(&humanization.pre_delay_ms).await;

        let run = if self.driver.config.runner.parallel {
            self.run_parallel(account).await
        } else {
            self.run_sequential(account).await
        };

        random_sleep(&self.driver.config.humanization.post_delay_ms).await;

        if run.ban().is_some() {
            self.ban_triggered = true;
        }
        run
    }

    async fn run_sequential(&self, account: &Account) -> PhaseRun {
        let desktop = self.driver.attempt(PhaseKind::Desktop, account).await;

        let skip = desktop
            .blocks_next_phase()
            .or_else(|| self.driver.standby.is_active().then_some("standby active"));
        let mobile = match skip {
            Some(why) => {
                self.driver.logger.warn(
                    true,
                    "PHASE",
                    format!("Skipping mobile phase for {}: {}", account.email, why),
                );
                None
            }
            None => Some(self.driver.attempt(PhaseKind::Mobile, account).await),
        };

        PhaseRun { desktop, mobile }
    }

    async fn run_parallel(&self, account: &Account) -> PhaseRun {
        let spawn = |kind: PhaseKind| {
            let driver = self.driver.clone();
            let account = account.clone();
            tokio::spawn(async move { driver.attempt(kind, &account).await })
        };
        let desktop_task = spawn(PhaseKind::Desktop);
        let mobile_task = spawn(PhaseKind::Mobile);

        // Settle both before looking at either
        let (desktop, mobile) = futures::future::join(desktop_task, mobile_task).await;
        let settle = |kind: PhaseKind, joined: Result<PhaseAttempt, tokio::task::JoinError>| {
            joined.unwrap_or_else(|e| {
                let text = format!("{}: phase task failed: {}", kind, e);
                self.driver.logger.error(kind.is_mobile(), "PHASE", &text);
                PhaseAttempt::failed(kind, text)
            })
        };

        PhaseRun {
            desktop: settle(PhaseKind::Desktop, desktop),
            mobile: Some(settle(PhaseKind::Mobile, mobile)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{BanStatus, PhaseResult};
    use crate::testing::fixtures;
    use crate::testing::{MockNotifier, MockPhaseExecutor};

    fn runner(config: Config, executor: Arc<MockPhaseExecutor>) -> AccountRunner {
        AccountRunner::new(
            Arc::new(config),
            fixtures::collaborators(executor, Arc::new(MockNotifier::new())),
            StandbyController::new(),
            WorkerLogger::local(1),
            0,
        )
    }

    fn finished(step: AccountStep) -> crate::account::AccountSummary {
        match step {
            AccountStep::Finished(summary) => summary,
            AccountStep::Halted(halt) => panic!("unexpected halt: {}", halt),
        }
    }

    #[test]
    fn test_truncate_reason() {
        let long = "x".repeat(250);
        assert_eq!(truncate_reason(long).len(), 200);
        assert_eq!(truncate_reason("short".into()), "short");
    }

    #[test]
    fn test_describe_error_verbose() {
        let error = PhaseError::failed("boom");
        assert_eq!(describe_error(&error, false), "boom");
        assert!(describe_error(&error, true).contains("Failed(\"boom\")"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_reconciles_points() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let a = fixtures::account("a@example.com");
        executor.respond(&a.email, PhaseKind::Desktop, Ok(PhaseResult::new(100, 20))).await;
        executor.respond(&a.email, PhaseKind::Mobile, Ok(PhaseResult::new(125, 5))).await;

        let mut runner = runner(fixtures::test_config(), executor.clone());
        let summary = finished(runner.process(&a).await);

        assert_eq!(summary.initial_total, 100);
        assert_eq!(summary.total_collected, 25);
        assert_eq!(summary.end_total, 125);
        assert_eq!(
            executor.calls().await,
            vec![
                (a.email.clone(), PhaseKind::Desktop),
                (a.email.clone(), PhaseKind::Mobile)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_compromised_skips_mobile_only() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let a = fixtures::account("a@example.com");
        let b = fixtures::account("b@example.com");
        executor
            .respond(&a.email, PhaseKind::Desktop, Err(PhaseError::Compromised("locked".into())))
            .await;

        let mut runner = runner(fixtures::test_config(), executor.clone());
        let summary = finished(runner.process(&a).await);
        assert_eq!(summary.errors, vec!["desktop: account compromised: locked"]);
        assert_eq!(executor.call_count(&a.email, PhaseKind::Mobile).await, 0);

        // The next account is unaffected
        finished(runner.process(&b).await);
        assert_eq!(executor.call_count(&b.email, PhaseKind::Mobile).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standby_guard_halts_before_start() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let mut runner = runner(fixtures::test_config(), executor.clone());
        runner.standby().engage("banned elsewhere");

        let step = runner.process(&fixtures::account("a@example.com")).await;
        assert_eq!(
            step,
            AccountStep::Halted(HaltReason::Standby {
                reason: "banned elsewhere".into()
            })
        );
        assert!(executor.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_truncates_reason_and_engages_standby() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let a = fixtures::account("a@example.com");
        let long = format!("account banned {}", "!".repeat(300));
        executor
            .respond(&a.email, PhaseKind::Desktop, Err(PhaseError::failed(long)))
            .await;

        let mut runner = runner(fixtures::test_config(), executor);
        let summary = finished(runner.process(&a).await);

        assert!(summary.banned.status);
        assert_eq!(summary.banned.reason.as_ref().unwrap().chars().count(), 200);
        assert!(runner.standby().is_active());
        assert!(runner.ban_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_runs_both_phases_concurrently() {
        let executor = Arc::new(MockPhaseExecutor::new());
        executor.set_delay(std::time::Duration::from_secs(10)).await;
        let a = fixtures::account("a@example.com");
        executor.respond(&a.email, PhaseKind::Desktop, Ok(PhaseResult::new(200, 30))).await;
        executor
            .respond(&a.email, PhaseKind::Mobile, Err(PhaseError::failed("timeout waiting")))
            .await;

        let mut config = fixtures::test_config();
        config.runner.parallel = true;
        let mut runner = runner(config, executor.clone());
        let summary = finished(runner.process(&a).await);

        assert_eq!(executor.max_in_flight().await, 2);
        assert_eq!(summary.desktop_collected, 30);
        assert_eq!(summary.mobile_collected, 0);
        assert_eq!(summary.initial_total, 200);
        assert_eq!(summary.errors, vec!["mobile: timeout waiting"]);
        assert_eq!(summary.banned, BanStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_ban_in_mobile_still_settles_desktop() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let a = fixtures::account("a@example.com");
        executor.respond(&a.email, PhaseKind::Desktop, Ok(PhaseResult::new(50, 10))).await;
        executor
            .respond(&a.email, PhaseKind::Mobile, Err(PhaseError::failed("account suspended")))
            .await;

        let mut config = fixtures::test_config();
        config.runner.parallel = true;
        let mut runner = runner(config, executor);
        let summary = finished(runner.process(&a).await);

        assert_eq!(summary.desktop_collected, 10);
        assert_eq!(summary.banned, BanStatus::banned("account suspended"));
        assert!(runner.standby().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_halts_following_accounts() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let a = fixtures::account("a@example.com");
        executor
            .respond(&a.email, PhaseKind::Desktop, Err(PhaseError::failed("banned device")))
            .await;

        let mut runner = runner(fixtures::test_config(), executor);
        finished(runner.process(&a).await);

        // Standby takes precedence over stop_on_ban in the guard order
        assert!(matches!(
            runner.process(&fixtures::account("b@example.com")).await,
            AccountStep::Halted(HaltReason::Standby { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_pass_after_login_failure() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let c = fixtures::account("c@example.com");
        executor
            .respond(&c.email, PhaseKind::Desktop, Err(PhaseError::LoginFailed("bad otp".into())))
            .await;
        executor.respond(&c.email, PhaseKind::Desktop, Ok(PhaseResult::new(10, 1))).await;

        let mut runner = runner(fixtures::test_config(), executor.clone());
        let summary = finished(runner.process(&c).await);
        assert_eq!(summary.errors, vec!["desktop: login failed: bad otp"]);
        assert_eq!(executor.call_count(&c.email, PhaseKind::Mobile).await, 0);
        assert!(runner.retry_queue().is_pending(&c.email));

        let report = runner.retry_pending(std::slice::from_ref(&c)).await;
        assert_eq!(report.retried, vec![c.email.clone()]);
        assert!(report.exhausted.is_empty());
        assert_eq!(executor.call_count(&c.email, PhaseKind::Desktop).await, 2);
        assert_eq!(executor.call_count(&c.email, PhaseKind::Mobile).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_retry_pass() {
        let executor = Arc::new(MockPhaseExecutor::new());
        let mut runner = runner(fixtures::test_config(), executor);
        assert_eq!(runner.retry_pending(&[]).await, RetryReport::default());
    }
}
