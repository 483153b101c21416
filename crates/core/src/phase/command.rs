//! Phase executor backed by an external program.
//!
//! The program is started once per phase with the account as JSON on stdin
//! and `TALLY_PHASE` set to `desktop` or `mobile`. It must print one JSON
//! object on stdout, either a [`PhaseResult`] or
//! `{"error": "...", "kind": "failed" | "login_failed" | "compromised"}`.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::context::PhaseContext;
use super::error::PhaseError;
use super::traits::PhaseExecutor;
use crate::account::{Account, PhaseResult};
use crate::config::PhaseConfig;

/// Shape of a failure reported by the phase program.
#[derive(Debug, Deserialize)]
struct ReportedError {
    error: String,
    #[serde(default)]
    kind: ReportedErrorKind,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReportedErrorKind {
    #[default]
    Failed,
    LoginFailed,
    Compromised,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhaseOutput {
    Error(ReportedError),
    Result(PhaseResult),
}

/// Runs the configured phase program.
pub struct CommandPhaseExecutor {
    config: PhaseConfig,
}

impl CommandPhaseExecutor {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    /// Last non-empty stdout line decoded as a phase answer.
    ///
    /// Programs may log before the final line.
    fn read_answer(stdout: &str) -> Option<PhaseOutput> {
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
        serde_json::from_str(line.trim()).ok()
    }

    fn parse_output(stdout: &str) -> Result<PhaseResult, PhaseError> {
        match Self::read_answer(stdout) {
            Some(PhaseOutput::Result(result)) => Ok(result),
            Some(PhaseOutput::Error(reported)) => Err(reported.into()),
            None if stdout.trim().is_empty() => {
                Err(PhaseError::failed("phase program produced no output"))
            }
            None => Err(PhaseError::failed(format!(
                "unreadable phase output: {}",
                stdout.trim()
            ))),
        }
    }
}

impl From<ReportedError> for PhaseError {
    fn from(reported: ReportedError) -> Self {
        match reported.kind {
            ReportedErrorKind::Failed => PhaseError::Failed(reported.error),
            ReportedErrorKind::LoginFailed => PhaseError::LoginFailed(reported.error),
            ReportedErrorKind::Compromised => PhaseError::Compromised(reported.error),
        }
    }
}

#[async_trait]
impl PhaseExecutor for CommandPhaseExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, ctx: &PhaseContext, account: &Account) -> Result<PhaseResult, PhaseError> {
        let Some((program, args)) = self.config.command.split_first() else {
            return Err(PhaseError::failed("no phase command configured"));
        };

        let payload = serde_json::to_vec(account)
            .map_err(|e| PhaseError::failed(format!("failed to encode account: {}", e)))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env("TALLY_PHASE", ctx.kind.as_str())
            .env("TALLY_WORKER_INDEX", ctx.worker_index.to_string())
            .env("TALLY_RUN_ON_ZERO_POINTS", ctx.run_on_zero_points().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(proxy) = &ctx.proxy {
            command.env("TALLY_PROXY", format!("{}:{}", proxy.url, proxy.port));
        }

        let mut child = command.spawn().map_err(|e| {
            PhaseError::failed(format!("failed to start phase program '{}': {}", program, e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| PhaseError::failed(format!("failed to send account: {}", e)))?;
            // Dropping stdin closes it so the program sees EOF
        }

        let output = match timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(PhaseError::failed(format!("phase program failed: {}", e))),
            // kill_on_drop reaps the child once the future is dropped
            Err(_) => return Err(PhaseError::Timeout(self.config.timeout_secs)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            "Phase program for {} ({}) exited with {:?}",
            account.email, ctx.kind, output.status
        );

        if !output.status.success() {
            // A structured error on stdout wins over the raw stderr text
            if let Some(PhaseOutput::Error(reported)) = Self::read_answer(&stdout) {
                return Err(reported.into());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PhaseError::failed(format!(
                "phase program exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Self::parse_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result_line() {
        let result =
            CommandPhaseExecutor::parse_output("starting\n{\"initial_points\":100,\"collected_points\":20}\n")
                .unwrap();
        assert_eq!(result, PhaseResult::new(100, 20));
    }

    #[test]
    fn test_parse_login_failure() {
        let err = CommandPhaseExecutor::parse_output(r#"{"error":"wrong password","kind":"login_failed"}"#)
            .unwrap_err();
        assert_eq!(err, PhaseError::LoginFailed("wrong password".into()));
    }

    #[test]
    fn test_parse_error_defaults_to_failed() {
        let err = CommandPhaseExecutor::parse_output(r#"{"error":"banned device"}"#).unwrap_err();
        assert_eq!(err, PhaseError::failed("banned device"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = CommandPhaseExecutor::parse_output("not json").unwrap_err();
        assert!(err.to_string().starts_with("unreadable phase output"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(CommandPhaseExecutor::parse_output("\n\n").is_err());
    }

    #[tokio::test]
    async fn test_missing_command() {
        let executor = CommandPhaseExecutor::new(PhaseConfig::default());
        let ctx = crate::testing::fixtures::phase_context(crate::phase::PhaseKind::Desktop);
        let err = executor
            .execute(&ctx, &Account::new("a@example.com", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, PhaseError::failed("no phase command configured"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_program_and_reads_result() {
        let executor = CommandPhaseExecutor::new(PhaseConfig {
            command: vec![
                "sh".into(),
                "-c".into(),
                r#"cat > /dev/null; echo "{\"initial_points\":50,\"collected_points\":7}""#.into(),
            ],
            timeout_secs: 10,
        });
        let ctx = crate::testing::fixtures::phase_context(crate::phase::PhaseKind::Mobile);
        let result = executor
            .execute(&ctx, &Account::new("a@example.com", "x"))
            .await
            .unwrap();
        assert_eq!(result, PhaseResult::new(50, 7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_phase_env_is_forwarded() {
        let executor = CommandPhaseExecutor::new(PhaseConfig {
            command: vec![
                "sh".into(),
                "-c".into(),
                r#"cat > /dev/null; echo "{\"error\":\"phase=$TALLY_PHASE\"}"; exit 3"#.into(),
            ],
            timeout_secs: 10,
        });
        let ctx = crate::testing::fixtures::phase_context(crate::phase::PhaseKind::Mobile);
        let err = executor
            .execute(&ctx, &Account::new("a@example.com", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, PhaseError::failed("phase=mobile"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_uses_stderr() {
        let executor = CommandPhaseExecutor::new(PhaseConfig {
            command: vec!["sh".into(), "-c".into(), "cat > /dev/null; echo boom >&2; exit 2".into()],
            timeout_secs: 10,
        });
        let ctx = crate::testing::fixtures::phase_context(crate::phase::PhaseKind::Desktop);
        let err = executor
            .execute(&ctx, &Account::new("a@example.com", "x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let executor = CommandPhaseExecutor::new(PhaseConfig {
            command: vec!["sh".into(), "-c".into(), "sleep 5".into()],
            timeout_secs: 1,
        });
        let ctx = crate::testing::fixtures::phase_context(crate::phase::PhaseKind::Desktop);
        let err = executor
            .execute(&ctx, &Account::new("a@example.com", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, PhaseError::Timeout(1));
    }
}
