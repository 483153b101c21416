//! Error types for phase execution.

use thiserror::Error;

/// Errors a phase invocation can end with.
///
/// All of them are contained at the account boundary; none stops the worker
/// by itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    /// The phase failed; the message is what gets classified for bans.
    #[error("{0}")]
    Failed(String),

    /// Login could not be completed; the account is queued for one retry.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The account needs attention; remaining activities of this account are skipped.
    #[error("account compromised: {0}")]
    Compromised(String),

    /// The phase exceeded its time budget.
    #[error("phase timed out after {0}s")]
    Timeout(u64),
}

impl PhaseError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_login_failure(&self) -> bool {
        matches!(self, Self::LoginFailed(_))
    }

    pub fn is_compromised(&self) -> bool {
        matches!(self, Self::Compromised(_))
    }
}
