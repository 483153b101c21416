//! Trait definitions for phase collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::context::PhaseContext;
use super::error::PhaseError;
use crate::account::{Account, PhaseResult};

/// Performs one phase for one account.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    /// Returns the name of this executor implementation.
    fn name(&self) -> &str;

    /// Runs the phase named by `ctx.kind` for `account`.
    async fn execute(&self, ctx: &PhaseContext, account: &Account) -> Result<PhaseResult, PhaseError>;
}

/// Ban verdict for a phase error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanVerdict {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BanVerdict {
    pub fn banned(reason: impl Into<String>) -> Self {
        Self {
            status: true,
            reason: Some(reason.into()),
        }
    }

    pub fn clear() -> Self {
        Self::default()
    }
}

/// Decides whether a phase error is a ban signal.
pub trait BanClassifier: Send + Sync {
    fn classify(&self, error: &PhaseError) -> BanVerdict;
}
