//! Account data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy settings attached to an account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProxy {
    pub url: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for AccountProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountProxy")
            .field("url", &self.url)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One credential/target unit processed during a run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<AccountProxy>,
}

impl Account {
    /// Create an account with just an email and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            totp: None,
            recovery_email: None,
            proxy: None,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("totp", &self.totp.as_ref().map(|_| "<redacted>"))
            .field("recovery_email", &self.recovery_email)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Outcome of one phase invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Point balance observed when the phase started.
    pub initial_points: i64,
    /// Points earned by the phase.
    pub collected_points: i64,
}

impl PhaseResult {
    pub fn new(initial_points: i64, collected_points: i64) -> Self {
        Self {
            initial_points,
            collected_points,
        }
    }
}

/// Ban verdict recorded on a summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanStatus {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BanStatus {
    pub fn banned(reason: impl Into<String>) -> Self {
        Self {
            status: true,
            reason: Some(reason.into()),
        }
    }
}

/// Per-account record, immutable once built.
///
/// `total_collected` and `end_total` are derived in [`AccountSummary::new`] so the
/// sum invariants cannot be broken by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub email: String,
    pub duration_ms: u64,
    pub desktop_collected: i64,
    pub mobile_collected: i64,
    pub total_collected: i64,
    pub initial_total: i64,
    pub end_total: i64,
    pub errors: Vec<String>,
    pub banned: BanStatus,
}

impl AccountSummary {
    pub fn new(
        email: impl Into<String>,
        duration_ms: u64,
        desktop_collected: i64,
        mobile_collected: i64,
        initial_total: i64,
        errors: Vec<String>,
        banned: BanStatus,
    ) -> Self {
        let total_collected = desktop_collected + mobile_collected;
        Self {
            email: email.into(),
            duration_ms,
            desktop_collected,
            mobile_collected,
            total_collected,
            initial_total,
            end_total: initial_total + total_collected,
            errors,
            banned,
        }
    }

    /// No errors recorded and not banned.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.banned.status
    }
}
