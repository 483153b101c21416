//! Account list loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::Account;

/// Errors that can occur while loading accounts.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Accounts file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read accounts file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse accounts: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Account #{0} has an empty email")]
    EmptyEmail(usize),

    #[error("Duplicate account: {0}")]
    Duplicate(String),
}

/// Load the account list from a JSON array file.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, AccountError> {
    if !path.exists() {
        return Err(AccountError::FileNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| AccountError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_accounts(&raw)
}

/// Parse and check an account list.
pub fn parse_accounts(raw: &str) -> Result<Vec<Account>, AccountError> {
    let accounts: Vec<Account> = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    for (idx, account) in accounts.iter().enumerate() {
        if account.email.trim().is_empty() {
            return Err(AccountError::EmptyEmail(idx));
        }
        if !seen.insert(account.email.to_lowercase()) {
            return Err(AccountError::Duplicate(account.email.clone()));
        }
    }

    Ok(accounts)
}
