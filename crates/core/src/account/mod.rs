//! Accounts, per-phase results and per-account summaries.

mod loader;
mod types;

pub use loader::{load_accounts, parse_accounts, AccountError};
pub use types::*;
