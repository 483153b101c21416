use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::account::AccountSummary;

/// Errors raised while persisting or pruning reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to prune reports in {path}: {source}")]
    Prune {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Aggregated figures over every account summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub accounts: usize,
    pub successes: usize,
    pub with_errors: usize,
    pub banned: usize,
    pub total_collected: i64,
    pub initial_total: i64,
    pub end_total: i64,
    pub duration_ms: u64,
}

impl RunTotals {
    pub fn from_summaries(summaries: &[AccountSummary]) -> Self {
        summaries.iter().fold(Self::default(), |mut totals, s| {
            totals.accounts += 1;
            if s.is_success() {
                totals.successes += 1;
            }
            if !s.errors.is_empty() {
                totals.with_errors += 1;
            }
            if s.banned.status {
                totals.banned += 1;
            }
            totals.total_collected += s.total_collected;
            totals.initial_total += s.initial_total;
            totals.end_total += s.end_total;
            totals.duration_ms += s.duration_ms;
            totals
        })
    }
}

/// The document persisted once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub totals: RunTotals,
    pub accounts: Vec<AccountSummary>,
    /// Emails still pending after the retry pass.
    #[serde(default)]
    pub manual_review: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::BanStatus;

    #[test]
    fn test_totals() {
        let summaries = vec![
            AccountSummary::new("a@example.com", 1000, 20, 5, 100, vec![], BanStatus::default()),
            AccountSummary::new(
                "b@example.com",
                500,
                0,
                0,
                0,
                vec!["desktop: banned device".into()],
                BanStatus::banned("banned device"),
            ),
            AccountSummary::new(
                "c@example.com",
                250,
                3,
                0,
                40,
                vec!["mobile: timeout".into()],
                BanStatus::default(),
            ),
        ];

        let totals = RunTotals::from_summaries(&summaries);
        assert_eq!(totals.accounts, 3);
        assert_eq!(totals.successes, 1);
        assert_eq!(totals.with_errors, 2);
        assert_eq!(totals.banned, 1);
        assert_eq!(totals.total_collected, 28);
        assert_eq!(totals.initial_total, 140);
        assert_eq!(totals.end_total, 168);
        assert_eq!(totals.duration_ms, 1750);
    }

    #[test]
    fn test_empty_totals() {
        assert_eq!(RunTotals::from_summaries(&[]), RunTotals::default());
    }
}
