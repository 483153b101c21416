//! Run-wide summary accumulation and finalization.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::notifier::Notifier;
use super::pages::build_conclusion_pages;
use super::store::ReportStore;
use super::types::{RunReport, RunTotals};
use crate::account::AccountSummary;
use crate::config::ReportConfig;

/// Collects account summaries in completion order and emits the run report.
pub struct SummaryAggregator {
    config: ReportConfig,
    run_id: String,
    started_at: DateTime<Utc>,
    config_hash: String,
    summaries: Vec<AccountSummary>,
    manual_review: Vec<String>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ReportStore>,
}

impl SummaryAggregator {
    pub fn new(
        config: ReportConfig,
        config_hash: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            config,
            run_id,
            started_at: Utc::now(),
            config_hash: config_hash.into(),
            summaries: Vec::new(),
            manual_review: Vec::new(),
            notifier,
            store,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn accumulate(&mut self, summary: AccountSummary) {
        self.summaries.push(summary);
    }

    /// Record accounts that still need a human after the retry pass.
    pub fn note_manual_review(&mut self, emails: impl IntoIterator<Item = String>) {
        for email in emails {
            if !self.manual_review.contains(&email) {
                self.manual_review.push(email);
            }
        }
    }

    pub fn summaries(&self) -> &[AccountSummary] {
        &self.summaries
    }

    pub fn manual_review(&self) -> &[String] {
        &self.manual_review
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals::from_summaries(&self.summaries)
    }

    /// Compute totals, notify, persist and prune. Never fails: every
    /// notification and persistence error is logged.
    pub async fn finalize(self) -> RunReport {
        let totals = self.totals();
        info!(
            "Run {} finished: {} account(s), {} collected, {} banned",
            self.run_id, totals.accounts, totals.total_collected, totals.banned
        );
        if !self.manual_review.is_empty() {
            warn!(
                "{} account(s) need manual review: {}",
                self.manual_review.len(),
                self.manual_review.join(", ")
            );
        }

        let pages = build_conclusion_pages(
            &self.summaries,
            &totals,
            self.config.page_size,
            self.config.max_pages,
        );
        if let Err(e) = self.notifier.send_conclusion(&pages).await {
            error!("Failed to send conclusion via {}: {}", self.notifier.name(), e);
        }

        let report = RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash,
            totals,
            accounts: self.summaries,
            manual_review: self.manual_review,
        };

        if let Err(e) = self.store.persist(&report).await {
            error!("Failed to persist run report: {}", e);
        }
        if let Some(days) = self.config.retention_days {
            match self.store.prune(days).await {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} report director(ies) older than {} day(s)", n, days),
                Err(e) => error!("Failed to prune old reports: {}", e),
            }
        }

        report
    }
}
