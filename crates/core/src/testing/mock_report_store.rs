//! Mock report store for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::report::{ReportError, ReportStore, RunReport};

/// Keeps reports in memory; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MockReportStore {
    persisted: Arc<RwLock<Vec<RunReport>>>,
    prune_calls: Arc<RwLock<Vec<u32>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn persisted(&self) -> Vec<RunReport> {
        self.persisted.read().await.clone()
    }

    /// Retention values passed to `prune`, in call order.
    pub async fn prune_calls(&self) -> Vec<u32> {
        self.prune_calls.read().await.clone()
    }
}

#[async_trait]
impl ReportStore for MockReportStore {
    async fn persist(&self, report: &RunReport) -> Result<PathBuf, ReportError> {
        let path = PathBuf::from(format!("mock/summary_{}.json", report.run_id));
        if *self.fail.read().await {
            return Err(ReportError::Write {
                path,
                source: std::io::Error::other("mock failure"),
            });
        }
        self.persisted.write().await.push(report.clone());
        Ok(path)
    }

    async fn prune(&self, retention_days: u32) -> Result<usize, ReportError> {
        self.prune_calls.write().await.push(retention_days);
        if *self.fail.read().await {
            return Err(ReportError::Prune {
                path: PathBuf::from("mock"),
                source: std::io::Error::other("mock failure"),
            });
        }
        Ok(0)
    }
}
