//! Report persistence.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::{ReportError, RunReport};

const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Stores run reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist one report, returning where it was written.
    async fn persist(&self, report: &RunReport) -> Result<PathBuf, ReportError>;

    /// Remove reports older than `retention_days`. Returns how many dated
    /// directories were removed.
    async fn prune(&self, retention_days: u32) -> Result<usize, ReportError>;
}

/// JSON files under `<dir>/<YYYY-MM-DD>/summary_<run_id>_<HHMMSS>.json`.
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    dir: PathBuf,
}

impl JsonReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn report_path(&self, report: &RunReport) -> PathBuf {
        let finished = report.finished_at.with_timezone(&Local);
        self.dir
            .join(finished.format(DATE_DIR_FORMAT).to_string())
            .join(format!(
                "summary_{}_{}.json",
                report.run_id,
                finished.format("%H%M%S")
            ))
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, ReportError> {
        let prune_err = |source| ReportError::Prune {
            path: self.dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(prune_err(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(prune_err)? {
            let name = entry.file_name();
            // Only dated directories are ours to remove
            let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, DATE_DIR_FORMAT).ok())
            else {
                continue;
            };
            if date < cutoff && entry.path().is_dir() {
                tokio::fs::remove_dir_all(entry.path())
                    .await
                    .map_err(prune_err)?;
                debug!("Pruned report directory {}", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn persist(&self, report: &RunReport) -> Result<PathBuf, ReportError> {
        let path = self.report_path(report);
        let write_err = |source| ReportError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let body = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, body).await.map_err(write_err)?;

        info!("Run report written to {}", path.display());
        Ok(path)
    }

    async fn prune(&self, retention_days: u32) -> Result<usize, ReportError> {
        let today = Local::now().date_naive();
        let cutoff = today - chrono::Duration::days(i64::from(retention_days));
        self.prune_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunTotals;
    use chrono::Utc;
    use tempfile::TempDir;

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: "abc12345".into(),
            started_at: now,
            finished_at: now,
            config_hash: "deadbeef".into(),
            totals: RunTotals::default(),
            accounts: vec![],
            manual_review: vec!["c@example.com".into()],
        }
    }

    #[tokio::test]
    async fn test_persist_layout() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::new(dir.path());
        let report = report();

        let path = store.persist(&report).await.unwrap();
        let day = report.finished_at.with_timezone(&Local).format("%Y-%m-%d").to_string();
        assert_eq!(path.parent().unwrap(), dir.path().join(day));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("summary_abc12345_"));
        assert!(name.ends_with(".json"));

        let stored: RunReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, report);
    }

    #[tokio::test]
    async fn test_prune_removes_old_dated_dirs_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("2020-01-01")).unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        let store = JsonReportStore::new(dir.path());
        store.persist(&report()).await.unwrap();

        let removed = store.prune(7).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("2020-01-01").exists());
        assert!(dir.path().join("notes").exists());
        let today = Local::now().format("%Y-%m-%d").to_string();
        assert!(dir.path().join(today).exists());
    }

    #[tokio::test]
    async fn test_prune_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::new(dir.path().join("missing"));
        assert_eq!(store.prune(7).await.unwrap(), 0);
    }
}
