//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::report::{Alert, ConclusionPage, Notifier, NotifyError};

/// Records alerts and conclusions; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    alerts: Arc<RwLock<Vec<Alert>>>,
    conclusions: Arc<RwLock<Vec<Vec<ConclusionPage>>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    /// Every conclusion sent, one entry per call.
    pub async fn conclusions(&self) -> Vec<Vec<ConclusionPage>> {
        self.conclusions.read().await.clone()
    }

    async fn check(&self) -> Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError::Rejected {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.check().await?;
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn send_conclusion(&self, pages: &[ConclusionPage]) -> Result<(), NotifyError> {
        self.check().await?;
        self.conclusions.write().await.push(pages.to_vec());
        Ok(())
    }
}
