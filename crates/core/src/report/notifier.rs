//! Outbound notifications: ban alerts and the run conclusion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::pages::ConclusionPage;
use crate::config::NotifierConfig;
use crate::phase::PhaseKind;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// A ban alert raised while an account was being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub email: String,
    pub phase: PhaseKind,
    pub reason: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn ban(email: impl Into<String>, phase: PhaseKind, reason: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            phase,
            reason: reason.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Ban detected for {} during {} phase: {}",
            self.email, self.phase, self.reason
        )
    }
}

/// Sink for alerts and conclusion pages.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError>;

    async fn send_conclusion(&self, pages: &[ConclusionPage]) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        warn!("ALERT: {}", alert.message());
        Ok(())
    }

    async fn send_conclusion(&self, pages: &[ConclusionPage]) -> Result<(), NotifyError> {
        for page in pages {
            info!("{}", page.title);
            if let Some(description) = &page.description {
                for line in description.lines() {
                    info!("  {}", line);
                }
            }
            for item in &page.items {
                info!("  {}", item);
            }
            if let Some(footer) = &page.footer {
                info!("  {}", footer);
            }
        }
        Ok(())
    }
}

/// Posts to a chat webhook: plain content for alerts, one embed per page.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build from config; `None` when no webhook URL is set.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>, NotifyError> {
        match config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(Some(Self::new(url, Duration::from_secs(config.timeout_secs))?)),
            None => Ok(None),
        }
    }

    fn page_body(page: &ConclusionPage) -> serde_json::Value {
        let mut description = String::new();
        if let Some(d) = &page.description {
            description.push_str(d);
            description.push_str("\n\n");
        }
        description.push_str(&page.items.join("\n"));

        let mut embed = json!({
            "title": page.title,
            "description": description,
        });
        if let Some(footer) = &page.footer {
            embed["footer"] = json!({ "text": footer });
        }
        json!({ "embeds": [embed] })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.post(&json!({ "content": alert.message() })).await
    }

    async fn send_conclusion(&self, pages: &[ConclusionPage]) -> Result<(), NotifyError> {
        for page in pages {
            self.post(&Self::page_body(page)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message() {
        let alert = Alert::ban("a@example.com", PhaseKind::Desktop, "banned device");
        assert_eq!(
            alert.message(),
            "Ban detected for a@example.com during desktop phase: banned device"
        );
    }

    #[test]
    fn test_page_body() {
        let page = ConclusionPage {
            title: "Run summary (2/2)".into(),
            description: None,
            items: vec!["a".into(), "b".into()],
            footer: Some("... and 3 more account(s) not shown".into()),
        };
        let body = WebhookNotifier::page_body(&page);
        assert_eq!(body["embeds"][0]["title"], "Run summary (2/2)");
        assert_eq!(body["embeds"][0]["description"], "a\nb");
        assert_eq!(
            body["embeds"][0]["footer"]["text"],
            "... and 3 more account(s) not shown"
        );
    }

    #[test]
    fn test_from_config_without_url() {
        let notifier = WebhookNotifier::from_config(&NotifierConfig::default()).unwrap();
        assert!(notifier.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_errors() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:9/hook", Duration::from_secs(2)).unwrap();
        let alert = Alert::ban("a@example.com", PhaseKind::Mobile, "suspended");
        assert!(notifier.send_alert(&alert).await.is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        let alert = Alert::ban("a@example.com", PhaseKind::Mobile, "suspended");
        assert!(notifier.send_alert(&alert).await.is_ok());
        assert!(notifier.send_conclusion(&[]).await.is_ok());
    }
}
