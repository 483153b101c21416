//! Builds the collaborators shared by the scheduler and its workers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::info;

use tally_core::report::{LogNotifier, Notifier, WebhookNotifier};
use tally_core::{Collaborators, CommandPhaseExecutor, Config, PatternBanClassifier};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub fn config_path() -> PathBuf {
    std::env::var("TALLY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn verbose_from_env() -> bool {
    std::env::var("TALLY_VERBOSE")
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

/// Short SHA-256 of the effective configuration, recorded in the run report.
pub fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    hash[..16].to_string()
}

pub fn collaborators(config: &Config) -> Result<Collaborators> {
    let classifier = PatternBanClassifier::new(&config.ban.patterns);

    let notifier: Arc<dyn Notifier> = match WebhookNotifier::from_config(&config.notifier)
        .context("Failed to create webhook notifier")?
    {
        Some(webhook) => {
            info!("Notifications go to the configured webhook");
            Arc::new(webhook)
        }
        None => Arc::new(LogNotifier),
    };

    Ok(Collaborators {
        executor: Arc::new(CommandPhaseExecutor::new(config.phase.clone())),
        classifier: Arc::new(classifier),
        notifier,
    })
}
