use regex_lite::Regex;

use super::{types::Config, ConfigError, DelayRange};
use crate::runner::AllowedWindow;

/// Validate configuration
///
/// Checks:
/// - at least one cluster
/// - delay and stagger ranges are ordered
/// - every allowed window parses
/// - report pagination bounds are non-zero
/// - ban patterns compile
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.scheduler.clusters == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.clusters must be at least 1".to_string(),
        ));
    }

    if config.scheduler.stagger_min_minutes > config.scheduler.stagger_max_minutes {
        return Err(ConfigError::ValidationError(
            "scheduler.stagger_min_minutes cannot exceed stagger_max_minutes".to_string(),
        ));
    }

    check_range("humanization.pre_delay_ms", &config.humanization.pre_delay_ms)?;
    check_range("humanization.post_delay_ms", &config.humanization.post_delay_ms)?;

    for window in &config.humanization.allowed_windows {
        AllowedWindow::parse(window).map_err(|e| {
            ConfigError::ValidationError(format!("humanization.allowed_windows: {}", e))
        })?;
    }

    if config.crash_recovery.restart_failed_worker
        && config.crash_recovery.restart_failed_worker_attempts == 0
    {
        return Err(ConfigError::ValidationError(
            "crash_recovery.restart_failed_worker_attempts must be at least 1 when restarts are enabled"
                .to_string(),
        ));
    }

    if config.report.page_size == 0 || config.report.max_pages == 0 {
        return Err(ConfigError::ValidationError(
            "report.page_size and report.max_pages must be at least 1".to_string(),
        ));
    }

    for pattern in &config.ban.patterns {
        Regex::new(pattern).map_err(|e| {
            ConfigError::ValidationError(format!("ban.patterns: '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

fn check_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if range.min > range.max {
        return Err(ConfigError::ValidationError(format!(
            "{}: min ({}) cannot exceed max ({})",
            name, range.min, range.max
        )));
    }
    Ok(())
}
