//! Pattern-based ban classification.

use regex_lite::Regex;
use tracing::warn;

use super::error::PhaseError;
use super::traits::{BanClassifier, BanVerdict};

/// Flags an error as a ban when its text matches any configured pattern.
#[derive(Debug)]
pub struct PatternBanClassifier {
    patterns: Vec<Regex>,
}

impl PatternBanClassifier {
    /// Compile patterns case-insensitively. Invalid patterns are skipped with a warning;
    /// config validation rejects them before this point in normal startup.
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid ban pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl BanClassifier for PatternBanClassifier {
    fn classify(&self, error: &PhaseError) -> BanVerdict {
        let text = match error {
            PhaseError::Failed(msg) | PhaseError::LoginFailed(msg) | PhaseError::Compromised(msg) => {
                msg.as_str()
            }
            PhaseError::Timeout(_) => return BanVerdict::clear(),
        };

        if self.patterns.iter().any(|re| re.is_match(text)) {
            BanVerdict::banned(text)
        } else {
            BanVerdict::clear()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BanConfig;

    fn classifier() -> PatternBanClassifier {
        PatternBanClassifier::new(&BanConfig::default().patterns)
    }

    #[test]
    fn test_banned_device_is_ban() {
        let verdict = classifier().classify(&PhaseError::failed("banned device"));
        assert_eq!(verdict, BanVerdict::banned("banned device"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let verdict = classifier().classify(&PhaseError::LoginFailed("Your Account Has Been Locked".into()));
        assert!(verdict.status);
    }

    #[test]
    fn test_ordinary_failure_is_not_ban() {
        let verdict = classifier().classify(&PhaseError::failed("element not found: #search"));
        assert!(!verdict.status);
    }

    #[test]
    fn test_banner_is_not_ban() {
        let verdict = classifier().classify(&PhaseError::failed("cookie banner did not close"));
        assert!(!verdict.status);
    }

    #[test]
    fn test_timeout_is_never_ban() {
        assert!(!classifier().classify(&PhaseError::Timeout(10)).status);
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let classifier = PatternBanClassifier::new(&["(open".to_string(), "blocked".to_string()]);
        assert_eq!(classifier.pattern_count(), 1);
    }
}
