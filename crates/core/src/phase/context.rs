//! Per-invocation execution context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::account::AccountProxy;
use crate::config::Config;
use crate::standby::StandbyController;

/// Which of the two phases is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Desktop,
    Mobile,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Desktop => "desktop",
            PhaseKind::Mobile => "mobile",
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, PhaseKind::Mobile)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a phase invocation may touch, built once per invocation.
///
/// Each phase of a parallel account gets its own context value, but all of
/// them share the worker's [`StandbyController`].
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub kind: PhaseKind,
    pub config: Arc<Config>,
    pub standby: StandbyController,
    pub proxy: Option<AccountProxy>,
    pub worker_index: usize,
    pub verbose: bool,
}

impl PhaseContext {
    pub fn new(
        kind: PhaseKind,
        config: Arc<Config>,
        standby: StandbyController,
        proxy: Option<AccountProxy>,
        worker_index: usize,
        verbose: bool,
    ) -> Self {
        Self {
            kind,
            config,
            standby,
            proxy,
            worker_index,
            verbose,
        }
    }

    pub fn run_on_zero_points(&self) -> bool {
        self.config.runner.run_on_zero_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_kind_serialization() {
        assert_eq!(serde_json::to_string(&PhaseKind::Desktop).unwrap(), "\"desktop\"");
        assert_eq!(PhaseKind::Mobile.to_string(), "mobile");
        assert!(PhaseKind::Mobile.is_mobile());
    }

    #[test]
    fn test_contexts_share_standby() {
        let config = Arc::new(Config::default());
        let standby = StandbyController::new();
        let desktop = PhaseContext::new(PhaseKind::Desktop, config.clone(), standby.clone(), None, 0, false);
        let mobile = PhaseContext::new(PhaseKind::Mobile, config, standby.clone(), None, 0, false);

        mobile.standby.engage("banned");
        assert!(desktop.standby.is_active());
        assert!(desktop.standby.same_as(&mobile.standby));
    }
}
