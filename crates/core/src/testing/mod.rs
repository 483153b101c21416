//! Testing utilities and mock implementations of the collaborator traits.
//!
//! Lets the runner, worker and scheduler be exercised end to end without a
//! real phase program, webhook or report directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_core::testing::{fixtures, MockNotifier, MockPhaseExecutor};
//!
//! let executor = Arc::new(MockPhaseExecutor::new());
//! executor
//!     .respond("a@example.com", PhaseKind::Desktop, Ok(PhaseResult::new(100, 20)))
//!     .await;
//!
//! let collaborators = fixtures::collaborators(executor.clone(), Arc::new(MockNotifier::new()));
//! ```

mod mock_notifier;
mod mock_phase_executor;
mod mock_report_store;

pub use mock_notifier::MockNotifier;
pub use mock_phase_executor::MockPhaseExecutor;
pub use mock_report_store::MockReportStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::{MockNotifier, MockPhaseExecutor};
    use crate::account::Account;
    use crate::config::{BanConfig, Config, DelayRange};
    use crate::ipc::WorkerAssignment;
    use crate::phase::{PatternBanClassifier, PhaseContext, PhaseKind};
    use crate::runner::Collaborators;
    use crate::standby::StandbyController;

    /// Default config with every wait removed.
    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.scheduler.stagger_min_minutes = 0;
        config.scheduler.stagger_max_minutes = 0;
        config.humanization.pre_delay_ms = DelayRange::zero();
        config.humanization.post_delay_ms = DelayRange::zero();
        config
    }

    pub fn account(email: &str) -> Account {
        Account::new(email, "hunter2")
    }

    pub fn accounts(emails: &[&str]) -> Vec<Account> {
        emails.iter().map(|e| account(e)).collect()
    }

    /// Assignment for a single worker.
    pub fn assignment(emails: &[&str], start_delay_ms: u64) -> WorkerAssignment {
        WorkerAssignment {
            chunk: accounts(emails),
            start_delay_ms,
            worker_index: 0,
            total_workers: 1,
        }
    }

    /// Mock executor and notifier with the default ban patterns.
    pub fn collaborators(executor: Arc<MockPhaseExecutor>, notifier: Arc<MockNotifier>) -> Collaborators {
        Collaborators {
            executor,
            classifier: Arc::new(PatternBanClassifier::new(&BanConfig::default().patterns)),
            notifier,
        }
    }

    pub fn phase_context(kind: PhaseKind) -> PhaseContext {
        PhaseContext::new(
            kind,
            Arc::new(test_config()),
            StandbyController::new(),
            None,
            0,
            false,
        )
    }
}
