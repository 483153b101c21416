//! Phase execution seam.
//!
//! A phase is one of the two automation passes run per account. The
//! orchestrator only decides whether, when and in what order phases run;
//! the work itself happens behind [`PhaseExecutor`]. Errors are classified
//! by a [`BanClassifier`] to decide whether the whole worker must halt.

mod ban;
mod command;
mod context;
mod error;
mod traits;

pub use ban::PatternBanClassifier;
pub use command::CommandPhaseExecutor;
pub use context::{PhaseContext, PhaseKind};
pub use error::PhaseError;
pub use traits::{BanClassifier, BanVerdict, PhaseExecutor};
