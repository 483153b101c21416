//! Run-level reporting: summary aggregation, conclusion pages, persistence
//! and notifications.

mod aggregator;
mod notifier;
mod pages;
mod store;
mod types;

pub use aggregator::SummaryAggregator;
pub use notifier::{Alert, LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use pages::{build_conclusion_pages, ConclusionPage};
pub use store::{JsonReportStore, ReportStore};
pub use types::{ReportError, RunReport, RunTotals};
