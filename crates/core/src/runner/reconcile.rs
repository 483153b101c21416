//! Point reconciliation across the two phases of one account.

use crate::account::PhaseResult;

/// Reconciled point figures for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub initial_total: i64,
    pub desktop_collected: i64,
    pub mobile_collected: i64,
}

impl Reconciled {
    pub fn total_collected(&self) -> i64 {
        self.desktop_collected + self.mobile_collected
    }

    pub fn end_total(&self) -> i64 {
        self.initial_total + self.total_collected()
    }
}

/// Combine the phases that completed.
///
/// Only non-zero baselines count. With both, the smaller one is the true
/// starting balance: the mobile reading is usually taken after desktop
/// already earned points, so adding them would double count. A genuine zero
/// baseline is indistinguishable from a missing one and both yield 0.
pub fn reconcile(desktop: Option<&PhaseResult>, mobile: Option<&PhaseResult>) -> Reconciled {
    let initial_total = [desktop, mobile]
        .into_iter()
        .flatten()
        .map(|r| r.initial_points)
        .filter(|points| *points != 0)
        .min()
        .unwrap_or(0);

    Reconciled {
        initial_total,
        desktop_collected: desktop.map_or(0, |r| r.collected_points),
        mobile_collected: mobile.map_or(0, |r| r.collected_points),
    }
}
