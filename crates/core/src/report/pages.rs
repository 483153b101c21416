//! Paginated conclusion payload.

use serde::{Deserialize, Serialize};

use super::types::RunTotals;
use crate::account::AccountSummary;

/// One page of the conclusion message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionPage {
    pub title: String,
    pub description: Option<String>,
    pub items: Vec<String>,
    pub footer: Option<String>,
}

fn account_line(summary: &AccountSummary) -> String {
    let mut line = format!(
        "{}: +{} (desktop {}, mobile {}) {} -> {}",
        summary.email,
        summary.total_collected,
        summary.desktop_collected,
        summary.mobile_collected,
        summary.initial_total,
        summary.end_total
    );
    if summary.banned.status {
        line.push_str(&format!(
            " [BANNED: {}]",
            summary.banned.reason.as_deref().unwrap_or("unknown")
        ));
    } else if !summary.errors.is_empty() {
        line.push_str(&format!(" [{} error(s)]", summary.errors.len()));
    }
    line
}

fn totals_description(totals: &RunTotals) -> String {
    format!(
        "Accounts: {} ({} ok, {} with errors, {} banned)\nCollected: {}\nBalance: {} -> {}\nDuration: {}s",
        totals.accounts,
        totals.successes,
        totals.with_errors,
        totals.banned,
        totals.total_collected,
        totals.initial_total,
        totals.end_total,
        totals.duration_ms / 1000
    )
}

/// Build the conclusion pages: `page_size` lines per page, at most `max_pages`
/// pages. Page one carries the totals; the last page notes any accounts that
/// did not fit.
pub fn build_conclusion_pages(
    summaries: &[AccountSummary],
    totals: &RunTotals,
    page_size: usize,
    max_pages: usize,
) -> Vec<ConclusionPage> {
    let page_size = page_size.max(1);
    let max_pages = max_pages.max(1);
    let lines: Vec<String> = summaries.iter().map(account_line).collect();
    let shown = lines.len().min(page_size.saturating_mul(max_pages));
    let hidden = lines.len() - shown;

    let chunks: Vec<&[String]> = if shown == 0 {
        vec![&[]]
    } else {
        lines[..shown].chunks(page_size).collect()
    };
    let page_count = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, items)| ConclusionPage {
            title: if page_count > 1 {
                format!("Run summary ({}/{})", i + 1, page_count)
            } else {
                "Run summary".to_string()
            },
            description: (i == 0).then(|| totals_description(totals)),
            items: items.to_vec(),
            footer: (i + 1 == page_count && hidden > 0)
                .then(|| format!("... and {} more account(s) not shown", hidden)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::BanStatus;

    fn summaries(n: usize) -> Vec<AccountSummary> {
        (0..n)
            .map(|i| {
                AccountSummary::new(
                    format!("user{}@example.com", i),
                    100,
                    10,
                    5,
                    1000,
                    vec![],
                    BanStatus::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_single_page() {
        let s = summaries(3);
        let pages = build_conclusion_pages(&s, &RunTotals::from_summaries(&s), 10, 10);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Run summary");
        assert_eq!(pages[0].items.len(), 3);
        assert!(pages[0].description.as_deref().unwrap().contains("Accounts: 3"));
        assert!(pages[0].footer.is_none());
        assert_eq!(pages[0].items[0], "user0@example.com: +15 (desktop 10, mobile 5) 1000 -> 1015");
    }

    #[test]
    fn test_pagination() {
        let s = summaries(25);
        let pages = build_conclusion_pages(&s, &RunTotals::from_summaries(&s), 10, 10);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].items.len(), 5);
        assert_eq!(pages[1].title, "Run summary (2/3)");
        assert!(pages[1].description.is_none());
        assert!(pages.iter().all(|p| p.footer.is_none()));
    }

    #[test]
    fn test_overflow_footer() {
        let s = summaries(25);
        let pages = build_conclusion_pages(&s, &RunTotals::from_summaries(&s), 5, 2);
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages[1].footer.as_deref(),
            Some("... and 15 more account(s) not shown")
        );
        assert!(pages[0].footer.is_none());
    }

    #[test]
    fn test_huge_page_limits() {
        let s = summaries(3);
        let pages = build_conclusion_pages(&s, &RunTotals::from_summaries(&s), usize::MAX, usize::MAX);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].items.len(), 3);
        assert!(pages[0].footer.is_none());
    }

    #[test]
    fn test_empty_run_still_has_totals_page() {
        let pages = build_conclusion_pages(&[], &RunTotals::default(), 10, 10);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].items.is_empty());
        assert!(pages[0].description.is_some());
    }

    #[test]
    fn test_banned_line() {
        let s = vec![AccountSummary::new(
            "b@example.com",
            0,
            0,
            0,
            0,
            vec!["desktop: banned device".into()],
            BanStatus::banned("banned device"),
        )];
        let pages = build_conclusion_pages(&s, &RunTotals::from_summaries(&s), 10, 10);
        assert!(pages[0].items[0].ends_with("[BANNED: banned device]"));
    }
}
