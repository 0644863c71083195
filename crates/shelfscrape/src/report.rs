//! Diagnostics for best-effort scraping.
//!
//! The session and extraction layers never fail a scrape. Whatever went
//! wrong is recorded as a [`Diagnostic`] next to the records that were
//! captured, so callers and tests can see it without network access.

use serde::{Deserialize, Serialize};

use crate::model::{Candidate, NavTarget, Product};

/// Something the pipeline recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No navigation entry matched; a transient target was synthesized.
    FallbackTarget { key: String, url: String },
    /// The browser context for a page could not be created.
    ContextUnavailable { url: String, reason: String },
    /// Navigation failed or timed out; extraction used whatever DOM loaded.
    NavigationFailed { url: String, reason: String },
    /// No DOM could be read back from the page at all.
    SnapshotUnavailable { url: String, reason: String },
    /// Targets beyond the per-session page cap were dropped.
    PageLimitReached { limit: usize, dropped: usize },
    /// The session's wall-clock budget ran out before these targets finished.
    SessionBudgetExhausted { skipped: usize },
    /// A browser call outside navigation and DOM capture hit the page timeout.
    StepTimedOut { url: String, step: String },
    /// Zero candidates survived filtering.
    ExtractionEmpty { url: String },
    /// No persisted category exists, so nothing was stored.
    PersistenceSkipped { slug: String },
}

impl Diagnostic {
    /// Whether this diagnostic means the upstream page was (partly) unreachable.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            Diagnostic::ContextUnavailable { .. }
                | Diagnostic::NavigationFailed { .. }
                | Diagnostic::SnapshotUnavailable { .. }
        )
    }
}

/// Result of one category scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeReport {
    /// Where the session went.
    pub target: NavTarget,
    /// Deduplicated records, in first-seen DOM order.
    pub records: Vec<Candidate>,
    /// Rows as stored; empty when persistence was skipped.
    pub products: Vec<Product>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScrapeReport {
    pub fn persistence_skipped(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::PersistenceSkipped { .. }))
    }

    pub fn extraction_empty(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::ExtractionEmpty { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_serialize_with_kind_tag() {
        let d = Diagnostic::PageLimitReached {
            limit: 10,
            dropped: 2,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "page_limit_reached");
        assert_eq!(json["dropped"], 2);
    }

    #[test]
    fn test_upstream_classification() {
        let failed = Diagnostic::NavigationFailed {
            url: "https://shop.test".into(),
            reason: "timeout".into(),
        };
        let empty = Diagnostic::ExtractionEmpty {
            url: "https://shop.test".into(),
        };
        assert!(failed.is_upstream_unavailable());
        assert!(!empty.is_upstream_unavailable());
    }
}
