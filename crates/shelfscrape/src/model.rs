//! Core data types for the mirrored catalog.
//!
//! Field names here are the durable schema contract; the SQLite columns in
//! [`crate::store`] use the same names in snake case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::Diagnostic;

/// A top-level category as exposed to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub url: String,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Scrape-tracking counterpart of a [`NavigationEntry`], one-to-one by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub navigation_id: Option<i64>,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// One catalog listing. Identity is `source_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub source_id: String,
    pub title: String,
    /// Display string as scraped, currency symbol included.
    pub price: String,
    pub image_url: Option<String>,
    pub source_url: String,
    pub category_id: i64,
    pub last_scraped_at: DateTime<Utc>,
}

/// Long-form fields for a product. Its existence means "already enriched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub id: i64,
    pub product_id: i64,
    pub description: String,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
}

/// A product with its detail attached when enriched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub detail: Option<ProductDetail>,
    /// What the enrichment pass recovered from; empty on a cache hit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// An unvalidated, pre-deduplication extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub price: String,
    pub image_url: Option<String>,
    pub source_id: String,
    pub product_url: Option<String>,
}

/// Identity of a resolved navigation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetId {
    /// Backed by a persisted [`NavigationEntry`].
    Persisted(i64),
    /// Synthesized on the fly; never written back and never used as an owner.
    Transient,
}

/// The crawlable target a category key resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavTarget {
    pub id: TargetId,
    pub slug: String,
    pub title: String,
    pub url: String,
}

impl NavTarget {
    pub fn is_transient(&self) -> bool {
        self.id == TargetId::Transient
    }

    /// The persisted navigation id, if any.
    pub fn navigation_id(&self) -> Option<i64> {
        match self.id {
            TargetId::Persisted(id) => Some(id),
            TargetId::Transient => None,
        }
    }
}

impl From<&NavigationEntry> for NavTarget {
    fn from(entry: &NavigationEntry) -> Self {
        Self {
            id: TargetId::Persisted(entry.id),
            slug: entry.slug.clone(),
            title: entry.title.clone(),
            url: entry.url.clone(),
        }
    }
}

/// One page of products for a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPage {
    pub items: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl BookPage {
    pub fn empty(page: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            total_pages: 0,
        }
    }
}

/// A seed category used by navigation bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedCategory {
    pub title: &'static str,
    pub slug: &'static str,
    pub url: &'static str,
}

/// Long-form fields pulled from a product page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
}

/// Lowercase, hyphen-joined natural key derived from a title.
///
/// Truncated to [`SOURCE_ID_MAX_CHARS`] characters, so two titles that agree
/// on their first 50 characters share a key.
pub fn source_id_for(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .take(SOURCE_ID_MAX_CHARS)
        .collect()
}

/// Maximum length of a derived `source_id`.
pub const SOURCE_ID_MAX_CHARS: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_for_title() {
        assert_eq!(source_id_for("The Great Escape"), "the-great-escape");
        assert_eq!(source_id_for("  The   Great\nEscape "), "the-great-escape");
    }

    #[test]
    fn test_source_id_truncates() {
        let title = "A ".repeat(60);
        let id = source_id_for(&title);
        assert_eq!(id.chars().count(), SOURCE_ID_MAX_CHARS);
        assert!(id.starts_with("a-a-a"));
    }

    #[test]
    fn test_transient_target_has_no_navigation_id() {
        let target = NavTarget {
            id: TargetId::Transient,
            slug: "poetry".into(),
            title: "poetry".into(),
            url: "https://example.com/collections/poetry-books".into(),
        };
        assert!(target.is_transient());
        assert_eq!(target.navigation_id(), None);
    }
}
