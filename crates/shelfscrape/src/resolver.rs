//! Category key → crawlable target resolution.
//!
//! Storefront slugs do not always match the keys users ask for, and the
//! navigation table may still be empty. Resolution therefore falls back in
//! layers and always produces a target:
//!
//! 1. exact navigation slug
//! 2. the same key with the `-books` suffix toggled (stripped if present,
//!    appended otherwise)
//! 3. a transient target built from the storefront's collection-path convention

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::{SiteConfig, CATEGORY_SUFFIX};
use crate::error::CatalogResult;
use crate::model::{Category, NavTarget, NavigationEntry, TargetId};
use crate::report::Diagnostic;
use crate::store::Catalog;

/// Resolves category keys against the navigation table.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    site: &'a SiteConfig,
}

/// Outcome of resolving a key for scraping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: NavTarget,
    /// The owning category, when one exists or could be created.
    pub category: Option<Category>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, site: &'a SiteConfig) -> Self {
        Self { catalog, site }
    }

    /// Steps 1 and 2 only: a persisted entry for the key, if any.
    pub fn find_entry(&self, key: &str) -> CatalogResult<Option<NavigationEntry>> {
        let key = key.trim();
        if let Some(entry) = self.catalog.find_navigation_by_slug(key)? {
            return Ok(Some(entry));
        }

        let alternate = match key.strip_suffix(CATEGORY_SUFFIX) {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            Some(_) => return Ok(None),
            None => format!("{key}{CATEGORY_SUFFIX}"),
        };
        debug!(key, alternate = %alternate, "exact slug missing; trying alternate form");
        self.catalog.find_navigation_by_slug(&alternate)
    }

    /// Resolve a key to a target. Never fails for lack of data.
    pub fn resolve(&self, key: &str) -> CatalogResult<(NavTarget, Option<Diagnostic>)> {
        if let Some(entry) = self.find_entry(key)? {
            return Ok((NavTarget::from(&entry), None));
        }

        let key = key.trim();
        let storefront_slug = if key.ends_with(CATEGORY_SUFFIX) {
            key.to_string()
        } else {
            format!("{key}{CATEGORY_SUFFIX}")
        };
        let target = NavTarget {
            id: TargetId::Transient,
            slug: key.to_string(),
            title: key.to_string(),
            url: self.site.collection_url(&storefront_slug),
        };
        warn!(key, url = %target.url, "no navigation entry; using fallback target");
        let diagnostic = Diagnostic::FallbackTarget {
            key: key.to_string(),
            url: target.url.clone(),
        };
        Ok((target, Some(diagnostic)))
    }

    /// Resolve a key and find or create its category.
    ///
    /// A category is only created for a persisted target, since its owner
    /// reference must point at a real navigation row.
    pub fn resolve_for_scrape(&self, key: &str) -> CatalogResult<Resolution> {
        let (target, fallback) = self.resolve(key)?;
        let mut diagnostics: Vec<Diagnostic> = fallback.into_iter().collect();

        let category = match self.catalog.find_category_by_slug(&target.slug)? {
            Some(category) => Some(category),
            None => match target.navigation_id() {
                Some(navigation_id) => Some(self.catalog.create_category(
                    &target.slug,
                    &target.title,
                    navigation_id,
                    Utc::now(),
                )?),
                None => None,
            },
        };

        if category.is_none() {
            diagnostics.push(Diagnostic::PersistenceSkipped {
                slug: target.slug.clone(),
            });
        }

        Ok(Resolution {
            target,
            category,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeedCategory;

    const HISTORY: SeedCategory = SeedCategory {
        title: "History",
        slug: "history-books",
        url: "https://www.worldofbooks.com/en-gb/collections/history-books",
    };

    fn catalog_with_history() -> Catalog {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.upsert_navigation(&HISTORY, Utc::now()).unwrap();
        catalog
    }

    #[test]
    fn test_exact_and_suffix_forms_resolve_to_same_target() {
        let catalog = catalog_with_history();
        let site = SiteConfig::default();
        let resolver = Resolver::new(&catalog, &site);

        let (short, short_diag) = resolver.resolve("history").unwrap();
        let (long, long_diag) = resolver.resolve("history-books").unwrap();
        assert_eq!(short, long);
        assert!(!short.is_transient());
        assert!(short_diag.is_none() && long_diag.is_none());
    }

    #[test]
    fn test_suffix_is_stripped_for_short_slugs() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog
            .upsert_navigation(
                &SeedCategory {
                    title: "Poetry",
                    slug: "poetry",
                    url: "https://www.worldofbooks.com/en-gb/collections/poetry",
                },
                Utc::now(),
            )
            .unwrap();
        let site = SiteConfig::default();
        let (target, _) = Resolver::new(&catalog, &site)
            .resolve("poetry-books")
            .unwrap();
        assert_eq!(target.slug, "poetry");
    }

    #[test]
    fn test_cold_database_synthesizes_transient_target() {
        let catalog = Catalog::open_in_memory().unwrap();
        let site = SiteConfig::default();
        let resolver = Resolver::new(&catalog, &site);

        let (target, diag) = resolver.resolve("crime").unwrap();
        assert!(target.is_transient());
        assert_eq!(target.slug, "crime");
        assert_eq!(
            target.url,
            "https://www.worldofbooks.com/en-gb/collections/crime-books"
        );
        assert!(matches!(diag, Some(Diagnostic::FallbackTarget { .. })));

        let (target, _) = resolver.resolve("crime-books").unwrap();
        assert_eq!(
            target.url,
            "https://www.worldofbooks.com/en-gb/collections/crime-books"
        );
        assert!(catalog.list_navigation().unwrap().is_empty());
    }

    #[test]
    fn test_category_created_only_for_persisted_targets() {
        let catalog = catalog_with_history();
        let site = SiteConfig::default();
        let resolver = Resolver::new(&catalog, &site);

        let real = resolver.resolve_for_scrape("history").unwrap();
        let category = real.category.expect("category for real target");
        assert_eq!(category.slug, "history-books");
        assert_eq!(category.navigation_id, real.target.navigation_id());
        assert!(real.diagnostics.is_empty());

        let again = resolver.resolve_for_scrape("history-books").unwrap();
        assert_eq!(again.category.map(|c| c.id), Some(category.id));

        let transient = resolver.resolve_for_scrape("crime").unwrap();
        assert!(transient.category.is_none());
        assert!(transient
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::PersistenceSkipped { .. })));
        assert_eq!(catalog.counts().unwrap().1, 1);
    }
}
