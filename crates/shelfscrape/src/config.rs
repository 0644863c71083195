//! Configuration loading and resolution.
//!
//! Defaults are compiled in; [`EngineConfig::from_env`] overlays
//! `SHELFSCRAPE_*` environment variables on top of them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::model::SeedCategory;

/// Seed categories for navigation bootstrap. Loaded once, never mutated.
pub static SEED_CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        title: "Fiction",
        slug: "fiction-books",
        url: "https://www.worldofbooks.com/en-gb/collections/fiction-books",
    },
    SeedCategory {
        title: "Non-Fiction",
        slug: "non-fiction-books",
        url: "https://www.worldofbooks.com/en-gb/collections/non-fiction-books",
    },
    SeedCategory {
        title: "Children's",
        slug: "childrens-books",
        url: "https://www.worldofbooks.com/en-gb/collections/childrens-books",
    },
    SeedCategory {
        title: "Rare Books",
        slug: "rare-books",
        url: "https://www.worldofbooks.com/en-gb/rare-books",
    },
    SeedCategory {
        title: "History",
        slug: "history-books",
        url: "https://www.worldofbooks.com/en-gb/collections/history-books",
    },
    SeedCategory {
        title: "Adventure",
        slug: "adventure-books",
        url: "https://www.worldofbooks.com/en-gb/collections/adventure-books",
    },
];

/// Suffix the storefront uses on collection slugs.
pub const CATEGORY_SUFFIX: &str = "-books";

/// URL conventions of the mirrored storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host, no trailing slash.
    pub base_url: String,
    /// Path prefix of collection pages, with leading and trailing slash.
    pub collection_path: String,
    /// Path prefix of product pages, with leading and trailing slash.
    pub product_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.worldofbooks.com".to_string(),
            collection_path: "/en-gb/collections/".to_string(),
            product_path: "/product/".to_string(),
        }
    }
}

impl SiteConfig {
    /// Collection page for a storefront slug.
    pub fn collection_url(&self, slug: &str) -> String {
        format!("{}{}{}", self.base_url, self.collection_path, slug)
    }

    /// Synthesized product page for a natural key.
    pub fn product_url(&self, source_id: &str) -> String {
        format!("{}{}{}", self.base_url, self.product_path, source_id)
    }
}

/// Sub-resource classes that can be suppressed during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Image,
    Font,
    Stylesheet,
    Script,
    Json,
}

impl ResourceClass {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            ResourceClass::Image => &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico"],
            ResourceClass::Font => &["woff", "woff2", "ttf", "otf"],
            ResourceClass::Stylesheet => &["css"],
            ResourceClass::Script => &["js"],
            ResourceClass::Json => &["json"],
        }
    }

    /// URL glob patterns matching this class, with and without a query string.
    pub fn url_patterns(self) -> Vec<String> {
        self.extensions()
            .iter()
            .flat_map(|ext| [format!("*.{ext}"), format!("*.{ext}?*")])
            .collect()
    }
}

/// Limits and behavior of one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hard cap on page loads per session.
    pub max_pages: usize,
    /// Per-page navigation timeout; extraction proceeds on whatever loaded.
    pub page_timeout_ms: u64,
    /// Wall-clock budget for the whole session.
    pub session_timeout_ms: u64,
    /// Sub-resources aborted before they load.
    pub blocked_resources: Vec<ResourceClass>,
    /// Click a visible accept/allow control if one exists.
    pub dismiss_consent: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            page_timeout_ms: 45_000,
            session_timeout_ms: 120_000,
            blocked_resources: vec![
                ResourceClass::Image,
                ResourceClass::Font,
                ResourceClass::Stylesheet,
                ResourceClass::Script,
                ResourceClass::Json,
            ],
            dismiss_consent: true,
        }
    }
}

impl SessionConfig {
    /// Narrower single-page session used for product detail pages.
    pub fn for_detail(timeout_ms: u64) -> Self {
        Self {
            max_pages: 1,
            page_timeout_ms: timeout_ms,
            session_timeout_ms: timeout_ms.saturating_mul(2),
            blocked_resources: vec![
                ResourceClass::Image,
                ResourceClass::Stylesheet,
                ResourceClass::Script,
            ],
            dismiss_consent: false,
        }
    }

    /// All URL patterns to block for this session.
    pub fn blocked_url_patterns(&self) -> Vec<String> {
        self.blocked_resources
            .iter()
            .flat_map(|class| class.url_patterns())
            .collect()
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub site: SiteConfig,
    pub session: SessionConfig,
    pub detail_timeout_ms: u64,
    pub page_size: u32,
    pub description_max_chars: usize,
    pub search_limit: usize,
    pub db_path: Option<PathBuf>,
    pub chromium_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            session: SessionConfig::default(),
            detail_timeout_ms: 15_000,
            page_size: 12,
            description_max_chars: 1000,
            search_limit: 20,
            db_path: None,
            chromium_path: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `SHELFSCRAPE_*` environment variables.
    pub fn from_env() -> CatalogResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> CatalogResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("SHELFSCRAPE_DB") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("SHELFSCRAPE_CHROMIUM_PATH") {
            config.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(base) = lookup("SHELFSCRAPE_BASE_URL") {
            config.site.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("SHELFSCRAPE_PAGE_TIMEOUT_MS") {
            config.session.page_timeout_ms = parse_number("SHELFSCRAPE_PAGE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("SHELFSCRAPE_MAX_PAGES") {
            let max_pages: usize = parse_number("SHELFSCRAPE_MAX_PAGES", &raw)?;
            if max_pages == 0 {
                return Err(CatalogError::Config(
                    "SHELFSCRAPE_MAX_PAGES must be at least 1".to_string(),
                ));
            }
            config.session.max_pages = max_pages;
        }

        Ok(config)
    }

    /// Session settings for the detail enrichment pass.
    pub fn detail_session(&self) -> SessionConfig {
        SessionConfig::for_detail(self.detail_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> CatalogResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::Config(format!("{key} is not a valid number: {raw:?}")))
}

/// Resolve the catalog database path.
///
/// Order: explicit argument, `SHELFSCRAPE_DB`, then `~/.shelfscrape/catalog.db`.
pub fn resolve_db_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("SHELFSCRAPE_DB") {
        return PathBuf::from(env_path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shelfscrape")
        .join("catalog.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_collection_url_convention() {
        let site = SiteConfig::default();
        assert_eq!(
            site.collection_url("history-books"),
            "https://www.worldofbooks.com/en-gb/collections/history-books"
        );
        assert_eq!(
            site.product_url("the-hobbit"),
            "https://www.worldofbooks.com/product/the-hobbit"
        );
    }

    #[test]
    fn test_seed_slugs_are_unique() {
        let mut slugs: Vec<_> = SEED_CATEGORIES.iter().map(|c| c.slug).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), SEED_CATEGORIES.len());
    }

    #[test]
    fn test_env_overlay() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("SHELFSCRAPE_PAGE_TIMEOUT_MS", "5000"),
            ("SHELFSCRAPE_MAX_PAGES", "3"),
            ("SHELFSCRAPE_BASE_URL", "http://127.0.0.1:8080/"),
        ]))
        .unwrap();
        assert_eq!(config.session.page_timeout_ms, 5000);
        assert_eq!(config.session.max_pages, 3);
        assert_eq!(config.site.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.page_size, 12);
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let err = EngineConfig::from_lookup(lookup_from(&[("SHELFSCRAPE_MAX_PAGES", "lots")]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));

        let err = EngineConfig::from_lookup(lookup_from(&[("SHELFSCRAPE_MAX_PAGES", "0")]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn test_blocked_patterns_cover_query_strings() {
        let patterns = ResourceClass::Script.url_patterns();
        assert_eq!(patterns, vec!["*.js".to_string(), "*.js?*".to_string()]);

        let detail = SessionConfig::for_detail(15_000);
        assert_eq!(detail.max_pages, 1);
        assert!(!detail.blocked_url_patterns().iter().any(|p| p.contains("woff")));
    }

    #[test]
    fn test_resolve_db_path_prefers_explicit() {
        assert_eq!(
            resolve_db_path(Some("/tmp/catalog.db")),
            PathBuf::from("/tmp/catalog.db")
        );
    }
}
