//! The catalog engine: both pipelines plus the catalog read operations.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::{EngineConfig, SEED_CATEGORIES};
use crate::dedup::dedup_by_title;
use crate::enrich::DetailEnricher;
use crate::error::{CatalogError, CatalogResult};
use crate::extract::{ListingExtractor, RecordExtractor};
use crate::model::{BookPage, Candidate, NavigationEntry, Product, ProductView};
use crate::reconcile::Reconciler;
use crate::renderer::Renderer;
use crate::report::{Diagnostic, ScrapeReport};
use crate::resolver::Resolver;
use crate::session::SessionDriver;
use crate::store::Catalog;

/// Scrape-and-reconcile engine over one catalog and one browser.
pub struct ShelfEngine {
    catalog: Arc<Catalog>,
    renderer: Arc<dyn Renderer>,
    config: EngineConfig,
    extractor: Box<dyn RecordExtractor>,
}

impl ShelfEngine {
    pub fn new(catalog: Arc<Catalog>, renderer: Arc<dyn Renderer>, config: EngineConfig) -> Self {
        Self {
            catalog,
            renderer,
            config,
            extractor: Box::new(ListingExtractor::new()),
        }
    }

    /// Replace the listing-page extractor.
    pub fn with_extractor(mut self, extractor: Box<dyn RecordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Pipelines ──

    /// Resolve, render, extract, deduplicate and (when a category exists)
    /// reconcile one category.
    ///
    /// Only storage errors fail this call. Upstream trouble is reported in
    /// [`ScrapeReport::diagnostics`] alongside whatever was captured.
    pub async fn scrape_category(&self, key: &str) -> CatalogResult<ScrapeReport> {
        let resolution =
            Resolver::new(&self.catalog, &self.config.site).resolve_for_scrape(key)?;
        let target = resolution.target;
        let mut diagnostics = resolution.diagnostics;

        let driver = SessionDriver::new(self.renderer.as_ref(), self.config.session.clone());
        let outcome = driver.run(std::slice::from_ref(&target.url)).await;
        diagnostics.extend(outcome.diagnostics);

        let raw: Vec<Candidate> = outcome
            .snapshots
            .iter()
            .flat_map(|snapshot| self.extractor.extract_records(snapshot))
            .collect();
        let raw_count = raw.len();
        let records = dedup_by_title(raw);

        if records.is_empty() {
            diagnostics.push(Diagnostic::ExtractionEmpty {
                url: target.url.clone(),
            });
        }

        let products = match &resolution.category {
            Some(category) => {
                Reconciler::new(&self.catalog, &self.config.site).reconcile(category, &records)?
            }
            None => Vec::new(),
        };

        info!(
            slug = %target.slug,
            extracted = raw_count,
            unique = records.len(),
            stored = products.len(),
            issues = diagnostics.len(),
            "category scrape finished"
        );

        Ok(ScrapeReport {
            target,
            records,
            products,
            diagnostics,
        })
    }

    /// The product and its long-form detail, fetched at most once.
    pub async fn get_product_detail(&self, source_id: &str) -> CatalogResult<ProductView> {
        DetailEnricher::new(&self.catalog, self.renderer.as_ref(), &self.config)
            .enrich(source_id)
            .await
    }

    // ── Catalog reads ──

    /// One page (1-based) of stored products for a category key.
    ///
    /// Unknown keys yield an empty page; no fallback target is synthesized.
    pub fn get_books_by_category(&self, key: &str, page: u32) -> CatalogResult<BookPage> {
        let page = page.max(1);
        let Some(entry) = Resolver::new(&self.catalog, &self.config.site).find_entry(key)? else {
            return Ok(BookPage::empty(page));
        };

        let category = match self.catalog.find_category_by_navigation(entry.id)? {
            Some(category) => Some(category),
            None => self.catalog.find_category_by_slug(&entry.slug)?,
        };
        let Some(category) = category else {
            return Ok(BookPage::empty(page));
        };

        let page_size = self.config.page_size.max(1);
        let offset = u64::from(page - 1) * u64::from(page_size);
        let paged = self
            .catalog
            .products_by_category(category.id, offset, page_size)?;
        let total_pages = paged.total.div_ceil(u64::from(page_size));

        Ok(BookPage {
            items: paged.items,
            total: paged.total,
            page,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        })
    }

    /// Case-insensitive title search. A blank query matches nothing.
    pub fn search_books(&self, query: &str) -> CatalogResult<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.catalog.search_products(query, self.config.search_limit)
    }

    /// Upsert the seed categories and return every navigation entry.
    pub fn bootstrap_navigation(&self) -> CatalogResult<Vec<NavigationEntry>> {
        let now = Utc::now();
        for seed in SEED_CATEGORIES {
            self.catalog.upsert_navigation(seed, now)?;
        }
        info!(seeds = SEED_CATEGORIES.len(), "navigation bootstrapped");
        self.catalog.list_navigation()
    }

    pub fn list_navigation(&self) -> CatalogResult<Vec<NavigationEntry>> {
        self.catalog.list_navigation()
    }

    /// Shut down the browser.
    pub async fn shutdown(&self) -> CatalogResult<()> {
        self.renderer
            .shutdown()
            .await
            .map_err(|e| CatalogError::Browser(format!("{e:#}")))
    }
}
