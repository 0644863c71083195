//! Write-back of scraped records into the catalog.
//!
//! Reconciliation is additive. Products are upserted by `source_id` and
//! re-stamped; a product missing from the latest scrape is left untouched,
//! so a failed or partial page load can never shrink the catalog.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::SiteConfig;
use crate::error::CatalogResult;
use crate::model::{Candidate, Category, Product};
use crate::store::{Catalog, ProductUpsert};

/// Upserts deduplicated candidates under a category.
pub struct Reconciler<'a> {
    catalog: &'a Catalog,
    site: &'a SiteConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a Catalog, site: &'a SiteConfig) -> Self {
        Self { catalog, site }
    }

    /// Upsert every record under `category` and touch the category when
    /// anything was written. Returns the stored rows.
    pub fn reconcile(
        &self,
        category: &Category,
        records: &[Candidate],
    ) -> CatalogResult<Vec<Product>> {
        if records.is_empty() {
            debug!(category = %category.slug, "nothing to reconcile");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let rows: Vec<ProductUpsert> = records
            .iter()
            .map(|r| ProductUpsert {
                source_id: r.source_id.clone(),
                title: r.title.clone(),
                price: r.price.clone(),
                image_url: r.image_url.clone(),
                source_url: r
                    .product_url
                    .clone()
                    .unwrap_or_else(|| self.site.product_url(&r.source_id)),
                category_id: category.id,
                scraped_at: now,
            })
            .collect();

        let saved = self.catalog.upsert_products(&rows)?;
        self.catalog.touch_category(category.id, now)?;

        info!(category = %category.slug, upserted = saved.len(), "catalog reconciled");
        Ok(saved)
    }
}
