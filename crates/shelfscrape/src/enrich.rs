//! Lazy, fetch-once product detail enrichment.
//!
//! A stored detail row is authoritative: once one exists no further browser
//! session is ever opened for that product. The first request always leaves
//! a row behind, with placeholder text when the page could not be read or
//! had no description.

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::extract::DetailExtractor;
use crate::model::ProductView;
use crate::renderer::Renderer;
use crate::report::Diagnostic;
use crate::session::SessionDriver;
use crate::store::Catalog;

/// Stored when the product page yielded no description.
pub const NO_DESCRIPTION: &str = "No description available.";
/// Stored when the product page could not be loaded at all.
pub const DETAILS_UNAVAILABLE: &str = "Details not available";

pub struct DetailEnricher<'a> {
    catalog: &'a Catalog,
    renderer: &'a dyn Renderer,
    config: &'a EngineConfig,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(catalog: &'a Catalog, renderer: &'a dyn Renderer, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            renderer,
            config,
        }
    }

    /// The product with its detail, fetching the detail on first request.
    pub async fn enrich(&self, source_id: &str) -> CatalogResult<ProductView> {
        let product = self
            .catalog
            .find_product(source_id)?
            .ok_or_else(|| CatalogError::NotFound(format!("product {source_id}")))?;

        if let Some(detail) = self.catalog.find_product_detail(product.id)? {
            return Ok(ProductView {
                product,
                detail: Some(detail),
                diagnostics: Vec::new(),
            });
        }

        let driver = SessionDriver::new(self.renderer, self.config.detail_session());
        let outcome = driver.run(std::slice::from_ref(&product.source_url)).await;

        for diagnostic in &outcome.diagnostics {
            debug!(source_id, ?diagnostic, "detail session issue");
        }
        let upstream_failed = outcome.snapshots.is_empty()
            || outcome
                .diagnostics
                .iter()
                .any(Diagnostic::is_upstream_unavailable);

        let fields = outcome
            .snapshots
            .first()
            .map(|snapshot| {
                DetailExtractor::new(self.config.description_max_chars).extract(&snapshot.html)
            })
            .unwrap_or_default();

        let description = match (&fields.description, upstream_failed) {
            (Some(description), _) => description.clone(),
            (None, true) => {
                warn!(
                    source_id,
                    url = %product.source_url,
                    "product page unavailable; storing placeholder detail"
                );
                DETAILS_UNAVAILABLE.to_string()
            }
            (None, false) => NO_DESCRIPTION.to_string(),
        };

        let detail = self
            .catalog
            .insert_product_detail(product.id, &description, &fields)?;
        info!(source_id, "product detail stored");

        Ok(ProductView {
            product,
            detail: Some(detail),
            diagnostics: outcome.diagnostics,
        })
    }
}
