//! Shelfscrape — scrape-and-reconcile engine for a local book catalog.
//!
//! The catalog mirrors listings from a storefront that has no stable API.
//! Two request-scoped pipelines live here:
//!
//! - category scrape: [`resolver`] → [`session`] → [`extract`] → [`dedup`] → [`reconcile`]
//! - product detail: [`enrich`], reusing the session driver and a narrower extractor
//!
//! [`engine::ShelfEngine`] wires both pipelines to a [`store::Catalog`] and a
//! [`renderer::Renderer`].

pub mod config;
pub mod dedup;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod model;
pub mod reconcile;
pub mod renderer;
pub mod report;
pub mod resolver;
pub mod session;
pub mod store;

pub use config::{EngineConfig, SessionConfig, SiteConfig};
pub use engine::ShelfEngine;
pub use error::{CatalogError, CatalogResult};
pub use model::*;
pub use report::{Diagnostic, ScrapeReport};
pub use store::Catalog;
