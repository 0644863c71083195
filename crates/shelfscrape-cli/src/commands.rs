//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use shelfscrape::config::resolve_db_path;
use shelfscrape::renderer::chromium::{find_chromium, ChromiumRenderer};
use shelfscrape::renderer::{NoopRenderer, Renderer};
use shelfscrape::{Catalog, EngineConfig, ShelfEngine};

use crate::output::{Output, Status};

/// Open the catalog and, when `browser` is set, launch Chromium.
///
/// A missing browser is not fatal: scrapes then report the upstream as
/// unavailable while catalog reads keep working.
async fn open_engine(db: Option<&str>, browser: bool) -> Result<(ShelfEngine, PathBuf)> {
    let config = EngineConfig::from_env()?;
    let db_path = match db {
        Some(_) => resolve_db_path(db),
        None => config
            .db_path
            .clone()
            .unwrap_or_else(|| resolve_db_path(None)),
    };
    let catalog = Catalog::open(&db_path)
        .with_context(|| format!("cannot open catalog at {}", db_path.display()))?;

    let renderer: Arc<dyn Renderer> = if browser {
        match ChromiumRenderer::launch(config.chromium_path.as_deref()).await {
            Ok(chromium) => Arc::new(chromium),
            Err(e) => {
                warn!("browser unavailable, continuing without it: {e:#}");
                Arc::new(NoopRenderer)
            }
        }
    } else {
        Arc::new(NoopRenderer)
    };

    Ok((
        ShelfEngine::new(Arc::new(catalog), renderer, config),
        db_path,
    ))
}

async fn close(engine: &ShelfEngine) {
    if let Err(e) = engine.shutdown().await {
        warn!("browser shutdown failed: {e}");
    }
}

pub async fn bootstrap(db: Option<&str>, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, false).await?;
    let entries = engine.bootstrap_navigation()?;
    out.navigation(&entries)
}

pub async fn nav(db: Option<&str>, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, false).await?;
    let entries = engine.list_navigation()?;
    out.navigation(&entries)
}

pub async fn scrape(db: Option<&str>, category: &str, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, true).await?;
    let report = engine.scrape_category(category).await;
    close(&engine).await;
    out.scrape(&report?)
}

pub async fn detail(db: Option<&str>, source_id: &str, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, true).await?;
    let view = engine.get_product_detail(source_id).await;
    close(&engine).await;
    out.product(&view?)
}

pub async fn books(db: Option<&str>, category: &str, page: u32, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, false).await?;
    let books = engine.get_books_by_category(category, page)?;
    out.book_page(category, &books)
}

pub async fn search(db: Option<&str>, query: &str, out: &Output) -> Result<()> {
    let (engine, _) = open_engine(db, false).await?;
    let hits = engine.search_books(query)?;
    out.products(&hits)
}

pub async fn status(db: Option<&str>, out: &Output) -> Result<()> {
    let (engine, db_path) = open_engine(db, false).await?;
    let (navigation, categories, products, details) = engine.catalog().counts()?;
    out.status(&Status {
        db_path: db_path.display().to_string(),
        chromium: find_chromium(engine.config().chromium_path.as_deref())
            .map(|p| p.display().to_string()),
        navigation,
        categories,
        products,
        details,
    })
}
