//! Human and JSON rendering of command results.

use anyhow::Result;
use serde::Serialize;

use shelfscrape::{BookPage, Diagnostic, NavigationEntry, Product, ProductView, ScrapeReport};

/// Catalog health summary for `shelfscrape status`.
#[derive(Debug, Serialize)]
pub struct Status {
    pub db_path: String,
    pub chromium: Option<String>,
    pub navigation: u64,
    pub categories: u64,
    pub products: u64,
    pub details: u64,
}

pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn navigation(&self, entries: &[NavigationEntry]) -> Result<()> {
        if self.json {
            return self.emit_json(entries);
        }
        if entries.is_empty() {
            println!("No navigation entries. Run `shelfscrape bootstrap` first.");
            return Ok(());
        }
        println!("  {:<20} {:<24} {:<22} URL", "TITLE", "SLUG", "LAST SCRAPED");
        for entry in entries {
            let scraped = entry
                .last_scraped_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<20} {:<24} {:<22} {}",
                entry.title, entry.slug, scraped, entry.url
            );
        }
        Ok(())
    }

    pub fn scrape(&self, report: &ScrapeReport) -> Result<()> {
        if self.json {
            return self.emit_json(report);
        }
        println!("Target: {} ({})", report.target.slug, report.target.url);
        if report.target.is_transient() {
            println!("  (no navigation entry; results not stored)");
        }
        println!(
            "Records: {}   Stored: {}",
            report.records.len(),
            report.products.len()
        );
        for record in &report.records {
            println!("  {:<10} {:<50} {}", record.price, record.title, record.source_id);
        }
        for diagnostic in &report.diagnostics {
            println!("  \u{26a0} {}", describe(diagnostic));
        }
        Ok(())
    }

    pub fn product(&self, view: &ProductView) -> Result<()> {
        if self.json {
            return self.emit_json(view);
        }
        let p = &view.product;
        println!("{}", p.title);
        println!("  Price:     {}", p.price);
        println!("  Source id: {}", p.source_id);
        println!("  URL:       {}", p.source_url);
        if let Some(image) = &p.image_url {
            println!("  Image:     {image}");
        }
        if let Some(detail) = &view.detail {
            for (label, value) in [
                ("Author", &detail.author),
                ("Publisher", &detail.publisher),
                ("ISBN", &detail.isbn),
            ] {
                if let Some(value) = value {
                    println!("  {label:<10} {value}");
                }
            }
            println!();
            println!("{}", detail.description);
        }
        for diagnostic in &view.diagnostics {
            println!("  \u{26a0} {}", describe(diagnostic));
        }
        Ok(())
    }

    pub fn products(&self, products: &[Product]) -> Result<()> {
        if self.json {
            return self.emit_json(products);
        }
        if products.is_empty() {
            println!("No matching books.");
            return Ok(());
        }
        for p in products {
            println!("  {:<10} {:<50} {}", p.price, p.title, p.source_id);
        }
        Ok(())
    }

    pub fn book_page(&self, category: &str, page: &BookPage) -> Result<()> {
        if self.json {
            return self.emit_json(page);
        }
        println!(
            "{category}: page {} of {} ({} books)",
            page.page,
            page.total_pages.max(1),
            page.total
        );
        self.products(&page.items)
    }

    pub fn status(&self, status: &Status) -> Result<()> {
        if self.json {
            return self.emit_json(status);
        }
        println!("Catalog:    {}", status.db_path);
        match &status.chromium {
            Some(path) => println!("[OK] Chromium found: {path}"),
            None => println!("[!!] Chromium NOT found. Set SHELFSCRAPE_CHROMIUM_PATH."),
        }
        println!("Navigation: {}", status.navigation);
        println!("Categories: {}", status.categories);
        println!("Products:   {}", status.products);
        println!("Details:    {}", status.details);
        Ok(())
    }
}

fn describe(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::FallbackTarget { key, url } => {
            format!("no navigation entry for {key:?}, tried {url}")
        }
        Diagnostic::ContextUnavailable { url, reason } => {
            format!("could not open a browser tab for {url}: {reason}")
        }
        Diagnostic::NavigationFailed { url, reason } => {
            format!("page load incomplete for {url}: {reason}")
        }
        Diagnostic::SnapshotUnavailable { url, reason } => {
            format!("no page content from {url}: {reason}")
        }
        Diagnostic::PageLimitReached { limit, dropped } => {
            format!("page cap {limit} reached, {dropped} target(s) dropped")
        }
        Diagnostic::SessionBudgetExhausted { skipped } => {
            format!("session time budget ran out, {skipped} target(s) skipped")
        }
        Diagnostic::StepTimedOut { url, step } => {
            format!("browser step {step} timed out on {url}")
        }
        Diagnostic::ExtractionEmpty { url } => format!("no products found on {url}"),
        Diagnostic::PersistenceSkipped { slug } => {
            format!("category {slug:?} is not in the catalog; nothing stored")
        }
    }
}
