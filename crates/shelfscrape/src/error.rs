//! Error types for the catalog engine.
//!
//! Only [`CatalogError::NotFound`] is a domain failure. Degraded scraping
//! (unreachable pages, empty extraction, skipped persistence) is reported
//! through [`crate::report::Diagnostic`] instead.

/// All errors that can escape the engine's public operations.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CatalogError {
    /// True for the one error kind callers are expected to show to users.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
