//! SQLite-backed catalog store.
//!
//! The engine only needs natural-key lookups, natural-key upserts and a
//! paginated read by foreign key. Nothing in here deletes rows.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::CatalogResult;
use crate::model::{
    Category, DetailFields, NavigationEntry, Product, ProductDetail, SeedCategory,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS navigation (
        id              INTEGER PRIMARY KEY,
        slug            TEXT UNIQUE NOT NULL,
        title           TEXT NOT NULL,
        url             TEXT NOT NULL,
        last_scraped_at TEXT
    );

    CREATE TABLE IF NOT EXISTS categories (
        id              INTEGER PRIMARY KEY,
        slug            TEXT UNIQUE NOT NULL,
        title           TEXT NOT NULL,
        navigation_id   INTEGER REFERENCES navigation(id),
        last_scraped_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_categories_navigation ON categories(navigation_id);

    CREATE TABLE IF NOT EXISTS products (
        id              INTEGER PRIMARY KEY,
        source_id       TEXT UNIQUE NOT NULL,
        title           TEXT NOT NULL,
        price           TEXT NOT NULL,
        image_url       TEXT,
        source_url      TEXT NOT NULL,
        category_id     INTEGER NOT NULL REFERENCES categories(id),
        last_scraped_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);

    CREATE TABLE IF NOT EXISTS product_details (
        id          INTEGER PRIMARY KEY,
        product_id  INTEGER UNIQUE NOT NULL REFERENCES products(id),
        description TEXT NOT NULL,
        isbn        TEXT,
        publisher   TEXT,
        author      TEXT
    );
";

const PRODUCT_COLUMNS: &str =
    "id, source_id, title, price, image_url, source_url, category_id, last_scraped_at";

/// Values written by a product upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUpsert {
    pub source_id: String,
    pub title: String,
    pub price: String,
    pub image_url: Option<String>,
    pub source_url: String,
    pub category_id: i64,
    pub scraped_at: DateTime<Utc>,
}

/// A page of rows plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// The persistence collaborator.
pub struct Catalog {
    db: Mutex<Connection>,
}

impl Catalog {
    /// Open or create a catalog database file.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    crate::error::CatalogError::Config(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// A private in-memory catalog.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CatalogResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // SQLite's own LIKE and lower() only fold ASCII.
        conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Navigation ──

    /// Insert a seed entry, or refresh title/url/timestamp of an existing one.
    pub fn upsert_navigation(
        &self,
        seed: &SeedCategory,
        now: DateTime<Utc>,
    ) -> CatalogResult<NavigationEntry> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO navigation (slug, title, url, last_scraped_at)
             VALUES (?1, ?2, ?3, NULL)
             ON CONFLICT(slug) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                last_scraped_at = ?4",
            params![seed.slug, seed.title, seed.url, ts(now)],
        )?;
        let entry = conn.query_row(
            "SELECT id, slug, title, url, last_scraped_at FROM navigation WHERE slug = ?1",
            params![seed.slug],
            navigation_from_row,
        )?;
        Ok(entry)
    }

    pub fn find_navigation_by_slug(&self, slug: &str) -> CatalogResult<Option<NavigationEntry>> {
        let entry = self
            .conn()
            .query_row(
                "SELECT id, slug, title, url, last_scraped_at FROM navigation WHERE slug = ?1",
                params![slug],
                navigation_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// All navigation entries, ordered by title for display.
    pub fn list_navigation(&self) -> CatalogResult<Vec<NavigationEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, slug, title, url, last_scraped_at FROM navigation ORDER BY title, id",
        )?;
        let rows = stmt
            .query_map([], navigation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Categories ──

    pub fn find_category_by_slug(&self, slug: &str) -> CatalogResult<Option<Category>> {
        let category = self
            .conn()
            .query_row(
                "SELECT id, slug, title, navigation_id, last_scraped_at
                 FROM categories WHERE slug = ?1",
                params![slug],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    pub fn find_category_by_navigation(
        &self,
        navigation_id: i64,
    ) -> CatalogResult<Option<Category>> {
        let category = self
            .conn()
            .query_row(
                "SELECT id, slug, title, navigation_id, last_scraped_at
                 FROM categories WHERE navigation_id = ?1 ORDER BY id LIMIT 1",
                params![navigation_id],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    /// Create a category owned by a persisted navigation entry.
    ///
    /// A concurrent creator of the same slug wins silently; the existing row
    /// is returned either way.
    pub fn create_category(
        &self,
        slug: &str,
        title: &str,
        navigation_id: i64,
        now: DateTime<Utc>,
    ) -> CatalogResult<Category> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO categories (slug, title, navigation_id, last_scraped_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slug) DO NOTHING",
            params![slug, title, navigation_id, ts(now)],
        )?;
        let category = conn.query_row(
            "SELECT id, slug, title, navigation_id, last_scraped_at
             FROM categories WHERE slug = ?1",
            params![slug],
            category_from_row,
        )?;
        Ok(category)
    }

    pub fn touch_category(&self, category_id: i64, now: DateTime<Utc>) -> CatalogResult<()> {
        self.conn().execute(
            "UPDATE categories SET last_scraped_at = ?2 WHERE id = ?1",
            params![category_id, ts(now)],
        )?;
        Ok(())
    }

    // ── Products ──

    /// Upsert a batch of products by `source_id` in one transaction.
    pub fn upsert_products(&self, rows: &[ProductUpsert]) -> CatalogResult<Vec<Product>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(rows.len());
        {
            let mut upsert = tx.prepare(
                "INSERT INTO products
                    (source_id, title, price, image_url, source_url, category_id, last_scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_id) DO UPDATE SET
                    title = excluded.title,
                    price = excluded.price,
                    image_url = excluded.image_url,
                    source_url = excluded.source_url,
                    category_id = excluded.category_id,
                    last_scraped_at = excluded.last_scraped_at",
            )?;
            let mut select = tx.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE source_id = ?1"
            ))?;
            for r in rows {
                upsert.execute(params![
                    r.source_id,
                    r.title,
                    r.price,
                    r.image_url,
                    r.source_url,
                    r.category_id,
                    ts(r.scraped_at),
                ])?;
                saved.push(select.query_row(params![r.source_id], product_from_row)?);
            }
        }
        tx.commit()?;
        Ok(saved)
    }

    pub fn find_product(&self, source_id: &str) -> CatalogResult<Option<Product>> {
        let product = self
            .conn()
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE source_id = ?1"),
                params![source_id],
                product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    /// Products of a category ordered by id, with the category's total count.
    pub fn products_by_category(
        &self,
        category_id: i64,
        offset: u64,
        limit: u32,
    ) -> CatalogResult<Paged<Product>> {
        let conn = self.conn();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM products WHERE category_id = ?1",
            params![category_id],
            |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE category_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3"
        ))?;
        let items = stmt
            .query_map(
                params![category_id, i64::from(limit), offset as i64],
                product_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paged {
            items,
            total: total.max(0) as u64,
        })
    }

    /// Substring match on title, case-folded with Unicode rules. The query is
    /// literal text; `%` and `_` carry no wildcard meaning.
    pub fn search_products(&self, query: &str, limit: usize) -> CatalogResult<Vec<Product>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE instr(casefold(title), ?1) > 0
             ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![query.to_lowercase(), limit as i64], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Details ──

    pub fn find_product_detail(&self, product_id: i64) -> CatalogResult<Option<ProductDetail>> {
        let detail = self
            .conn()
            .query_row(
                "SELECT id, product_id, description, isbn, publisher, author
                 FROM product_details WHERE product_id = ?1",
                params![product_id],
                detail_from_row,
            )
            .optional()?;
        Ok(detail)
    }

    /// Store the detail for a product. The first writer wins; later calls
    /// return the row that is already there.
    pub fn insert_product_detail(
        &self,
        product_id: i64,
        description: &str,
        fields: &DetailFields,
    ) -> CatalogResult<ProductDetail> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO product_details (product_id, description, isbn, publisher, author)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(product_id) DO NOTHING",
            params![
                product_id,
                description,
                fields.isbn,
                fields.publisher,
                fields.author
            ],
        )?;
        let detail = conn.query_row(
            "SELECT id, product_id, description, isbn, publisher, author
             FROM product_details WHERE product_id = ?1",
            params![product_id],
            detail_from_row,
        )?;
        Ok(detail)
    }

    // ── Stats ──

    /// Row counts per table: (navigation, categories, products, details).
    pub fn counts(&self) -> CatalogResult<(u64, u64, u64, u64)> {
        let conn = self.conn();
        let count = |table: &str| -> rusqlite::Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
        };
        Ok((
            count("navigation")?,
            count("categories")?,
            count("products")?,
            count("product_details")?,
        ))
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.as_deref().map(|s| parse_ts(s, idx)).transpose()
}

fn navigation_from_row(row: &Row<'_>) -> rusqlite::Result<NavigationEntry> {
    Ok(NavigationEntry {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        last_scraped_at: optional_ts(row, 4)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        navigation_id: row.get(3)?,
        last_scraped_at: optional_ts(row, 4)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let scraped: String = row.get(7)?;
    Ok(Product {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        price: row.get(3)?,
        image_url: row.get(4)?,
        source_url: row.get(5)?,
        category_id: row.get(6)?,
        last_scraped_at: parse_ts(&scraped, 7)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<ProductDetail> {
    Ok(ProductDetail {
        id: row.get(0)?,
        product_id: row.get(1)?,
        description: row.get(2)?,
        isbn: row.get(3)?,
        publisher: row.get(4)?,
        author: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SEED_CATEGORIES;

    fn upsert_row(source_id: &str, price: &str, category_id: i64) -> ProductUpsert {
        ProductUpsert {
            source_id: source_id.to_string(),
            title: source_id.replace('-', " "),
            price: price.to_string(),
            image_url: None,
            source_url: format!("https://example.com/product/{source_id}"),
            category_id,
            scraped_at: Utc::now(),
        }
    }

    fn seeded_category(catalog: &Catalog) -> Category {
        let nav = catalog
            .upsert_navigation(&SEED_CATEGORIES[0], Utc::now())
            .unwrap();
        catalog
            .create_category(&nav.slug, &nav.title, nav.id, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_navigation_upsert_refreshes_in_place() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog
            .upsert_navigation(&SEED_CATEGORIES[0], Utc::now())
            .unwrap();
        assert!(first.last_scraped_at.is_none());

        let second = catalog
            .upsert_navigation(&SEED_CATEGORIES[0], Utc::now())
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.last_scraped_at.is_some());
        assert_eq!(catalog.list_navigation().unwrap().len(), 1);
    }

    #[test]
    fn test_product_upsert_by_natural_key() {
        let catalog = Catalog::open_in_memory().unwrap();
        let category = seeded_category(&catalog);

        let first = catalog
            .upsert_products(&[upsert_row("the-hobbit", "£5.99", category.id)])
            .unwrap();
        let second = catalog
            .upsert_products(&[upsert_row("the-hobbit", "£4.49", category.id)])
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].price, "£4.49");
        assert!(second[0].last_scraped_at >= first[0].last_scraped_at);
        assert_eq!(catalog.counts().unwrap().2, 1);
    }

    #[test]
    fn test_products_by_category_paginates() {
        let catalog = Catalog::open_in_memory().unwrap();
        let category = seeded_category(&catalog);
        let rows: Vec<_> = (0..5)
            .map(|i| upsert_row(&format!("book-{i}"), "£1.00", category.id))
            .collect();
        catalog.upsert_products(&rows).unwrap();

        let page = catalog.products_by_category(category.id, 2, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(
            page.items.iter().map(|p| p.source_id.as_str()).collect::<Vec<_>>(),
            vec!["book-2", "book-3"]
        );
    }

    #[test]
    fn test_search_is_case_insensitive_and_escapes_wildcards() {
        let catalog = Catalog::open_in_memory().unwrap();
        let category = seeded_category(&catalog);
        catalog
            .upsert_products(&[
                upsert_row("harry-potter", "£3.00", category.id),
                upsert_row("100%-cotton", "£2.00", category.id),
            ])
            .unwrap();

        let hits = catalog.search_products("HARRY", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "harry-potter");

        let hits = catalog.search_products("%", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "100%-cotton");
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let catalog = Catalog::open_in_memory().unwrap();
        let category = seeded_category(&catalog);
        catalog
            .upsert_products(&[
                upsert_row("émile-zola", "£4.00", category.id),
                upsert_row("emile-ajar", "£1.00", category.id),
            ])
            .unwrap();

        let hits = catalog.search_products("ÉMILE", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, "émile-zola");
        assert_eq!(catalog.search_products("Émile Z", 20).unwrap().len(), 1);
    }

    #[test]
    fn test_detail_first_writer_wins() {
        let catalog = Catalog::open_in_memory().unwrap();
        let category = seeded_category(&catalog);
        let product = catalog
            .upsert_products(&[upsert_row("dune", "£7.00", category.id)])
            .unwrap()
            .remove(0);

        let fields = DetailFields::default();
        let first = catalog
            .insert_product_detail(product.id, "first", &fields)
            .unwrap();
        let second = catalog
            .insert_product_detail(product.id, "second", &fields)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.description, "first");
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let catalog = Catalog::open(&path).unwrap();
        seeded_category(&catalog);
        drop(catalog);

        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.counts().unwrap(), (1, 1, 0, 0));
    }
}
