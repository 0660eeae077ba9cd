//! Product resolution
//!
//! Products are identified by their folded name (trimmed, lowercased). The
//! first spelling seen becomes the canonical name. Resolution is an upsert
//! on the unique folded name, so two writers racing on a new name end up
//! with the same row.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Product;

/// Identity key for a product name
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A product id resolved for one receipt line
#[derive(Debug, Clone)]
pub(crate) struct ResolvedProduct {
    pub id: i64,
    /// Canonical name
    pub name: String,
    /// Whether this resolution inserted the product
    pub created: bool,
}

/// Resolves names to product ids within a single transaction
///
/// Caches lookups so repeated names on one receipt hit the database once.
#[derive(Default)]
pub(crate) struct ProductResolver {
    cache: HashMap<String, ResolvedProduct>,
}

impl ProductResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, conn: &Connection, name: &str) -> Result<ResolvedProduct> {
        let folded = fold_name(name);
        if let Some(hit) = self.cache.get(&folded) {
            // Only the first resolution in a transaction can have created it
            return Ok(ResolvedProduct {
                created: false,
                ..hit.clone()
            });
        }

        let resolved = upsert_product(conn, name, &folded)?;
        self.cache.insert(folded, resolved.clone());
        Ok(resolved)
    }
}

fn upsert_product(conn: &Connection, name: &str, folded: &str) -> Result<ResolvedProduct> {
    if folded.is_empty() {
        return Err(Error::Validation("Product name is empty".into()));
    }

    let inserted = conn.execute(
        "INSERT INTO products (name, folded_name) VALUES (?, ?)
         ON CONFLICT(folded_name) DO NOTHING",
        params![name.trim(), folded],
    )?;

    let (id, canonical): (i64, String) = conn.query_row(
        "SELECT id, name FROM products WHERE folded_name = ?",
        params![folded],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(ResolvedProduct {
        id,
        name: canonical,
        created: inserted > 0,
    })
}

fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    let created_at_str: String = row.get(3)?;
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        folded_name: row.get(2)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Resolve a name to a product id, creating the product if needed
    pub fn resolve_product(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        Ok(upsert_product(&conn, name, &fold_name(name))?.id)
    }

    /// Get a product by ID
    pub fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                "SELECT id, name, folded_name, created_at FROM products WHERE id = ?",
                params![id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    /// Find a product by name, ignoring case and surrounding whitespace
    pub fn find_product(&self, name: &str) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let product = conn
            .query_row(
                "SELECT id, name, folded_name, created_at FROM products WHERE folded_name = ?",
                params![fold_name(name)],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    /// List all products by name
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, folded_name, created_at FROM products ORDER BY folded_name",
        )?;
        let products = stmt
            .query_map([], row_to_product)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }
}
