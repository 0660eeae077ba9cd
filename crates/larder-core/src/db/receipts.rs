//! Receipt persistence
//!
//! A receipt is written in one immediate transaction: header, product
//! resolution, items and ledger updates commit together or not at all.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::inventory::apply_purchase;
use super::products::ProductResolver;
use super::settings::claim_key_policy;
use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    IngestOutcome, NewReceipt, NewReceiptItem, Receipt, ReceiptItem, ReceiptWithItems,
};

const RECEIPT_COLUMNS: &str =
    "id, store_name, total_amount, total_missing, scanned_at, content_hash, created_at";

fn row_to_receipt(row: &rusqlite::Row) -> rusqlite::Result<Receipt> {
    let scanned_at_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    Ok(Receipt {
        id: row.get(0)?,
        store_name: row.get(1)?,
        total_amount: row.get(2)?,
        total_missing: row.get(3)?,
        scanned_at: parse_datetime(&scanned_at_str),
        content_hash: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ReceiptItem> {
    Ok(ReceiptItem {
        id: row.get(0)?,
        receipt_id: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        line_name: row.get(4)?,
        price: row.get(5)?,
        quantity: row.get(6)?,
    })
}

/// Items for the receipts matched by `receipt_filter`, grouped by receipt
fn load_items(
    conn: &Connection,
    receipt_filter: &str,
    filter_params: &[&dyn rusqlite::ToSql],
) -> Result<HashMap<i64, Vec<ReceiptItem>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT ri.id, ri.receipt_id, ri.product_id, p.name, ri.line_name, ri.price, ri.quantity
         FROM receipt_items ri
         JOIN products p ON ri.product_id = p.id
         WHERE ri.receipt_id IN ({})
         ORDER BY ri.receipt_id, ri.id",
        receipt_filter
    ))?;

    let mut grouped: HashMap<i64, Vec<ReceiptItem>> = HashMap::new();
    let items = stmt.query_map(filter_params, row_to_item)?;
    for item in items {
        let item = item?;
        grouped.entry(item.receipt_id).or_default().push(item);
    }
    Ok(grouped)
}

impl Database {
    /// Persist a receipt and apply its lines to the inventory ledger
    ///
    /// Lines must already be screened. Runs as one immediate transaction;
    /// any failure leaves the database exactly as it was.
    pub fn ingest_receipt(
        &self,
        receipt: &NewReceipt,
        items: &[NewReceiptItem],
    ) -> Result<IngestOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        claim_key_policy(&tx, self.key_policy)?;

        tx.execute(
            "INSERT INTO receipts (store_name, total_amount, total_missing, scanned_at, content_hash)
             VALUES (?, ?, ?, ?, ?)",
            params![
                receipt.store_name,
                receipt.total_amount,
                receipt.total_missing,
                format_datetime(&receipt.scanned_at),
                receipt.content_hash,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Duplicate("Receipt image was already ingested".into())
            }
            other => Error::Database(other),
        })?;
        let receipt_id = tx.last_insert_rowid();

        let mut resolver = ProductResolver::new();
        let mut touched: HashSet<i64> = HashSet::new();
        let mut visited_keys: HashSet<String> = HashSet::new();
        let mut created = 0;

        for item in items {
            let product = resolver.resolve(&tx, &item.name)?;
            if product.created {
                created += 1;
            }
            touched.insert(product.id);

            tx.execute(
                "INSERT INTO receipt_items (receipt_id, product_id, line_name, price, quantity)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    receipt_id,
                    product.id,
                    item.name.trim(),
                    item.price,
                    item.quantity
                ],
            )?;

            let key = crate::inventory::lot_key(self.key_policy, product.id, item.price);
            let new_visit = visited_keys.insert(key);
            apply_purchase(
                &tx,
                self.key_policy,
                &product,
                item.price,
                item.quantity,
                receipt.scanned_at,
                new_visit,
            )?;
        }

        tx.commit()?;
        debug!(
            receipt_id,
            items = items.len(),
            products_created = created,
            "Receipt committed"
        );

        Ok(IngestOutcome {
            receipt_id,
            products_touched: touched.len(),
            products_created: created,
        })
    }

    /// Get a receipt header by ID
    pub fn get_receipt_header(&self, id: i64) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!("SELECT {} FROM receipts WHERE id = ?", RECEIPT_COLUMNS),
                params![id],
                row_to_receipt,
            )
            .optional()?;
        Ok(receipt)
    }

    /// Get a receipt with its items
    pub fn get_receipt(&self, id: i64) -> Result<Option<ReceiptWithItems>> {
        let Some(receipt) = self.get_receipt_header(id)? else {
            return Ok(None);
        };

        let conn = self.conn()?;
        let mut items = load_items(&conn, "?", params![id])?;
        Ok(Some(ReceiptWithItems {
            items: items.remove(&id).unwrap_or_default(),
            receipt,
        }))
    }

    /// Find a receipt previously scanned from the same image
    pub fn get_receipt_by_hash(&self, content_hash: &str) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!(
                    "SELECT {} FROM receipts WHERE content_hash = ?",
                    RECEIPT_COLUMNS
                ),
                params![content_hash],
                row_to_receipt,
            )
            .optional()?;
        Ok(receipt)
    }

    /// Require that a receipt exists
    pub fn require_receipt(&self, id: i64) -> Result<ReceiptWithItems> {
        self.get_receipt(id)?
            .ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))
    }

    /// List receipts with their items, newest first
    ///
    /// `limit` of None returns every receipt.
    pub fn list_receipts(&self, limit: Option<i64>) -> Result<Vec<ReceiptWithItems>> {
        let mut conn = self.conn()?;
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.unwrap_or(-1);

        // Headers and items must come from the same snapshot, or a receipt
        // committed between the two reads shifts the LIMIT window
        let tx = conn.transaction()?;

        let receipts = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM receipts ORDER BY scanned_at DESC, id DESC LIMIT ?",
                RECEIPT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit], row_to_receipt)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut items = load_items(
            &tx,
            "SELECT id FROM receipts ORDER BY scanned_at DESC, id DESC LIMIT ?",
            params![limit],
        )?;
        tx.commit()?;

        Ok(receipts
            .into_iter()
            .map(|receipt| ReceiptWithItems {
                items: items.remove(&receipt.id).unwrap_or_default(),
                receipt,
            })
            .collect())
    }

    /// Count stored receipts
    pub fn count_receipts(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?;
        Ok(count)
    }
}
