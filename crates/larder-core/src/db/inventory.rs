//! Inventory ledger operations
//!
//! Every write runs inside an immediate transaction and re-checks the
//! recorded lot key policy before touching a lot.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::products::{ProductResolver, ResolvedProduct};
use super::settings::claim_key_policy;
use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::inventory::{lot_key, validate_quantity, Depletion, LotBalance};
use crate::models::{ConsumeOutcome, InventoryLot, InventoryStats, LotKeyPolicy};

const LOT_COLUMNS: &str = "id, lot_key, product_id, display_name, quantity, total_value, \
                           last_price, last_purchased_at, frequency, updated_at";

fn row_to_lot(row: &rusqlite::Row) -> rusqlite::Result<InventoryLot> {
    let last_purchased_str: String = row.get(7)?;
    let updated_at_str: String = row.get(9)?;
    Ok(InventoryLot {
        id: row.get(0)?,
        lot_key: row.get(1)?,
        product_id: row.get(2)?,
        display_name: row.get(3)?,
        quantity: row.get(4)?,
        total_value: row.get(5)?,
        last_price: row.get(6)?,
        last_purchased_at: parse_datetime(&last_purchased_str),
        frequency: row.get(8)?,
        updated_at: parse_datetime(&updated_at_str),
    })
}

fn find_lot(conn: &Connection, id: i64) -> Result<Option<InventoryLot>> {
    let lot = conn
        .query_row(
            &format!("SELECT {} FROM inventory_lots WHERE id = ?", LOT_COLUMNS),
            params![id],
            row_to_lot,
        )
        .optional()?;
    Ok(lot)
}

fn find_lot_by_key(conn: &Connection, key: &str) -> Result<Option<InventoryLot>> {
    let lot = conn
        .query_row(
            &format!("SELECT {} FROM inventory_lots WHERE lot_key = ?", LOT_COLUMNS),
            params![key],
            row_to_lot,
        )
        .optional()?;
    Ok(lot)
}

fn require_lot(conn: &Connection, id: i64) -> Result<InventoryLot> {
    find_lot(conn, id)?.ok_or_else(|| Error::NotFound(format!("Inventory lot {}", id)))
}

fn write_balance(conn: &Connection, id: i64, balance: &LotBalance) -> Result<()> {
    conn.execute(
        "UPDATE inventory_lots
         SET quantity = ?, total_value = ?, last_price = ?, last_purchased_at = ?,
             frequency = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
        params![
            balance.quantity,
            balance.total_value,
            balance.last_price,
            format_datetime(&balance.last_purchased_at),
            balance.frequency,
            id
        ],
    )?;
    Ok(())
}

/// Apply one purchase to the ledger
///
/// Creates the lot on first sight of its key. `new_visit` marks the first
/// line of a receipt that touches this key, so frequency counts receipts.
pub(crate) fn apply_purchase(
    conn: &Connection,
    policy: LotKeyPolicy,
    product: &ResolvedProduct,
    price: f64,
    quantity: f64,
    at: DateTime<Utc>,
    new_visit: bool,
) -> Result<String> {
    let key = lot_key(policy, product.id, price);

    match find_lot_by_key(conn, &key)? {
        Some(lot) => {
            let mut balance = lot.balance();
            balance.record_purchase(price, quantity, at, new_visit);
            write_balance(conn, lot.id, &balance)?;
        }
        None => {
            let balance = LotBalance::opened(price, quantity, at, i64::from(new_visit));
            conn.execute(
                "INSERT INTO inventory_lots
                 (lot_key, product_id, display_name, quantity, total_value, last_price,
                  last_purchased_at, frequency)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    key,
                    product.id,
                    product.name,
                    balance.quantity,
                    balance.total_value,
                    balance.last_price,
                    format_datetime(&balance.last_purchased_at),
                    balance.frequency
                ],
            )?;
        }
    }

    Ok(key)
}

impl Database {
    /// List all lots by display name
    pub fn list_lots(&self) -> Result<Vec<InventoryLot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inventory_lots ORDER BY display_name COLLATE NOCASE, id",
            LOT_COLUMNS
        ))?;
        let lots = stmt
            .query_map([], row_to_lot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// Get a lot by ID
    pub fn get_lot(&self, id: i64) -> Result<Option<InventoryLot>> {
        let conn = self.conn()?;
        find_lot(&conn, id)
    }

    /// Get a lot by its ledger key
    pub fn get_lot_by_key(&self, key: &str) -> Result<Option<InventoryLot>> {
        let conn = self.conn()?;
        find_lot_by_key(&conn, key)
    }

    /// Lots belonging to one product (several under the product_price policy)
    pub fn lots_for_product(&self, product_id: i64) -> Result<Vec<InventoryLot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inventory_lots WHERE product_id = ? ORDER BY id",
            LOT_COLUMNS
        ))?;
        let lots = stmt
            .query_map(params![product_id], row_to_lot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// Add stock by hand, outside any receipt
    ///
    /// Resolves (or creates) the product by name and applies the purchase
    /// dated now. Receipt frequency is not incremented.
    pub fn add_manual_item(&self, name: &str, price: f64, quantity: f64) -> Result<InventoryLot> {
        let quantity = validate_quantity(quantity)?;
        if !price.is_finite() || price < 0.0 {
            return Err(Error::Validation(format!(
                "Price must be a non-negative number, got {}",
                price
            )));
        }
        if name.trim().is_empty() {
            return Err(Error::Validation("Item name is empty".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        claim_key_policy(&tx, self.key_policy)?;

        let product = ProductResolver::new().resolve(&tx, name)?;
        let key = apply_purchase(
            &tx,
            self.key_policy,
            &product,
            price,
            quantity,
            Utc::now(),
            false,
        )?;
        let lot = find_lot_by_key(&tx, &key)?
            .ok_or_else(|| Error::NotFound(format!("Inventory lot {}", key)))?;

        tx.commit()?;
        info!(product = %product.name, quantity, price, "Added inventory by hand");
        Ok(lot)
    }

    /// Decrease a lot at weighted average cost
    ///
    /// Consuming the whole quantity (or more) removes the lot.
    pub fn consume_lot(&self, id: i64, quantity: f64) -> Result<ConsumeOutcome> {
        let quantity = validate_quantity(quantity)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        claim_key_policy(&tx, self.key_policy)?;

        let lot = require_lot(&tx, id)?;
        let mut balance = lot.balance();
        let outcome = match balance.consume(quantity) {
            Depletion::Depleted => {
                tx.execute("DELETE FROM inventory_lots WHERE id = ?", params![id])?;
                debug!(lot_id = id, "Lot depleted and removed");
                ConsumeOutcome::Removed { lot_id: id }
            }
            Depletion::Remaining => {
                write_balance(&tx, id, &balance)?;
                let lot = require_lot(&tx, id)?;
                ConsumeOutcome::Updated { lot }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Increase a lot, valuing the new units at its last purchase price
    pub fn restock_lot(&self, id: i64, quantity: f64) -> Result<InventoryLot> {
        let quantity = validate_quantity(quantity)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        claim_key_policy(&tx, self.key_policy)?;

        let lot = require_lot(&tx, id)?;
        let mut balance = lot.balance();
        balance.restock(quantity);
        write_balance(&tx, id, &balance)?;
        let lot = require_lot(&tx, id)?;

        tx.commit()?;
        Ok(lot)
    }

    /// Change a lot's display name
    ///
    /// The product and its identity are unchanged; lots are never merged.
    pub fn rename_lot(&self, id: i64, display_name: &str) -> Result<InventoryLot> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::Validation("Display name is empty".into()));
        }

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE inventory_lots SET display_name = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![display_name, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Inventory lot {}", id)));
        }
        require_lot(&conn, id)
    }

    /// Remove a lot from the ledger
    pub fn delete_lot(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM inventory_lots WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Inventory lot {}", id)));
        }
        Ok(())
    }

    /// Rebuild the ledger by replaying every stored receipt item in order
    ///
    /// Manual adjustments are discarded. Returns the number of lots written.
    pub fn rebuild_inventory(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        claim_key_policy(&tx, self.key_policy)?;

        tx.execute("DELETE FROM inventory_lots", [])?;

        let purchases: Vec<(i64, i64, String, f64, f64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT ri.receipt_id, p.id, p.name, ri.price, ri.quantity, r.scanned_at
                 FROM receipt_items ri
                 JOIN receipts r ON ri.receipt_id = r.id
                 JOIN products p ON ri.product_id = p.id
                 ORDER BY r.scanned_at, r.id, ri.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut visits: HashSet<(i64, String)> = HashSet::new();
        for (receipt_id, product_id, name, price, quantity, scanned_at) in &purchases {
            let product = ResolvedProduct {
                id: *product_id,
                name: name.clone(),
                created: false,
            };
            let key = lot_key(self.key_policy, product.id, *price);
            let new_visit = visits.insert((*receipt_id, key));
            apply_purchase(
                &tx,
                self.key_policy,
                &product,
                *price,
                *quantity,
                parse_datetime(scanned_at),
                new_visit,
            )?;
        }

        let lots: i64 = tx.query_row("SELECT COUNT(*) FROM inventory_lots", [], |row| {
            row.get(0)
        })?;

        tx.commit()?;
        info!(items = purchases.len(), lots, "Inventory rebuilt from receipts");
        Ok(lots as usize)
    }

    /// Totals across all lots
    pub fn inventory_stats(&self) -> Result<InventoryStats> {
        let conn = self.conn()?;
        query_inventory_stats(&conn)
    }
}

pub(crate) fn query_inventory_stats(conn: &Connection) -> Result<InventoryStats> {
    let stats = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(quantity), 0.0), COALESCE(SUM(total_value), 0.0)
         FROM inventory_lots",
        [],
        |row| {
            Ok(InventoryStats {
                lots: row.get(0)?,
                total_units: row.get(1)?,
                total_value: row.get(2)?,
            })
        },
    )?;
    Ok(stats)
}
