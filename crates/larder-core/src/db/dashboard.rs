//! Dashboard statistics

use chrono::Utc;
use rusqlite::params;

use super::inventory::query_inventory_stats;
use super::Database;
use crate::error::Result;
use crate::models::DashboardStats;

impl Database {
    /// Headline numbers: receipts, spend, products and inventory value
    ///
    /// All figures are read from one snapshot.
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current_month = Utc::now().format("%Y-%m").to_string();

        let (receipt_count, total_spend, current_month_spend, product_count) = tx.query_row(
            "SELECT
                (SELECT COUNT(*) FROM receipts),
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM receipts),
                (SELECT COALESCE(SUM(total_amount), 0.0) FROM receipts
                 WHERE strftime('%Y-%m', scanned_at) = ?),
                (SELECT COUNT(*) FROM products)",
            params![current_month],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        let inventory = query_inventory_stats(&tx)?;
        tx.commit()?;

        Ok(DashboardStats {
            receipt_count,
            total_spend,
            current_month_spend,
            product_count,
            inventory,
        })
    }
}
