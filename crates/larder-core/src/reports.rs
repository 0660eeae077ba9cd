//! Spending reports computed from receipt history
//!
//! Everything here is read-only and derived on demand from receipts with
//! their items. Receipts are processed in ascending (scan time, id) order
//! and items in id order, so "first seen" always means chronologically
//! first. Missing or zero quantities count as one unit.

use std::collections::{BTreeMap, HashMap};

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    MonthlySummary, PriceHistory, PriceObservation, ProductSpend, ReceiptWithItems, StoreSpend,
};

/// Calendar month key (YYYY-MM) of a receipt
fn month_of(receipt: &ReceiptWithItems) -> String {
    receipt.receipt.scanned_at.format("%Y-%m").to_string()
}

fn effective_quantity(quantity: f64) -> f64 {
    if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        1.0
    }
}

fn effective_price(price: f64) -> f64 {
    if price.is_finite() {
        price
    } else {
        0.0
    }
}

fn chronological(receipts: &[ReceiptWithItems]) -> Vec<&ReceiptWithItems> {
    let mut ordered: Vec<&ReceiptWithItems> = receipts.iter().collect();
    ordered.sort_by(|a, b| {
        a.receipt
            .scanned_at
            .cmp(&b.receipt.scanned_at)
            .then(a.receipt.id.cmp(&b.receipt.id))
    });
    ordered
}

/// Per-month spending, oldest month first
pub fn monthly_summaries(receipts: &[ReceiptWithItems], top_n: usize) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<String, Vec<&ReceiptWithItems>> = BTreeMap::new();
    for receipt in chronological(receipts) {
        months.entry(month_of(receipt)).or_default().push(receipt);
    }

    months
        .into_iter()
        .map(|(month, receipts)| summarize_month(month, &receipts, top_n))
        .collect()
}

/// Spending for a single month (YYYY-MM), if any receipt falls in it
pub fn monthly_summary(
    receipts: &[ReceiptWithItems],
    month: &str,
    top_n: usize,
) -> Option<MonthlySummary> {
    let in_month: Vec<&ReceiptWithItems> = chronological(receipts)
        .into_iter()
        .filter(|r| month_of(r) == month)
        .collect();

    if in_month.is_empty() {
        None
    } else {
        Some(summarize_month(month.to_string(), &in_month, top_n))
    }
}

fn summarize_month(month: String, receipts: &[&ReceiptWithItems], top_n: usize) -> MonthlySummary {
    let total_spend: f64 = receipts.iter().map(|r| r.receipt.total_amount).sum();
    let visits = receipts.len();

    // Vec keeps first-visit order; index lookup by store name
    let mut stores: Vec<StoreSpend> = Vec::new();
    let mut store_index: HashMap<&str, usize> = HashMap::new();
    let mut products: Vec<ProductSpend> = Vec::new();
    let mut product_index: HashMap<i64, usize> = HashMap::new();

    for receipt in receipts {
        let name = receipt.receipt.store_name.as_str();
        let idx = *store_index.entry(name).or_insert_with(|| {
            stores.push(StoreSpend {
                store: name.to_string(),
                total: 0.0,
                visits: 0,
            });
            stores.len() - 1
        });
        stores[idx].total += receipt.receipt.total_amount;
        stores[idx].visits += 1;

        for item in &receipt.items {
            let quantity = effective_quantity(item.quantity);
            let idx = *product_index.entry(item.product_id).or_insert_with(|| {
                products.push(ProductSpend {
                    product_id: item.product_id,
                    name: item.product_name.clone(),
                    total: 0.0,
                    quantity: 0.0,
                });
                products.len() - 1
            });
            products[idx].total += effective_price(item.price) * quantity;
            products[idx].quantity += quantity;
        }
    }

    // Stable sort: equal spend keeps encounter order
    products.sort_by(|a, b| b.total.total_cmp(&a.total));
    products.truncate(top_n);

    MonthlySummary {
        month,
        total_spend,
        visits,
        average_per_visit: if visits > 0 {
            total_spend / visits as f64
        } else {
            0.0
        },
        stores,
        top_products: products,
    }
}

/// Price series for every product, most frequently bought first
pub fn price_histories(receipts: &[ReceiptWithItems]) -> Vec<PriceHistory> {
    let mut series: Vec<(i64, String, Vec<PriceObservation>)> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for receipt in chronological(receipts) {
        let mut items: Vec<_> = receipt.items.iter().collect();
        items.sort_by_key(|item| item.id);

        for item in items {
            let idx = *index.entry(item.product_id).or_insert_with(|| {
                series.push((item.product_id, item.product_name.clone(), Vec::new()));
                series.len() - 1
            });
            series[idx].2.push(PriceObservation {
                date: receipt.receipt.scanned_at,
                price: effective_price(item.price),
                quantity: effective_quantity(item.quantity),
                store: receipt.receipt.store_name.clone(),
                receipt_id: receipt.receipt.id,
            });
        }
    }

    let mut histories: Vec<PriceHistory> = series
        .into_iter()
        .filter_map(|(product_id, name, observations)| {
            build_history(product_id, name, observations)
        })
        .collect();

    histories.sort_by(|a, b| b.observations.len().cmp(&a.observations.len()));
    histories
}

/// Price series for one product
pub fn price_history(receipts: &[ReceiptWithItems], product_id: i64) -> Option<PriceHistory> {
    price_histories(receipts)
        .into_iter()
        .find(|h| h.product_id == product_id)
}

fn build_history(
    product_id: i64,
    name: String,
    observations: Vec<PriceObservation>,
) -> Option<PriceHistory> {
    let first_price = observations.first()?.price;
    let last_price = observations.last()?.price;

    let prices = observations.iter().map(|o| o.price);
    let min_price = prices.clone().fold(f64::INFINITY, f64::min);
    let max_price = prices.clone().fold(f64::NEG_INFINITY, f64::max);
    let average_price = prices.sum::<f64>() / observations.len() as f64;

    let percent_change = if first_price == 0.0 {
        None
    } else {
        Some((last_price - first_price) / first_price * 100.0)
    };

    Some(PriceHistory {
        product_id,
        name,
        observations,
        min_price,
        max_price,
        average_price,
        first_price,
        last_price,
        percent_change,
    })
}

impl Database {
    /// Monthly summaries over the whole receipt history
    pub fn monthly_report(&self, top_n: usize) -> Result<Vec<MonthlySummary>> {
        Ok(monthly_summaries(&self.list_receipts(None)?, top_n))
    }

    /// Price histories over the whole receipt history
    pub fn price_report(&self) -> Result<Vec<PriceHistory>> {
        Ok(price_histories(&self.list_receipts(None)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Receipt, ReceiptItem};
    use chrono::{TimeZone, Utc};

    fn receipt(
        id: i64,
        store: &str,
        total: f64,
        ymd: (i32, u32, u32),
        items: &[(i64, i64, &str, f64, f64)],
    ) -> ReceiptWithItems {
        let at = Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 12, 0, 0).unwrap();
        ReceiptWithItems {
            receipt: Receipt {
                id,
                store_name: store.to_string(),
                total_amount: total,
                total_missing: false,
                scanned_at: at,
                content_hash: None,
                created_at: at,
            },
            items: items
                .iter()
                .map(|&(item_id, product_id, name, price, quantity)| ReceiptItem {
                    id: item_id,
                    receipt_id: id,
                    product_id,
                    product_name: name.to_string(),
                    line_name: name.to_string(),
                    price,
                    quantity,
                })
                .collect(),
        }
    }

    fn history() -> Vec<ReceiptWithItems> {
        // Newest first, the way the database lists them
        vec![
            receipt(4, "FreshCo", 8.0, (2024, 2, 3), &[(6, 1, "Milk", 6.0, 1.0), (7, 3, "Eggs", 2.0, 1.0)]),
            receipt(3, "MartX", 6.0, (2024, 1, 20), &[(4, 2, "Bread", 3.0, 2.0)]),
            receipt(2, "FreshCo", 9.0, (2024, 1, 10), &[(3, 1, "Milk", 4.5, 2.0)]),
            receipt(1, "MartX", 10.5, (2024, 1, 5), &[(1, 1, "Milk", 5.0, 1.0), (2, 2, "Bread", 5.0, 1.0)]),
        ]
    }

    #[test]
    fn test_monthly_summaries() {
        let months = monthly_summaries(&history(), 5);
        assert_eq!(months.len(), 2);

        let jan = &months[0];
        assert_eq!(jan.month, "2024-01");
        assert_eq!(jan.visits, 3);
        assert!((jan.total_spend - 25.5).abs() < 1e-9);
        assert!((jan.average_per_visit - 8.5).abs() < 1e-9);

        // Stores in order of first visit
        assert_eq!(jan.stores[0].store, "MartX");
        assert_eq!(jan.stores[0].visits, 2);
        assert!((jan.stores[0].total - 16.5).abs() < 1e-9);
        assert_eq!(jan.stores[1].store, "FreshCo");

        // Milk 5 + 9 = 14, Bread 5 + 6 = 11
        assert_eq!(jan.top_products[0].name, "Milk");
        assert!((jan.top_products[0].total - 14.0).abs() < 1e-9);
        assert!((jan.top_products[0].quantity - 3.0).abs() < 1e-9);
        assert_eq!(jan.top_products[1].name, "Bread");
    }

    #[test]
    fn test_store_spend_sums_to_month_total() {
        for month in monthly_summaries(&history(), 5) {
            let stores: f64 = month.stores.iter().map(|s| s.total).sum();
            assert!((stores - month.total_spend).abs() < 1e-6);
        }
    }

    #[test]
    fn test_top_products_ties_keep_encounter_order() {
        let receipts = vec![receipt(
            1,
            "A",
            4.0,
            (2024, 5, 1),
            &[(1, 10, "Zucchini", 2.0, 1.0), (2, 11, "Apples", 2.0, 1.0)],
        )];

        let month = monthly_summary(&receipts, "2024-05", 1).unwrap();
        assert_eq!(month.top_products.len(), 1);
        assert_eq!(month.top_products[0].name, "Zucchini");
        assert!(monthly_summary(&receipts, "2024-06", 1).is_none());
    }

    #[test]
    fn test_price_history() {
        let histories = price_histories(&history());
        assert_eq!(histories[0].name, "Milk");

        let milk = &histories[0];
        let prices: Vec<f64> = milk.observations.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![5.0, 4.5, 6.0]);
        assert_eq!(milk.min_price, 4.5);
        assert_eq!(milk.max_price, 6.0);
        assert_eq!(milk.first_price, 5.0);
        assert_eq!(milk.last_price, 6.0);
        assert!((milk.average_price - 5.1666666).abs() < 1e-4);
        assert!((milk.percent_change.unwrap() - 20.0).abs() < 1e-9);

        let eggs = price_history(&history(), 3).unwrap();
        assert_eq!(eggs.observations.len(), 1);
        assert_eq!(eggs.percent_change, Some(0.0));
    }

    #[test]
    fn test_price_history_zero_first_price() {
        let receipts = vec![
            receipt(1, "A", 0.0, (2024, 1, 1), &[(1, 1, "Sample", 0.0, 1.0)]),
            receipt(2, "A", 1.0, (2024, 1, 2), &[(2, 1, "Sample", 1.0, 0.0)]),
        ];
        let history = price_history(&receipts, 1).unwrap();
        assert_eq!(history.percent_change, None);
        // Zero quantity counts as one unit
        assert_eq!(history.observations[1].quantity, 1.0);
    }

    #[test]
    fn test_empty_history() {
        assert!(monthly_summaries(&[], 5).is_empty());
        assert!(price_histories(&[]).is_empty());
    }
}
