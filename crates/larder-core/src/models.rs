//! Domain models for Larder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::LotBalance;

/// How purchases are grouped into inventory lots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LotKeyPolicy {
    /// One lot per product
    #[default]
    Product,
    /// One lot per (product, unit price in cents)
    ProductPrice,
}

impl LotKeyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::ProductPrice => "product_price",
        }
    }
}

impl std::str::FromStr for LotKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "product_price" | "product-price" | "batch" => Ok(Self::ProductPrice),
            _ => Err(format!("Unknown lot key policy: {}", s)),
        }
    }
}

impl std::fmt::Display for LotKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A distinct purchasable thing, identified by its case-folded name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    /// Spelling seen the first time the product was encountered
    pub name: String,
    /// Trimmed, lowercased name (unique)
    pub folded_name: String,
    pub created_at: DateTime<Utc>,
}

/// A stored receipt header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub store_name: String,
    pub total_amount: f64,
    /// True when the extraction service gave no total and 0 was stored
    pub total_missing: bool,
    /// Purchase date from the receipt, or the time of scanning
    pub scanned_at: DateTime<Utc>,
    /// SHA256 of the source image, when scanned from an image
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New receipt header for insertion
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub store_name: String,
    pub total_amount: f64,
    pub total_missing: bool,
    pub scanned_at: DateTime<Utc>,
    pub content_hash: Option<String>,
}

/// A purchased line on a stored receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub id: i64,
    pub receipt_id: i64,
    pub product_id: i64,
    /// Canonical product name
    pub product_name: String,
    /// Name as printed on this receipt
    pub line_name: String,
    /// Unit price
    pub price: f64,
    pub quantity: f64,
}

impl ReceiptItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity
    }
}

/// An accepted line ready to be persisted
#[derive(Debug, Clone)]
pub struct NewReceiptItem {
    pub name: String,
    pub price: f64,
    pub quantity: f64,
}

/// Receipt with its joined line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptWithItems {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub items: Vec<ReceiptItem>,
}

/// A stock position in the inventory ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLot {
    pub id: i64,
    pub lot_key: String,
    pub product_id: i64,
    pub display_name: String,
    pub quantity: f64,
    /// Book value of the units on hand
    pub total_value: f64,
    pub last_price: f64,
    pub last_purchased_at: DateTime<Utc>,
    /// Number of receipts that contributed to this lot
    pub frequency: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLot {
    pub fn balance(&self) -> LotBalance {
        LotBalance {
            quantity: self.quantity,
            total_value: self.total_value,
            last_price: self.last_price,
            last_purchased_at: self.last_purchased_at,
            frequency: self.frequency,
        }
    }

    /// Weighted average cost of one unit
    pub fn average_cost(&self) -> f64 {
        self.balance().average_cost()
    }
}

/// Result of a manual decrease
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsumeOutcome {
    Updated { lot: InventoryLot },
    Removed { lot_id: i64 },
}

/// Why a receipt line produced no product, item or inventory change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Name contains a non-merchandise marker (discount, tax, ...)
    Denylisted(String),
    NegativePrice,
    EmptyName,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denylisted(marker) => write!(f, "matches '{}'", marker),
            Self::NegativePrice => write!(f, "negative price"),
            Self::EmptyName => write!(f, "empty name"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedLine {
    pub name: String,
    pub price: f64,
    pub quantity: f64,
    pub reason: SkipReason,
}

/// Outcome of ingesting one receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub receipt_id: i64,
    pub store_name: String,
    pub total_amount: f64,
    pub total_missing: bool,
    pub scanned_at: DateTime<Utc>,
    /// Lines persisted as receipt items
    pub accepted_items: usize,
    /// Distinct products referenced by the accepted lines
    pub products_touched: usize,
    /// Products created by this receipt
    pub products_created: usize,
    pub skipped: Vec<SkippedLine>,
}

/// Summary of what a single ingestion wrote
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub receipt_id: i64,
    pub products_touched: usize,
    pub products_created: usize,
}

/// Spend at one store within a month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSpend {
    pub store: String,
    pub total: f64,
    pub visits: usize,
}

/// Spend on one product within a month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSpend {
    pub product_id: i64,
    pub name: String,
    pub total: f64,
    pub quantity: f64,
}

/// Spending for one calendar month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// YYYY-MM
    pub month: String,
    pub total_spend: f64,
    pub visits: usize,
    pub average_per_visit: f64,
    /// Stores in order of first visit within the month
    pub stores: Vec<StoreSpend>,
    pub top_products: Vec<ProductSpend>,
}

/// One purchase of a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub store: String,
    pub receipt_id: i64,
}

/// Chronological price series for one product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub product_id: i64,
    pub name: String,
    pub observations: Vec<PriceObservation>,
    pub min_price: f64,
    pub max_price: f64,
    pub average_price: f64,
    pub first_price: f64,
    pub last_price: f64,
    /// (last - first) / first * 100; None when first price is zero
    pub percent_change: Option<f64>,
}

/// Totals across the inventory ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryStats {
    pub lots: i64,
    pub total_units: f64,
    pub total_value: f64,
}

/// Dashboard statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub receipt_count: i64,
    pub total_spend: f64,
    pub current_month_spend: f64,
    pub product_count: i64,
    pub inventory: InventoryStats,
}
