//! Typed drafts produced by the extraction adapter
//!
//! Model output is loosely typed. Everything downstream of the adapter works
//! with these structs, which have already been normalized: names trimmed,
//! prices and quantities coerced to numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A receipt as read from an image, before validation and persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftReceipt {
    /// Store name, if the model could read one
    pub store: Option<String>,
    /// Purchase date printed on the receipt
    pub date: Option<NaiveDate>,
    /// Receipt total, if present and numeric
    pub total: Option<f64>,
    pub items: Vec<DraftItem>,
}

/// One printed line of a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    /// Trimmed line name
    pub name: String,
    /// Unit price (0 when unreadable, may be negative for discounts)
    pub price: f64,
    /// Units bought (1 when unreadable)
    pub quantity: f64,
}

impl DraftItem {
    pub fn new(name: &str, price: f64, quantity: f64) -> Self {
        Self {
            name: name.trim().to_string(),
            price,
            quantity,
        }
    }
}
