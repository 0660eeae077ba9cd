//! Inventory valuation
//!
//! Each lot carries a quantity on hand and the book value of those units.
//! Purchases add `price * quantity` to the value. Decreases remove value at
//! the weighted average cost (`value / quantity`) taken before the decrement,
//! so the value of what remains is never distorted by the order in which
//! units were bought. A lot that runs out is removed from the ledger.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::LotKeyPolicy;

/// Quantities at or below this are treated as empty
const EMPTY_EPSILON: f64 = 1e-9;

/// Build the ledger key for a purchase under the given policy
///
/// `product` keys one lot per product. `product_price` keys one lot per
/// product and unit price rounded to cents.
pub fn lot_key(policy: LotKeyPolicy, product_id: i64, price: f64) -> String {
    match policy {
        LotKeyPolicy::Product => format!("p:{}", product_id),
        LotKeyPolicy::ProductPrice => format!("p:{}@{}", product_id, price_cents(price)),
    }
}

/// Unit price in whole cents
pub fn price_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Reject quantities that cannot be applied to a lot
pub fn validate_quantity(quantity: f64) -> Result<f64> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(quantity)
    } else {
        Err(Error::Validation(format!(
            "Quantity must be a positive number, got {}",
            quantity
        )))
    }
}

/// Whether a decrease left anything on hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depletion {
    Remaining,
    Depleted,
}

/// Quantity and value state of one lot
#[derive(Debug, Clone, PartialEq)]
pub struct LotBalance {
    pub quantity: f64,
    pub total_value: f64,
    pub last_price: f64,
    pub last_purchased_at: DateTime<Utc>,
    pub frequency: i64,
}

impl LotBalance {
    /// Balance of a lot created by its first purchase
    pub fn opened(price: f64, quantity: f64, at: DateTime<Utc>, frequency: i64) -> Self {
        Self {
            quantity,
            total_value: (price * quantity).max(0.0),
            last_price: price,
            last_purchased_at: at,
            frequency,
        }
    }

    /// Weighted average cost of one unit (0 for an empty lot)
    pub fn average_cost(&self) -> f64 {
        if self.quantity > EMPTY_EPSILON {
            self.total_value / self.quantity
        } else {
            0.0
        }
    }

    /// Add a purchase of `quantity` units at `price`
    ///
    /// Last price and date only move forward: an event dated before the
    /// stored last purchase leaves them untouched. `new_visit` counts the
    /// purchase towards the lot's receipt frequency.
    pub fn record_purchase(
        &mut self,
        price: f64,
        quantity: f64,
        at: DateTime<Utc>,
        new_visit: bool,
    ) {
        self.quantity += quantity;
        self.total_value += price * quantity;
        if at >= self.last_purchased_at {
            self.last_price = price;
            self.last_purchased_at = at;
        }
        if new_visit {
            self.frequency += 1;
        }
    }

    /// Remove `quantity` units at weighted average cost
    pub fn consume(&mut self, quantity: f64) -> Depletion {
        if quantity + EMPTY_EPSILON >= self.quantity {
            self.quantity = 0.0;
            self.total_value = 0.0;
            return Depletion::Depleted;
        }

        let unit_cost = self.average_cost();
        self.quantity -= quantity;
        self.total_value = (self.total_value - quantity * unit_cost).max(0.0);
        Depletion::Remaining
    }

    /// Add `quantity` units valued at the last purchase price
    pub fn restock(&mut self, quantity: f64) {
        self.quantity += quantity;
        self.total_value += quantity * self.last_price;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_lot_key_policies() {
        assert_eq!(lot_key(LotKeyPolicy::Product, 7, 3.49), "p:7");
        assert_eq!(lot_key(LotKeyPolicy::ProductPrice, 7, 3.49), "p:7@349");
        assert_eq!(
            lot_key(LotKeyPolicy::ProductPrice, 7, 3.494),
            lot_key(LotKeyPolicy::ProductPrice, 7, 3.49)
        );
    }

    #[test]
    fn test_purchases_accumulate_value() {
        let mut lot = LotBalance::opened(5.0, 1.0, day(1), 1);
        lot.record_purchase(5.0, 1.0, day(1), false);
        assert_eq!(lot.quantity, 2.0);
        assert!((lot.total_value - 10.0).abs() < 1e-9);
        assert_eq!(lot.frequency, 1);

        lot.record_purchase(6.0, 3.0, day(5), true);
        assert_eq!(lot.quantity, 5.0);
        assert!((lot.total_value - 28.0).abs() < 1e-9);
        assert_eq!(lot.last_price, 6.0);
        assert_eq!(lot.frequency, 2);
    }

    #[test]
    fn test_older_purchase_keeps_last_price() {
        let mut lot = LotBalance::opened(4.0, 1.0, day(10), 1);
        lot.record_purchase(3.0, 1.0, day(2), true);
        assert_eq!(lot.last_price, 4.0);
        assert_eq!(lot.last_purchased_at, day(10));
        assert!((lot.total_value - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_day_purchase_updates_last_price() {
        let mut lot = LotBalance::opened(4.0, 1.0, day(10), 1);
        lot.record_purchase(4.5, 1.0, day(10), true);
        assert_eq!(lot.last_price, 4.5);
    }

    #[test]
    fn test_consume_at_weighted_average() {
        let mut lot = LotBalance::opened(10.0, 3.0, day(1), 1);
        assert_eq!(lot.consume(1.0), Depletion::Remaining);
        assert_eq!(lot.quantity, 2.0);
        assert!((lot.total_value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_consume_mixed_prices() {
        let mut lot = LotBalance::opened(2.0, 2.0, day(1), 1);
        lot.record_purchase(5.0, 2.0, day(2), true);
        // value 14 over 4 units -> 3.50 each
        lot.consume(1.0);
        assert!((lot.total_value - 10.5).abs() < 1e-9);
        assert_eq!(lot.quantity, 3.0);
    }

    #[test]
    fn test_consume_everything_depletes() {
        let mut lot = LotBalance::opened(10.0, 3.0, day(1), 1);
        assert_eq!(lot.consume(3.0), Depletion::Depleted);
        assert_eq!(lot.quantity, 0.0);
        assert_eq!(lot.total_value, 0.0);

        let mut lot = LotBalance::opened(10.0, 3.0, day(1), 1);
        assert_eq!(lot.consume(5.0), Depletion::Depleted);
    }

    #[test]
    fn test_restock_uses_last_price() {
        let mut lot = LotBalance::opened(2.5, 2.0, day(1), 1);
        lot.restock(2.0);
        assert_eq!(lot.quantity, 4.0);
        assert!((lot.total_value - 10.0).abs() < 1e-9);
        assert_eq!(lot.frequency, 1);
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1.0).is_ok());
        assert!(validate_quantity(0.5).is_ok());
        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(-2.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
    }
}
