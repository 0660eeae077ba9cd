//! Receipt ingestion
//!
//! Turns a normalized draft into stored rows:
//! 1. Validate the draft (at least one line)
//! 2. Screen lines: non-merchandise markers and negative prices are skipped
//! 3. Default the header (empty store, zero total flagged missing, today's date)
//! 4. Persist header, products, items and ledger deltas in one transaction
//!
//! Scanning an image adds a duplicate check on the image hash and the
//! extraction call in front of step 1. Nothing is written until extraction
//! has returned a usable draft.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::ai::{AIBackend, DraftItem, DraftReceipt};
use crate::config::LarderConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{IngestReport, NewReceipt, NewReceiptItem, SkipReason, SkippedLine};

/// Markers used when no configuration is supplied
const DEFAULT_DENYLIST: &[&str] = &["discount", "tax", "service charge"];

/// SHA256 of an image, hex encoded
pub fn content_hash(image_data: &[u8]) -> String {
    hex::encode(Sha256::digest(image_data))
}

/// Writes extracted receipts to the database
pub struct ReceiptIngestor<'a> {
    db: &'a Database,
    /// Lowercase markers; a line whose name contains one is skipped
    denylist: Vec<String>,
}

impl<'a> ReceiptIngestor<'a> {
    /// Create an ingestor with the default denylist
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create an ingestor using the configured denylist
    pub fn with_config(db: &'a Database, config: &LarderConfig) -> Self {
        Self {
            db,
            denylist: config.ingest.denylist.clone(),
        }
    }

    /// Decide whether a line is merchandise
    pub fn screen(&self, item: &DraftItem) -> Option<SkipReason> {
        let folded = item.name.trim().to_lowercase();
        if folded.is_empty() {
            return Some(SkipReason::EmptyName);
        }
        if let Some(marker) = self.denylist.iter().find(|m| folded.contains(m.as_str())) {
            return Some(SkipReason::Denylisted(marker.clone()));
        }
        if item.price < 0.0 {
            return Some(SkipReason::NegativePrice);
        }
        None
    }

    /// Ingest an already-extracted draft
    pub fn ingest(&self, draft: &DraftReceipt) -> Result<IngestReport> {
        self.ingest_with_hash(draft, None)
    }

    /// Hash the image, extract it and ingest the result
    ///
    /// Refuses an image that was already ingested before calling the backend.
    /// An extraction failure leaves the database untouched.
    pub async fn scan<B>(&self, ai: &B, image_data: &[u8], mime_type: &str) -> Result<IngestReport>
    where
        B: AIBackend + ?Sized,
    {
        let hash = content_hash(image_data);
        if let Some(existing) = self.db.get_receipt_by_hash(&hash)? {
            return Err(Error::Duplicate(format!(
                "This image was already ingested as receipt {}",
                existing.id
            )));
        }

        info!(
            model = ai.model(),
            bytes = image_data.len(),
            mime_type,
            "Extracting receipt"
        );
        let draft = ai.extract_receipt(image_data, mime_type).await?;

        self.ingest_with_hash(&draft, Some(hash))
    }

    fn ingest_with_hash(
        &self,
        draft: &DraftReceipt,
        content_hash: Option<String>,
    ) -> Result<IngestReport> {
        if draft.items.is_empty() {
            return Err(Error::Validation("Receipt has no line items".into()));
        }

        let mut accepted = Vec::with_capacity(draft.items.len());
        let mut skipped = Vec::new();
        for item in &draft.items {
            match self.screen(item) {
                Some(reason) => {
                    warn!(line = %item.name, price = item.price, %reason, "Skipping receipt line");
                    skipped.push(SkippedLine {
                        name: item.name.clone(),
                        price: item.price,
                        quantity: item.quantity,
                        reason,
                    });
                }
                None => accepted.push(NewReceiptItem {
                    name: item.name.trim().to_string(),
                    price: normalize_price(item.price),
                    quantity: normalize_quantity(item.quantity),
                }),
            }
        }

        let header = NewReceipt {
            store_name: draft
                .store
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            total_amount: draft.total.unwrap_or(0.0),
            total_missing: draft.total.is_none(),
            scanned_at: draft.date.map(start_of_day).unwrap_or_else(Utc::now),
            content_hash,
        };

        let outcome = self.db.ingest_receipt(&header, &accepted)?;

        info!(
            receipt_id = outcome.receipt_id,
            store = %header.store_name,
            items = accepted.len(),
            skipped = skipped.len(),
            products_created = outcome.products_created,
            "Receipt ingested"
        );

        Ok(IngestReport {
            receipt_id: outcome.receipt_id,
            store_name: header.store_name,
            total_amount: header.total_amount,
            total_missing: header.total_missing,
            scanned_at: header.scanned_at,
            accepted_items: accepted.len(),
            products_touched: outcome.products_touched,
            products_created: outcome.products_created,
            skipped,
        })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn normalize_price(price: f64) -> f64 {
    if price.is_finite() {
        price
    } else {
        0.0
    }
}

/// Unusable quantities count as one unit
fn normalize_quantity(quantity: f64) -> f64 {
    if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn martx() -> DraftReceipt {
        DraftReceipt {
            store: Some("MartX".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            total: Some(10.50),
            items: vec![
                DraftItem::new("Milk", 5.00, 1.0),
                DraftItem::new("Milk", 5.00, 1.0),
            ],
        }
    }

    #[test]
    fn test_screen_lines() {
        let db = Database::in_memory().unwrap();
        let ingestor = ReceiptIngestor::new(&db);

        assert_eq!(ingestor.screen(&DraftItem::new("Milk", 1.0, 1.0)), None);
        assert_eq!(
            ingestor.screen(&DraftItem::new("Sales TAX", 0.4, 1.0)),
            Some(SkipReason::Denylisted("tax".into()))
        );
        assert_eq!(
            ingestor.screen(&DraftItem::new("Service Charge", 2.0, 1.0)),
            Some(SkipReason::Denylisted("service charge".into()))
        );
        assert_eq!(
            ingestor.screen(&DraftItem::new("Coupon", -1.0, 1.0)),
            Some(SkipReason::NegativePrice)
        );
        assert_eq!(
            ingestor.screen(&DraftItem::new("  ", 1.0, 1.0)),
            Some(SkipReason::EmptyName)
        );
    }

    #[test]
    fn test_ingest_martx() {
        let db = Database::in_memory().unwrap();
        let report = ReceiptIngestor::new(&db).ingest(&martx()).unwrap();

        assert_eq!(report.store_name, "MartX");
        assert_eq!(report.accepted_items, 2);
        assert_eq!(report.products_touched, 1);
        assert_eq!(report.products_created, 1);
        assert!(!report.total_missing);
        assert_eq!(report.scanned_at.format("%Y-%m-%d").to_string(), "2024-03-01");

        let lots = db.list_lots().unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 2.0);
        assert!((lots[0].total_value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ingest_defaults_missing_header_fields() {
        let db = Database::in_memory().unwrap();
        let draft = DraftReceipt {
            items: vec![DraftItem::new("Apples", 2.0, 0.0)],
            ..Default::default()
        };

        let before = Utc::now() - chrono::Duration::seconds(5);
        let report = ReceiptIngestor::new(&db).ingest(&draft).unwrap();
        assert_eq!(report.store_name, "");
        assert_eq!(report.total_amount, 0.0);
        assert!(report.total_missing);
        assert!(report.scanned_at >= before);

        // Zero quantity counts as one unit
        let receipt = db.get_receipt(report.receipt_id).unwrap().unwrap();
        assert_eq!(receipt.items[0].quantity, 1.0);
    }

    #[test]
    fn test_empty_draft_is_rejected() {
        let db = Database::in_memory().unwrap();
        let err = ReceiptIngestor::new(&db)
            .ingest(&DraftReceipt::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(db.count_receipts().unwrap(), 0);
    }

    #[test]
    fn test_configured_denylist() {
        let db = Database::in_memory().unwrap();
        let mut config = LarderConfig::default();
        config.ingest.denylist = vec!["deposit".to_string()];
        let ingestor = ReceiptIngestor::with_config(&db, &config);

        assert!(ingestor
            .screen(&DraftItem::new("Bottle Deposit", 0.25, 1.0))
            .is_some());
        assert!(ingestor.screen(&DraftItem::new("Tax", 0.25, 1.0)).is_none());
    }

    #[tokio::test]
    async fn test_scan_skips_non_merchandise() {
        let db = Database::in_memory().unwrap();
        let ai = MockBackend::new();

        let report = ReceiptIngestor::new(&db)
            .scan(&ai, b"receipt-image", "image/jpeg")
            .await
            .unwrap();

        // Sample draft: Bananas, Whole Milk, Member Discount, Sales Tax
        assert_eq!(report.accepted_items, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(db.list_products().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_same_image_twice_is_duplicate() {
        let db = Database::in_memory().unwrap();
        let ai = MockBackend::new();
        let ingestor = ReceiptIngestor::new(&db);

        ingestor.scan(&ai, b"same", "image/png").await.unwrap();
        let err = ingestor.scan(&ai, b"same", "image/png").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
        assert_eq!(db.count_receipts().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_extraction_failure_writes_nothing() {
        let db = Database::in_memory().unwrap();
        let ai = MockBackend::failing("model returned prose");

        let err = ReceiptIngestor::new(&db)
            .scan(&ai, b"img", "image/jpeg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Extraction);
        assert_eq!(db.count_receipts().unwrap(), 0);
        assert!(db.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_content_hash_is_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
