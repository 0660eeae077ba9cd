//! Mock backend for testing
//!
//! Returns a fixed draft (or a fixed failure) without touching the network.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};

use super::types::{DraftItem, DraftReceipt};
use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Draft returned by extract_receipt; a stock grocery receipt when None
    pub draft: Option<DraftReceipt>,
    /// When set, extract_receipt fails with this extraction error
    pub failure: Option<String>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Always return `draft`
    pub fn with_draft(draft: DraftReceipt) -> Self {
        Self {
            draft: Some(draft),
            ..Self::new()
        }
    }

    /// Always fail extraction with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Stock receipt returned when no draft is configured
    pub fn sample_draft() -> DraftReceipt {
        DraftReceipt {
            store: Some("Mock Mart".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 1, 15),
            total: Some(9.47),
            items: vec![
                DraftItem::new("Bananas", 1.29, 2.0),
                DraftItem::new("Whole Milk", 3.99, 1.0),
                DraftItem::new("Member Discount", -0.50, 1.0),
                DraftItem::new("Sales Tax", 0.41, 1.0),
            ],
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_receipt(
        &self,
        _image_data: &[u8],
        _mime_type: &str,
    ) -> Result<DraftReceipt> {
        if let Some(ref message) = self.failure {
            return Err(Error::Extraction(message.clone()));
        }
        Ok(self.draft.clone().unwrap_or_else(Self::sample_draft))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
