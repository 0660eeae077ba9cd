//! Larder Core Library
//!
//! Shared functionality for the Larder grocery receipt tracker:
//! - Extraction adapter over pluggable vision backends (Ollama, OpenAI-compatible)
//! - Product resolution by case-insensitive name
//! - Receipt ingestion with non-merchandise filtering
//! - Inventory ledger valued at weighted-average cost
//! - Monthly spending summaries and price history
//! - Prompt library and layered configuration

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod models;
pub mod prompts;
pub mod reports;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, DraftItem, DraftReceipt, MockBackend, OllamaBackend};
pub use config::LarderConfig;
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use ingest::ReceiptIngestor;
pub use prompts::{Prompt, PromptId, PromptLibrary};
