//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (load_settings, open_db, require_ai)
//! - `inventory` - Inventory ledger commands
//! - `receipts` - Scan, JSON ingest and receipt listing
//! - `reports` - Monthly and price history reports
//! - `serve` - Web server command
//! - `status` - Status and dashboard commands

pub mod core;
pub mod inventory;
pub mod receipts;
pub mod reports;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use core::*;
pub use inventory::*;
pub use receipts::*;
pub use reports::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
