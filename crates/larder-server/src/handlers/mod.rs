//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod inventory;
pub mod receipts;
pub mod reports;

// Re-export all handlers for use in router
pub use inventory::*;
pub use receipts::*;
pub use reports::*;
