//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Larder - Track what you buy and what's in the pantry
#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Self-hosted grocery receipt and pantry tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "larder.db", global = true)]
    pub db: PathBuf,

    /// Config override file (defaults to ~/.local/share/larder/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set LARDER_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Scan a receipt image with the vision model and ingest it
    Scan {
        /// Receipt image file
        #[arg(short, long)]
        file: PathBuf,

        /// MIME type (guessed from the file extension if not specified)
        #[arg(short, long)]
        mime: Option<String>,
    },

    /// Ingest an already-extracted receipt from a JSON file
    IngestJson {
        /// JSON file with store, date, total and items
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List receipts, newest first
    Receipts {
        /// Maximum number of receipts to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Manage the inventory ledger
    Inventory {
        #[command(subcommand)]
        action: Option<InventoryAction>,
    },

    /// Generate reports
    Report {
        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Show dashboard summary
    Dashboard,

    /// Show database, config and vision backend status
    Status,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory of static files for the web UI
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum InventoryAction {
    /// List all lots
    List,

    /// Add stock that didn't come from a scanned receipt
    Add {
        /// Product name
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: f64,

        /// Number of units
        #[arg(short, long, default_value = "1")]
        quantity: f64,
    },

    /// Use up units of a lot at its average cost
    Consume {
        /// Lot ID
        id: i64,

        /// Number of units
        #[arg(short, long, default_value = "1")]
        quantity: f64,
    },

    /// Add units to a lot at its last price
    Restock {
        /// Lot ID
        id: i64,

        /// Number of units
        #[arg(short, long, default_value = "1")]
        quantity: f64,
    },

    /// Change a lot's display name
    Rename {
        /// Lot ID
        id: i64,

        /// New display name
        name: String,
    },

    /// Remove a lot from the ledger
    Remove {
        /// Lot ID
        id: i64,
    },

    /// Rebuild the ledger by replaying every receipt
    ///
    /// Manual adds, consumption and renames are discarded.
    Rebuild,

    /// Show ledger totals
    Stats,
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Spending by month with store breakdown and top products
    Monthly {
        /// Single month (YYYY-MM); all months if not specified
        #[arg(short, long)]
        month: Option<String>,

        /// Number of top products per month (defaults to config)
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Price history per product
    Prices {
        /// Product name (case-insensitive); all products if not specified
        #[arg(short, long)]
        product: Option<String>,
    },
}
