//! Larder CLI - Grocery receipt and pantry tracker
//!
//! Usage:
//!   larder init                       Initialize database
//!   larder scan --file receipt.jpg    Extract and ingest a receipt photo
//!   larder inventory                  Show what's on hand
//!   larder report monthly             Spending by month
//!   larder serve --port 3000          Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, config_path, cli.no_encrypt),
        Commands::Scan { file, mime } => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            let ai = commands::require_ai(&settings)?;
            commands::cmd_scan(&db, &settings, &ai, &file, mime.as_deref()).await
        }
        Commands::IngestJson { file } => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            commands::cmd_ingest_json(&db, &settings, &file)
        }
        Commands::Receipts { limit } => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            commands::cmd_receipts_list(&db, limit)
        }
        Commands::Inventory { action } => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            match action {
                None | Some(InventoryAction::List) => commands::cmd_inventory_list(&db),
                Some(InventoryAction::Add {
                    name,
                    price,
                    quantity,
                }) => commands::cmd_inventory_add(&db, &name, price, quantity),
                Some(InventoryAction::Consume { id, quantity }) => {
                    commands::cmd_inventory_consume(&db, id, quantity)
                }
                Some(InventoryAction::Restock { id, quantity }) => {
                    commands::cmd_inventory_restock(&db, id, quantity)
                }
                Some(InventoryAction::Rename { id, name }) => {
                    commands::cmd_inventory_rename(&db, id, &name)
                }
                Some(InventoryAction::Remove { id }) => commands::cmd_inventory_remove(&db, id),
                Some(InventoryAction::Rebuild) => commands::cmd_inventory_rebuild(&db),
                Some(InventoryAction::Stats) => commands::cmd_inventory_stats(&db),
            }
        }
        Commands::Report { report_type } => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            match report_type {
                ReportType::Monthly { month, top } => commands::cmd_report_monthly(
                    &db,
                    month.as_deref(),
                    top.unwrap_or(settings.ingest.top_products),
                ),
                ReportType::Prices { product } => {
                    commands::cmd_report_prices(&db, product.as_deref())
                }
            }
        }
        Commands::Dashboard => {
            let settings = commands::load_settings(config_path)?;
            let db = commands::open_db(&cli.db, cli.no_encrypt, &settings)?;
            commands::cmd_dashboard(&db)
        }
        Commands::Status => commands::cmd_status(&cli.db, config_path, cli.no_encrypt).await,
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                config_path,
                &host,
                port,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
    }
}
