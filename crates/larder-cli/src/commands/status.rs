//! Status and dashboard command implementations

use std::path::Path;

use anyhow::Result;
use larder_core::ai::{AIBackend, AIClient};
use larder_core::db::Database;

use super::{load_settings, open_db};

pub async fn cmd_status(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    use larder_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Larder Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    let settings = match load_settings(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            println!();
            println!("   ❌ Config error: {:#}", e);
            println!();
            return Ok(());
        }
    };

    match &settings.source {
        Some(path) => println!("   Config: {}", path.display()),
        None => println!("   Config: built-in defaults"),
    }
    println!("   Lot key policy: {}", settings.inventory.key_policy);

    // Vision backend
    match AIClient::from_config(&settings.extraction) {
        Some(ai) => {
            let state = if ai.health_check().await {
                "✅ reachable"
            } else {
                "⚠️  not responding"
            };
            println!(
                "   🤖 Vision: {} at {} (model: {}) {}",
                ai.backend_name(),
                ai.host(),
                ai.model(),
                state
            );
        }
        None => println!("   🤖 Vision: not configured (set OLLAMA_HOST)"),
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt, &settings) {
            Ok(db) => {
                if let Ok(stats) = db.dashboard_stats() {
                    println!();
                    println!("   Receipts: {}", stats.receipt_count);
                    println!("   Products: {}", stats.product_count);
                    println!("   Inventory lots: {}", stats.inventory.lots);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {:#}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_dashboard(db: &Database) -> Result<()> {
    let stats = db.dashboard_stats()?;

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│           🛒 Larder Dashboard           │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Receipts:          {}", stats.receipt_count);
    println!("  Total spend:       ${:.2}", stats.total_spend);
    println!("  This month:        ${:.2}", stats.current_month_spend);
    println!("  Products:          {}", stats.product_count);
    println!();
    println!("  Inventory lots:    {}", stats.inventory.lots);
    println!("  Units on hand:     {:.2}", stats.inventory.total_units);
    println!("  Book value:        ${:.2}", stats.inventory.total_value);
    println!();

    if stats.receipt_count == 0 {
        println!("  💡 Scan your first receipt: larder scan --file receipt.jpg");
        println!();
    }

    Ok(())
}
