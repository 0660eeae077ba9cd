//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_settings` - Layered config (embedded, override file, environment)
//! - `open_db` - Shared utility to open the database under the configured lot key policy
//! - `require_ai` - Vision backend for scanning
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use larder_core::ai::{AIBackend, AIClient};
use larder_core::db::Database;
use larder_core::LarderConfig;

/// Load settings from an explicit file or the default override location
pub fn load_settings(config_path: Option<&Path>) -> Result<LarderConfig> {
    match config_path {
        Some(path) => {
            let mut settings = LarderConfig::from_path(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            settings
                .apply_env(|key| std::env::var(key).ok())
                .context("Invalid config environment variable")?;
            Ok(settings)
        }
        None => LarderConfig::load().context("Failed to load config"),
    }
}

/// Open database with encryption by default, or unencrypted if --no-encrypt
///
/// The handle writes lots under the configured key policy; opening fails if
/// the database was built with a different one.
pub fn open_db(db_path: &Path, no_encrypt: bool, settings: &LarderConfig) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow!("Database path must be valid UTF-8: {}", db_path.display()))?;
    let db = if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")?
    } else {
        Database::new(path_str).context("Failed to open database")?
    };

    db.with_key_policy(settings.inventory.key_policy)
        .context("Lot key policy does not match this database")
}

/// Vision backend from the environment, or an error explaining how to set one
pub fn require_ai(settings: &LarderConfig) -> Result<AIClient> {
    AIClient::from_config(&settings.extraction).ok_or_else(|| {
        anyhow!(
            "Vision backend not configured. Set OLLAMA_HOST (or AI_BACKEND=openai_compatible \
            with OPENAI_COMPATIBLE_HOST) to scan receipts, or use 'larder ingest-json'."
        )
    })
}

pub fn cmd_init(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let settings = load_settings(config_path)?;
    let db = open_db(db_path, no_encrypt, &settings)?;

    match db.recorded_key_policy()? {
        Some(policy) => println!("   Lot key policy: {} (recorded)", policy),
        None => println!(
            "   Lot key policy: {} (recorded on first purchase)",
            settings.inventory.key_policy
        ),
    }

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    match AIClient::from_config(&settings.extraction) {
        Some(ai) => println!(
            "   🤖 Vision backend: {} (model: {})",
            ai.backend_name(),
            ai.model()
        ),
        None => println!("   💡 Tip: Set OLLAMA_HOST to scan receipt photos"),
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Scan a receipt: larder scan --file receipt.jpg");
    println!("  2. Start web UI: larder serve");

    Ok(())
}
