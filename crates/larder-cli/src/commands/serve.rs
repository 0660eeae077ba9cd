//! Server command implementation

use std::path::Path;

use anyhow::{anyhow, Result};

use super::{load_settings, open_db};

pub async fn cmd_serve(
    db_path: &Path,
    config_path: Option<&Path>,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Larder web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    // Allowed CORS origins from environment (comma-separated)
    let allowed_origins: Vec<String> = std::env::var("LARDER_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !allowed_origins.is_empty() {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }

    println!();
    println!("   ⚠️  No built-in authentication - put a reverse proxy in front before exposing");
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let settings = load_settings(config_path)?;
    let db = open_db(db_path, no_encrypt, &settings)?;

    let config = larder_server::ServerConfig { allowed_origins };

    let static_dir_str = match static_dir {
        Some(p) => Some(
            p.to_str()
                .ok_or_else(|| anyhow!("Static dir path must be valid UTF-8: {}", p.display()))?,
        ),
        None => None,
    };
    larder_server::serve(db, settings, host, port, static_dir_str, config).await?;

    Ok(())
}
