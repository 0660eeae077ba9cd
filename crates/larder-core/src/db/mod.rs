//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `products` - Product resolution by folded name
//! - `receipts` - Atomic receipt ingestion and receipt reads
//! - `inventory` - Inventory ledger (lots) and manual adjustments
//! - `settings` - Key/value settings, including the recorded lot key policy
//! - `dashboard` - Summary statistics

use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::LotKeyPolicy;

mod dashboard;
mod inventory;
mod products;
mod receipts;
mod settings;

pub use products::fold_name;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "LARDER_DB_KEY";

/// How long a writer waits for another writer's transaction to finish
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Format used for all stored timestamps
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"larder-salt-v1-x";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    /// Lot key policy used for every ledger write through this handle
    key_policy: LotKeyPolicy,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `LARDER_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = match passphrase {
            Some(pass) => Some(format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?)),
            None => None,
        };

        // Runs on every new pooled connection
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(ref pragma) = key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            key_policy: LotKeyPolicy::default(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "larder_test_{}_{}.db",
            std::process::id(),
            id
        ));

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block the single writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Key/value settings (lot key policy, ...)
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Products, unique by trimmed lowercase name
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                folded_name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Receipt headers (append-only)
            CREATE TABLE IF NOT EXISTS receipts (
                id INTEGER PRIMARY KEY,
                store_name TEXT NOT NULL DEFAULT '',
                total_amount REAL NOT NULL DEFAULT 0,
                total_missing BOOLEAN NOT NULL DEFAULT 0,
                scanned_at DATETIME NOT NULL,
                content_hash TEXT UNIQUE,              -- SHA256 of the scanned image
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_receipts_scanned_at ON receipts(scanned_at);

            -- Accepted receipt lines (append-only)
            CREATE TABLE IF NOT EXISTS receipt_items (
                id INTEGER PRIMARY KEY,
                receipt_id INTEGER NOT NULL REFERENCES receipts(id),
                product_id INTEGER NOT NULL REFERENCES products(id),
                line_name TEXT NOT NULL,
                price REAL NOT NULL,
                quantity REAL NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_receipt_items_receipt ON receipt_items(receipt_id);
            CREATE INDEX IF NOT EXISTS idx_receipt_items_product ON receipt_items(product_id);

            CREATE TRIGGER IF NOT EXISTS receipts_append_only
            BEFORE UPDATE ON receipts
            BEGIN
                SELECT RAISE(ABORT, 'receipts are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS receipt_items_append_only
            BEFORE UPDATE ON receipt_items
            BEGIN
                SELECT RAISE(ABORT, 'receipt items are immutable');
            END;

            -- Inventory ledger
            CREATE TABLE IF NOT EXISTS inventory_lots (
                id INTEGER PRIMARY KEY,
                lot_key TEXT NOT NULL UNIQUE,
                product_id INTEGER NOT NULL REFERENCES products(id),
                display_name TEXT NOT NULL,
                quantity REAL NOT NULL CHECK (quantity >= 0),
                total_value REAL NOT NULL CHECK (total_value >= 0),
                last_price REAL NOT NULL,
                last_purchased_at DATETIME NOT NULL,
                frequency INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_inventory_lots_product ON inventory_lots(product_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
