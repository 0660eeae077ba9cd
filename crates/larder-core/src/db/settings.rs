//! Settings and the recorded lot key policy

use rusqlite::{params, Connection, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::models::LotKeyPolicy;

/// Settings key holding the policy the ledger was built with
const KEY_POLICY_SETTING: &str = "lot_key_policy";

/// Record `policy` for the ledger, or confirm it matches the recorded one
///
/// Must be called inside the transaction that writes lots, so the first
/// writer wins and every later writer is checked against it.
pub(crate) fn claim_key_policy(conn: &Connection, policy: LotKeyPolicy) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)",
        params![KEY_POLICY_SETTING, policy.as_str()],
    )?;

    let recorded: String = conn.query_row(
        "SELECT value FROM settings WHERE key = ?",
        params![KEY_POLICY_SETTING],
        |row| row.get(0),
    )?;

    ensure_policy_matches(&recorded, policy)
}

fn ensure_policy_matches(recorded: &str, policy: LotKeyPolicy) -> Result<()> {
    let recorded: LotKeyPolicy = recorded.parse().map_err(Error::Config)?;
    if recorded != policy {
        return Err(Error::Config(format!(
            "Inventory was built with lot key policy '{}' but '{}' is configured. \
            Change the config back or rebuild from an empty database.",
            recorded, policy
        )));
    }
    Ok(())
}

impl Database {
    /// Use `policy` for all ledger writes through this handle
    ///
    /// Fails with a config error when the database already records a
    /// different policy.
    pub fn with_key_policy(mut self, policy: LotKeyPolicy) -> Result<Self> {
        if let Some(recorded) = self.get_setting(KEY_POLICY_SETTING)? {
            ensure_policy_matches(&recorded, policy)?;
        }
        self.key_policy = policy;
        Ok(self)
    }

    /// Lot key policy used by this handle
    pub fn key_policy(&self) -> LotKeyPolicy {
        self.key_policy
    }

    /// Policy recorded in the database, if any lot has been written
    pub fn recorded_key_policy(&self) -> Result<Option<LotKeyPolicy>> {
        match self.get_setting(KEY_POLICY_SETTING)? {
            Some(value) => Ok(Some(value.parse().map_err(Error::Config)?)),
            None => Ok(None),
        }
    }

    /// Get a setting value
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
