//! Layered configuration
//!
//! Settings are resolved in order, later layers winning:
//! 1. Embedded defaults (compiled into binary from config/larder.toml)
//! 2. Override file in data dir (~/.local/share/larder/config.toml)
//! 3. Environment variables (`LARDER_LOT_KEY_POLICY`, `OLLAMA_VISION_MODEL`)
//!
//! An override file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::LotKeyPolicy;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/larder.toml");

/// Environment variable overriding the lot key policy
pub const KEY_POLICY_ENV: &str = "LARDER_LOT_KEY_POLICY";

/// Environment variable overriding the vision model
pub const VISION_MODEL_ENV: &str = "OLLAMA_VISION_MODEL";

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub key_policy: LotKeyPolicy,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Case-insensitive markers of non-merchandise lines
    pub denylist: Vec<String>,
    /// Products listed per month in the monthly summary
    pub top_products: usize,
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub vision_model: Option<String>,
    pub timeout: Duration,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct LarderConfig {
    pub inventory: InventoryConfig,
    pub ingest: IngestConfig,
    pub extraction: ExtractionConfig,
    /// Override file that contributed to this config, if any
    pub source: Option<PathBuf>,
}

impl Default for LarderConfig {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig {
                key_policy: LotKeyPolicy::Product,
            },
            ingest: IngestConfig {
                denylist: vec![
                    "discount".to_string(),
                    "tax".to_string(),
                    "service charge".to_string(),
                ],
                top_products: 5,
            },
            extraction: ExtractionConfig {
                vision_model: None,
                timeout: Duration::from_secs(120),
            },
            source: None,
        }
    }
}

impl LarderConfig {
    /// Load from the default override location and the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::embedded()?;
        if let Some(path) = default_config_path() {
            if path.exists() {
                config.apply_file(&path)?;
            }
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load with an explicit override file
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut config = Self::embedded()?;
        config.apply_file(path)?;
        Ok(config)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Parse TOML content on top of the built-in defaults
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(content)?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        self.apply_toml(&content)?;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)?;

        if let Some(inventory) = raw.inventory {
            if let Some(policy) = inventory.key_policy {
                self.inventory.key_policy = policy.parse().map_err(Error::Config)?;
            }
        }

        if let Some(ingest) = raw.ingest {
            if let Some(denylist) = ingest.denylist {
                self.ingest.denylist = denylist
                    .into_iter()
                    .map(|m| m.trim().to_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect();
            }
            if let Some(top) = ingest.top_products {
                self.ingest.top_products = top;
            }
        }

        if let Some(extraction) = raw.extraction {
            if let Some(model) = extraction.vision_model {
                self.extraction.vision_model = Some(model).filter(|m| !m.is_empty());
            }
            if let Some(secs) = extraction.timeout_secs {
                self.extraction.timeout = Duration::from_secs(secs);
            }
        }

        Ok(())
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup(KEY_POLICY_ENV).filter(|v| !v.is_empty()) {
            self.inventory.key_policy = policy.parse().map_err(Error::Config)?;
        }
        if let Some(model) = lookup(VISION_MODEL_ENV).filter(|v| !v.is_empty()) {
            self.extraction.vision_model = Some(model);
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("larder").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    inventory: Option<RawInventory>,
    ingest: Option<RawIngest>,
    extraction: Option<RawExtraction>,
}

#[derive(Debug, Deserialize)]
struct RawInventory {
    key_policy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIngest {
    denylist: Option<Vec<String>>,
    top_products: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    vision_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_parses() {
        let config = LarderConfig::embedded().unwrap();
        assert_eq!(config.inventory.key_policy, LotKeyPolicy::Product);
        assert_eq!(
            config.ingest.denylist,
            vec!["discount", "tax", "service charge"]
        );
        assert_eq!(config.ingest.top_products, 5);
        assert_eq!(config.extraction.timeout, Duration::from_secs(120));
        assert_eq!(
            config.extraction.vision_model.as_deref(),
            Some("llama3.2-vision")
        );
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = LarderConfig::parse(
            r#"
            [inventory]
            key_policy = "product_price"
            "#,
        )
        .unwrap();
        assert_eq!(config.inventory.key_policy, LotKeyPolicy::ProductPrice);
        assert_eq!(config.ingest.top_products, 5);
        assert_eq!(config.ingest.denylist.len(), 3);
    }

    #[test]
    fn test_denylist_is_normalized() {
        let config = LarderConfig::parse(
            r#"
            [ingest]
            denylist = ["  Coupon ", "", "BAG FEE"]
            "#,
        )
        .unwrap();
        assert_eq!(config.ingest.denylist, vec!["coupon", "bag fee"]);
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        let err = LarderConfig::parse(
            r#"
            [inventory]
            key_policy = "fifo"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = LarderConfig::parse("[inventory").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ingest]\ntop_products = 10").unwrap();

        let config = LarderConfig::from_path(file.path()).unwrap();
        assert_eq!(config.ingest.top_products, 10);
        assert_eq!(config.source.as_deref(), Some(file.path()));
        // Embedded layer still applies underneath
        assert_eq!(
            config.extraction.vision_model.as_deref(),
            Some("llama3.2-vision")
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LarderConfig::embedded().unwrap();
        config
            .apply_env(|key| match key {
                KEY_POLICY_ENV => Some("product_price".to_string()),
                VISION_MODEL_ENV => Some("llava".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.inventory.key_policy, LotKeyPolicy::ProductPrice);
        assert_eq!(config.extraction.vision_model.as_deref(), Some("llava"));
    }
}
