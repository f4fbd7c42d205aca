//! # Admin Configuration
//!
//! Settings for the admin services and the command-line entry point.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOOKSTORE_DB_PATH=./bookstore.db                                   │
//! │     BOOKSTORE_DELETE_POLICY=hard                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bookstore-admin/bookstore.toml (Linux)                   │
//! │     ~/Library/Application Support/com.bookstore.admin/bookstore.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     soft delete, top 5, pages of 10                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # bookstore.toml
//! [database]
//! path = "/var/lib/bookstore/bookstore.db"
//! max_connections = 5
//! delete_policy = "soft"  # soft | hard
//!
//! [dashboard]
//! top_n = 5
//!
//! [inventory]
//! page_size = 10
//! low_stock_threshold = 2
//! default_image = "/images/no-cover.png"
//!
//! [logging]
//! filter = "info,bookstore=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use bookstore_core::{DEFAULT_PAGE_SIZE, DEFAULT_TOP_N};
use bookstore_db::{DbConfig, DeletePolicy};

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "bookstore.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `bookstore.db` in the platform data dir.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// What deleting a book or inventory record does.
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "bookstore", "admin")
        .map(|dirs| dirs.data_dir().join("bookstore.db"))
        .unwrap_or_else(|| PathBuf::from("bookstore.db"))
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSettings {
    /// Entries kept in each ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Books per search results page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Stock at or below this is reported by the low-stock screen.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,

    /// Shown by the book details view when a book has no pictures.
    #[serde(default = "default_image")]
    pub default_image: String,
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            page_size: default_page_size(),
            low_stock_threshold: default_low_stock_threshold(),
            default_image: default_image(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_low_stock_threshold() -> i64 {
    2
}

fn default_image() -> String {
    "/images/no-cover.png".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,bookstore=debug,sqlx=warn".to_string()
}

// =============================================================================
// AdminConfig
// =============================================================================

/// Complete admin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub dashboard: DashboardSettings,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AdminConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bookstore.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading admin config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load admin config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Admin config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.dashboard.top_n == 0 {
            return Err(ConfigError::Invalid(
                "dashboard.top_n must be greater than 0".into(),
            ));
        }

        if self.inventory.page_size == 0 {
            return Err(ConfigError::Invalid(
                "inventory.page_size must be greater than 0".into(),
            ));
        }

        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold must not be negative".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BOOKSTORE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("BOOKSTORE_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid BOOKSTORE_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(policy) = std::env::var("BOOKSTORE_DELETE_POLICY") {
            match policy.parse::<DeletePolicy>() {
                Ok(p) => {
                    debug!(policy = ?p, "Overriding delete policy from environment");
                    self.database.delete_policy = p;
                }
                Err(e) => warn!(error = %e, "Ignoring BOOKSTORE_DELETE_POLICY"),
            }
        }

        if let Ok(top) = std::env::var("BOOKSTORE_TOP_N") {
            if let Ok(n) = top.parse::<usize>() {
                self.dashboard.top_n = n;
            }
        }

        if let Ok(size) = std::env::var("BOOKSTORE_PAGE_SIZE") {
            if let Ok(n) = size.parse::<usize>() {
                self.inventory.page_size = n;
            }
        }

        if let Ok(threshold) = std::env::var("BOOKSTORE_LOW_STOCK_THRESHOLD") {
            if let Ok(n) = threshold.parse::<i64>() {
                self.inventory.low_stock_threshold = n;
            }
        }

        if let Ok(filter) = std::env::var("BOOKSTORE_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bookstore", "admin")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Database settings in the shape `bookstore-db` expects.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .delete_policy(self.database.delete_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert_eq!(config.database.delete_policy, DeletePolicy::Soft);
        assert_eq!(config.dashboard.top_n, 5);
        assert_eq!(config.inventory.page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AdminConfig::default();

        config.dashboard.top_n = 0;
        assert!(config.validate().is_err());

        config.dashboard.top_n = 3;
        config.inventory.page_size = 0;
        assert!(config.validate().is_err());

        config.inventory.page_size = 20;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AdminConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/books.db"
            delete_policy = "hard"

            [dashboard]
            top_n = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/books.db"));
        assert_eq!(config.database.delete_policy, DeletePolicy::Hard);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.dashboard.top_n, 3);
        assert_eq!(config.inventory, InventorySettings::default());
    }

    #[test]
    fn test_save_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AdminConfig::default();
        config.database.path = dir.path().join("books.db");
        config.inventory.low_stock_threshold = 7;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[database]"));
        assert!(contents.contains("[inventory]"));

        let parsed: AdminConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_db_config_carries_policy() {
        let mut config = AdminConfig::default();
        config.database.delete_policy = DeletePolicy::Hard;
        config.database.max_connections = 3;

        let db = config.db_config();
        assert_eq!(db.delete_policy, DeletePolicy::Hard);
        assert_eq!(db.max_connections, 3);
    }
}
