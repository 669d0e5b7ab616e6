use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default number of documents removed per page by the bulk delete.
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

/// Audit document store configuration.
///
/// Selects the adapter the expiration scheduler deletes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum StoreConfig {
    /// In-process store. Contents are lost on restart.
    Memory(MemoryStoreConfig),

    /// SQLite-backed store with a `(status, processed_at)` index.
    #[cfg(feature = "database-sqlite")]
    Sqlite(SqliteConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory(MemoryStoreConfig::default())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StoreConfig::Memory(c) => validate_page_size(c.page_size),
            #[cfg(feature = "database-sqlite")]
            StoreConfig::Sqlite(c) => c.validate(),
        }
    }

    /// Short name of the configured adapter, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Memory(_) => "memory",
            #[cfg(feature = "database-sqlite")]
            StoreConfig::Sqlite(_) => "sqlite",
        }
    }
}

/// In-memory store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStoreConfig {
    /// Documents removed per page during a bulk delete.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// SQLite configuration.
#[cfg(feature = "database-sqlite")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    /// Use `:memory:` for an in-memory database (testing only).
    pub path: String,

    /// Create the database file if it doesn't exist.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// Run migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,

    /// Enable WAL mode so deletes don't block readers.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_sqlite_max_connections")]
    pub max_connections: u32,

    /// Rows removed per `DELETE` statement during a bulk delete.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[cfg(feature = "database-sqlite")]
impl SqliteConfig {
    /// Configuration for a file at `path` with all defaults.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            run_migrations: true,
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
            max_connections: default_sqlite_max_connections(),
            page_size: default_page_size(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::Validation(
                "SQLite path cannot be empty".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "store.max_connections must be at least 1".into(),
            ));
        }
        validate_page_size(self.page_size)
    }
}

fn validate_page_size(page_size: u32) -> Result<(), ConfigError> {
    if page_size == 0 {
        return Err(ConfigError::Validation(
            "store.page_size must be at least 1".into(),
        ));
    }
    Ok(())
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[cfg(feature = "database-sqlite")]
fn default_true() -> bool {
    true
}

#[cfg(feature = "database-sqlite")]
fn default_busy_timeout() -> u64 {
    5000 // 5 seconds
}

#[cfg(feature = "database-sqlite")]
fn default_sqlite_max_connections() -> u32 {
    5
}
