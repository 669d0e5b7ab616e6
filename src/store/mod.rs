//! Audit document stores.
//!
//! The expiration scheduler only needs [`ExpiryStore::delete_by_index`]; the
//! wider [`AuditStore`] trait lets hosts and tests populate and inspect a
//! store. Two adapters are provided:
//!
//! - [`InMemoryAuditStore`]: process-local, always available
//! - `SqliteAuditStore`: persistent, behind the `database-sqlite` feature

mod error;
mod memory;
#[cfg(feature = "database-sqlite")]
mod sqlite;
pub mod traits;

#[cfg(test)]
pub(crate) mod tests;

use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryAuditStore;
#[cfg(feature = "database-sqlite")]
pub use sqlite::{SqliteAuditStore, run_migrations};
pub use traits::{AuditStore, ExpiryStore};

use crate::config::StoreConfig;

/// Create an audit store from configuration.
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn AuditStore>> {
    let store: Arc<dyn AuditStore> = match config {
        StoreConfig::Memory(cfg) => Arc::new(InMemoryAuditStore::from_config(cfg)),

        #[cfg(feature = "database-sqlite")]
        StoreConfig::Sqlite(cfg) => Arc::new(SqliteAuditStore::connect(cfg).await?),
    };

    Ok(store)
}
