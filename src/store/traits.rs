use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::StoreResult;
use crate::{
    expiration::ExpiryPredicate,
    models::{AuditDocument, MessagesViewEntry},
};

/// The part of an audit store the expiration scheduler depends on.
///
/// Implementations must be thread-safe; foreground reads and writes may run
/// concurrently with a bulk delete.
#[async_trait]
pub trait ExpiryStore: Send + Sync {
    /// Delete every document the named index currently reports as matching
    /// `predicate`, returning how many were removed.
    ///
    /// A single call covers the whole result set: implementations page
    /// through matches internally. Progress is not rolled back if a later
    /// page fails. `cancel` is checked between pages and never interrupts a
    /// page in flight; when it fires the call returns
    /// [`StoreError::Cancelled`](super::StoreError::Cancelled).
    async fn delete_by_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
        cancel: &CancellationToken,
    ) -> StoreResult<u64>;
}

/// Full document access, used by hosts and tests to populate and inspect
/// a store.
#[async_trait]
pub trait AuditStore: ExpiryStore {
    /// Insert or replace a document, keeping the index in step.
    async fn store(&self, document: AuditDocument) -> StoreResult<()>;

    /// Load a document by ID.
    async fn load(&self, id: &str) -> StoreResult<Option<AuditDocument>>;

    /// List index rows matching `predicate`, ordered by `processed_at`.
    async fn query_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
    ) -> StoreResult<Vec<MessagesViewEntry>>;

    /// Number of documents in the collection.
    async fn count(&self) -> StoreResult<u64>;

    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.count().await? == 0)
    }
}
