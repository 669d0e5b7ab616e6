use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;

use super::ExpiryPredicate;
use crate::store::{ExpiryStore, StoreError};

/// Outcome of a single bulk delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Number of documents deleted.
    pub deleted: u64,
    /// Wall-clock time spent in the store call.
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ReapError {
    #[error("Reap cancelled after deleting {deleted} documents")]
    Cancelled { deleted: u64 },

    #[error("Bulk delete against '{index}' failed: {source}")]
    Store {
        index: String,
        #[source]
        source: StoreError,
    },
}

impl ReapError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReapError::Cancelled { .. } => "cancelled",
            ReapError::Store { source, .. } => match source {
                StoreError::IndexNotFound(_) => "index_not_found",
                StoreError::Unavailable(_) => "unavailable",
                _ => "store",
            },
        }
    }
}

/// Deletes every document matching a predicate through one named index.
///
/// The store pages internally, so a single `reap` removes all current
/// matches no matter how many there are. No retry is attempted; failures are
/// returned to the caller with whatever partial progress the store made
/// already committed.
#[derive(Clone)]
pub struct BulkReaper {
    store: Arc<dyn ExpiryStore>,
    index_name: String,
}

impl BulkReaper {
    pub fn new(store: Arc<dyn ExpiryStore>, index_name: impl Into<String>) -> Self {
        Self {
            store,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub async fn reap(
        &self,
        predicate: &ExpiryPredicate,
        cancel: &CancellationToken,
    ) -> Result<ReapOutcome, ReapError> {
        let started = Instant::now();

        match self
            .store
            .delete_by_index(&self.index_name, predicate, cancel)
            .await
        {
            Ok(deleted) => Ok(ReapOutcome {
                deleted,
                elapsed: started.elapsed(),
            }),
            Err(StoreError::Cancelled { deleted }) => Err(ReapError::Cancelled { deleted }),
            Err(source) => Err(ReapError::Store {
                index: self.index_name.clone(),
                source,
            }),
        }
    }
}
