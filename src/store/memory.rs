//! In-process audit store.
//!
//! Documents live in a hash map; the messages view index is a `BTreeSet`
//! ordered by `(status, processed_at, id)`, so an expiry query is one range
//! scan per expirable status rather than a walk over every document.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{
    error::{StoreError, StoreResult},
    traits::{AuditStore, ExpiryStore},
};
use crate::{
    config::{DEFAULT_PAGE_SIZE, MemoryStoreConfig},
    expiration::ExpiryPredicate,
    models::{AuditDocument, AuditedEntity, MESSAGES_VIEW_INDEX, MessageStatus, MessagesViewEntry},
};

type IndexKey = (MessageStatus, DateTime<Utc>, String);

#[derive(Debug, Default)]
struct Collection {
    documents: HashMap<String, AuditDocument>,
    messages_view: BTreeSet<IndexKey>,
}

impl Collection {
    fn upsert(&mut self, document: AuditDocument) {
        let id = document.id().to_string();
        if let Some(previous) = self.documents.remove(&id) {
            self.unindex(&previous);
        }
        if let Some(entry) = document.view_entry() {
            self.messages_view
                .insert((entry.status, entry.processed_at, entry.id));
        }
        self.documents.insert(id, document);
    }

    fn unindex(&mut self, document: &AuditDocument) {
        if let Some(entry) = document.view_entry() {
            self.messages_view
                .remove(&(entry.status, entry.processed_at, entry.id));
        }
    }

    /// Index keys matching the predicate, oldest first within each status.
    fn matching<'a>(
        &'a self,
        predicate: &'a ExpiryPredicate,
    ) -> impl Iterator<Item = &'a IndexKey> + 'a {
        predicate.statuses().iter().flat_map(move |&status| {
            self.messages_view
                .range((status, DateTime::<Utc>::MIN_UTC, String::new())..)
                .take_while(move |(s, processed_at, _)| {
                    *s == status && *processed_at <= predicate.cutoff()
                })
        })
    }

    /// Remove up to `limit` matching documents, returning how many went.
    fn remove_page(&mut self, predicate: &ExpiryPredicate, limit: usize) -> usize {
        let page: Vec<IndexKey> = self.matching(predicate).take(limit).cloned().collect();
        for key in &page {
            self.messages_view.remove(key);
            self.documents.remove(&key.2);
        }
        page.len()
    }
}

/// Audit store held entirely in memory.
#[derive(Debug)]
pub struct InMemoryAuditStore {
    collection: RwLock<Collection>,
    page_size: usize,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE as usize)
    }
}

impl InMemoryAuditStore {
    /// Create an empty store deleting at most `page_size` documents per page.
    pub fn new(page_size: usize) -> Self {
        Self {
            collection: RwLock::new(Collection::default()),
            page_size: page_size.max(1),
        }
    }

    pub fn from_config(config: &MemoryStoreConfig) -> Self {
        Self::new(config.page_size as usize)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

fn check_index(index_name: &str) -> StoreResult<()> {
    if index_name == MESSAGES_VIEW_INDEX {
        Ok(())
    } else {
        Err(StoreError::IndexNotFound(index_name.to_string()))
    }
}

#[async_trait]
impl ExpiryStore for InMemoryAuditStore {
    async fn delete_by_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
        cancel: &CancellationToken,
    ) -> StoreResult<u64> {
        check_index(index_name)?;

        let mut deleted: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled { deleted });
            }

            let removed = self
                .collection
                .write()
                .remove_page(predicate, self.page_size);
            deleted += removed as u64;

            if removed < self.page_size {
                break;
            }

            // Let foreground writers in between pages
            tokio::task::yield_now().await;
        }

        Ok(deleted)
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn store(&self, document: AuditDocument) -> StoreResult<()> {
        self.collection.write().upsert(document);
        Ok(())
    }

    async fn load(&self, id: &str) -> StoreResult<Option<AuditDocument>> {
        Ok(self.collection.read().documents.get(id).cloned())
    }

    async fn query_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
    ) -> StoreResult<Vec<MessagesViewEntry>> {
        check_index(index_name)?;

        let collection = self.collection.read();
        let mut entries: Vec<MessagesViewEntry> = collection
            .matching(predicate)
            .map(|(status, processed_at, id)| MessagesViewEntry {
                id: id.clone(),
                status: *status,
                processed_at: *processed_at,
            })
            .collect();
        entries.sort_by(|a, b| a.processed_at.cmp(&b.processed_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.collection.read().documents.len() as u64)
    }
}
