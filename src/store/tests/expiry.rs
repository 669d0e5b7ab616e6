//! Shared tests for bulk expiry through `AuditStore` implementations

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::{
    expiration::{ExpiryPredicate, RetentionPolicy},
    models::{
        AuditDocument, FailedMessage, FailedMessageStatus, IS_SYSTEM_MESSAGE, MESSAGES_VIEW_INDEX,
        MessageStatus, ProcessedMessage,
    },
    store::{AuditStore, StoreError},
};

const HOURS_TO_KEEP: i64 = 24;

fn predicate_at(now: DateTime<Utc>) -> ExpiryPredicate {
    let policy = RetentionPolicy::new(HOURS_TO_KEEP).expect("valid policy");
    ExpiryPredicate::new(policy.cutoff(now))
}

async fn expire(store: &dyn AuditStore, now: DateTime<Utc>) -> u64 {
    store
        .delete_by_index(MESSAGES_VIEW_INDEX, &predicate_at(now), &CancellationToken::new())
        .await
        .expect("Failed to delete expired documents")
}

async fn put(store: &dyn AuditStore, document: impl Into<AuditDocument>) {
    store
        .store(document.into())
        .await
        .expect("Failed to store document");
}

async fn exists(store: &dyn AuditStore, id: &str) -> bool {
    store
        .load(id)
        .await
        .expect("Failed to load document")
        .is_some()
}

// ============================================================================
// Eligibility
// ============================================================================

pub async fn test_processed_messages_are_expired(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now - Duration::hours(HOURS_TO_KEEP * 3))).await;
    put(
        store,
        ProcessedMessage::new("2", now - Duration::hours(HOURS_TO_KEEP * 2))
            .with_metadata(IS_SYSTEM_MESSAGE, true),
    )
    .await;

    assert_eq!(expire(store, now).await, 2);
    assert!(!exists(store, "1").await);
    assert!(!exists(store, "2").await);
}

pub async fn test_only_old_processed_messages_are_expired(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now - Duration::hours(HOURS_TO_KEEP * 3))).await;
    put(
        store,
        ProcessedMessage::new("2", now).with_metadata(IS_SYSTEM_MESSAGE, true),
    )
    .await;

    assert_eq!(expire(store, now).await, 1);
    assert!(!exists(store, "1").await);
    assert!(exists(store, "2").await);
}

pub async fn test_recent_processed_messages_are_kept(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now)).await;
    put(
        store,
        ProcessedMessage::new("2", now - Duration::hours(HOURS_TO_KEEP) + Duration::seconds(1)),
    )
    .await;

    assert_eq!(expire(store, now).await, 0);
    assert!(exists(store, "1").await);
    assert!(exists(store, "2").await);
}

pub async fn test_cutoff_is_inclusive(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("edge", now - Duration::hours(HOURS_TO_KEEP))).await;

    assert_eq!(expire(store, now).await, 1);
    assert!(!exists(store, "edge").await);
}

pub async fn test_cutoff_is_exact_to_the_nanosecond(store: &dyn AuditStore) {
    let now = Utc::now();
    let cutoff = now - Duration::hours(HOURS_TO_KEEP);
    put(store, ProcessedMessage::new("before", cutoff - Duration::nanoseconds(1))).await;
    put(store, ProcessedMessage::new("after", cutoff + Duration::nanoseconds(1))).await;

    assert_eq!(expire(store, now).await, 1);
    assert!(!exists(store, "before").await);
    assert!(exists(store, "after").await);
}

pub async fn test_far_future_messages_are_kept(store: &dyn AuditStore) {
    let now = Utc::now();
    let year_10000 = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
    put(store, ProcessedMessage::new("future", year_10000)).await;

    assert_eq!(expire(store, now).await, 0);
    assert!(exists(store, "future").await);
    assert!(
        store
            .query_index(MESSAGES_VIEW_INDEX, &predicate_at(year_10000))
            .await
            .unwrap()
            .iter()
            .any(|entry| entry.id == "future" && entry.processed_at == year_10000)
    );
}

pub async fn test_ancient_messages_are_expired(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("epoch", DateTime::UNIX_EPOCH)).await;
    put(
        store,
        ProcessedMessage::new("bce", Utc.with_ymd_and_hms(-1, 3, 15, 12, 0, 0).unwrap()),
    )
    .await;
    put(store, ProcessedMessage::new("recent", now)).await;

    assert_eq!(expire(store, now).await, 2);
    assert!(!exists(store, "epoch").await);
    assert!(!exists(store, "bce").await);
    assert!(exists(store, "recent").await);
}

pub async fn test_unresolved_failures_are_kept(store: &dyn AuditStore) {
    let now = Utc::now();
    put(
        store,
        FailedMessage::new("1", FailedMessageStatus::Unresolved)
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 3))
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 2)),
    )
    .await;
    put(
        store,
        FailedMessage::new("2", FailedMessageStatus::Unresolved)
            .with_attempt(now - Duration::days(3650)),
    )
    .await;

    assert_eq!(expire(store, now).await, 0);
    assert!(exists(store, "1").await);
    assert!(exists(store, "2").await);
}

pub async fn test_archived_failures_are_kept(store: &dyn AuditStore) {
    let now = Utc::now();
    put(
        store,
        FailedMessage::new("1", FailedMessageStatus::Archived)
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 3)),
    )
    .await;

    assert_eq!(expire(store, now).await, 0);
    assert!(exists(store, "1").await);
}

pub async fn test_resolved_failures_expire_from_last_attempt(store: &dyn AuditStore) {
    let now = Utc::now();
    put(
        store,
        FailedMessage::new("old", FailedMessageStatus::Resolved)
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 3))
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 2)),
    )
    .await;
    put(
        store,
        FailedMessage::new("recent", FailedMessageStatus::Resolved)
            .with_attempt(now - Duration::hours(HOURS_TO_KEEP * 3))
            .with_attempt(now - Duration::hours(1)),
    )
    .await;

    assert_eq!(expire(store, now).await, 1);
    assert!(!exists(store, "old").await);
    assert!(exists(store, "recent").await);
}

pub async fn test_failures_without_attempts_are_kept(store: &dyn AuditStore) {
    put(store, FailedMessage::new("1", FailedMessageStatus::Resolved)).await;

    assert_eq!(expire(store, Utc::now()).await, 0);
    assert!(exists(store, "1").await);
}

// ============================================================================
// Paging and idempotence
// ============================================================================

pub async fn test_many_processed_messages_are_expired(store: &dyn AuditStore) {
    let now = Utc::now();
    let old = now - Duration::days(HOURS_TO_KEEP * 3);
    for i in 0..2049 {
        put(store, ProcessedMessage::new(format!("old-{i}"), old - Duration::minutes(i % 30)))
            .await;
    }
    put(store, ProcessedMessage::new("recent", now)).await;

    assert_eq!(expire(store, now).await, 2049);
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(exists(store, "recent").await);
    assert!(!exists(store, "old-0").await);
    assert!(!exists(store, "old-2048").await);
}

pub async fn test_second_run_deletes_nothing(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now - Duration::hours(HOURS_TO_KEEP * 3))).await;
    put(store, ProcessedMessage::new("2", now)).await;

    assert_eq!(expire(store, now).await, 1);
    assert_eq!(expire(store, now).await, 0);
    assert_eq!(store.count().await.unwrap(), 1);
}

pub async fn test_later_cycle_catches_newly_eligible(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now)).await;

    assert_eq!(expire(store, now).await, 0);
    assert_eq!(expire(store, now + Duration::hours(HOURS_TO_KEEP)).await, 1);
    assert!(!exists(store, "1").await);
}

// ============================================================================
// Failure modes
// ============================================================================

pub async fn test_unknown_index_is_rejected(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now - Duration::hours(HOURS_TO_KEEP * 3))).await;

    let err = store
        .delete_by_index("NoSuchIndex", &predicate_at(now), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::IndexNotFound(ref name) if name == "NoSuchIndex"));
    assert!(exists(store, "1").await);
}

pub async fn test_cancelled_before_first_page(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("1", now - Duration::hours(HOURS_TO_KEEP * 3))).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = store
        .delete_by_index(MESSAGES_VIEW_INDEX, &predicate_at(now), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled { deleted: 0 }));
    assert!(exists(store, "1").await);
}

// ============================================================================
// Inspection
// ============================================================================

pub async fn test_query_index_lists_matches_oldest_first(store: &dyn AuditStore) {
    let now = Utc::now();
    put(store, ProcessedMessage::new("b", now - Duration::hours(48))).await;
    put(store, ProcessedMessage::new("a", now - Duration::hours(72))).await;
    put(store, ProcessedMessage::new("c", now)).await;
    put(
        store,
        FailedMessage::new("f", FailedMessageStatus::Resolved).with_attempt(now - Duration::hours(60)),
    )
    .await;

    let entries = store
        .query_index(MESSAGES_VIEW_INDEX, &predicate_at(now))
        .await
        .unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "f", "b"]);
    assert_eq!(entries[1].status, MessageStatus::ResolvedSuccessfully);
}

pub async fn test_load_preserves_document(store: &dyn AuditStore) {
    let now = Utc::now();
    let message = ProcessedMessage::new("1", now).with_metadata(IS_SYSTEM_MESSAGE, true);
    put(store, message.clone()).await;

    let loaded = store.load("1").await.unwrap();
    assert_eq!(loaded, Some(AuditDocument::Processed(message)));
    assert_eq!(store.load("missing").await.unwrap(), None);
}

mod memory_tests {
    use crate::store::InMemoryAuditStore;

    macro_rules! memory_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let store = InMemoryAuditStore::default();
                super::$name(&store).await;
            }
        };
    }

    memory_test!(test_processed_messages_are_expired);
    memory_test!(test_only_old_processed_messages_are_expired);
    memory_test!(test_recent_processed_messages_are_kept);
    memory_test!(test_cutoff_is_inclusive);
    memory_test!(test_cutoff_is_exact_to_the_nanosecond);
    memory_test!(test_far_future_messages_are_kept);
    memory_test!(test_ancient_messages_are_expired);
    memory_test!(test_unresolved_failures_are_kept);
    memory_test!(test_archived_failures_are_kept);
    memory_test!(test_resolved_failures_expire_from_last_attempt);
    memory_test!(test_failures_without_attempts_are_kept);
    memory_test!(test_many_processed_messages_are_expired);
    memory_test!(test_second_run_deletes_nothing);
    memory_test!(test_later_cycle_catches_newly_eligible);
    memory_test!(test_unknown_index_is_rejected);
    memory_test!(test_cancelled_before_first_page);
    memory_test!(test_query_index_lists_matches_oldest_first);
    memory_test!(test_load_preserves_document);
}

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use crate::store::{SqliteAuditStore, tests::harness::create_migrated_sqlite_pool};

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let store = SqliteAuditStore::new(create_migrated_sqlite_pool().await);
                super::$name(&store).await;
            }
        };
    }

    sqlite_test!(test_processed_messages_are_expired);
    sqlite_test!(test_only_old_processed_messages_are_expired);
    sqlite_test!(test_recent_processed_messages_are_kept);
    sqlite_test!(test_cutoff_is_inclusive);
    sqlite_test!(test_cutoff_is_exact_to_the_nanosecond);
    sqlite_test!(test_far_future_messages_are_kept);
    sqlite_test!(test_ancient_messages_are_expired);
    sqlite_test!(test_unresolved_failures_are_kept);
    sqlite_test!(test_archived_failures_are_kept);
    sqlite_test!(test_resolved_failures_expire_from_last_attempt);
    sqlite_test!(test_failures_without_attempts_are_kept);
    sqlite_test!(test_many_processed_messages_are_expired);
    sqlite_test!(test_second_run_deletes_nothing);
    sqlite_test!(test_later_cycle_catches_newly_eligible);
    sqlite_test!(test_unknown_index_is_rejected);
    sqlite_test!(test_cancelled_before_first_page);
    sqlite_test!(test_query_index_lists_matches_oldest_first);
    sqlite_test!(test_load_preserves_document);
}
