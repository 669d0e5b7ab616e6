//! SQLite-backed audit store.
//!
//! The messages view projection is stored in `status` / `processed_at_secs`
//! / `processed_at_nanos` columns next to the JSON document, covered by
//! `idx_messages_view_status_processed_at`. Expiry statements name that index
//! with `INDEXED BY`, so a missing index fails the query instead of silently
//! degrading to a table scan.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tokio_util::sync::CancellationToken;

use super::{
    error::{StoreError, StoreResult},
    traits::{AuditStore, ExpiryStore},
};
use crate::{
    config::{DEFAULT_PAGE_SIZE, SqliteConfig},
    expiration::ExpiryPredicate,
    models::{AuditDocument, AuditedEntity, MESSAGES_VIEW_INDEX, MessageStatus, MessagesViewEntry},
};

const MESSAGES_VIEW_SQL_INDEX: &str = "idx_messages_view_status_processed_at";

pub struct SqliteAuditStore {
    pool: SqlitePool,
    page_size: u32,
}

impl SqliteAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_page_size(pool, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(pool: SqlitePool, page_size: u32) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
        }
    }

    /// Open the database described by `config`, running migrations if asked.
    pub async fn connect(config: &SqliteConfig) -> StoreResult<Self> {
        let in_memory = config.path == ":memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(config.create_if_missing)
                .journal_mode(if config.wal_mode {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
        };
        let options =
            options.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms));

        // Every connection to `:memory:` is a separate database
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        if config.run_migrations {
            run_migrations(&pool).await?;
        }

        Ok(Self::with_page_size(pool, config.page_size))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
    Ok(())
}

fn check_index(index_name: &str) -> StoreResult<()> {
    if index_name == MESSAGES_VIEW_INDEX {
        Ok(())
    } else {
        Err(StoreError::IndexNotFound(index_name.to_string()))
    }
}

/// Split an instant into `(seconds since epoch, subsecond nanos)`.
///
/// Both parts are integers, so the pair orders chronologically for every
/// representable year, including negative and five-digit ones.
fn encode_timestamp(instant: DateTime<Utc>) -> (i64, i64) {
    (instant.timestamp(), i64::from(instant.timestamp_subsec_nanos()))
}

fn decode_timestamp(secs: i64, nanos: i64) -> StoreResult<DateTime<Utc>> {
    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(secs, nanos))
        .ok_or_else(|| StoreError::Internal(format!("invalid processed_at {secs}s {nanos}ns")))
}

fn status_placeholders(predicate: &ExpiryPredicate) -> String {
    vec!["?"; predicate.statuses().len()].join(", ")
}

#[async_trait]
impl ExpiryStore for SqliteAuditStore {
    async fn delete_by_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
        cancel: &CancellationToken,
    ) -> StoreResult<u64> {
        check_index(index_name)?;

        let sql = format!(
            r#"
            DELETE FROM audit_documents
            WHERE id IN (
                SELECT id FROM audit_documents INDEXED BY {MESSAGES_VIEW_SQL_INDEX}
                WHERE status IN ({})
                  AND (processed_at_secs, processed_at_nanos) <= (?, ?)
                LIMIT ?
            )
            "#,
            status_placeholders(predicate)
        );
        let (cutoff_secs, cutoff_nanos) = encode_timestamp(predicate.cutoff());
        let limit = self.page_size as u64;

        let mut total_deleted: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled {
                    deleted: total_deleted,
                });
            }

            let mut query = sqlx::query(&sql);
            for code in predicate.status_codes() {
                query = query.bind(code);
            }
            let result = query
                .bind(cutoff_secs)
                .bind(cutoff_nanos)
                .bind(limit as i64)
                .execute(&self.pool)
                .await?;

            let rows_deleted = result.rows_affected();
            total_deleted += rows_deleted;

            if rows_deleted < limit {
                break;
            }
        }

        Ok(total_deleted)
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn store(&self, document: AuditDocument) -> StoreResult<()> {
        let entry = document.view_entry();
        let processed_at = entry.as_ref().map(|e| encode_timestamp(e.processed_at));
        let body = serde_json::to_string(&document)?;

        sqlx::query(
            r#"
            INSERT INTO audit_documents
                (id, kind, status, processed_at_secs, processed_at_nanos, body)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                status = excluded.status,
                processed_at_secs = excluded.processed_at_secs,
                processed_at_nanos = excluded.processed_at_nanos,
                body = excluded.body
            "#,
        )
        .bind(document.id())
        .bind(document.kind())
        .bind(entry.as_ref().map(|e| e.status.code()))
        .bind(processed_at.map(|(secs, _)| secs))
        .bind(processed_at.map(|(_, nanos)| nanos))
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, id: &str) -> StoreResult<Option<AuditDocument>> {
        let row = sqlx::query("SELECT body FROM audit_documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let body: String = row.get("body");
            serde_json::from_str(&body).map_err(StoreError::from)
        })
        .transpose()
    }

    async fn query_index(
        &self,
        index_name: &str,
        predicate: &ExpiryPredicate,
    ) -> StoreResult<Vec<MessagesViewEntry>> {
        check_index(index_name)?;

        let sql = format!(
            r#"
            SELECT id, status, processed_at_secs, processed_at_nanos
            FROM audit_documents INDEXED BY {MESSAGES_VIEW_SQL_INDEX}
            WHERE status IN ({})
              AND (processed_at_secs, processed_at_nanos) <= (?, ?)
            ORDER BY processed_at_secs, processed_at_nanos, id
            "#,
            status_placeholders(predicate)
        );

        let mut query = sqlx::query(&sql);
        for code in predicate.status_codes() {
            query = query.bind(code);
        }
        let (cutoff_secs, cutoff_nanos) = encode_timestamp(predicate.cutoff());
        let rows = query
            .bind(cutoff_secs)
            .bind(cutoff_nanos)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let code: i64 = row.get("status");
                Ok(MessagesViewEntry {
                    id: row.get("id"),
                    status: MessageStatus::from_code(code).ok_or_else(|| {
                        StoreError::Internal(format!("unknown status code {code}"))
                    })?,
                    processed_at: decode_timestamp(
                        row.get("processed_at_secs"),
                        row.get("processed_at_nanos"),
                    )?,
                })
            })
            .collect()
    }

    async fn count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM audit_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count") as u64)
    }
}
