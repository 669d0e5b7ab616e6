use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FailedMessage, MessageStatus, ProcessedMessage};

/// Name of the secondary index expiry queries run against.
pub const MESSAGES_VIEW_INDEX: &str = "MessagesViewIndex";

/// A row of the messages view index: the fields expiry needs, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesViewEntry {
    pub id: String,
    pub status: MessageStatus,
    pub processed_at: DateTime<Utc>,
}

/// Anything the audit store keeps that may eventually expire.
pub trait AuditedEntity {
    fn id(&self) -> &str;

    /// Status the entity is indexed under.
    fn status(&self) -> MessageStatus;

    /// Timestamp expiry is measured from, if the entity has one yet.
    fn processed_at(&self) -> Option<DateTime<Utc>>;

    /// Project the entity into its index row.
    ///
    /// Entities without a timestamp are not indexed and can never expire.
    fn view_entry(&self) -> Option<MessagesViewEntry> {
        Some(MessagesViewEntry {
            id: self.id().to_string(),
            status: self.status(),
            processed_at: self.processed_at()?,
        })
    }
}

impl AuditedEntity for ProcessedMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> MessageStatus {
        MessageStatus::Successful
    }

    fn processed_at(&self) -> Option<DateTime<Utc>> {
        Some(self.processed_at)
    }
}

impl AuditedEntity for FailedMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> MessageStatus {
        self.view_status()
    }

    fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt().map(|attempt| attempt.attempted_at)
    }
}

/// A document stored in the audit collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDocument {
    Processed(ProcessedMessage),
    Failed(FailedMessage),
}

impl AuditDocument {
    /// Short name of the document kind, as stored alongside the index row.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditDocument::Processed(_) => "processed",
            AuditDocument::Failed(_) => "failed",
        }
    }
}

impl AuditedEntity for AuditDocument {
    fn id(&self) -> &str {
        match self {
            AuditDocument::Processed(m) => m.id(),
            AuditDocument::Failed(m) => m.id(),
        }
    }

    fn status(&self) -> MessageStatus {
        match self {
            AuditDocument::Processed(m) => m.status(),
            AuditDocument::Failed(m) => m.status(),
        }
    }

    fn processed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            AuditDocument::Processed(m) => m.processed_at(),
            AuditDocument::Failed(m) => m.processed_at(),
        }
    }
}

impl From<ProcessedMessage> for AuditDocument {
    fn from(message: ProcessedMessage) -> Self {
        AuditDocument::Processed(message)
    }
}

impl From<FailedMessage> for AuditDocument {
    fn from(message: FailedMessage) -> Self {
        AuditDocument::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::FailedMessageStatus;

    #[test]
    fn test_processed_message_view_entry() {
        let now = Utc::now();
        let entry = ProcessedMessage::new("1", now).view_entry().unwrap();
        assert_eq!(entry.id, "1");
        assert_eq!(entry.status, MessageStatus::Successful);
        assert_eq!(entry.processed_at, now);
    }

    #[test]
    fn test_failed_message_indexed_at_last_attempt() {
        let now = Utc::now();
        let message = FailedMessage::new("f", FailedMessageStatus::Resolved)
            .with_attempt(now - Duration::hours(72))
            .with_attempt(now - Duration::hours(48));
        let entry = message.view_entry().unwrap();
        assert_eq!(entry.status, MessageStatus::ResolvedSuccessfully);
        assert_eq!(entry.processed_at, now - Duration::hours(48));
    }

    #[test]
    fn test_failed_message_without_attempts_not_indexed() {
        let message = FailedMessage::new("f", FailedMessageStatus::Resolved);
        assert!(message.view_entry().is_none());
    }

    #[test]
    fn test_document_serde_tagging() {
        let now = Utc::now();
        let doc = AuditDocument::from(ProcessedMessage::new("1", now));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["kind"], "processed");
        assert_eq!(json["id"], "1");

        let back: AuditDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.kind(), "processed");
    }
}
