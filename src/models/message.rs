use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Metadata key set by the audit pipeline on control messages.
pub const IS_SYSTEM_MESSAGE: &str = "IsSystemMessage";

/// Status of a message as exposed by the messages view index.
///
/// The numeric codes are what the index stores and what expiry queries match
/// on, so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Failed once and not yet resolved
    Failed,
    /// Failed more than once and not yet resolved
    RepeatedFailure,
    /// Processed successfully and audited
    Successful,
    /// A failure that was later resolved by a successful retry
    ResolvedSuccessfully,
    /// A failure that an operator archived
    ArchivedFailure,
    /// A retry has been requested and is in flight
    RetryIssued,
}

impl MessageStatus {
    /// Statuses that mark a message as finished with and safe to expire.
    pub const EXPIRABLE: [MessageStatus; 2] = [
        MessageStatus::Successful,
        MessageStatus::ResolvedSuccessfully,
    ];

    /// Numeric code stored in the index.
    pub fn code(&self) -> i64 {
        match self {
            MessageStatus::Failed => 1,
            MessageStatus::RepeatedFailure => 2,
            MessageStatus::Successful => 3,
            MessageStatus::ResolvedSuccessfully => 4,
            MessageStatus::ArchivedFailure => 5,
            MessageStatus::RetryIssued => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MessageStatus::Failed),
            2 => Some(MessageStatus::RepeatedFailure),
            3 => Some(MessageStatus::Successful),
            4 => Some(MessageStatus::ResolvedSuccessfully),
            5 => Some(MessageStatus::ArchivedFailure),
            6 => Some(MessageStatus::RetryIssued),
            _ => None,
        }
    }

    pub fn is_expirable(&self) -> bool {
        Self::EXPIRABLE.contains(self)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::RepeatedFailure => write!(f, "repeated_failure"),
            MessageStatus::Successful => write!(f, "successful"),
            MessageStatus::ResolvedSuccessfully => write!(f, "resolved_successfully"),
            MessageStatus::ArchivedFailure => write!(f, "archived_failure"),
            MessageStatus::RetryIssued => write!(f, "retry_issued"),
        }
    }
}

/// A message that was processed successfully and recorded by the audit
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub id: String,
    /// When the receiving endpoint finished processing the message
    pub processed_at: DateTime<Utc>,
    /// Headers and flags captured with the message. Not used for expiry.
    #[serde(default)]
    pub message_metadata: HashMap<String, JsonValue>,
}

impl ProcessedMessage {
    pub fn new(id: impl Into<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            processed_at,
            message_metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.message_metadata.insert(key.into(), value.into());
        self
    }
}

/// Resolution state of a failed message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedMessageStatus {
    #[default]
    Unresolved,
    Resolved,
    Archived,
}

/// One attempt at processing a failed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingAttempt {
    pub attempted_at: DateTime<Utc>,
    /// Exception summary captured by the endpoint, if any
    #[serde(default)]
    pub failure: Option<String>,
}

impl ProcessingAttempt {
    pub fn at(attempted_at: DateTime<Utc>) -> Self {
        Self {
            attempted_at,
            failure: None,
        }
    }
}

/// A message that failed processing at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedMessage {
    pub id: String,
    /// Attempts in the order they happened
    #[serde(default)]
    pub processing_attempts: Vec<ProcessingAttempt>,
    #[serde(default)]
    pub status: FailedMessageStatus,
}

impl FailedMessage {
    pub fn new(id: impl Into<String>, status: FailedMessageStatus) -> Self {
        Self {
            id: id.into(),
            processing_attempts: Vec::new(),
            status,
        }
    }

    pub fn with_attempt(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.processing_attempts
            .push(ProcessingAttempt::at(attempted_at));
        self
    }

    pub fn last_attempt(&self) -> Option<&ProcessingAttempt> {
        self.processing_attempts.last()
    }

    /// Status this failure is indexed under.
    pub fn view_status(&self) -> MessageStatus {
        match self.status {
            FailedMessageStatus::Unresolved if self.processing_attempts.len() > 1 => {
                MessageStatus::RepeatedFailure
            }
            FailedMessageStatus::Unresolved => MessageStatus::Failed,
            FailedMessageStatus::Resolved => MessageStatus::ResolvedSuccessfully,
            FailedMessageStatus::Archived => MessageStatus::ArchivedFailure,
        }
    }
}
