use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{MessageStatus, MessagesViewEntry};

/// Index query selecting messages that are finished with and older than a
/// cutoff.
///
/// Matches `status ∈ {Successful, ResolvedSuccessfully} AND processed_at <= cutoff`.
/// Stores evaluate it through the `(status, processed_at)` index; results may
/// lag recent writes, which only delays those documents to a later cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryPredicate {
    cutoff: DateTime<Utc>,
}

impl ExpiryPredicate {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self { cutoff }
    }

    /// Statuses a document must have to match, in ascending code order.
    pub fn statuses(&self) -> &'static [MessageStatus] {
        &MessageStatus::EXPIRABLE
    }

    /// Status codes as stored in the index.
    pub fn status_codes(&self) -> Vec<i64> {
        self.statuses().iter().map(MessageStatus::code).collect()
    }

    /// Inclusive upper bound on `processed_at`.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn matches(&self, entry: &MessagesViewEntry) -> bool {
        entry.status.is_expirable() && entry.processed_at <= self.cutoff
    }

    /// Render as a Lucene query over the messages view index.
    ///
    /// Lucene range terms must be ISO-8601 with `:` and `-` escaped or the
    /// range silently matches nothing.
    pub fn to_lucene(&self) -> String {
        let statuses = self
            .statuses()
            .iter()
            .map(|status| format!("Status:{}", status.code()))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "(({statuses}) AND (ProcessedAt:[ * TO {} ]))",
            escape_lucene_term(&round_trip_timestamp(self.cutoff))
        )
    }
}

impl fmt::Display for ExpiryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lucene())
    }
}

/// ISO-8601 round-trip form with 100ns precision, e.g. `2026-10-19T12:00:00.0000000Z`.
fn round_trip_timestamp(instant: DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        instant.format("%Y-%m-%dT%H:%M:%S"),
        instant.timestamp_subsec_nanos() / 100
    )
}

fn escape_lucene_term(term: &str) -> String {
    term.replace(':', r"\:").replace('-', r"\-")
}
