//! Background time-to-live expiration for a message-audit document store.
//!
//! An [`ExpirationScheduler`](expiration::ExpirationScheduler) periodically
//! deletes processed messages and resolved failures older than a retention
//! window through the store's messages view index. Unresolved failures are
//! never removed.

pub mod config;
pub mod expiration;
pub mod models;
pub mod observability;
pub mod store;
