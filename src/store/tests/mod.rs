//! Shared store test infrastructure
//!
//! The same expiry tests run against every [`AuditStore`](super::AuditStore)
//! adapter:
//!
//! - **Memory**: always compiled
//! - **SQLite**: in-memory databases with the real migrations, behind
//!   `database-sqlite`

mod expiry;
