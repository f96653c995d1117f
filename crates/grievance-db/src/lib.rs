//! PostgreSQL persistence for the grievance escalation engine.
//!
//! This crate owns the row models the escalation engine reads and writes:
//!
//! - [`models::ComplaintCandidate`] - the engine's view of an open complaint
//! - [`models::Authority`] - department x location x level directory entries
//! - [`models::EscalationRule`] - persisted escalation rules
//! - [`models::EscalationRecord`] - immutable escalation ledger rows
//! - [`models::StatusHistoryEvent`] - citizen-facing timeline rows
//! - [`models::AuditLogEntry`] - append-only compliance log
//!
//! Query helpers are generic over [`sqlx::PgExecutor`] so they can run
//! against the pool or inside an open transaction.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbPool, PoolSettings};
