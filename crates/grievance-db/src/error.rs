//! Error types for the grievance-db crate.
//!
//! Setup errors plus transient-error classification for `SQLx` failures.

use thiserror::Error;

/// Database setup errors.
///
/// Query helpers return `sqlx::Error` directly; this type covers pool
/// creation and migrations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Returns true when a `SQLx` error is worth retrying on the next cycle
/// (pool exhaustion, dropped connections, I/O failures).
#[must_use]
pub fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed
    )
}
