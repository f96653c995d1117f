//! Error types for the escalation engine.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Escalation engine errors.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A storage call exceeded its time budget.
    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),

    /// The complaint changed between scan and escalation.
    #[error("Escalation conflict for complaint {complaint_id}: {message}")]
    Conflict { complaint_id: Uuid, message: String },

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other failure while processing a candidate.
    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for escalation operations.
pub type Result<T> = std::result::Result<T, EscalationError>;

impl EscalationError {
    /// Timeouts and connection-level failures that the next cycle may not hit.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Database(e) => grievance_db::error::is_transient(e),
            _ => false,
        }
    }

    /// Check if this error is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
