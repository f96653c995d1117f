//! Append-only audit log.
//!
//! Shared with other subsystems; the engine writes `action = "escalation"`
//! rows and never edits rows it did not create.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// An audit log row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub complaint_id: Option<Uuid>,
    pub action: String,
    pub actor: String,
    /// Before/after snapshot and decision details.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Request to append an audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub complaint_id: Option<Uuid>,
    pub action: String,
    pub actor: String,
    pub metadata: serde_json::Value,
}

impl AuditLogEntry {
    /// Append an audit row.
    pub async fn create<'e, E>(executor: E, input: CreateAuditLogEntry) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO audit_logs (complaint_id, action, actor, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(input.complaint_id)
        .bind(&input.action)
        .bind(&input.actor)
        .bind(&input.metadata)
        .fetch_one(executor)
        .await
    }

    /// Audit rows for a complaint and action, oldest first.
    pub async fn find_by_complaint<'e, E>(
        executor: E,
        complaint_id: Uuid,
        action: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM audit_logs
            WHERE complaint_id = $1 AND action = $2
            ORDER BY created_at ASC
            ",
        )
        .bind(complaint_id)
        .bind(action)
        .fetch_all(executor)
        .await
    }
}
