//! Complaint status history (citizen timeline).
//!
//! Rows are append-only. Escalations write a row whose `old_status` equals
//! `new_status`; the level change is described in `note`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A timeline event.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEvent {
    pub id: Uuid,
    pub complaint_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub note: Option<String>,
    pub changed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Request to append a timeline event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStatusHistoryEvent {
    pub complaint_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub note: Option<String>,
    pub changed_by: String,
}

impl StatusHistoryEvent {
    /// Check whether this event left the lifecycle status unchanged.
    #[must_use]
    pub fn preserves_status(&self) -> bool {
        self.old_status.as_deref() == Some(self.new_status.as_str())
    }

    /// Append a timeline event.
    pub async fn create<'e, E>(
        executor: E,
        input: CreateStatusHistoryEvent,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO complaint_status_history (
                complaint_id, old_status, new_status, note, changed_by
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(input.complaint_id)
        .bind(&input.old_status)
        .bind(&input.new_status)
        .bind(&input.note)
        .bind(&input.changed_by)
        .fetch_one(executor)
        .await
    }

    /// Find events by id.
    pub async fn find_by_ids<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM complaint_status_history
            WHERE id = ANY($1)
            ORDER BY created_at ASC
            ",
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    /// Full timeline for a complaint, oldest first.
    pub async fn find_by_complaint<'e, E>(
        executor: E,
        complaint_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM complaint_status_history
            WHERE complaint_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(complaint_id)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_status() {
        let mut event = StatusHistoryEvent {
            id: Uuid::new_v4(),
            complaint_id: Uuid::new_v4(),
            old_status: Some("in_progress".to_string()),
            new_status: "in_progress".to_string(),
            note: Some("Escalated from level 0 to level 1".to_string()),
            changed_by: "system".to_string(),
            created_at: Utc::now(),
        };
        assert!(event.preserves_status());

        event.new_status = "resolved".to_string();
        assert!(!event.preserves_status());

        event.old_status = None;
        assert!(!event.preserves_status());
    }
}
