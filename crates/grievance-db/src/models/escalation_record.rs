//! Escalation ledger model.
//!
//! One row per successful escalation. Rows are never updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Immutable ledger row for a completed escalation.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// Unique identifier for the record.
    pub id: Uuid,

    /// The complaint that was escalated.
    pub complaint_id: Uuid,

    /// The rule that triggered the escalation.
    pub rule_id: Option<Uuid>,

    /// Department before escalation.
    pub from_department_id: Option<Uuid>,

    /// Department after escalation.
    pub to_department_id: Uuid,

    /// Authority before escalation.
    pub from_authority_id: Option<Uuid>,

    /// Authority after escalation.
    pub to_authority_id: Uuid,

    /// The level the complaint was escalated to.
    pub escalation_level: i32,

    /// Human-readable reason.
    pub reason: String,

    /// Always the system actor for engine-created rows.
    pub actor: String,

    /// The timeline event written alongside this record.
    pub history_event_id: Uuid,

    /// Whether the escalation ran in dry-run (labeling) mode.
    pub is_dry_run: bool,

    /// When the escalation occurred.
    pub created_at: DateTime<Utc>,
}

/// Request to insert a ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEscalationRecord {
    pub complaint_id: Uuid,
    pub rule_id: Option<Uuid>,
    pub from_department_id: Option<Uuid>,
    pub to_department_id: Uuid,
    pub from_authority_id: Option<Uuid>,
    pub to_authority_id: Uuid,
    pub escalation_level: i32,
    pub reason: String,
    pub actor: String,
    pub history_event_id: Uuid,
    pub is_dry_run: bool,
}

impl EscalationRecord {
    /// Check whether the complaint was escalated to `level` at or after `since`.
    pub async fn exists_since<'e, E>(
        executor: E,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM escalation_records
                WHERE complaint_id = $1
                  AND escalation_level = $2
                  AND created_at >= $3
            )
            ",
        )
        .bind(complaint_id)
        .bind(level)
        .bind(since)
        .fetch_one(executor)
        .await
    }

    /// Escalation history for a complaint, oldest first.
    pub async fn find_by_complaint<'e, E>(
        executor: E,
        complaint_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM escalation_records
            WHERE complaint_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(complaint_id)
        .fetch_all(executor)
        .await
    }

    /// Insert a ledger row.
    pub async fn create<'e, E>(
        executor: E,
        input: CreateEscalationRecord,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO escalation_records (
                complaint_id, rule_id, from_department_id, to_department_id,
                from_authority_id, to_authority_id, escalation_level, reason,
                actor, history_event_id, is_dry_run
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            ",
        )
        .bind(input.complaint_id)
        .bind(input.rule_id)
        .bind(input.from_department_id)
        .bind(input.to_department_id)
        .bind(input.from_authority_id)
        .bind(input.to_authority_id)
        .bind(input.escalation_level)
        .bind(&input.reason)
        .bind(&input.actor)
        .bind(input.history_event_id)
        .bind(input.is_dry_run)
        .fetch_one(executor)
        .await
    }
}
