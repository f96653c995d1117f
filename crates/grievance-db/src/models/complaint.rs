//! Complaint view used by the escalation engine.
//!
//! The complaints table belongs to the intake layer. The engine reads a
//! narrow projection of it and only ever writes the assignment and
//! escalation level columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Projection shared by the candidate scan and the row lock.
const CANDIDATE_COLUMNS: &str = r"
    c.id,
    c.status,
    c.priority,
    c.department_id,
    c.location_id,
    c.pincode,
    c.assigned_authority_id,
    c.escalation_level,
    c.last_status_change_at,
    (
        SELECT MAX(r.created_at) FROM escalation_records r
        WHERE r.complaint_id = c.id AND r.escalation_level = c.escalation_level
    ) AS level_entered_at
";

/// A complaint eligible for escalation evaluation.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ComplaintCandidate {
    /// Complaint identifier.
    pub id: Uuid,

    /// Current lifecycle status. Escalation never changes it.
    pub status: String,

    /// Complaint priority.
    pub priority: String,

    /// Currently assigned department.
    pub department_id: Uuid,

    /// Location used for authority lookup.
    pub location_id: Uuid,

    /// Postal code used as a secondary authority lookup key.
    pub pincode: Option<String>,

    /// Currently assigned authority, if any.
    pub assigned_authority_id: Option<Uuid>,

    /// Current escalation level (0 = first tier).
    pub escalation_level: i32,

    /// When the lifecycle status last changed.
    pub last_status_change_at: DateTime<Utc>,

    /// When the complaint was escalated into its current level, if it was.
    pub level_entered_at: Option<DateTime<Utc>>,
}

impl ComplaintCandidate {
    /// Start of the SLA clock for the current level.
    ///
    /// A status change or an escalation into the current level both restart it.
    #[must_use]
    pub fn sla_clock_start(&self) -> DateTime<Utc> {
        match self.level_entered_at {
            Some(entered) if entered > self.last_status_change_at => entered,
            _ => self.last_status_change_at,
        }
    }

    /// Find open complaints with a department and location, below `max_level`.
    ///
    /// Oldest SLA clocks come first so a bounded batch drains the most
    /// overdue complaints.
    pub async fn find_escalation_candidates<'e, E>(
        executor: E,
        open_statuses: &[String],
        max_level: i32,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r"
            SELECT {CANDIDATE_COLUMNS}
            FROM complaints c
            WHERE lower(c.status) = ANY($1)
              AND c.department_id IS NOT NULL
              AND c.location_id IS NOT NULL
              AND c.escalation_level < $2
            ORDER BY c.last_status_change_at ASC
            LIMIT $3
            "
        );

        sqlx::query_as::<_, Self>(&query)
            .bind(open_statuses)
            .bind(max_level)
            .bind(limit)
            .fetch_all(executor)
            .await
    }

    /// Lock a complaint row for the duration of the caller's transaction.
    ///
    /// Returns `None` when the complaint no longer qualifies (missing
    /// department or location).
    pub async fn lock_for_escalation<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r"
            SELECT {CANDIDATE_COLUMNS}
            FROM complaints c
            WHERE c.id = $1
              AND c.department_id IS NOT NULL
              AND c.location_id IS NOT NULL
            FOR UPDATE OF c
            "
        );

        sqlx::query_as::<_, Self>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Move a complaint to a new authority and level.
    ///
    /// The update only applies if the complaint is still at `expected_level`.
    /// Status and `last_status_change_at` are left untouched.
    /// Returns the number of rows changed (0 or 1).
    pub async fn apply_escalation<'e, E>(
        executor: E,
        id: Uuid,
        expected_level: i32,
        department_id: Uuid,
        authority_id: Uuid,
        new_level: i32,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE complaints
            SET department_id = $3,
                assigned_authority_id = $4,
                escalation_level = $5,
                updated_at = NOW()
            WHERE id = $1 AND escalation_level = $2
            ",
        )
        .bind(id)
        .bind(expected_level)
        .bind(department_id)
        .bind(authority_id)
        .bind(new_level)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candidate(entered: Option<DateTime<Utc>>) -> ComplaintCandidate {
        ComplaintCandidate {
            id: Uuid::new_v4(),
            status: "submitted".to_string(),
            priority: "high".to_string(),
            department_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            pincode: Some("560001".to_string()),
            assigned_authority_id: None,
            escalation_level: 0,
            last_status_change_at: Utc::now() - Duration::hours(10),
            level_entered_at: entered,
        }
    }

    #[test]
    fn test_sla_clock_uses_status_change_without_escalation() {
        let c = candidate(None);
        assert_eq!(c.sla_clock_start(), c.last_status_change_at);
    }

    #[test]
    fn test_sla_clock_restarts_on_escalation() {
        let entered = Utc::now() - Duration::hours(2);
        let c = candidate(Some(entered));
        assert_eq!(c.sla_clock_start(), entered);
    }

    #[test]
    fn test_sla_clock_prefers_later_status_change() {
        let entered = Utc::now() - Duration::hours(20);
        let c = candidate(Some(entered));
        assert_eq!(c.sla_clock_start(), c.last_status_change_at);
    }
}
