//! Escalation rule model.
//!
//! Rules are immutable once created; administration only flips `is_active`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use super::{EscalationTarget, Scope};

/// A persisted escalation rule.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Unique identifier for the rule.
    pub id: Uuid,

    /// Human-readable rule name.
    pub name: String,

    /// Department scope (NULL = any).
    pub from_department_id: Option<Uuid>,

    /// Location scope (NULL = any).
    pub from_location_id: Option<Uuid>,

    /// Target department (NULL = same hierarchy).
    pub to_department_id: Option<Uuid>,

    /// The level a complaint must currently be at for this rule to apply.
    pub escalation_level: i32,

    /// Condition payload (statuses, priorities, SLA).
    pub conditions: serde_json::Value,

    /// Whether the rule participates in scans.
    pub is_active: bool,

    /// When the rule was created.
    pub created_at: DateTime<Utc>,

    /// When the rule was last activated or deactivated.
    pub updated_at: DateTime<Utc>,
}

/// Request to create an escalation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEscalationRule {
    pub name: String,
    pub from_department: Scope,
    pub from_location: Scope,
    pub to_department: EscalationTarget,
    pub escalation_level: i32,
    pub conditions: serde_json::Value,
}

impl EscalationRule {
    /// Department scope as a typed value.
    #[must_use]
    pub fn from_department(&self) -> Scope {
        Scope::from_nullable(self.from_department_id)
    }

    /// Location scope as a typed value.
    #[must_use]
    pub fn from_location(&self) -> Scope {
        Scope::from_nullable(self.from_location_id)
    }

    /// Target department as a typed value.
    #[must_use]
    pub fn to_department(&self) -> EscalationTarget {
        EscalationTarget::from_nullable(self.to_department_id)
    }

    /// List all active rules, oldest first.
    pub async fn find_active<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM escalation_rules
            WHERE is_active = true
            ORDER BY escalation_level, created_at
            ",
        )
        .fetch_all(executor)
        .await
    }

    /// Find a rule by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM escalation_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Create a rule.
    pub async fn create<'e, E>(executor: E, input: CreateEscalationRule) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO escalation_rules (
                name, from_department_id, from_location_id, to_department_id,
                escalation_level, conditions
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(&input.name)
        .bind(input.from_department.to_nullable())
        .bind(input.from_location.to_nullable())
        .bind(match input.to_department {
            EscalationTarget::SameHierarchy => None,
            EscalationTarget::Department(id) => Some(id),
        })
        .bind(input.escalation_level)
        .bind(&input.conditions)
        .fetch_one(executor)
        .await
    }

    /// Activate or deactivate a rule. Only `is_active` and `updated_at` change.
    pub async fn set_active<'e, E>(
        executor: E,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            UPDATE escalation_rules
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(executor)
        .await
    }
}
