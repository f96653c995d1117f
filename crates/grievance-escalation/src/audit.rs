//! Audit metadata for escalation decisions.

use grievance_db::models::{CreateAuditLogEntry, ESCALATION_AUDIT_ACTION, SYSTEM_ACTOR};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to an attempted escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Escalated,
    NoAuthority,
    /// The complaint changed between scan and commit.
    Conflict,
    Failed,
}

/// Before/after snapshot stored as audit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationAuditSnapshot {
    pub complaint_id: Uuid,
    pub action: String,
    pub outcome: AuditOutcome,
    pub level_from: i32,
    pub level_to: i32,
    pub department_from: Uuid,
    pub department_to: Uuid,
    pub authority_from: Option<Uuid>,
    pub authority_to: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub reason: String,
    pub dry_run: bool,
    pub sla_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EscalationAuditSnapshot {
    /// Metadata payload for the audit row.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Audit row for this snapshot.
    #[must_use]
    pub fn to_entry(&self) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            complaint_id: Some(self.complaint_id),
            action: ESCALATION_AUDIT_ACTION.to_string(),
            actor: SYSTEM_ACTOR.to_string(),
            metadata: self.to_value(),
        }
    }
}
