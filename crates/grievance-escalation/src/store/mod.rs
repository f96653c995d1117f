//! Storage seam for the escalation engine.
//!
//! [`EscalationStore`] covers every read and write a cycle performs. The
//! PostgreSQL implementation backs production; the in-memory one backs
//! tests and local runs. [`TimeoutStore`] bounds every call.

mod memory;
mod postgres;
mod timeout;

pub use memory::{FailurePoint, InMemoryEscalationStore, StoredComplaint};
pub use postgres::PgEscalationStore;
pub use timeout::TimeoutStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grievance_db::models::{
    AuditLogEntry, Authority, AuthorityQuery, ComplaintCandidate, CreateAuditLogEntry,
    EscalationRecord, EscalationRule, StatusHistoryEvent,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;

/// Which complaints a scan should return.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFilter {
    /// Open lifecycle statuses, lowercase.
    pub open_statuses: Vec<String>,
    /// Only complaints strictly below this level.
    pub max_level: i32,
    /// Maximum rows returned.
    pub limit: i64,
}

/// Everything needed to apply one escalation atomically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationPlan {
    pub complaint_id: Uuid,
    pub rule_id: Option<Uuid>,
    /// Level observed at scan time. The write is refused if it moved.
    pub expected_level: i32,
    pub new_level: i32,
    /// Status observed at scan time. Written as both old and new status.
    pub status: String,
    pub from_department_id: Uuid,
    pub to_department_id: Uuid,
    pub from_authority_id: Option<Uuid>,
    pub to_authority_id: Uuid,
    pub reason: String,
    pub history_note: String,
    pub dry_run: bool,
    pub audit_metadata: serde_json::Value,
}

/// Rows written by a committed escalation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEscalation {
    pub history_event: StatusHistoryEvent,
    pub record: EscalationRecord,
    /// `None` when the audit insert failed and was rolled back on its own.
    pub audit_entry: Option<AuditLogEntry>,
}

/// Escalation ledger and the timeline events it points to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EscalationHistory {
    pub records: Vec<EscalationRecord>,
    pub events: Vec<StatusHistoryEvent>,
}

/// Persistence operations used by the escalation cycle.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Rules with `is_active = true`, unparsed.
    async fn active_rules(&self) -> Result<Vec<EscalationRule>>;

    /// Toggle a rule's active flag. Returns `None` if the rule does not exist.
    async fn set_rule_active(&self, rule_id: Uuid, is_active: bool)
        -> Result<Option<EscalationRule>>;

    /// Open complaints with a department and location.
    async fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<ComplaintCandidate>>;

    /// Check the ledger for an escalation to `level` at or after `since`.
    async fn escalated_since(
        &self,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    /// Best authority for the query, if any.
    async fn find_authority(&self, query: &AuthorityQuery) -> Result<Option<Authority>>;

    /// Apply a plan in one unit of work.
    ///
    /// The complaint update, history event and ledger row commit together
    /// or not at all. The audit entry is written in the same unit but its
    /// failure does not undo the other three.
    async fn apply_escalation(&self, plan: &EscalationPlan) -> Result<AppliedEscalation>;

    /// Append an audit entry outside any escalation transaction.
    async fn append_audit(&self, entry: CreateAuditLogEntry) -> Result<AuditLogEntry>;

    /// Escalation ledger and linked timeline events for a complaint.
    async fn escalation_history(&self, complaint_id: Uuid) -> Result<EscalationHistory>;
}

#[async_trait]
impl<T: EscalationStore + ?Sized> EscalationStore for Arc<T> {
    async fn active_rules(&self) -> Result<Vec<EscalationRule>> {
        (**self).active_rules().await
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<EscalationRule>> {
        (**self).set_rule_active(rule_id, is_active).await
    }

    async fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<ComplaintCandidate>> {
        (**self).candidates(filter).await
    }

    async fn escalated_since(
        &self,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        (**self).escalated_since(complaint_id, level, since).await
    }

    async fn find_authority(&self, query: &AuthorityQuery) -> Result<Option<Authority>> {
        (**self).find_authority(query).await
    }

    async fn apply_escalation(&self, plan: &EscalationPlan) -> Result<AppliedEscalation> {
        (**self).apply_escalation(plan).await
    }

    async fn append_audit(&self, entry: CreateAuditLogEntry) -> Result<AuditLogEntry> {
        (**self).append_audit(entry).await
    }

    async fn escalation_history(&self, complaint_id: Uuid) -> Result<EscalationHistory> {
        (**self).escalation_history(complaint_id).await
    }
}
