//! PostgreSQL-backed escalation store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grievance_db::models::{
    AuditLogEntry, Authority, AuthorityQuery, ComplaintCandidate, CreateAuditLogEntry,
    CreateEscalationRecord, CreateStatusHistoryEvent, EscalationRecord, EscalationRule,
    StatusHistoryEvent, ESCALATION_AUDIT_ACTION, SYSTEM_ACTOR,
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use super::{AppliedEscalation, CandidateFilter, EscalationHistory, EscalationPlan, EscalationStore};
use crate::error::{EscalationError, Result};

/// Escalation store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgEscalationStore {
    pool: PgPool,
}

impl PgEscalationStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Write the audit row under a savepoint so its failure leaves the
    /// rest of the transaction intact.
    async fn insert_audit_in_savepoint(
        tx: &mut Transaction<'_, Postgres>,
        plan: &EscalationPlan,
    ) -> Option<AuditLogEntry> {
        let mut savepoint = match sqlx::Connection::begin(&mut **tx).await {
            Ok(sp) => sp,
            Err(e) => {
                warn!(complaint_id = %plan.complaint_id, error = %e, "Failed to open audit savepoint");
                return None;
            }
        };

        let input = CreateAuditLogEntry {
            complaint_id: Some(plan.complaint_id),
            action: ESCALATION_AUDIT_ACTION.to_string(),
            actor: SYSTEM_ACTOR.to_string(),
            metadata: plan.audit_metadata.clone(),
        };

        match AuditLogEntry::create(&mut *savepoint, input).await {
            Ok(entry) => match savepoint.commit().await {
                Ok(()) => Some(entry),
                Err(e) => {
                    warn!(complaint_id = %plan.complaint_id, error = %e, "Failed to release audit savepoint");
                    None
                }
            },
            Err(e) => {
                warn!(
                    complaint_id = %plan.complaint_id,
                    error = %e,
                    "Audit insert failed, committing escalation without it"
                );
                if let Err(e) = savepoint.rollback().await {
                    warn!(complaint_id = %plan.complaint_id, error = %e, "Failed to roll back audit savepoint");
                }
                None
            }
        }
    }
}

fn conflict(plan: &EscalationPlan, message: impl Into<String>) -> EscalationError {
    EscalationError::Conflict {
        complaint_id: plan.complaint_id,
        message: message.into(),
    }
}

#[async_trait]
impl EscalationStore for PgEscalationStore {
    async fn active_rules(&self) -> Result<Vec<EscalationRule>> {
        Ok(EscalationRule::find_active(&self.pool).await?)
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<EscalationRule>> {
        Ok(EscalationRule::set_active(&self.pool, rule_id, is_active).await?)
    }

    async fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<ComplaintCandidate>> {
        Ok(ComplaintCandidate::find_escalation_candidates(
            &self.pool,
            &filter.open_statuses,
            filter.max_level,
            filter.limit,
        )
        .await?)
    }

    async fn escalated_since(
        &self,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(EscalationRecord::exists_since(&self.pool, complaint_id, level, since).await?)
    }

    async fn find_authority(&self, query: &AuthorityQuery) -> Result<Option<Authority>> {
        Ok(Authority::find_for_escalation(&self.pool, query).await?)
    }

    async fn apply_escalation(&self, plan: &EscalationPlan) -> Result<AppliedEscalation> {
        let mut tx = self.pool.begin().await?;

        // Returning early drops the transaction, which rolls it back.
        let locked = ComplaintCandidate::lock_for_escalation(&mut *tx, plan.complaint_id)
            .await?
            .ok_or_else(|| conflict(plan, "complaint no longer has a department and location"))?;

        if locked.escalation_level != plan.expected_level {
            return Err(conflict(
                plan,
                format!(
                    "level moved from {} to {} since scan",
                    plan.expected_level, locked.escalation_level
                ),
            ));
        }
        if !locked.status.eq_ignore_ascii_case(&plan.status) {
            return Err(conflict(
                plan,
                format!("status changed from '{}' to '{}' since scan", plan.status, locked.status),
            ));
        }

        let updated = ComplaintCandidate::apply_escalation(
            &mut *tx,
            plan.complaint_id,
            plan.expected_level,
            plan.to_department_id,
            plan.to_authority_id,
            plan.new_level,
        )
        .await?;
        if updated != 1 {
            return Err(conflict(plan, "complaint update matched no rows"));
        }

        let history_event = StatusHistoryEvent::create(
            &mut *tx,
            CreateStatusHistoryEvent {
                complaint_id: plan.complaint_id,
                old_status: Some(locked.status.clone()),
                new_status: locked.status.clone(),
                note: Some(plan.history_note.clone()),
                changed_by: SYSTEM_ACTOR.to_string(),
            },
        )
        .await?;

        let record = EscalationRecord::create(
            &mut *tx,
            CreateEscalationRecord {
                complaint_id: plan.complaint_id,
                rule_id: plan.rule_id,
                from_department_id: Some(plan.from_department_id),
                to_department_id: plan.to_department_id,
                from_authority_id: plan.from_authority_id,
                to_authority_id: plan.to_authority_id,
                escalation_level: plan.new_level,
                reason: plan.reason.clone(),
                actor: SYSTEM_ACTOR.to_string(),
                history_event_id: history_event.id,
                is_dry_run: plan.dry_run,
            },
        )
        .await?;

        let audit_entry = Self::insert_audit_in_savepoint(&mut tx, plan).await;

        tx.commit().await?;

        Ok(AppliedEscalation {
            history_event,
            record,
            audit_entry,
        })
    }

    async fn append_audit(&self, entry: CreateAuditLogEntry) -> Result<AuditLogEntry> {
        Ok(AuditLogEntry::create(&self.pool, entry).await?)
    }

    async fn escalation_history(&self, complaint_id: Uuid) -> Result<EscalationHistory> {
        let records = EscalationRecord::find_by_complaint(&self.pool, complaint_id).await?;
        let event_ids: Vec<Uuid> = records.iter().map(|r| r.history_event_id).collect();
        let events = if event_ids.is_empty() {
            Vec::new()
        } else {
            StatusHistoryEvent::find_by_ids(&self.pool, &event_ids).await?
        };

        Ok(EscalationHistory { records, events })
    }
}
