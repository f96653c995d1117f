//! Escalation executor.
//!
//! Turns a due rule and a resolved authority into an [`EscalationPlan`],
//! hands it to the store for atomic application and publishes a notice
//! once it has committed.

use std::sync::Arc;

use grievance_db::models::{Authority, ComplaintCandidate, ESCALATION_AUDIT_ACTION};
use tracing::warn;

use crate::audit::{AuditOutcome, EscalationAuditSnapshot};
use crate::condition::EscalationDecision;
use crate::config::DRY_RUN_MARKER;
use crate::error::Result;
use crate::notify::{EscalationNotice, EscalationPublisher};
use crate::rules::CompiledRule;
use crate::store::{AppliedEscalation, EscalationPlan, EscalationStore};

/// Applies escalations and records escalation attempts.
pub struct EscalationExecutor {
    store: Arc<dyn EscalationStore>,
    publisher: Option<EscalationPublisher>,
    dry_run: bool,
    sla_override: bool,
}

impl EscalationExecutor {
    pub fn new(store: Arc<dyn EscalationStore>, dry_run: bool, sla_override: bool) -> Self {
        Self {
            store,
            publisher: None,
            dry_run,
            sla_override,
        }
    }

    /// Publish notices for committed escalations.
    #[must_use]
    pub fn with_publisher(mut self, publisher: EscalationPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Prefix `text` with the dry-run marker when in dry-run mode.
    fn label(&self, text: &str) -> String {
        if self.dry_run {
            format!("{DRY_RUN_MARKER} {text}")
        } else {
            text.to_string()
        }
    }

    /// Audit snapshot for a decision on `candidate`.
    #[must_use]
    pub fn snapshot(
        &self,
        candidate: &ComplaintCandidate,
        rule: &CompiledRule,
        authority: Option<&Authority>,
        decision: &EscalationDecision,
        outcome: AuditOutcome,
    ) -> EscalationAuditSnapshot {
        EscalationAuditSnapshot {
            complaint_id: candidate.id,
            action: ESCALATION_AUDIT_ACTION.to_string(),
            outcome,
            level_from: candidate.escalation_level,
            level_to: candidate.escalation_level + 1,
            department_from: candidate.department_id,
            department_to: rule.to_department.resolve(candidate.department_id),
            authority_from: candidate.assigned_authority_id,
            authority_to: authority.map(|a| a.id),
            rule_id: Some(rule.id),
            reason: self.label(&decision.reason),
            dry_run: self.dry_run,
            sla_override: self.sla_override,
            error: None,
        }
    }

    /// Build the write plan for escalating `candidate` to `authority`.
    #[must_use]
    pub fn plan(
        &self,
        candidate: &ComplaintCandidate,
        rule: &CompiledRule,
        authority: &Authority,
        decision: &EscalationDecision,
    ) -> EscalationPlan {
        let from = candidate.escalation_level;
        let to = from + 1;
        let snapshot = self.snapshot(
            candidate,
            rule,
            Some(authority),
            decision,
            AuditOutcome::Escalated,
        );

        EscalationPlan {
            complaint_id: candidate.id,
            rule_id: Some(rule.id),
            expected_level: from,
            new_level: to,
            status: candidate.status.clone(),
            from_department_id: candidate.department_id,
            to_department_id: authority.department_id,
            from_authority_id: candidate.assigned_authority_id,
            to_authority_id: authority.id,
            reason: self.label(&decision.reason),
            history_note: self.label(&format!(
                "Escalated from level {from} to {to}: {}",
                decision.reason
            )),
            dry_run: self.dry_run,
            audit_metadata: snapshot.to_value(),
        }
    }

    /// Apply a plan, then publish a notice for it.
    pub async fn execute(&self, plan: &EscalationPlan) -> Result<AppliedEscalation> {
        let applied = self.store.apply_escalation(plan).await?;

        if let Some(publisher) = &self.publisher {
            publisher.publish(EscalationNotice::from_applied(&applied));
        }

        Ok(applied)
    }

    /// Append an audit row for an attempt that wrote nothing else.
    ///
    /// Best effort: a failure is logged and dropped.
    pub async fn record_attempt(&self, snapshot: &EscalationAuditSnapshot) {
        if let Err(e) = self.store.append_audit(snapshot.to_entry()).await {
            warn!(
                complaint_id = %snapshot.complaint_id,
                outcome = ?snapshot.outcome,
                error = %e,
                "Failed to record escalation attempt in audit log"
            );
        }
    }
}
