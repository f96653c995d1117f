//! Per-call time budget for any escalation store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grievance_db::models::{
    AuditLogEntry, Authority, AuthorityQuery, ComplaintCandidate, CreateAuditLogEntry,
    EscalationRule,
};
use uuid::Uuid;

use super::{AppliedEscalation, CandidateFilter, EscalationHistory, EscalationPlan, EscalationStore};
use crate::error::{EscalationError, Result};

/// Wraps a store so no call blocks longer than `limit`.
///
/// A timed-out escalation drops its transaction, which rolls it back.
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// Get the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| EscalationError::Timeout(self.limit))?
    }
}

#[async_trait]
impl<S: EscalationStore> EscalationStore for TimeoutStore<S> {
    async fn active_rules(&self) -> Result<Vec<EscalationRule>> {
        self.bounded(self.inner.active_rules()).await
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<EscalationRule>> {
        self.bounded(self.inner.set_rule_active(rule_id, is_active))
            .await
    }

    async fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<ComplaintCandidate>> {
        self.bounded(self.inner.candidates(filter)).await
    }

    async fn escalated_since(
        &self,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        self.bounded(self.inner.escalated_since(complaint_id, level, since))
            .await
    }

    async fn find_authority(&self, query: &AuthorityQuery) -> Result<Option<Authority>> {
        self.bounded(self.inner.find_authority(query)).await
    }

    async fn apply_escalation(&self, plan: &EscalationPlan) -> Result<AppliedEscalation> {
        self.bounded(self.inner.apply_escalation(plan)).await
    }

    async fn append_audit(&self, entry: CreateAuditLogEntry) -> Result<AuditLogEntry> {
        self.bounded(self.inner.append_audit(entry)).await
    }

    async fn escalation_history(&self, complaint_id: Uuid) -> Result<EscalationHistory> {
        self.bounded(self.inner.escalation_history(complaint_id))
            .await
    }
}
