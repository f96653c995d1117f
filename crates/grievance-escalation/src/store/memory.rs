//! In-memory escalation store.
//!
//! Backs unit and integration tests and local runs without a database.
//! Escalations are staged under a single lock and applied together, which
//! gives the same all-or-nothing behavior as the PostgreSQL transaction.
//! Failures can be injected at each write step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grievance_db::models::{
    AuditLogEntry, Authority, AuthorityQuery, ComplaintCandidate, CreateAuditLogEntry,
    CreateEscalationRule, EscalationRecord, EscalationRule, EscalationTarget, StatusHistoryEvent,
    ESCALATION_AUDIT_ACTION, SYSTEM_ACTOR,
};
use tracing::warn;
use uuid::Uuid;

use super::{AppliedEscalation, CandidateFilter, EscalationHistory, EscalationPlan, EscalationStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{EscalationError, Result};

/// Complaint row as held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredComplaint {
    pub id: Uuid,
    pub status: String,
    pub priority: String,
    pub department_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub pincode: Option<String>,
    pub assigned_authority_id: Option<Uuid>,
    pub escalation_level: i32,
    pub last_status_change_at: DateTime<Utc>,
}

impl StoredComplaint {
    /// A level-0 complaint with medium priority.
    pub fn new(
        department_id: Uuid,
        location_id: Uuid,
        status: &str,
        last_status_change_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: status.to_string(),
            priority: "medium".to_string(),
            department_id: Some(department_id),
            location_id: Some(location_id),
            pincode: None,
            assigned_authority_id: None,
            escalation_level: 0,
            last_status_change_at,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: &str) -> Self {
        self.priority = priority.to_string();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: i32) -> Self {
        self.escalation_level = level;
        self
    }

    #[must_use]
    pub fn with_pincode(mut self, pincode: &str) -> Self {
        self.pincode = Some(pincode.to_string());
        self
    }

    #[must_use]
    pub fn with_authority(mut self, authority_id: Uuid) -> Self {
        self.assigned_authority_id = Some(authority_id);
        self
    }

    #[must_use]
    pub fn without_location(mut self) -> Self {
        self.location_id = None;
        self
    }
}

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Rules,
    Candidates,
    EscalationLookup,
    AuthorityLookup,
    /// Another writer bumps the complaint's level just before the update.
    ConcurrentEscalation,
    ComplaintUpdate,
    HistoryInsert,
    RecordInsert,
    /// Audit insert inside an escalation.
    AuditInsert,
    /// Standalone audit append.
    AuditAppend,
}

#[derive(Debug, Default)]
struct MemoryState {
    rules: Vec<EscalationRule>,
    complaints: HashMap<Uuid, StoredComplaint>,
    authorities: Vec<Authority>,
    records: Vec<EscalationRecord>,
    history: Vec<StatusHistoryEvent>,
    audit: Vec<AuditLogEntry>,
    failures: Vec<(FailurePoint, Option<Uuid>)>,
}

impl MemoryState {
    /// Consume a matching one-shot failure, if armed.
    fn take_failure(&mut self, point: FailurePoint, complaint_id: Option<Uuid>) -> bool {
        let pos = self.failures.iter().position(|(p, target)| {
            *p == point && (target.is_none() || *target == complaint_id)
        });
        match pos {
            Some(i) => {
                self.failures.remove(i);
                true
            }
            None => false,
        }
    }

    fn fail_if_armed(&mut self, point: FailurePoint, complaint_id: Option<Uuid>) -> Result<()> {
        if self.take_failure(point, complaint_id) {
            return Err(EscalationError::Processing(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }

    fn level_entered_at(&self, complaint_id: Uuid, level: i32) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter(|r| r.complaint_id == complaint_id && r.escalation_level == level)
            .map(|r| r.created_at)
            .max()
    }

    fn candidate_view(&self, complaint: &StoredComplaint) -> Option<ComplaintCandidate> {
        Some(ComplaintCandidate {
            id: complaint.id,
            status: complaint.status.clone(),
            priority: complaint.priority.clone(),
            department_id: complaint.department_id?,
            location_id: complaint.location_id?,
            pincode: complaint.pincode.clone(),
            assigned_authority_id: complaint.assigned_authority_id,
            escalation_level: complaint.escalation_level,
            last_status_change_at: complaint.last_status_change_at,
            level_entered_at: self.level_entered_at(complaint.id, complaint.escalation_level),
        })
    }
}

/// In-memory implementation of [`EscalationStore`] for testing.
#[derive(Debug)]
pub struct InMemoryEscalationStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
    authority_delay: Mutex<Option<Duration>>,
}

impl Default for InMemoryEscalationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEscalationStore {
    /// Create an empty store stamping rows with wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping rows from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
            authority_delay: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a rule, active by default.
    pub fn insert_rule(&self, input: CreateEscalationRule) -> EscalationRule {
        let now = self.clock.now();
        let rule = EscalationRule {
            id: Uuid::new_v4(),
            name: input.name,
            from_department_id: input.from_department.to_nullable(),
            from_location_id: input.from_location.to_nullable(),
            to_department_id: match input.to_department {
                EscalationTarget::SameHierarchy => None,
                EscalationTarget::Department(id) => Some(id),
            },
            escalation_level: input.escalation_level,
            conditions: input.conditions,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state().rules.push(rule.clone());
        rule
    }

    /// Insert a complaint and return its id.
    pub fn insert_complaint(&self, complaint: StoredComplaint) -> Uuid {
        let id = complaint.id;
        self.state().complaints.insert(id, complaint);
        id
    }

    /// Insert an authority row as-is.
    pub fn insert_authority(&self, authority: Authority) -> Authority {
        self.state().authorities.push(authority.clone());
        authority
    }

    /// Insert an active authority for a department and level.
    ///
    /// `location_id = None` makes it department-wide.
    pub fn add_authority(
        &self,
        department_id: Uuid,
        location_id: Option<Uuid>,
        level: i32,
    ) -> Authority {
        self.insert_authority(Authority {
            id: Uuid::new_v4(),
            department_id,
            location_id,
            pincode: None,
            level,
            name: format!("Level {level} authority"),
            is_active: true,
            created_at: self.clock.now(),
        })
    }

    /// Insert a ledger row as-is, as an earlier run would have left it.
    pub fn insert_record(&self, record: EscalationRecord) -> EscalationRecord {
        self.state().records.push(record.clone());
        record
    }

    /// Current state of a complaint.
    pub fn complaint(&self, id: Uuid) -> Option<StoredComplaint> {
        self.state().complaints.get(&id).cloned()
    }

    /// Replace a complaint's status, as the intake layer would.
    pub fn set_status(&self, id: Uuid, status: &str) {
        let now = self.clock.now();
        if let Some(c) = self.state().complaints.get_mut(&id) {
            c.status = status.to_string();
            c.last_status_change_at = now;
        }
    }

    /// All ledger rows (for testing).
    pub fn records(&self) -> Vec<EscalationRecord> {
        self.state().records.clone()
    }

    /// All timeline events (for testing).
    pub fn history(&self) -> Vec<StatusHistoryEvent> {
        self.state().history.clone()
    }

    /// All audit rows (for testing).
    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state().audit.clone()
    }

    /// Arm a one-shot failure, optionally limited to one complaint.
    pub fn fail_next(&self, point: FailurePoint, complaint_id: Option<Uuid>) {
        self.state().failures.push((point, complaint_id));
    }

    /// Delay every authority lookup, to exercise timeouts.
    pub fn set_authority_delay(&self, delay: Option<Duration>) {
        *self
            .authority_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = delay;
    }
}

fn conflict(plan: &EscalationPlan, message: impl Into<String>) -> EscalationError {
    EscalationError::Conflict {
        complaint_id: plan.complaint_id,
        message: message.into(),
    }
}

#[async_trait]
impl EscalationStore for InMemoryEscalationStore {
    async fn active_rules(&self) -> Result<Vec<EscalationRule>> {
        let mut state = self.state();
        state.fail_if_armed(FailurePoint::Rules, None)?;
        let mut rules: Vec<EscalationRule> =
            state.rules.iter().filter(|r| r.is_active).cloned().collect();
        rules.sort_by_key(|r| r.created_at);
        Ok(rules)
    }

    async fn set_rule_active(
        &self,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<EscalationRule>> {
        let now = self.clock.now();
        let mut state = self.state();
        Ok(state.rules.iter_mut().find(|r| r.id == rule_id).map(|rule| {
            rule.is_active = is_active;
            rule.updated_at = now;
            rule.clone()
        }))
    }

    async fn candidates(&self, filter: &CandidateFilter) -> Result<Vec<ComplaintCandidate>> {
        let mut state = self.state();
        state.fail_if_armed(FailurePoint::Candidates, None)?;

        let mut candidates: Vec<ComplaintCandidate> = state
            .complaints
            .values()
            .filter(|c| {
                c.escalation_level < filter.max_level
                    && filter.open_statuses.contains(&c.status.to_lowercase())
            })
            .filter_map(|c| state.candidate_view(c))
            .collect();

        candidates.sort_by(|a, b| {
            a.last_status_change_at
                .cmp(&b.last_status_change_at)
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(usize::try_from(filter.limit.max(0)).unwrap_or(usize::MAX));
        Ok(candidates)
    }

    async fn escalated_since(
        &self,
        complaint_id: Uuid,
        level: i32,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state();
        state.fail_if_armed(FailurePoint::EscalationLookup, Some(complaint_id))?;
        Ok(state.records.iter().any(|r| {
            r.complaint_id == complaint_id && r.escalation_level == level && r.created_at >= since
        }))
    }

    async fn find_authority(&self, query: &AuthorityQuery) -> Result<Option<Authority>> {
        let delay = *self
            .authority_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.fail_if_armed(FailurePoint::AuthorityLookup, None)?;
        Ok(state
            .authorities
            .iter()
            .filter_map(|a| a.match_rank(query).map(|rank| (rank, a)))
            .min_by(|(ra, a), (rb, b)| ra.cmp(rb).then(a.created_at.cmp(&b.created_at)))
            .map(|(_, a)| a.clone()))
    }

    async fn apply_escalation(&self, plan: &EscalationPlan) -> Result<AppliedEscalation> {
        let now = self.clock.now();
        let id = Some(plan.complaint_id);
        let mut state = self.state();

        if state.take_failure(FailurePoint::ConcurrentEscalation, id) {
            if let Some(complaint) = state.complaints.get_mut(&plan.complaint_id) {
                complaint.escalation_level += 1;
            }
        }

        let current = state
            .complaints
            .get(&plan.complaint_id)
            .filter(|c| c.department_id.is_some() && c.location_id.is_some())
            .cloned()
            .ok_or_else(|| conflict(plan, "complaint no longer has a department and location"))?;

        if current.escalation_level != plan.expected_level {
            return Err(conflict(
                plan,
                format!(
                    "level moved from {} to {} since scan",
                    plan.expected_level, current.escalation_level
                ),
            ));
        }
        if !current.status.eq_ignore_ascii_case(&plan.status) {
            return Err(conflict(
                plan,
                format!("status changed from '{}' to '{}' since scan", plan.status, current.status),
            ));
        }

        // Stage every row before touching state.
        state.fail_if_armed(FailurePoint::ComplaintUpdate, id)?;

        state.fail_if_armed(FailurePoint::HistoryInsert, id)?;
        let history_event = StatusHistoryEvent {
            id: Uuid::new_v4(),
            complaint_id: plan.complaint_id,
            old_status: Some(current.status.clone()),
            new_status: current.status.clone(),
            note: Some(plan.history_note.clone()),
            changed_by: SYSTEM_ACTOR.to_string(),
            created_at: now,
        };

        state.fail_if_armed(FailurePoint::RecordInsert, id)?;
        let record = EscalationRecord {
            id: Uuid::new_v4(),
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
            created_at: now,
        };

        let audit_entry = if state.take_failure(FailurePoint::AuditInsert, id) {
            warn!(
                complaint_id = %plan.complaint_id,
                "Audit insert failed, committing escalation without it"
            );
            None
        } else {
            Some(AuditLogEntry {
                id: Uuid::new_v4(),
                complaint_id: Some(plan.complaint_id),
                action: ESCALATION_AUDIT_ACTION.to_string(),
                actor: SYSTEM_ACTOR.to_string(),
                metadata: plan.audit_metadata.clone(),
                created_at: now,
            })
        };

        if let Some(complaint) = state.complaints.get_mut(&plan.complaint_id) {
            complaint.department_id = Some(plan.to_department_id);
            complaint.assigned_authority_id = Some(plan.to_authority_id);
            complaint.escalation_level = plan.new_level;
        }
        state.history.push(history_event.clone());
        state.records.push(record.clone());
        if let Some(entry) = &audit_entry {
            state.audit.push(entry.clone());
        }

        Ok(AppliedEscalation {
            history_event,
            record,
            audit_entry,
        })
    }

    async fn append_audit(&self, entry: CreateAuditLogEntry) -> Result<AuditLogEntry> {
        let now = self.clock.now();
        let mut state = self.state();
        state.fail_if_armed(FailurePoint::AuditAppend, entry.complaint_id)?;
        let row = AuditLogEntry {
            id: Uuid::new_v4(),
            complaint_id: entry.complaint_id,
            action: entry.action,
            actor: entry.actor,
            metadata: entry.metadata,
            created_at: now,
        };
        state.audit.push(row.clone());
        Ok(row)
    }

    async fn escalation_history(&self, complaint_id: Uuid) -> Result<EscalationHistory> {
        let state = self.state();
        let records: Vec<EscalationRecord> = state
            .records
            .iter()
            .filter(|r| r.complaint_id == complaint_id)
            .cloned()
            .collect();
        let events = state
            .history
            .iter()
            .filter(|e| records.iter().any(|r| r.history_event_id == e.id))
            .cloned()
            .collect();
        Ok(EscalationHistory { records, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn plan(complaint: &StoredComplaint, to_authority: Uuid) -> EscalationPlan {
        EscalationPlan {
            complaint_id: complaint.id,
            rule_id: None,
            expected_level: complaint.escalation_level,
            new_level: complaint.escalation_level + 1,
            status: complaint.status.clone(),
            from_department_id: complaint.department_id.unwrap_or_default(),
            to_department_id: complaint.department_id.unwrap_or_default(),
            from_authority_id: None,
            to_authority_id: to_authority,
            reason: "test".to_string(),
            history_note: "Escalated from level 0 to 1: test".to_string(),
            dry_run: false,
            audit_metadata: json!({"outcome": "escalated"}),
        }
    }

    #[tokio::test]
    async fn test_candidates_filter_and_order() {
        let now = Utc::now();
        let store = InMemoryEscalationStore::with_clock(Arc::new(FixedClock::new(now)));
        let dept = Uuid::new_v4();
        let loc = Uuid::new_v4();

        let old = store.insert_complaint(StoredComplaint::new(dept, loc, "Submitted", now - ChronoDuration::hours(5)));
        let newer = store.insert_complaint(StoredComplaint::new(dept, loc, "assigned", now - ChronoDuration::hours(1)));
        store.insert_complaint(StoredComplaint::new(dept, loc, "resolved", now - ChronoDuration::hours(9)));
        store.insert_complaint(StoredComplaint::new(dept, loc, "assigned", now).without_location());
        store.insert_complaint(StoredComplaint::new(dept, loc, "assigned", now).with_level(3));

        let filter = CandidateFilter {
            open_statuses: vec!["submitted".to_string(), "assigned".to_string()],
            max_level: 3,
            limit: 10,
        };
        let ids: Vec<Uuid> = store
            .candidates(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![old, newer]);
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let store = InMemoryEscalationStore::new();
        let complaint = StoredComplaint::new(Uuid::new_v4(), Uuid::new_v4(), "assigned", Utc::now());
        store.insert_complaint(complaint.clone());

        store.fail_next(FailurePoint::RecordInsert, Some(complaint.id));
        let err = store
            .apply_escalation(&plan(&complaint, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Processing(_)));
        assert_eq!(store.complaint(complaint.id).unwrap().escalation_level, 0);
        assert!(store.history().is_empty());
        assert!(store.records().is_empty());
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_undo_escalation() {
        let store = InMemoryEscalationStore::new();
        let complaint = StoredComplaint::new(Uuid::new_v4(), Uuid::new_v4(), "assigned", Utc::now());
        store.insert_complaint(complaint.clone());

        store.fail_next(FailurePoint::AuditInsert, None);
        let applied = store
            .apply_escalation(&plan(&complaint, Uuid::new_v4()))
            .await
            .unwrap();
        assert!(applied.audit_entry.is_none());
        assert_eq!(store.complaint(complaint.id).unwrap().escalation_level, 1);
        assert_eq!(store.records().len(), 1);
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_apply_rejects_stale_level() {
        let store = InMemoryEscalationStore::new();
        let complaint = StoredComplaint::new(Uuid::new_v4(), Uuid::new_v4(), "assigned", Utc::now());
        store.insert_complaint(complaint.clone().with_level(1));

        let err = store
            .apply_escalation(&plan(&complaint, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_find_authority_prefers_exact_location() {
        let store = InMemoryEscalationStore::new();
        let dept = Uuid::new_v4();
        let loc = Uuid::new_v4();
        let wide = store.add_authority(dept, None, 1);
        let exact = store.add_authority(dept, Some(loc), 1);
        store.add_authority(dept, Some(loc), 2);

        let query = AuthorityQuery {
            department_id: dept,
            location_id: loc,
            pincode: None,
            level: 1,
        };
        assert_eq!(store.find_authority(&query).await.unwrap().unwrap().id, exact.id);

        let elsewhere = AuthorityQuery {
            location_id: Uuid::new_v4(),
            ..query
        };
        assert_eq!(store.find_authority(&elsewhere).await.unwrap().unwrap().id, wide.id);
    }
}
