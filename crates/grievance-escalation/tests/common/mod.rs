//! Shared fixtures for escalation engine integration tests.
//!
//! All tests run against the in-memory store and a fixed clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use grievance_db::models::{
    Authority, CreateEscalationRule, EscalationRecord, EscalationRule, EscalationTarget, Scope,
    SYSTEM_ACTOR,
};
use grievance_escalation::store::StoredComplaint;
use grievance_escalation::{
    EngineSettings, EscalationJob, FixedClock, InMemoryEscalationStore, RuleSlaThreshold,
    ThresholdResolver,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// In-memory store, clock and a default department/location.
pub struct TestContext {
    pub store: Arc<InMemoryEscalationStore>,
    pub clock: Arc<FixedClock>,
    pub now: DateTime<Utc>,
    pub department_id: Uuid,
    pub location_id: Uuid,
}

impl TestContext {
    pub fn new() -> Self {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now));
        Self {
            store: Arc::new(InMemoryEscalationStore::with_clock(clock.clone())),
            clock,
            now,
            department_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
        }
    }

    /// Job using rule-configured SLAs.
    pub fn job(&self, settings: EngineSettings) -> EscalationJob {
        self.job_with(settings, Arc::new(RuleSlaThreshold))
    }

    /// Job with a specific threshold strategy.
    pub fn job_with(
        &self,
        settings: EngineSettings,
        thresholds: Arc<dyn ThresholdResolver>,
    ) -> EscalationJob {
        EscalationJob::new(self.store.clone(), thresholds, settings).with_clock(self.clock.clone())
    }

    /// Rule for `level` with any scope and same-hierarchy target.
    pub fn add_rule(&self, level: i32, conditions: Value) -> EscalationRule {
        self.store.insert_rule(CreateEscalationRule {
            name: format!("level-{level} rule"),
            from_department: Scope::Any,
            from_location: Scope::Any,
            to_department: EscalationTarget::SameHierarchy,
            escalation_level: level,
            conditions,
        })
    }

    /// Standard 72-hour rule at level 0.
    pub fn add_standard_rule(&self) -> EscalationRule {
        self.add_rule(
            0,
            json!({
                "required_statuses": ["submitted", "assigned", "in_progress"],
                "sla_hours": 72
            }),
        )
    }

    /// Complaint in the default department and location, last changed `age` ago.
    pub fn add_complaint(&self, status: &str, age: Duration) -> Uuid {
        self.store.insert_complaint(StoredComplaint::new(
            self.department_id,
            self.location_id,
            status,
            self.now - age,
        ))
    }

    /// Authority at `level` for the default department and location.
    pub fn add_authority(&self, level: i32) -> Authority {
        self.store
            .add_authority(self.department_id, Some(self.location_id), level)
    }

    /// Ledger row for `complaint_id` at `level`, created `age` ago.
    pub fn add_prior_escalation(&self, complaint_id: Uuid, level: i32, age: Duration) {
        self.store.insert_record(EscalationRecord {
            id: Uuid::new_v4(),
            complaint_id,
            rule_id: None,
            from_department_id: Some(self.department_id),
            to_department_id: self.department_id,
            from_authority_id: None,
            to_authority_id: Uuid::new_v4(),
            escalation_level: level,
            reason: "earlier run".to_string(),
            actor: SYSTEM_ACTOR.to_string(),
            history_event_id: Uuid::new_v4(),
            is_dry_run: false,
            created_at: self.now - age,
        });
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
