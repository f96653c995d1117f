//! Shared helpers for API tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
};
use chrono::Duration;
use grievance_api::{AdminAccess, EscalationApiState};
use grievance_db::models::{CreateEscalationRule, EscalationRule, EscalationTarget, Scope};
use grievance_escalation::store::StoredComplaint;
use grievance_escalation::{
    EngineSettings, EscalationJob, FixedClock, InMemoryEscalationStore, RuleSlaThreshold,
    WorkerStatus,
};
use serde_json::json;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub state: EscalationApiState,
    pub store: Arc<InMemoryEscalationStore>,
    pub department_id: Uuid,
    pub location_id: Uuid,
}

impl TestApp {
    pub fn new(admin: AdminAccess) -> Self {
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
        let store = Arc::new(InMemoryEscalationStore::with_clock(clock.clone()));
        let job = EscalationJob::new(
            store.clone(),
            Arc::new(RuleSlaThreshold),
            EngineSettings::default(),
        )
        .with_clock(clock);

        Self {
            state: EscalationApiState::new(
                Arc::new(job),
                store.clone(),
                Arc::new(WorkerStatus::default()),
                admin,
            ),
            store,
            department_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
        }
    }

    /// One overdue complaint with a rule and authority to escalate it.
    pub fn seed_overdue_complaint(&self) -> (Uuid, EscalationRule) {
        let rule = self.store.insert_rule(CreateEscalationRule {
            name: "72h first tier".to_string(),
            from_department: Scope::Any,
            from_location: Scope::Any,
            to_department: EscalationTarget::SameHierarchy,
            escalation_level: 0,
            conditions: json!({"sla_hours": 72}),
        });
        self.store
            .add_authority(self.department_id, Some(self.location_id), 1);
        let complaint_id = self.store.insert_complaint(StoredComplaint::new(
            self.department_id,
            self.location_id,
            "assigned",
            chrono::Utc::now() - Duration::hours(80),
        ));
        (complaint_id, rule)
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
