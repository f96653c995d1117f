//! PostgreSQL-backed escalation tests.
//!
//! Run with `--features integration` and `DATABASE_URL` pointing at a
//! disposable database.

#![cfg(feature = "integration")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use grievance_db::models::{AuditLogEntry, CreateEscalationRule, EscalationRule, EscalationTarget, Scope};
use grievance_db::{run_migrations, DbPool};
use grievance_escalation::store::EscalationStore;
use grievance_escalation::{EngineSettings, EscalationJob, PgEscalationStore, RuleSlaThreshold};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = DbPool::connect(&url).await.expect("Failed to connect");
    run_migrations(&pool).await.expect("Failed to migrate");
    pool.inner().clone()
}

async fn seed_complaint(pool: &PgPool, department: Uuid, location: Uuid, age: Duration) -> Uuid {
    sqlx::query_scalar(
        r"
        INSERT INTO complaints (status, priority, department_id, location_id, last_status_change_at)
        VALUES ('assigned', 'high', $1, $2, $3)
        RETURNING id
        ",
    )
    .bind(department)
    .bind(location)
    .bind(Utc::now() - age)
    .fetch_one(pool)
    .await
    .expect("Failed to seed complaint")
}

async fn seed_authority(pool: &PgPool, department: Uuid, level: i32) -> Uuid {
    sqlx::query_scalar(
        r"
        INSERT INTO authorities (department_id, level, name)
        VALUES ($1, $2, 'District grievance officer')
        RETURNING id
        ",
    )
    .bind(department)
    .bind(level)
    .fetch_one(pool)
    .await
    .expect("Failed to seed authority")
}

async fn seed_rule(pool: &PgPool, department: Uuid) -> EscalationRule {
    EscalationRule::create(
        pool,
        CreateEscalationRule {
            name: format!("pg test {department}"),
            from_department: Scope::Specific(department),
            from_location: Scope::Any,
            to_department: EscalationTarget::SameHierarchy,
            escalation_level: 0,
            conditions: json!({"required_statuses": ["assigned"], "sla_hours": 72}),
        },
    )
    .await
    .expect("Failed to seed rule")
}

async fn level_of(pool: &PgPool, complaint_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT escalation_level FROM complaints WHERE id = $1")
        .bind(complaint_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read complaint")
}

#[tokio::test]
async fn test_pg_cycle_escalates_atomically_and_once() {
    let pool = pool().await;
    let department = Uuid::new_v4();
    let location = Uuid::new_v4();
    let rule = seed_rule(&pool, department).await;
    let authority = seed_authority(&pool, department, 1).await;
    let complaint_id = seed_complaint(&pool, department, location, Duration::hours(73)).await;

    let store = Arc::new(PgEscalationStore::new(pool.clone()));
    let job = EscalationJob::new(store.clone(), Arc::new(RuleSlaThreshold), EngineSettings::default());

    job.run_cycle().await.expect("cycle failed");
    job.run_cycle().await.expect("second cycle failed");

    assert_eq!(level_of(&pool, complaint_id).await, 1);

    let history = store.escalation_history(complaint_id).await.unwrap();
    assert_eq!(history.records.len(), 1);
    assert_eq!(history.records[0].to_authority_id, authority);
    assert_eq!(history.records[0].rule_id, Some(rule.id));
    assert_eq!(history.events.len(), 1);
    assert!(history.events[0].preserves_status());

    let audit = AuditLogEntry::find_by_complaint(&pool, complaint_id, "escalation")
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);

    EscalationRule::set_active(&pool, rule.id, false).await.unwrap();
}

#[tokio::test]
async fn test_pg_missing_authority_writes_nothing() {
    let pool = pool().await;
    let department = Uuid::new_v4();
    let rule = seed_rule(&pool, department).await;
    let complaint_id = seed_complaint(&pool, department, Uuid::new_v4(), Duration::hours(100)).await;

    let store = Arc::new(PgEscalationStore::new(pool.clone()));
    let job = EscalationJob::new(store.clone(), Arc::new(RuleSlaThreshold), EngineSettings::default());
    job.run_cycle().await.expect("cycle failed");

    assert_eq!(level_of(&pool, complaint_id).await, 0);
    assert!(store
        .escalation_history(complaint_id)
        .await
        .unwrap()
        .records
        .is_empty());

    EscalationRule::set_active(&pool, rule.id, false).await.unwrap();
}
