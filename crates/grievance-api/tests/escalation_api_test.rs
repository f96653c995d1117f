//! Router-level tests for escalation endpoints.

use axum::http::StatusCode;
use grievance_api::{escalation_router, AdminAccess};
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{json_body, request, TestApp, ADMIN_TOKEN};

#[tokio::test]
async fn test_health_is_open() {
    let app = TestApp::new(AdminAccess::locked());
    let response = escalation_router(app.state.clone())
        .oneshot(request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["worker_running"], false);
    assert!(body["last_cycle"].is_null());
}

#[tokio::test]
async fn test_manual_run_returns_report() {
    let app = TestApp::new(AdminAccess::with_token(ADMIN_TOKEN));
    let (complaint_id, _) = app.seed_overdue_complaint();

    let response = escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["stats"]["escalated"], 1);
    assert_eq!(body["dry_run"], false);
    assert_eq!(body["outcomes"][0]["complaint_id"], complaint_id.to_string());
    assert_eq!(body["outcomes"][0]["outcome"], "escalated");
    assert_eq!(body["outcomes"][0]["to_level"], 1);

    assert_eq!(app.store.complaint(complaint_id).unwrap().escalation_level, 1);
    assert_eq!(app.state.worker_status.cycles_completed(), 1);
}

#[tokio::test]
async fn test_manual_run_requires_token() {
    let app = TestApp::new(AdminAccess::with_token(ADMIN_TOKEN));
    let (complaint_id, _) = app.seed_overdue_complaint();

    let missing = escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(missing).await["error"], "unauthorized");

    let wrong = escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", Some("guess")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(app.store.complaint(complaint_id).unwrap().escalation_level, 0);
}

#[tokio::test]
async fn test_admin_routes_closed_without_token_in_production() {
    let app = TestApp::new(AdminAccess::locked());
    let response = escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_open_without_token_in_pilot() {
    let app = TestApp::new(AdminAccess::open());
    let response = escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_complaint_history_after_escalation() {
    let app = TestApp::new(AdminAccess::open());
    let (complaint_id, rule) = app.seed_overdue_complaint();
    app.state.job.run_cycle().await.unwrap();

    let response = escalation_router(app.state.clone())
        .oneshot(request(
            "GET",
            &format!("/escalations/complaints/{complaint_id}"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["complaint_id"], complaint_id.to_string());
    assert_eq!(body["escalations"].as_array().unwrap().len(), 1);
    assert_eq!(body["escalations"][0]["escalation_level"], 1);
    assert_eq!(body["escalations"][0]["rule_id"], rule.id.to_string());
    assert_eq!(body["timeline"].as_array().unwrap().len(), 1);
    assert_eq!(body["timeline"][0]["old_status"], body["timeline"][0]["new_status"]);
}

#[tokio::test]
async fn test_history_for_unknown_complaint_is_empty() {
    let app = TestApp::new(AdminAccess::open());
    let response = escalation_router(app.state.clone())
        .oneshot(request(
            "GET",
            &format!("/escalations/complaints/{}", Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["escalations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rule_activation_toggle() {
    let app = TestApp::new(AdminAccess::with_token(ADMIN_TOKEN));
    let (complaint_id, rule) = app.seed_overdue_complaint();

    let response = escalation_router(app.state.clone())
        .oneshot(request(
            "POST",
            &format!("/escalations/rules/{}/deactivate", rule.id),
            Some(ADMIN_TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["is_active"], false);
    assert_eq!(body["conditions"]["sla_hours"], 72);

    let report = app.state.job.run_cycle().await.unwrap();
    assert_eq!(report.stats.processed, 0);
    assert_eq!(app.store.complaint(complaint_id).unwrap().escalation_level, 0);

    let response = escalation_router(app.state.clone())
        .oneshot(request(
            "POST",
            &format!("/escalations/rules/{}/activate", rule.id),
            Some(ADMIN_TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["is_active"], true);

    app.state.job.run_cycle().await.unwrap();
    assert_eq!(app.store.complaint(complaint_id).unwrap().escalation_level, 1);
}

#[tokio::test]
async fn test_activate_unknown_rule_is_not_found() {
    let app = TestApp::new(AdminAccess::open());
    let response = escalation_router(app.state.clone())
        .oneshot(request(
            "POST",
            &format!("/escalations/rules/{}/activate", Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_health_reports_last_cycle() {
    let app = TestApp::new(AdminAccess::open());
    app.seed_overdue_complaint();

    escalation_router(app.state.clone())
        .oneshot(request("POST", "/escalations/run", None))
        .await
        .unwrap();

    let response = escalation_router(app.state.clone())
        .oneshot(request("GET", "/health", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["cycles_completed"], 1);
    assert_eq!(body["last_cycle"]["stats"]["escalated"], 1);
}
