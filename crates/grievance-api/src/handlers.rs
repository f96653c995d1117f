//! Escalation endpoint handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use grievance_db::models::EscalationRule;
use grievance_escalation::{CycleReport, CycleSummary, EscalationStore};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiEscalationError, ApiResult};
use crate::models::{ComplaintEscalationHistory, HealthResponse};
use crate::state::EscalationApiState;

/// Liveness and last-cycle summary.
pub async fn health_handler(State(state): State<EscalationApiState>) -> Json<HealthResponse> {
    let last_cycle = state.worker_status.last_cycle();
    let degraded = last_cycle.as_ref().is_some_and(|c| c.error.is_some());

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        worker_running: state.worker_status.is_running(),
        cycles_completed: state.worker_status.cycles_completed(),
        last_cycle,
    })
}

/// Run one escalation cycle synchronously.
///
/// Waits for a scheduled cycle in progress to finish first.
pub async fn run_cycle_handler(
    State(state): State<EscalationApiState>,
) -> ApiResult<Json<CycleReport>> {
    info!("Manual escalation cycle requested");
    let report = state.job.run_cycle().await?;
    state
        .worker_status
        .record(CycleSummary::from_report(&report));
    Ok(Json(report))
}

/// Escalation ledger and timeline for a complaint.
pub async fn complaint_history_handler(
    State(state): State<EscalationApiState>,
    Path(complaint_id): Path<Uuid>,
) -> ApiResult<Json<ComplaintEscalationHistory>> {
    let history = state.store.escalation_history(complaint_id).await?;
    Ok(Json(ComplaintEscalationHistory::new(complaint_id, history)))
}

pub async fn activate_rule_handler(
    State(state): State<EscalationApiState>,
    Path(rule_id): Path<Uuid>,
) -> ApiResult<Json<EscalationRule>> {
    set_rule_active(&state, rule_id, true).await
}

pub async fn deactivate_rule_handler(
    State(state): State<EscalationApiState>,
    Path(rule_id): Path<Uuid>,
) -> ApiResult<Json<EscalationRule>> {
    set_rule_active(&state, rule_id, false).await
}

async fn set_rule_active(
    state: &EscalationApiState,
    rule_id: Uuid,
    is_active: bool,
) -> ApiResult<Json<EscalationRule>> {
    let rule = state
        .store
        .set_rule_active(rule_id, is_active)
        .await?
        .ok_or_else(|| ApiEscalationError::NotFound(format!("escalation rule {rule_id}")))?;

    info!(rule_id = %rule.id, is_active, "Escalation rule activation changed");
    Ok(Json(rule))
}
