//! Router for escalation endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    activate_rule_handler, complaint_history_handler, deactivate_rule_handler, health_handler,
    run_cycle_handler,
};
use crate::middleware::admin_guard;
use crate::state::EscalationApiState;

/// Create the escalation router.
///
/// # Routes
///
/// - `GET /health` - open
/// - `POST /escalations/run` - admin
/// - `GET /escalations/complaints/:complaint_id` - admin
/// - `POST /escalations/rules/:rule_id/activate` - admin
/// - `POST /escalations/rules/:rule_id/deactivate` - admin
pub fn escalation_router(state: EscalationApiState) -> Router {
    let admin = Router::new()
        .route("/run", post(run_cycle_handler))
        .route("/complaints/:complaint_id", get(complaint_history_handler))
        .route("/rules/:rule_id/activate", post(activate_rule_handler))
        .route("/rules/:rule_id/deactivate", post(deactivate_rule_handler))
        .layer(middleware::from_fn_with_state(
            state.admin.clone(),
            admin_guard,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/escalations", admin)
        .with_state(state)
}
