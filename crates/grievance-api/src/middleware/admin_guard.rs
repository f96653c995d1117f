//! Admin guard for escalation endpoints.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::ApiEscalationError;
use crate::state::AdminAccess;

/// Reject requests that fail the configured [`AdminAccess`] policy.
pub async fn admin_guard(
    State(access): State<AdminAccess>,
    request: Request,
    next: Next,
) -> Result<Response, ApiEscalationError> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = access.check(authorization) {
        tracing::warn!(
            path = %request.uri().path(),
            error = %e,
            "Admin access denied"
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}
