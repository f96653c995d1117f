//! Shared state for escalation endpoints.

use std::fmt;
use std::sync::Arc;

use grievance_escalation::{EscalationJob, EscalationStore, WorkerStatus};
use subtle::ConstantTimeEq;

use crate::error::ApiEscalationError;

/// Who may call admin endpoints.
#[derive(Clone)]
pub struct AdminAccess {
    token: Option<Arc<str>>,
    allow_without_token: bool,
}

impl fmt::Debug for AdminAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccess")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("allow_without_token", &self.allow_without_token)
            .finish()
    }
}

impl AdminAccess {
    /// Build the policy.
    ///
    /// With a token, callers must present it. Without one, access is open
    /// only when `allow_without_token` is set.
    pub fn new(token: Option<String>, allow_without_token: bool) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
            allow_without_token,
        }
    }

    /// Require `Authorization: Bearer <token>`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Some(token.into()), false)
    }

    /// No token, open access.
    pub fn open() -> Self {
        Self::new(None, true)
    }

    /// No token, no access.
    pub fn locked() -> Self {
        Self::new(None, false)
    }

    /// Check an `Authorization` header value.
    pub fn check(&self, authorization: Option<&str>) -> Result<(), ApiEscalationError> {
        let Some(expected) = &self.token else {
            return if self.allow_without_token {
                Ok(())
            } else {
                Err(ApiEscalationError::Forbidden)
            };
        };

        let presented = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiEscalationError::Unauthorized)?;

        if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(ApiEscalationError::Unauthorized)
        }
    }
}

/// State shared by all escalation handlers.
#[derive(Clone)]
pub struct EscalationApiState {
    pub job: Arc<EscalationJob>,
    pub store: Arc<dyn EscalationStore>,
    pub worker_status: Arc<WorkerStatus>,
    pub admin: AdminAccess,
}

impl EscalationApiState {
    pub fn new(
        job: Arc<EscalationJob>,
        store: Arc<dyn EscalationStore>,
        worker_status: Arc<WorkerStatus>,
        admin: AdminAccess,
    ) -> Self {
        Self {
            job,
            store,
            worker_status,
            admin,
        }
    }
}
