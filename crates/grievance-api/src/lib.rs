//! HTTP surface of the grievance escalation engine.
//!
//! - `GET  /health` - liveness plus the worker's last cycle
//! - `POST /escalations/run` - run one cycle now and return its report
//! - `GET  /escalations/complaints/:complaint_id` - escalation history
//! - `POST /escalations/rules/:rule_id/activate`
//! - `POST /escalations/rules/:rule_id/deactivate`
//!
//! Everything under `/escalations` sits behind [`middleware::admin_guard`].

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod state;

pub use error::{ApiEscalationError, ApiResult};
pub use router::escalation_router;
pub use state::{AdminAccess, EscalationApiState};
