//! Request and response bodies.

use grievance_db::models::{EscalationRecord, StatusHistoryEvent};
use grievance_escalation::{CycleSummary, EscalationHistory};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the last cycle failed.
    pub status: String,
    pub version: String,
    pub worker_running: bool,
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleSummary>,
}

/// Escalation history for one complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintEscalationHistory {
    pub complaint_id: Uuid,
    /// Ledger rows, oldest first.
    pub escalations: Vec<EscalationRecord>,
    /// Timeline events written alongside each escalation.
    pub timeline: Vec<StatusHistoryEvent>,
}

impl ComplaintEscalationHistory {
    #[must_use]
    pub fn new(complaint_id: Uuid, history: EscalationHistory) -> Self {
        Self {
            complaint_id,
            escalations: history.records,
            timeline: history.events,
        }
    }
}
