//! Post-commit escalation notices.
//!
//! Notices go out on a broadcast channel after the escalation transaction
//! commits. Delivery is fire-and-forget: a missing or lagging subscriber
//! never affects the escalation outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::store::AppliedEscalation;

/// A committed escalation, for downstream notification delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub complaint_id: Uuid,
    pub record_id: Uuid,
    pub from_level: i32,
    pub to_level: i32,
    pub department_id: Uuid,
    pub authority_id: Uuid,
    pub reason: String,
    pub dry_run: bool,
    pub occurred_at: DateTime<Utc>,
}

impl EscalationNotice {
    /// Build a notice from the committed rows.
    #[must_use]
    pub fn from_applied(applied: &AppliedEscalation) -> Self {
        let record = &applied.record;
        Self {
            complaint_id: record.complaint_id,
            record_id: record.id,
            from_level: record.escalation_level - 1,
            to_level: record.escalation_level,
            department_id: record.to_department_id,
            authority_id: record.to_authority_id,
            reason: record.reason.clone(),
            dry_run: record.is_dry_run,
            occurred_at: record.created_at,
        }
    }
}

/// Broadcasts escalation notices to subscribers.
#[derive(Debug, Clone)]
pub struct EscalationPublisher {
    sender: broadcast::Sender<EscalationNotice>,
}

impl EscalationPublisher {
    /// Create a publisher with the given channel capacity.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<EscalationNotice>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Publish a notice. Errors are logged, never propagated.
    pub fn publish(&self, notice: EscalationNotice) {
        if let Err(e) = self.sender.send(notice) {
            tracing::warn!(
                target: "escalation::notify",
                complaint_id = %e.0.complaint_id,
                "No active subscribers to receive escalation notice"
            );
        }
    }

    /// Get a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<EscalationNotice> {
        self.sender.subscribe()
    }
}
