//! Idempotency guard.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::EscalationStore;

/// Suppresses a repeat escalation to the same level within a lookback window.
///
/// This bounds duplicate work from restarts, overlapping runs and manual
/// triggers. The row lock taken by the executor covers true concurrency.
pub struct IdempotencyGuard {
    store: Arc<dyn EscalationStore>,
    lookback: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn EscalationStore>, lookback: Duration) -> Self {
        Self { store, lookback }
    }

    /// Check whether `complaint_id` reached `target_level` within the window.
    pub async fn already_escalated(
        &self,
        complaint_id: Uuid,
        target_level: i32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.store
            .escalated_since(complaint_id, target_level, now - self.lookback)
            .await
    }
}
