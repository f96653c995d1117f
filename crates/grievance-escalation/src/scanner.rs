//! Candidate scanner.

use std::sync::Arc;

use grievance_db::models::ComplaintCandidate;
use tracing::debug;

use crate::config::EngineSettings;
use crate::error::Result;
use crate::store::{CandidateFilter, EscalationStore};

/// Finds complaints eligible for escalation evaluation.
///
/// Eligible means an open status, a department and a location, and a level
/// below the configured maximum. Complaints missing a department or
/// location are excluded, not reported.
pub struct CandidateScanner {
    store: Arc<dyn EscalationStore>,
    filter: CandidateFilter,
}

impl CandidateScanner {
    pub fn new(store: Arc<dyn EscalationStore>, settings: &EngineSettings) -> Self {
        Self {
            store,
            filter: CandidateFilter {
                open_statuses: settings.open_statuses.clone(),
                max_level: settings.max_level,
                limit: settings.batch_size,
            },
        }
    }

    /// Load the current batch of candidates.
    pub async fn candidates(&self) -> Result<Vec<ComplaintCandidate>> {
        let candidates = self.store.candidates(&self.filter).await?;
        if candidates.len() as i64 >= self.filter.limit {
            debug!(
                limit = self.filter.limit,
                "Candidate batch is full, remaining complaints wait for the next cycle"
            );
        }
        Ok(candidates)
    }
}
