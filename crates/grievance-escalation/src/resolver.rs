//! Authority resolver.

use std::sync::Arc;

use grievance_db::models::{Authority, AuthorityQuery};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::store::EscalationStore;

/// Finds the authority that receives an escalated complaint.
///
/// Preference order: exact location, then pincode, then department-wide.
pub struct AuthorityResolver {
    store: Arc<dyn EscalationStore>,
}

impl AuthorityResolver {
    pub fn new(store: Arc<dyn EscalationStore>) -> Self {
        Self { store }
    }

    /// Look up an authority. A miss is an expected outcome, logged as a warning.
    pub async fn find_authority(
        &self,
        complaint_id: Uuid,
        query: &AuthorityQuery,
    ) -> Result<Option<Authority>> {
        let authority = self.store.find_authority(query).await?;
        if authority.is_none() {
            warn!(
                complaint_id = %complaint_id,
                department_id = %query.department_id,
                location_id = %query.location_id,
                pincode = query.pincode.as_deref().unwrap_or(""),
                level = query.level,
                "No authority found for escalation target, skipping this cycle"
            );
        }
        Ok(authority)
    }
}
