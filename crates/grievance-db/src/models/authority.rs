//! Authority directory model.
//!
//! An authority is the (department, location/pincode, level) tuple that
//! receives a complaint. The directory is maintained by department
//! onboarding; the engine only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// An entry in the authority directory.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Authority {
    pub id: Uuid,
    pub department_id: Uuid,
    /// Location served (NULL = department-wide at this level).
    pub location_id: Option<Uuid>,
    /// Postal code served, when the directory is keyed by pincode.
    pub pincode: Option<String>,
    pub level: i32,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Lookup key for an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityQuery {
    pub department_id: Uuid,
    pub location_id: Uuid,
    pub pincode: Option<String>,
    pub level: i32,
}

impl Authority {
    /// Specificity of this entry for a query: exact location beats pincode,
    /// pincode beats department-wide. `None` when the entry does not serve
    /// the query at all.
    #[must_use]
    pub fn match_rank(&self, query: &AuthorityQuery) -> Option<u8> {
        if !self.is_active
            || self.department_id != query.department_id
            || self.level != query.level
        {
            return None;
        }

        if self.location_id == Some(query.location_id) {
            return Some(0);
        }
        if let (Some(ours), Some(theirs)) = (&self.pincode, &query.pincode) {
            if self.location_id.is_none() && ours == theirs {
                return Some(1);
            }
        }
        if self.location_id.is_none() && self.pincode.is_none() {
            return Some(2);
        }
        None
    }

    /// Find the most specific active authority for a department, location and level.
    pub async fn find_for_escalation<'e, E>(
        executor: E,
        query: &AuthorityQuery,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM authorities
            WHERE is_active = true
              AND department_id = $1
              AND level = $4
              AND (
                    location_id = $2
                 OR (location_id IS NULL AND pincode IS NOT NULL AND pincode = $3)
                 OR (location_id IS NULL AND pincode IS NULL)
              )
            ORDER BY
                CASE
                    WHEN location_id = $2 THEN 0
                    WHEN pincode IS NOT NULL THEN 1
                    ELSE 2
                END,
                created_at
            LIMIT 1
            ",
        )
        .bind(query.department_id)
        .bind(query.location_id)
        .bind(query.pincode.as_deref())
        .bind(query.level)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(location: Option<Uuid>, pincode: Option<&str>) -> Authority {
        Authority {
            id: Uuid::new_v4(),
            department_id: Uuid::nil(),
            location_id: location,
            pincode: pincode.map(str::to_string),
            level: 1,
            name: "District Officer".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn query(location: Uuid) -> AuthorityQuery {
        AuthorityQuery {
            department_id: Uuid::nil(),
            location_id: location,
            pincode: Some("110001".to_string()),
            level: 1,
        }
    }

    #[test]
    fn test_exact_location_ranks_first() {
        let location = Uuid::new_v4();
        let q = query(location);
        assert_eq!(authority(Some(location), None).match_rank(&q), Some(0));
        assert_eq!(authority(None, Some("110001")).match_rank(&q), Some(1));
        assert_eq!(authority(None, None).match_rank(&q), Some(2));
    }

    #[test]
    fn test_non_matching_entries_are_rejected() {
        let q = query(Uuid::new_v4());
        assert_eq!(authority(Some(Uuid::new_v4()), None).match_rank(&q), None);
        assert_eq!(authority(None, Some("999999")).match_rank(&q), None);

        let mut wrong_level = authority(None, None);
        wrong_level.level = 2;
        assert_eq!(wrong_level.match_rank(&q), None);

        let mut inactive = authority(None, None);
        inactive.is_active = false;
        assert_eq!(inactive.match_rank(&q), None);
    }
}
