//! Escalation type definitions.
//!
//! Shared column-level types for rule scoping and escalation targets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor recorded on rows written by the escalation engine.
pub const SYSTEM_ACTOR: &str = "system";

/// Audit action recorded for escalation decisions.
pub const ESCALATION_AUDIT_ACTION: &str = "escalation";

/// Rule scope over a department or location.
///
/// Stored as a nullable column where NULL means "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    /// Matches every value.
    Any,
    /// Matches exactly one identifier.
    Specific(Uuid),
}

impl Scope {
    /// Build a scope from a nullable column.
    #[must_use]
    pub fn from_nullable(value: Option<Uuid>) -> Self {
        value.map_or(Self::Any, Self::Specific)
    }

    /// Convert back to the nullable column representation.
    #[must_use]
    pub fn to_nullable(self) -> Option<Uuid> {
        match self {
            Self::Any => None,
            Self::Specific(id) => Some(id),
        }
    }

    /// Check whether the scope admits the given identifier.
    #[must_use]
    pub fn matches(&self, value: Uuid) -> bool {
        match self {
            Self::Any => true,
            Self::Specific(id) => *id == value,
        }
    }

    /// Check if this scope names a specific identifier.
    #[must_use]
    pub fn is_specific(&self) -> bool {
        matches!(self, Self::Specific(_))
    }
}

/// Department that receives an escalated complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EscalationTarget {
    /// Stay within the complaint's current department hierarchy.
    SameHierarchy,
    /// Move to a specific department.
    Department(Uuid),
}

impl EscalationTarget {
    /// Build a target from the nullable `to_department_id` column.
    #[must_use]
    pub fn from_nullable(value: Option<Uuid>) -> Self {
        value.map_or(Self::SameHierarchy, Self::Department)
    }

    /// Resolve the concrete department for a complaint currently in `current`.
    #[must_use]
    pub fn resolve(&self, current: Uuid) -> Uuid {
        match self {
            Self::SameHierarchy => current,
            Self::Department(id) => *id,
        }
    }
}
