//! Database entity models for grievance-db.
//!
//! These models represent the database tables and provide
//! type-safe interactions with PostgreSQL.

pub mod audit_log;
pub mod authority;
pub mod complaint;
pub mod escalation_record;
pub mod escalation_rule;
pub mod escalation_types;
pub mod status_history;

pub use audit_log::{AuditLogEntry, CreateAuditLogEntry};
pub use authority::{Authority, AuthorityQuery};
pub use complaint::ComplaintCandidate;
pub use escalation_record::{CreateEscalationRecord, EscalationRecord};
pub use escalation_rule::{CreateEscalationRule, EscalationRule};
pub use escalation_types::{EscalationTarget, Scope, ESCALATION_AUDIT_ACTION, SYSTEM_ACTOR};
pub use status_history::{CreateStatusHistoryEvent, StatusHistoryEvent};
