//! Rule-driven escalation and SLA engine for citizen grievances.
//!
//! A cycle runs the pipeline
//!
//! ```text
//! RuleStore -> CandidateScanner -> for each candidate:
//!     ConditionEvaluator -> IdempotencyGuard -> AuthorityResolver -> EscalationExecutor
//! ```
//!
//! and moves each overdue complaint up one escalation level. The level
//! bump, the citizen timeline event and the escalation ledger row commit
//! together; the lifecycle status is never changed.
//!
//! [`EscalationJob`] runs single cycles (used by the manual trigger) and
//! [`EscalationWorker`] drives it on an interval.

pub mod audit;
pub mod clock;
pub mod condition;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod job;
pub mod notify;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod store;
pub mod threshold;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use condition::{ConditionError, ConditionEvaluator, EscalationCondition, EscalationDecision};
pub use config::EngineSettings;
pub use error::{EscalationError, Result};
pub use job::{CandidateOutcome, CycleReport, Disposition, EscalationJob, EscalationStats, SkipReason};
pub use notify::{EscalationNotice, EscalationPublisher};
pub use store::{
    EscalationHistory, EscalationStore, InMemoryEscalationStore, PgEscalationStore, TimeoutStore,
};
pub use threshold::{threshold_resolver, RuleSlaThreshold, SlaOverrideThreshold, ThresholdResolver};
pub use worker::{CycleSummary, EscalationWorker, WorkerConfig, WorkerHandle, WorkerStatus};
