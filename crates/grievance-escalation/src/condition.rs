//! Rule condition payloads and their evaluation.
//!
//! Rule rows carry a loosely-typed JSON payload. [`EscalationCondition::parse`]
//! turns it into a typed predicate and never panics; any malformed field
//! makes the whole rule inapplicable.
//!
//! Accepted shape:
//!
//! ```json
//! {
//!   "required_statuses": ["submitted", "assigned"],
//!   "required_priorities": ["high"],
//!   "sla_hours": 72
//! }
//! ```
//!
//! `statuses` and `priorities` are accepted as aliases. An absent or empty
//! list places no constraint. `sla_hours` may be a number or a numeric string.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use grievance_db::models::ComplaintCandidate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::rules::CompiledRule;
use crate::threshold::ThresholdResolver;

/// Upper bound on a configured SLA (ten years).
pub const MAX_SLA_HOURS: f64 = 87_600.0;

const STATUS_KEYS: &[&str] = &["required_statuses", "statuses"];
const PRIORITY_KEYS: &[&str] = &["required_priorities", "priorities"];
const SLA_KEY: &str = "sla_hours";

/// Reasons a condition payload is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    /// Payload is not a JSON object.
    #[error("condition payload must be a JSON object")]
    NotAnObject,

    /// Payload has no SLA.
    #[error("condition payload is missing sla_hours")]
    MissingSla,

    /// SLA is present but unusable.
    #[error("invalid sla_hours: {0}")]
    InvalidSla(String),

    /// A status or priority list is malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Typed rule predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationCondition {
    /// Statuses the complaint must be in. `None` admits any status.
    pub required_statuses: Option<BTreeSet<String>>,

    /// Priorities the complaint must have. `None` admits any priority.
    pub required_priorities: Option<BTreeSet<String>>,

    /// SLA for the rule's level, in hours.
    pub sla_hours: f64,
}

impl EscalationCondition {
    /// Parse a stored condition payload.
    pub fn parse(payload: &Value) -> Result<Self, ConditionError> {
        let obj = payload.as_object().ok_or(ConditionError::NotAnObject)?;

        Ok(Self {
            required_statuses: parse_set(obj, STATUS_KEYS, "required_statuses")?,
            required_priorities: parse_set(obj, PRIORITY_KEYS, "required_priorities")?,
            sla_hours: parse_sla(obj)?,
        })
    }

    /// The rule's own SLA as a duration.
    #[must_use]
    pub fn sla(&self) -> Duration {
        hours_to_duration(self.sla_hours)
    }

    /// Check whether the status constraint admits `status`.
    #[must_use]
    pub fn admits_status(&self, status: &str) -> bool {
        admits(self.required_statuses.as_ref(), status)
    }

    /// Check whether the priority constraint admits `priority`.
    #[must_use]
    pub fn admits_priority(&self, priority: &str) -> bool {
        admits(self.required_priorities.as_ref(), priority)
    }
}

fn admits(set: Option<&BTreeSet<String>>, value: &str) -> bool {
    match set {
        None => true,
        Some(set) => set.contains(&value.trim().to_lowercase()),
    }
}

fn parse_set(
    obj: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<Option<BTreeSet<String>>, ConditionError> {
    let Some(value) = keys.iter().find_map(|k| obj.get(*k)) else {
        return Ok(None);
    };

    let items = match value {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        other => {
            return Err(ConditionError::InvalidField {
                field,
                reason: format!("expected an array, got {}", json_kind(other)),
            })
        }
    };

    let mut set = BTreeSet::new();
    for item in items {
        let s = item.as_str().ok_or_else(|| ConditionError::InvalidField {
            field,
            reason: format!("expected strings, got {}", json_kind(item)),
        })?;
        let s = s.trim().to_lowercase();
        if !s.is_empty() {
            set.insert(s);
        }
    }

    Ok(if set.is_empty() { None } else { Some(set) })
}

fn parse_sla(obj: &Map<String, Value>) -> Result<f64, ConditionError> {
    let hours = match obj.get(SLA_KEY) {
        None | Some(Value::Null) => return Err(ConditionError::MissingSla),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ConditionError::InvalidSla(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConditionError::InvalidSla(format!("{s:?} is not a number")))?,
        Some(other) => {
            return Err(ConditionError::InvalidSla(format!(
                "expected a number, got {}",
                json_kind(other)
            )))
        }
    };

    if !hours.is_finite() || hours < 0.0 {
        return Err(ConditionError::InvalidSla(format!(
            "{hours} must be a non-negative number"
        )));
    }
    if hours > MAX_SLA_HOURS {
        return Err(ConditionError::InvalidSla(format!(
            "{hours} exceeds the maximum of {MAX_SLA_HOURS} hours"
        )));
    }

    Ok(hours)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Convert fractional hours to a millisecond-precision duration.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Convert fractional minutes to a millisecond-precision duration.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Render a duration in the unit people read SLAs in.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_duration(d: Duration) -> String {
    let ms = d.num_milliseconds() as f64;
    if d < Duration::hours(1) {
        format!("{:.1}m", ms / 60_000.0)
    } else {
        format!("{:.1}h", ms / 3_600_000.0)
    }
}

/// Outcome of checking one rule against one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Rule matches and the SLA is breached.
    Due,
    /// Candidate status is not in the rule's status set.
    StatusMismatch,
    /// Candidate priority is not in the rule's priority set.
    PriorityMismatch,
    /// Rule matches but the SLA has not elapsed yet.
    SlaNotBreached,
}

/// Decision plus the numbers behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationDecision {
    pub verdict: Verdict,
    pub reason: String,
    pub elapsed: Duration,
    pub threshold: Duration,
}

impl EscalationDecision {
    /// Check if the candidate should be escalated.
    #[must_use]
    pub fn should_escalate(&self) -> bool {
        self.verdict == Verdict::Due
    }
}

/// Decides whether a rule's conditions currently hold for a candidate.
#[derive(Clone)]
pub struct ConditionEvaluator {
    thresholds: Arc<dyn ThresholdResolver>,
}

impl fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl ConditionEvaluator {
    /// Create an evaluator with the given threshold strategy.
    pub fn new(thresholds: Arc<dyn ThresholdResolver>) -> Self {
        Self { thresholds }
    }

    /// Check whether a threshold override is in effect.
    #[must_use]
    pub fn uses_override(&self) -> bool {
        self.thresholds.is_override()
    }

    /// Evaluate `rule` against `candidate` at instant `now`.
    ///
    /// The SLA boundary is inclusive: `elapsed == threshold` escalates.
    #[must_use]
    pub fn should_escalate(
        &self,
        candidate: &ComplaintCandidate,
        rule: &CompiledRule,
        now: DateTime<Utc>,
    ) -> EscalationDecision {
        let threshold = self.thresholds.threshold(&rule.condition);
        let elapsed = now - candidate.sla_clock_start();

        let decision = |verdict, reason: String| EscalationDecision {
            verdict,
            reason,
            elapsed,
            threshold,
        };

        if !rule.condition.admits_status(&candidate.status) {
            return decision(
                Verdict::StatusMismatch,
                format!(
                    "status '{}' not covered by rule '{}'",
                    candidate.status, rule.name
                ),
            );
        }
        if !rule.condition.admits_priority(&candidate.priority) {
            return decision(
                Verdict::PriorityMismatch,
                format!(
                    "priority '{}' not covered by rule '{}'",
                    candidate.priority, rule.name
                ),
            );
        }

        if elapsed >= threshold {
            decision(
                Verdict::Due,
                format!(
                    "SLA breached at level {}: {} elapsed, threshold {} (rule '{}')",
                    candidate.escalation_level,
                    format_duration(elapsed),
                    format_duration(threshold),
                    rule.name
                ),
            )
        } else {
            decision(
                Verdict::SlaNotBreached,
                format!(
                    "{} elapsed of {} allowed at level {}",
                    format_duration(elapsed),
                    format_duration(threshold),
                    candidate.escalation_level
                ),
            )
        }
    }
}
