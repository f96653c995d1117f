//! Rule store.
//!
//! Loads active rules and compiles their condition payloads. A rule whose
//! payload fails to parse is dropped from the set with a warning; the rest
//! still load.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use grievance_db::models::{ComplaintCandidate, EscalationRule, EscalationTarget, Scope};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::condition::{ConditionError, EscalationCondition};
use crate::error::Result;
use crate::store::EscalationStore;

/// A rule with its condition parsed and its scopes typed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub id: Uuid,
    pub name: String,
    pub from_department: Scope,
    pub from_location: Scope,
    pub to_department: EscalationTarget,
    /// Level a complaint must currently be at for this rule to apply.
    pub level: i32,
    pub condition: EscalationCondition,
    pub created_at: DateTime<Utc>,
}

impl CompiledRule {
    /// Compile a stored rule.
    pub fn compile(rule: &EscalationRule) -> std::result::Result<Self, ConditionError> {
        Ok(Self {
            id: rule.id,
            name: rule.name.clone(),
            from_department: rule.from_department(),
            from_location: rule.from_location(),
            to_department: rule.to_department(),
            level: rule.escalation_level,
            condition: EscalationCondition::parse(&rule.conditions)?,
            created_at: rule.created_at,
        })
    }

    /// Check level and scope against a candidate. Conditions are not checked.
    #[must_use]
    pub fn applies_to(&self, candidate: &ComplaintCandidate) -> bool {
        self.level == candidate.escalation_level
            && self.from_department.matches(candidate.department_id)
            && self.from_location.matches(candidate.location_id)
    }

    /// Number of specific scopes. Higher wins.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        u8::from(self.from_department.is_specific()) + u8::from(self.from_location.is_specific())
    }
}

/// Compiled rules in precedence order.
///
/// More specific scopes come first; ties go to the oldest rule.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Build a rule set, sorting by precedence.
    #[must_use]
    pub fn new(mut rules: Vec<CompiledRule>) -> Self {
        rules.sort_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Self { rules }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose level and scope match the candidate, in precedence order.
    pub fn matching<'a>(
        &'a self,
        candidate: &'a ComplaintCandidate,
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules.iter().filter(move |r| r.applies_to(candidate))
    }
}

/// Loads and compiles active rules.
pub struct RuleStore {
    store: Arc<dyn EscalationStore>,
    /// Rules already reported as malformed, so each is warned about once.
    reported: Mutex<HashSet<Uuid>>,
}

impl RuleStore {
    pub fn new(store: Arc<dyn EscalationStore>) -> Self {
        Self {
            store,
            reported: Mutex::new(HashSet::new()),
        }
    }

    /// Load active rules. Malformed rules are skipped.
    pub async fn active_rules(&self) -> Result<RuleSet> {
        let rows = self.store.active_rules().await?;
        let mut compiled = Vec::with_capacity(rows.len());

        for row in rows.iter().filter(|r| r.is_active) {
            match CompiledRule::compile(row) {
                Ok(rule) => compiled.push(rule),
                Err(e) => self.report_malformed(row, &e),
            }
        }

        debug!(
            loaded = rows.len(),
            usable = compiled.len(),
            "Loaded escalation rules"
        );
        Ok(RuleSet::new(compiled))
    }

    fn report_malformed(&self, rule: &EscalationRule, error: &ConditionError) {
        let first_time = self
            .reported
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(rule.id);

        if first_time {
            warn!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                error = %error,
                "Skipping escalation rule with malformed conditions"
            );
        } else {
            debug!(rule_id = %rule.id, "Still skipping malformed escalation rule");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn compiled(dept: Scope, loc: Scope, age_hours: i64) -> CompiledRule {
        CompiledRule {
            id: Uuid::new_v4(),
            name: format!("rule-{age_hours}"),
            from_department: dept,
            from_location: loc,
            to_department: EscalationTarget::SameHierarchy,
            level: 0,
            condition: EscalationCondition::parse(&json!({"sla_hours": 1})).unwrap(),
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn candidate(dept: Uuid, loc: Uuid) -> ComplaintCandidate {
        ComplaintCandidate {
            id: Uuid::new_v4(),
            status: "submitted".to_string(),
            priority: "medium".to_string(),
            department_id: dept,
            location_id: loc,
            pincode: None,
            assigned_authority_id: None,
            escalation_level: 0,
            last_status_change_at: Utc::now(),
            level_entered_at: None,
        }
    }

    #[test]
    fn test_precedence_prefers_specific_then_oldest() {
        let dept = Uuid::new_v4();
        let loc = Uuid::new_v4();

        let generic_old = compiled(Scope::Any, Scope::Any, 10);
        let generic_new = compiled(Scope::Any, Scope::Any, 1);
        let by_dept = compiled(Scope::Specific(dept), Scope::Any, 2);
        let exact = compiled(Scope::Specific(dept), Scope::Specific(loc), 3);

        let set = RuleSet::new(vec![
            generic_new.clone(),
            by_dept.clone(),
            generic_old.clone(),
            exact.clone(),
        ]);
        let c = candidate(dept, loc);
        let order: Vec<Uuid> = set.matching(&c).map(|r| r.id).collect();

        assert_eq!(order, vec![exact.id, by_dept.id, generic_old.id, generic_new.id]);
    }

    #[test]
    fn test_scope_and_level_filtering() {
        let dept = Uuid::new_v4();
        let other = compiled(Scope::Specific(Uuid::new_v4()), Scope::Any, 1);
        let mut wrong_level = compiled(Scope::Any, Scope::Any, 1);
        wrong_level.level = 2;

        let set = RuleSet::new(vec![other, wrong_level]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.matching(&candidate(dept, Uuid::new_v4())).count(), 0);
    }

    #[test]
    fn test_compile_rejects_bad_payload() {
        let rule = EscalationRule {
            id: Uuid::new_v4(),
            name: "broken".to_string(),
            from_department_id: None,
            from_location_id: None,
            to_department_id: None,
            escalation_level: 0,
            conditions: json!({"statuses": ["submitted"]}),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(CompiledRule::compile(&rule), Err(ConditionError::MissingSla));
    }
}
