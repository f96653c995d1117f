//! Escalation cycle.
//!
//! One cycle loads active rules, scans candidates and, for each candidate,
//! runs evaluator -> guard -> resolver -> executor. Per-candidate errors are
//! caught, logged and counted; only a failed rule load or scan fails the
//! cycle as a whole.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use grievance_db::models::{AuthorityQuery, ComplaintCandidate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::audit::AuditOutcome;
use crate::clock::{Clock, SystemClock};
use crate::condition::{ConditionEvaluator, Verdict};
use crate::config::EngineSettings;
use crate::error::Result;
use crate::executor::EscalationExecutor;
use crate::guard::IdempotencyGuard;
use crate::notify::EscalationPublisher;
use crate::resolver::AuthorityResolver;
use crate::rules::{RuleSet, RuleStore};
use crate::scanner::CandidateScanner;
use crate::store::EscalationStore;
use crate::threshold::ThresholdResolver;

/// Why a candidate was left alone this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MaxLevelReached,
    NoMatchingRule,
    SlaNotBreached,
    AlreadyEscalated,
    NoAuthority,
    Conflict,
}

/// What the cycle did with a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Disposition {
    Escalated {
        to_level: i32,
        rule_id: Uuid,
        department_id: Uuid,
        authority_id: Uuid,
        record_id: Uuid,
        reason: String,
    },
    Skipped {
        reason: SkipReason,
        detail: String,
    },
    Failed {
        error: String,
    },
}

/// Per-candidate result of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub complaint_id: Uuid,
    pub from_level: i32,
    #[serde(flatten)]
    pub disposition: Disposition,
}

impl CandidateOutcome {
    /// Check if the candidate was escalated.
    #[must_use]
    pub fn is_escalated(&self) -> bool {
        matches!(self.disposition, Disposition::Escalated { .. })
    }

    /// Skip reason, if the candidate was skipped.
    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.disposition {
            Disposition::Skipped { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Statistics from one or more cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationStats {
    /// Candidates examined.
    pub processed: usize,
    /// Candidates escalated.
    pub escalated: usize,
    /// Candidates skipped for an expected reason.
    pub skipped: usize,
    /// Candidates that hit an error.
    pub failed: usize,
}

impl EscalationStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &EscalationStats) {
        self.processed += other.processed;
        self.escalated += other.escalated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Count one candidate outcome.
    pub fn record(&mut self, outcome: &CandidateOutcome) {
        self.processed += 1;
        match outcome.disposition {
            Disposition::Escalated { .. } => self.escalated += 1,
            Disposition::Skipped { .. } => self.skipped += 1,
            Disposition::Failed { .. } => self.failed += 1,
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub sla_override: bool,
    pub outcomes: Vec<CandidateOutcome>,
    pub stats: EscalationStats,
}

/// Runs escalation cycles.
pub struct EscalationJob {
    rules: RuleStore,
    scanner: CandidateScanner,
    evaluator: ConditionEvaluator,
    guard: IdempotencyGuard,
    resolver: AuthorityResolver,
    executor: EscalationExecutor,
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    /// Held for the whole cycle so scheduled and manual runs never overlap.
    cycle_lock: Mutex<()>,
}

impl EscalationJob {
    /// Create a job over `store` with the given threshold strategy.
    pub fn new(
        store: Arc<dyn EscalationStore>,
        thresholds: Arc<dyn ThresholdResolver>,
        settings: EngineSettings,
    ) -> Self {
        let evaluator = ConditionEvaluator::new(thresholds);
        Self {
            rules: RuleStore::new(Arc::clone(&store)),
            scanner: CandidateScanner::new(Arc::clone(&store), &settings),
            guard: IdempotencyGuard::new(Arc::clone(&store), settings.lookback),
            resolver: AuthorityResolver::new(Arc::clone(&store)),
            executor: EscalationExecutor::new(store, settings.dry_run, evaluator.uses_override()),
            evaluator,
            settings,
            clock: Arc::new(SystemClock),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Use a different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish a notice after every committed escalation.
    #[must_use]
    pub fn with_publisher(mut self, publisher: EscalationPublisher) -> Self {
        self.executor = self.executor.with_publisher(publisher);
        self
    }

    /// Engine settings in effect.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one full cycle.
    ///
    /// Waits for any cycle already in progress to finish first.
    #[instrument(skip(self), fields(dry_run = self.settings.dry_run))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _running = self.cycle_lock.lock().await;
        let started_at = self.clock.now();
        debug!("Starting escalation cycle");

        let rules = self.rules.active_rules().await.map_err(|e| {
            error!(error = %e, "Failed to load escalation rules");
            e
        })?;

        let candidates = if rules.is_empty() {
            debug!("No usable escalation rules, skipping scan");
            Vec::new()
        } else {
            self.scanner.candidates().await.map_err(|e| {
                error!(error = %e, "Failed to scan escalation candidates");
                e
            })?
        };

        let now = self.clock.now();
        let outcomes: Vec<CandidateOutcome> = if self.settings.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                outcomes.push(self.process_candidate(candidate, &rules, now).await);
            }
            outcomes
        } else {
            let rules = &rules;
            stream::iter(candidates.iter().cloned())
                .map(move |candidate| async move {
                    self.process_candidate(&candidate, rules, now).await
                })
                .buffer_unordered(self.settings.concurrency)
                .collect()
                .await
        };

        let mut stats = EscalationStats::default();
        for outcome in &outcomes {
            stats.record(outcome);
        }

        if stats.processed > 0 {
            info!(
                processed = stats.processed,
                escalated = stats.escalated,
                skipped = stats.skipped,
                failed = stats.failed,
                rules = rules.len(),
                "Completed escalation cycle"
            );
        } else {
            debug!("No escalation candidates to process");
        }

        Ok(CycleReport {
            started_at,
            finished_at: self.clock.now(),
            dry_run: self.settings.dry_run,
            sla_override: self.evaluator.uses_override(),
            outcomes,
            stats,
        })
    }

    /// Process one candidate. Never fails; errors become [`Disposition::Failed`].
    async fn process_candidate(
        &self,
        candidate: &ComplaintCandidate,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> CandidateOutcome {
        let disposition = match self.escalate_candidate(candidate, rules, now).await {
            Ok(disposition) => disposition,
            Err(e) => {
                if e.is_transient() {
                    warn!(
                        complaint_id = %candidate.id,
                        level = candidate.escalation_level,
                        error = %e,
                        "Transient error while evaluating candidate, will retry next cycle"
                    );
                } else {
                    error!(
                        complaint_id = %candidate.id,
                        level = candidate.escalation_level,
                        error = %e,
                        "Failed to evaluate candidate"
                    );
                }
                Disposition::Failed {
                    error: e.to_string(),
                }
            }
        };

        CandidateOutcome {
            complaint_id: candidate.id,
            from_level: candidate.escalation_level,
            disposition,
        }
    }

    async fn escalate_candidate(
        &self,
        candidate: &ComplaintCandidate,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> Result<Disposition> {
        let level = candidate.escalation_level;
        if level >= self.settings.max_level {
            return Ok(skipped(
                SkipReason::MaxLevelReached,
                format!("already at maximum level {}", self.settings.max_level),
            ));
        }

        // The first rule in precedence order whose status and priority filters
        // admit the candidate governs it. Less specific rules are not consulted.
        let mut first_miss = None;
        let mut governing = None;
        for rule in rules.matching(candidate) {
            let decision = self.evaluator.should_escalate(candidate, rule, now);
            match decision.verdict {
                Verdict::StatusMismatch | Verdict::PriorityMismatch => {
                    first_miss.get_or_insert(decision);
                }
                Verdict::Due | Verdict::SlaNotBreached => {
                    governing = Some((rule, decision));
                    break;
                }
            }
        }

        let (rule, decision) = match governing {
            Some((rule, decision)) if decision.should_escalate() => (rule, decision),
            Some((_, decision)) => {
                return Ok(skipped(SkipReason::SlaNotBreached, decision.reason));
            }
            None => return Ok(match first_miss {
                Some(miss) => {
                    debug!(complaint_id = %candidate.id, reason = %miss.reason, "No rule condition matched");
                    skipped(SkipReason::NoMatchingRule, miss.reason)
                }
                None => {
                    debug!(complaint_id = %candidate.id, level, "No escalation rule for candidate");
                    skipped(
                        SkipReason::NoMatchingRule,
                        format!("no active rule for level {level}"),
                    )
                }
            }),
        };

        let target_level = level + 1;
        if self
            .guard
            .already_escalated(candidate.id, target_level, now)
            .await?
        {
            debug!(
                complaint_id = %candidate.id,
                target_level,
                "Already escalated within lookback window"
            );
            return Ok(skipped(
                SkipReason::AlreadyEscalated,
                format!("escalated to level {target_level} within the lookback window"),
            ));
        }

        let query = AuthorityQuery {
            department_id: rule.to_department.resolve(candidate.department_id),
            location_id: candidate.location_id,
            pincode: candidate.pincode.clone(),
            level: target_level,
        };
        let Some(authority) = self.resolver.find_authority(candidate.id, &query).await? else {
            let snapshot =
                self.executor
                    .snapshot(candidate, rule, None, &decision, AuditOutcome::NoAuthority);
            self.executor.record_attempt(&snapshot).await;
            return Ok(skipped(
                SkipReason::NoAuthority,
                format!(
                    "no authority at level {target_level} for department {}",
                    query.department_id
                ),
            ));
        };

        let plan = self.executor.plan(candidate, rule, &authority, &decision);
        match self.executor.execute(&plan).await {
            Ok(applied) => {
                info!(
                    complaint_id = %candidate.id,
                    rule_id = %rule.id,
                    from_level = level,
                    to_level = target_level,
                    authority_id = %authority.id,
                    record_id = %applied.record.id,
                    dry_run = plan.dry_run,
                    "Escalated complaint"
                );
                Ok(Disposition::Escalated {
                    to_level: target_level,
                    rule_id: rule.id,
                    department_id: authority.department_id,
                    authority_id: authority.id,
                    record_id: applied.record.id,
                    reason: plan.reason,
                })
            }
            Err(e) if e.is_conflict() => {
                info!(complaint_id = %candidate.id, error = %e, "Complaint changed since scan, skipping");
                let mut snapshot = self.executor.snapshot(
                    candidate,
                    rule,
                    Some(&authority),
                    &decision,
                    AuditOutcome::Conflict,
                );
                snapshot.error = Some(e.to_string());
                self.executor.record_attempt(&snapshot).await;
                Ok(skipped(SkipReason::Conflict, e.to_string()))
            }
            Err(e) => {
                error!(
                    complaint_id = %candidate.id,
                    from_level = level,
                    to_level = target_level,
                    error = %e,
                    "Escalation transaction failed and was rolled back"
                );
                let mut snapshot = self.executor.snapshot(
                    candidate,
                    rule,
                    Some(&authority),
                    &decision,
                    AuditOutcome::Failed,
                );
                snapshot.error = Some(e.to_string());
                self.executor.record_attempt(&snapshot).await;
                Ok(Disposition::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}

fn skipped(reason: SkipReason, detail: String) -> Disposition {
    Disposition::Skipped { reason, detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(disposition: Disposition) -> CandidateOutcome {
        CandidateOutcome {
            complaint_id: Uuid::new_v4(),
            from_level: 0,
            disposition,
        }
    }

    #[test]
    fn test_stats_record_and_merge() {
        let mut stats = EscalationStats::default();
        stats.record(&outcome(Disposition::Failed {
            error: "boom".to_string(),
        }));
        stats.record(&outcome(Disposition::Skipped {
            reason: SkipReason::NoAuthority,
            detail: String::new(),
        }));

        let mut total = EscalationStats {
            processed: 3,
            escalated: 3,
            skipped: 0,
            failed: 0,
        };
        total.merge(&stats);

        assert_eq!(total.processed, 5);
        assert_eq!(total.escalated, 3);
        assert_eq!(total.skipped, 1);
        assert_eq!(total.failed, 1);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let value = serde_json::to_value(outcome(Disposition::Skipped {
            reason: SkipReason::AlreadyEscalated,
            detail: "recent".to_string(),
        }))
        .unwrap();

        assert_eq!(value["outcome"], "skipped");
        assert_eq!(value["reason"], "already_escalated");
        assert_eq!(value["from_level"], 0);
        assert!(value["complaint_id"].is_string());
    }
}
