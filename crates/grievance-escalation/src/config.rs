//! Engine settings.
//!
//! Process-level configuration (environment variables, overrides, the
//! worker interval) is read by the binary. This module only holds the
//! values the cycle itself needs.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Highest escalation level a complaint can reach.
pub const DEFAULT_MAX_LEVEL: i32 = 3;

/// Idempotency lookback window.
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 60;

/// Maximum candidates loaded per cycle.
pub const DEFAULT_BATCH_SIZE: i64 = 500;

/// Per-call storage timeout.
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 10;

/// Marker prepended to reasons and notes when running in dry-run mode.
pub const DRY_RUN_MARKER: &str = "[DRY RUN]";

/// Lifecycle statuses that keep a complaint open for escalation.
pub const DEFAULT_OPEN_STATUSES: &[&str] = &[
    "submitted",
    "acknowledged",
    "assigned",
    "in_progress",
    "reopened",
    "escalated",
];

/// Settings for one escalation cycle.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Complaints at this level are never escalated further.
    pub max_level: i32,

    /// Window in which a repeat escalation to the same level is suppressed.
    pub lookback: Duration,

    /// Label all writes as dry-run activity.
    pub dry_run: bool,

    /// Open lifecycle statuses, lowercase.
    pub open_statuses: Vec<String>,

    /// Maximum candidates per cycle.
    pub batch_size: i64,

    /// Candidates processed in parallel. 1 means sequential.
    pub concurrency: usize,

    /// Time budget for each storage call.
    pub storage_timeout: StdDuration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_level: DEFAULT_MAX_LEVEL,
            lookback: Duration::minutes(DEFAULT_LOOKBACK_MINUTES),
            dry_run: false,
            open_statuses: DEFAULT_OPEN_STATUSES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            storage_timeout: StdDuration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl EngineSettings {
    /// Enable or disable dry-run labeling.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the maximum escalation level.
    #[must_use]
    pub fn with_max_level(mut self, max_level: i32) -> Self {
        self.max_level = max_level;
        self
    }

    /// Set the idempotency lookback window.
    #[must_use]
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Replace the open status set. Values are normalized to lowercase.
    #[must_use]
    pub fn with_open_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.open_statuses = normalize_statuses(statuses);
        self
    }

    /// Set the candidate batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the per-cycle candidate concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the per-call storage timeout.
    #[must_use]
    pub fn with_storage_timeout(mut self, timeout: StdDuration) -> Self {
        self.storage_timeout = timeout;
        self
    }
}

/// Trim, lowercase and dedupe a status list, dropping empty entries.
pub fn normalize_statuses<I, S>(statuses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for status in statuses {
        let status = status.as_ref().trim().to_lowercase();
        if !status.is_empty() && !out.contains(&status) {
            out.push(status);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_level, 3);
        assert_eq!(settings.lookback, Duration::hours(1));
        assert!(!settings.dry_run);
        assert_eq!(settings.concurrency, 1);
        assert!(settings.open_statuses.contains(&"in_progress".to_string()));
        assert!(!settings.open_statuses.contains(&"resolved".to_string()));
    }

    #[test]
    fn test_normalize_statuses() {
        let statuses = normalize_statuses([" Submitted", "ASSIGNED", "", "submitted"]);
        assert_eq!(statuses, vec!["submitted", "assigned"]);
    }

    #[test]
    fn test_builder_clamps_concurrency_and_batch() {
        let settings = EngineSettings::default()
            .with_concurrency(0)
            .with_batch_size(-5);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.batch_size, 1);
    }
}
