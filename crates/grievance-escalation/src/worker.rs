//! Background escalation worker.
//!
//! Runs one cycle immediately on start and then on a fixed interval until
//! stopped. Stopping cancels the timer and waits for an in-flight cycle to
//! finish; a cycle is never interrupted mid-candidate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::job::{CycleReport, EscalationJob, EscalationStats};

/// Default interval between cycles in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Shortest interval the worker will tick at.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between cycle starts.
    pub interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }
}

/// Summary of the last finished cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: EscalationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleSummary {
    #[must_use]
    pub fn from_report(report: &CycleReport) -> Self {
        Self {
            started_at: report.started_at,
            finished_at: report.finished_at,
            stats: report.stats,
            error: None,
        }
    }
}

/// Observable worker state, shared with the health endpoint.
#[derive(Debug, Default)]
pub struct WorkerStatus {
    running: AtomicBool,
    cycles: AtomicU64,
    last_cycle: RwLock<Option<CycleSummary>>,
}

impl WorkerStatus {
    /// Check if the worker loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Number of cycles finished, successful or not.
    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Summary of the most recent cycle.
    #[must_use]
    pub fn last_cycle(&self) -> Option<CycleSummary> {
        self.last_cycle
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Record a finished cycle.
    pub fn record(&self, summary: CycleSummary) {
        *self.last_cycle.write().unwrap_or_else(|e| e.into_inner()) = Some(summary);
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }
}

/// Periodic driver for [`EscalationJob`].
pub struct EscalationWorker {
    job: Arc<EscalationJob>,
    config: WorkerConfig,
    status: Arc<WorkerStatus>,
}

impl EscalationWorker {
    /// Create a worker. Use [`EscalationWorker::start`] to run it.
    pub fn new(job: Arc<EscalationJob>, config: WorkerConfig) -> Self {
        Self {
            job,
            config,
            status: Arc::new(WorkerStatus::default()),
        }
    }

    /// Share status with another component.
    #[must_use]
    pub fn with_status(mut self, status: Arc<WorkerStatus>) -> Self {
        self.status = status;
        self
    }

    /// Shared status handle.
    #[must_use]
    pub fn status(&self) -> Arc<WorkerStatus> {
        Arc::clone(&self.status)
    }

    /// Spawn the worker loop.
    pub fn start(self) -> WorkerHandle {
        let token = CancellationToken::new();
        let status = self.status();
        status.set_running(true);
        let task = tokio::spawn(self.run(token.clone()));
        WorkerHandle {
            token,
            task,
            status,
        }
    }

    #[instrument(skip_all, fields(interval_secs = self.config.interval.as_secs()))]
    async fn run(self, token: CancellationToken) {
        info!("Escalation worker started");

        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => self.run_once().await,
            }
        }

        self.status.set_running(false);
        info!("Escalation worker stopped");
    }

    async fn run_once(&self) {
        let started_at = Utc::now();
        let summary = match self.job.run_cycle().await {
            Ok(report) => CycleSummary::from_report(&report),
            Err(e) => {
                error!(error = %e, "Escalation cycle failed, retrying on next tick");
                CycleSummary {
                    started_at,
                    finished_at: Utc::now(),
                    stats: EscalationStats::default(),
                    error: Some(e.to_string()),
                }
            }
        };
        self.status.record(summary);
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    status: Arc<WorkerStatus>,
}

impl WorkerHandle {
    /// Shared status handle.
    #[must_use]
    pub fn status(&self) -> Arc<WorkerStatus> {
        Arc::clone(&self.status)
    }

    /// Stop the timer and wait for any in-flight cycle to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Escalation worker task ended abnormally");
            self.status.set_running(false);
        }
    }
}
