use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::domain::ReportId;

/// How long a failure stays visible through the status endpoint.
pub const FAILED_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Upper bound on remembered failures; the oldest go first.
pub const MAX_FAILED: usize = 1024;

/// Lifecycle of one report job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Created,
    Generating,
    Archived,
    Failed(String),
}

impl JobState {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Generating => "generating",
            Self::Archived => "archived",
            Self::Failed(_) => "failed",
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    state: JobState,
    updated: Instant,
}

/// In-memory states of jobs that are running or recently failed.
///
/// Archived jobs are not kept: the archive on disk is their record. Failures
/// are dropped after `failed_retention`, and beyond `max_failed` entries.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<ReportId, Entry>>,
    failed_retention: Duration,
    max_failed: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(FAILED_RETENTION, MAX_FAILED)
    }
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retention(failed_retention: Duration, max_failed: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            failed_retention,
            max_failed,
        }
    }

    pub fn set(&self, id: ReportId, state: JobState) {
        let now = Instant::now();
        if let Ok(mut jobs) = self.jobs.write() {
            if state == JobState::Archived {
                jobs.remove(&id);
            } else {
                jobs.insert(id, Entry { state, updated: now });
            }
            self.prune(&mut jobs, now);
        }

        #[allow(clippy::cast_precision_loss)]
        let tracked = self.tracked() as f64;
        metrics::gauge!("report_jobs_tracked").set(tracked);
    }

    #[must_use]
    pub fn get(&self, id: ReportId) -> Option<JobState> {
        self.jobs.read().ok()?.get(&id).map(|entry| entry.state.clone())
    }

    /// Number of jobs currently held in memory.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.jobs.read().map_or(0, |jobs| jobs.len())
    }

    fn prune(&self, jobs: &mut HashMap<ReportId, Entry>, now: Instant) {
        jobs.retain(|_, entry| {
            !matches!(entry.state, JobState::Failed(_))
                || now.duration_since(entry.updated) <= self.failed_retention
        });

        let mut failed: Vec<(Instant, ReportId)> = jobs
            .iter()
            .filter(|(_, entry)| matches!(entry.state, JobState::Failed(_)))
            .map(|(id, entry)| (entry.updated, *id))
            .collect();

        if failed.len() > self.max_failed {
            failed.sort_unstable();
            let excess = failed.len() - self.max_failed;
            for (_, id) in failed.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }
    }
}
