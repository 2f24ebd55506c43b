//! Report jobs: creation, background generation and storage layout.
//!
//! Creating a job is synchronous and cheap. Generation runs as a detached
//! task: read the uploaded table, enrich every row from the identity service,
//! merge, write the encrypted archive, then email the password and link.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::clients::{MailTransport, UserDataClient, UserDataError};
use crate::config::Config;
use crate::domain::{AccessPassword, ReportId, ReportIdGenerator};

use super::aggregator::UserAggregator;
use super::archive::{ArchiveError, build_archive};
use super::merge::{SourceTable, SourceTableError, merge};
use super::notifier::NotificationSender;
use super::registry::{JobRegistry, JobState};
use super::timing::StageTimer;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Source(#[from] SourceTableError),

    #[error(transparent)]
    UserData(#[from] UserDataError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// One accepted report request, consumed by generation.
#[derive(Debug)]
pub struct ReportJob {
    pub id: ReportId,
    password: AccessPassword,
    recipients: Vec<String>,
    source: Vec<u8>,
}

impl ReportJob {
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}

pub struct ReportService {
    ids: ReportIdGenerator,
    aggregator: UserAggregator,
    notifier: NotificationSender,
    registry: JobRegistry,
    storage_dir: PathBuf,
    service_address: String,
    compression_level: i64,
}

impl ReportService {
    pub fn new(
        config: &Config,
        user_client: Arc<dyn UserDataClient>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            ids: ReportIdGenerator::new(),
            aggregator: UserAggregator::new(
                user_client,
                config.user_info.chunk_size,
                Duration::from_millis(config.user_info.after_chunk_delay_ms),
            ),
            notifier: NotificationSender::new(mailer, config.email.sender.clone()),
            registry: JobRegistry::new(),
            storage_dir: PathBuf::from(&config.reports.storage_dir),
            service_address: config.server.service_address.trim_end_matches('/').to_string(),
            compression_level: config.reports.compression_level,
        }
    }

    /// Allocates an id and a password. Does not start any work.
    pub fn create(&self, source: Vec<u8>, recipients: Vec<String>) -> ReportJob {
        let id = self.ids.next_id();
        self.registry.set(id, JobState::Created);
        metrics::counter!("reports_created_total").increment(1);

        ReportJob {
            id,
            password: AccessPassword::generate(),
            recipients,
            source,
        }
    }

    #[must_use]
    pub fn report_path(&self, id: ReportId) -> PathBuf {
        self.storage_dir.join(format!("report_{id}.zip"))
    }

    #[must_use]
    pub fn report_url(&self, id: ReportId) -> String {
        format!("{}/report/{id}", self.service_address)
    }

    /// Registry state, or `Archived` for an archive left by an earlier run.
    pub async fn status(&self, id: ReportId) -> Option<JobState> {
        if let Some(state) = self.registry.get(id) {
            return Some(state);
        }
        tokio::fs::try_exists(self.report_path(id))
            .await
            .unwrap_or(false)
            .then_some(JobState::Archived)
    }

    /// Runs generation on a detached task; no handle is kept by the caller.
    ///
    /// A panic inside the job is caught at the task boundary and recorded as
    /// a failure of that job only.
    pub fn spawn(self: &Arc<Self>, job: ReportJob) {
        let id = job.id;
        let worker = {
            let service = Arc::clone(self);
            // `generate` logs and records its own errors.
            tokio::spawn(async move { service.generate(job).await.ok() })
        };

        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(report_id = %id, error = %e, "Report task aborted");
                service.record_failure(id, format!("report task aborted: {e}"));
            }
        });
    }

    /// Runs the whole pipeline once and records the outcome in the registry.
    pub async fn generate(&self, job: ReportJob) -> Result<u64, ReportError> {
        let id = job.id;
        let span = info_span!("report", report_id = %id);

        async move {
            self.registry.set(id, JobState::Generating);

            match self.run_pipeline(&job).await {
                Ok(size) => Ok(size),
                Err(e) => {
                    error!(error = %e, "Report generation failed");
                    self.record_failure(id, e.to_string());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn record_failure(&self, id: ReportId, reason: String) {
        self.registry.set(id, JobState::Failed(reason));
        metrics::counter!("reports_failed_total").increment(1);
    }

    async fn run_pipeline(&self, job: &ReportJob) -> Result<u64, ReportError> {
        let mut timer = StageTimer::start();

        let source = SourceTable::from_csv(&job.source)?;
        timer.lap("read_source");
        info!(rows = source.row_count(), "Source table loaded");

        if let Err(e) = self.notifier.send_start(job.id, &job.recipients).await {
            notification_failed("start", &e);
        }

        let users = self.aggregator.fetch_all(&source.user_ids()).await?;
        timer.lap("fetch_users");

        let table = merge(&source, &users);
        timer.lap("merge");

        let size = build_archive(
            table,
            self.report_path(job.id),
            job.password.expose().to_string(),
            self.compression_level,
        )
        .await?;
        timer.lap("archive");

        self.registry.set(job.id, JobState::Archived);
        metrics::counter!("reports_completed_total").increment(1);
        info!(
            bytes = size,
            stages = %timer,
            total_ms = u64::try_from(timer.total().as_millis()).unwrap_or(u64::MAX),
            "Report archived"
        );

        let url = self.report_url(job.id);
        if let Err(e) = self
            .notifier
            .send_finish(job.id, &job.password, &url, &job.recipients)
            .await
        {
            notification_failed("finish", &e);
        }

        Ok(size)
    }
}

fn notification_failed(kind: &'static str, error: &crate::clients::MailError) {
    warn!(kind, error = %error, "Failed to send notification");
    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
}
