use std::sync::Arc;

use crate::clients::{HttpUserDataClient, MailTransport, SmtpMailer, UserDataClient};
use crate::config::Config;
use crate::services::ReportService;

/// Every long-lived dependency of the service, built once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub user_client: Arc<dyn UserDataClient>,

    pub reports: Arc<ReportService>,
}

impl SharedState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let user_client: Arc<dyn UserDataClient> =
            Arc::new(HttpUserDataClient::new(&config.user_info)?);
        let mailer: Arc<dyn MailTransport> = Arc::new(SmtpMailer::new(&config.email)?);

        Ok(Self::from_parts(config, user_client, mailer))
    }

    /// Wires the state around caller-supplied collaborators.
    pub fn from_parts(
        config: Config,
        user_client: Arc<dyn UserDataClient>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        let reports = Arc::new(ReportService::new(&config, user_client.clone(), mailer));

        Self {
            config: Arc::new(config),
            user_client,
            reports,
        }
    }
}
