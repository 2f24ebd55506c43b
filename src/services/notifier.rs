use std::sync::Arc;

use crate::clients::{MailError, MailTransport, OutgoingMail};
use crate::domain::{AccessPassword, ReportId};

pub const START_SUBJECT: &str = "Report was processing";
pub const FINISH_SUBJECT: &str = "Report was done";

/// Sends the start and completion notices of a report to its recipients.
#[derive(Clone)]
pub struct NotificationSender {
    transport: Arc<dyn MailTransport>,
    sender: String,
}

impl NotificationSender {
    pub fn new(transport: Arc<dyn MailTransport>, sender: impl Into<String>) -> Self {
        Self {
            transport,
            sender: sender.into(),
        }
    }

    pub async fn send_start(&self, id: ReportId, recipients: &[String]) -> Result<(), MailError> {
        self.transport
            .send(self.mail(recipients, START_SUBJECT, start_text(id)))
            .await
    }

    pub async fn send_finish(
        &self,
        id: ReportId,
        password: &AccessPassword,
        url: &str,
        recipients: &[String],
    ) -> Result<(), MailError> {
        self.transport
            .send(self.mail(recipients, FINISH_SUBJECT, finish_text(id, password, url)))
            .await
    }

    fn mail(&self, recipients: &[String], subject: &str, text: String) -> OutgoingMail {
        OutgoingMail {
            sender: self.sender.clone(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            text,
        }
    }
}

fn start_text(id: ReportId) -> String {
    format!("We started to generate a report with id {id}")
}

fn finish_text(id: ReportId, password: &AccessPassword, url: &str) -> String {
    format!(
        "Password for report with id {id} is {}.\nYou can download report by link {url}",
        password.expose()
    )
}
