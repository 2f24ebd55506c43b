pub mod mail;
pub mod user_info;

pub use mail::{MailError, MailTransport, OutgoingMail, SmtpMailer};
pub use user_info::{Fetched, HttpUserDataClient, UserDataClient, UserDataError};
