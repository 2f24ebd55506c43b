#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reportd::clients::user_info::ProfilePayload;
use reportd::clients::{
    Fetched, MailError, MailTransport, OutgoingMail, UserDataClient, UserDataError,
};
use reportd::config::Config;
use reportd::domain::{IdentityDocument, UserId};
use reportd::state::SharedState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USERNAME: &str = "reporter";
pub const PASSWORD: &str = "s3cret";
pub const BOUNDARY: &str = "reportd-test-boundary";
pub const GOOD_CSV: &[u8] = include_bytes!("../fixtures/good.csv");

#[derive(Default)]
pub struct FakeUsers {
    pub profile_calls: AtomicUsize,
}

#[async_trait]
impl UserDataClient for FakeUsers {
    async fn get_profile(&self, user: &UserId) -> Result<Fetched<ProfilePayload>, UserDataError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Fetched::Available(ProfilePayload {
            wl_id: Some(format!("wl-{user}")),
            country: Some("NL".to_string()),
            ..ProfilePayload::default()
        }))
    }

    async fn get_email(&self, user: &UserId) -> Result<Fetched<String>, UserDataError> {
        Ok(Fetched::Available(format!("{user}@remote.test")))
    }

    async fn get_phone(&self, _user: &UserId) -> Result<Fetched<String>, UserDataError> {
        Ok(Fetched::Unavailable)
    }

    async fn get_documents(
        &self,
        _user: &UserId,
    ) -> Result<Fetched<Vec<IdentityDocument>>, UserDataError> {
        Ok(Fetched::Available(vec![IdentityDocument {
            document_type: Some("PASSPORT".to_string()),
            number: Some("P-1".to_string()),
            ..IdentityDocument::default()
        }]))
    }

    async fn healthcheck(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<FakeUsers>,
    pub outbox: Arc<Outbox>,
    pub storage: tempfile::TempDir,
}

pub fn spawn_app() -> TestApp {
    let storage = tempfile::tempdir().expect("Failed to create storage dir");

    let mut config = Config::default();
    config.auth.username = USERNAME.to_string();
    config.auth.password = PASSWORD.to_string();
    config.reports.storage_dir = storage.path().to_string_lossy().into_owned();
    config.server.service_address = "http://reports.test".to_string();
    config.user_info.after_chunk_delay_ms = 0;

    let users = Arc::new(FakeUsers::default());
    let outbox = Arc::new(Outbox::default());
    let shared = Arc::new(SharedState::from_parts(config, users.clone(), outbox.clone()));
    let router = reportd::api::router(reportd::api::create_app_state(shared, None));

    TestApp {
        router,
        users,
        outbox,
        storage,
    }
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub enum Part<'a> {
    File {
        name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"upload.csv\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(auth: Option<String>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/report")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}
