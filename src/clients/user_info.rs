//! Client for the remote identity service.
//!
//! Every user is assembled from four independent calls (profile, email,
//! phone, verified documents). Transport failures and error statuses degrade
//! the affected field to its default; a response that arrives but cannot be
//! decoded is a hard error and is returned to the caller.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::UserInfoConfig;
use crate::domain::{IdentityDocument, UserId, UserRecord, scalar_text};

const DEPENDENCY_NAME: &str = "UserInfoClient";
const HEALTH_PATH: &str = "/v1/ping";

/// Review answer the identity service uses for a passed verification.
pub const VERIFIED_REVIEW_ANSWER: &str = "GREEN";

#[derive(Debug, Error)]
pub enum UserDataError {
    #[error("malformed {endpoint} response for user {user}: {source}")]
    Malformed {
        endpoint: &'static str,
        user: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of one failure-tolerant field fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Available(T),
    Unavailable,
}

impl<T> Fetched<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }
}

impl<T: Default> Fetched<T> {
    pub fn or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

/// Base profile as returned by `/profiles/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfilePayload {
    #[serde(deserialize_with = "scalar_text")]
    pub wl_id: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub country: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub registration_date: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub registration_platform: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub language: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub patronymic: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub address: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailPayload {
    #[serde(deserialize_with = "scalar_text")]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhonePayload {
    #[serde(deserialize_with = "scalar_text")]
    phone: Option<String>,
}

/// Applicant list as returned by `/applicants/by_user_uid/{uid}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicantsPayload {
    list: Option<ApplicantList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicantList {
    items: Option<Vec<Applicant>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Applicant {
    review: Option<Review>,
    info: Option<ApplicantInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Review {
    #[serde(rename = "reviewResult")]
    review_result: Option<ReviewResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReviewResult {
    #[serde(rename = "reviewAnswer")]
    review_answer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicantInfo {
    #[serde(rename = "idDocs")]
    id_docs: Vec<IdentityDocument>,
}

impl Applicant {
    fn is_verified(&self) -> bool {
        self.review
            .as_ref()
            .and_then(|r| r.review_result.as_ref())
            .and_then(|r| r.review_answer.as_deref())
            == Some(VERIFIED_REVIEW_ANSWER)
    }
}

/// Keeps documents of verified applicants only, first occurrence of each
/// document type wins (scanning in upstream order).
#[must_use]
pub fn verified_documents(payload: ApplicantsPayload) -> Vec<IdentityDocument> {
    let applicants = payload
        .list
        .and_then(|list| list.items)
        .unwrap_or_default();

    let mut seen_types = HashSet::new();
    applicants
        .into_iter()
        .filter(Applicant::is_verified)
        .filter_map(|applicant| applicant.info)
        .flat_map(|info| info.id_docs)
        .filter(|document| seen_types.insert(document.document_type.clone()))
        .collect()
}

/// Builds a user from the four per-field results.
///
/// An unavailable profile leaves every profile field empty; the contact and
/// document fields still come from their own calls.
#[must_use]
pub fn assemble_record(
    user: &UserId,
    profile: Fetched<ProfilePayload>,
    email: Fetched<String>,
    phone: Fetched<String>,
    documents: Fetched<Vec<IdentityDocument>>,
) -> UserRecord {
    let profile = profile.or_default();
    UserRecord {
        user_uid: user.clone(),
        wl_id: profile.wl_id.unwrap_or_default(),
        email: email.or_default(),
        phone: phone.or_default(),
        country: profile.country.unwrap_or_default(),
        registration_date: profile.registration_date.unwrap_or_default(),
        registration_platform: profile.registration_platform.unwrap_or_default(),
        language: profile.language.unwrap_or_default(),
        first_name: profile.first_name.unwrap_or_default(),
        last_name: profile.last_name.unwrap_or_default(),
        patronymic: profile.patronymic.unwrap_or_default(),
        address: profile.address.unwrap_or_default(),
        date_of_birth: profile.date_of_birth.unwrap_or_default(),
        documents: documents.or_default(),
    }
}

/// Source of user data, one method per remote call.
#[async_trait]
pub trait UserDataClient: Send + Sync {
    async fn get_profile(&self, user: &UserId) -> Result<Fetched<ProfilePayload>, UserDataError>;

    async fn get_email(&self, user: &UserId) -> Result<Fetched<String>, UserDataError>;

    async fn get_phone(&self, user: &UserId) -> Result<Fetched<String>, UserDataError>;

    /// Verified documents only, at most one per document type.
    async fn get_documents(
        &self,
        user: &UserId,
    ) -> Result<Fetched<Vec<IdentityDocument>>, UserDataError>;

    async fn healthcheck(&self) -> bool;

    /// Issues the four calls concurrently and assembles the full record.
    async fn fetch_user(&self, user: &UserId) -> Result<UserRecord, UserDataError> {
        let (profile, email, phone, documents) = tokio::try_join!(
            self.get_profile(user),
            self.get_email(user),
            self.get_phone(user),
            self.get_documents(user),
        )?;
        Ok(assemble_record(user, profile, email, phone, documents))
    }
}

pub struct HttpUserDataClient {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpUserDataClient {
    pub fn new(config: &UserInfoConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("User info token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(DEPENDENCY_NAME)
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls)
            .pool_max_idle_per_host(config.chunk_size.saturating_mul(4))
            .build()
            .context("Failed to build user info HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(config.health_timeout_seconds),
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: String,
        user: &UserId,
    ) -> Result<Fetched<T>, UserDataError> {
        let url = format!("{}{path}", self.base_url);
        let start = Instant::now();
        debug!(dependency = DEPENDENCY_NAME, %url, "Request");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                info!(dependency = DEPENDENCY_NAME, endpoint, user = %user, error = %e, "Request failed");
                return Ok(Fetched::Unavailable);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                info!(dependency = DEPENDENCY_NAME, endpoint, user = %user, error = %e, "Failed to read response body");
                return Ok(Fetched::Unavailable);
            }
        };

        debug!(
            dependency = DEPENDENCY_NAME,
            endpoint,
            status = status.as_u16(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Response"
        );

        if !status.is_success() {
            debug!(
                dependency = DEPENDENCY_NAME,
                endpoint,
                body = %String::from_utf8_lossy(&body),
                "Unsuccessful response"
            );
            return Ok(Fetched::Unavailable);
        }

        serde_json::from_slice(&body)
            .map(Fetched::Available)
            .map_err(|source| UserDataError::Malformed {
                endpoint,
                user: user.to_string(),
                source,
            })
    }
}

fn encode(user: &UserId) -> String {
    urlencoding::encode(user.as_str()).into_owned()
}

#[async_trait]
impl UserDataClient for HttpUserDataClient {
    async fn get_profile(&self, user: &UserId) -> Result<Fetched<ProfilePayload>, UserDataError> {
        self.fetch("profile", format!("/profiles/{}", encode(user)), user)
            .await
    }

    async fn get_email(&self, user: &UserId) -> Result<Fetched<String>, UserDataError> {
        let payload: Fetched<EmailPayload> = self
            .fetch("email", format!("/profiles/{}/email", encode(user)), user)
            .await?;
        Ok(match payload {
            Fetched::Available(p) => Fetched::Available(p.email.unwrap_or_default()),
            Fetched::Unavailable => Fetched::Unavailable,
        })
    }

    async fn get_phone(&self, user: &UserId) -> Result<Fetched<String>, UserDataError> {
        let payload: Fetched<PhonePayload> = self
            .fetch("phone", format!("/profiles/{}/phone", encode(user)), user)
            .await?;
        Ok(match payload {
            Fetched::Available(p) => Fetched::Available(p.phone.unwrap_or_default()),
            Fetched::Unavailable => Fetched::Unavailable,
        })
    }

    async fn get_documents(
        &self,
        user: &UserId,
    ) -> Result<Fetched<Vec<IdentityDocument>>, UserDataError> {
        let payload: Fetched<ApplicantsPayload> = self
            .fetch(
                "documents",
                format!("/applicants/by_user_uid/{}", encode(user)),
                user,
            )
            .await?;
        Ok(match payload {
            Fetched::Available(p) => Fetched::Available(verified_documents(p)),
            Fetched::Unavailable => Fetched::Unavailable,
        })
    }

    async fn healthcheck(&self) -> bool {
        let url = format!("{}{HEALTH_PATH}", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                warn!(dependency = DEPENDENCY_NAME, error = %e, "Health check failed");
                false
            }
        }
    }
}
