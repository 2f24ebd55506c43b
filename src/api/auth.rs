use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

use super::{ApiError, AppState};

/// Decoded `Authorization: Basic` credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Rejects the request with `401` unless it carries the configured basic
/// credential.
pub async fn basic_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = &state.shared.config.auth;

    match extract_basic_credentials(request.headers()) {
        Some(credentials)
            if constant_time_eq(credentials.username.as_bytes(), auth.username.as_bytes())
                & constant_time_eq(credentials.password.as_bytes(), auth.password.as_bytes()) =>
        {
            tracing::Span::current().record("user_id", credentials.username.as_str());
            Ok(next.run(request).await)
        }
        _ => Err(ApiError::Unauthorized),
    }
}

pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Compares two byte strings in time independent of where they differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
