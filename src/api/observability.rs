//! Prometheus scrape endpoint and per-request logging.

use axum::extract::{MatchedPath, Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, field, info, info_span};
use uuid::Uuid;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::api::AppState;

/// Health and scrape routes are counted in metrics but never logged.
const QUIET_PATHS: [&str; 3] = ["/ping", "/health", "/metrics"];

/// Prometheus text format, or a short notice when the exporter is off.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .prometheus_handle
        .as_ref()
        .map_or_else(
            || "metrics exporter is disabled".to_string(),
            PrometheusHandle::render,
        )
        .into_response()
}

fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "error"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "success"
    }
}

fn record_request(method: &Method, route: &str, status: StatusCode, started: Instant) {
    let labels = [
        ("method", method.as_str().to_string()),
        ("path", route.to_string()),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

/// Opens a `request` span carrying a fresh request id, then records metrics
/// and a completion line once the handler has answered.
///
/// The `user_id` field is left empty here and filled by the basic auth layer.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    // Route templates keep label cardinality bounded; raw paths carry ids.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |m| m.as_str().to_string());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        path = %path,
        route = %route,
        user_id = field::Empty,
    );

    async move {
        let response = next.run(req).await;
        let status = response.status();
        record_request(&method, &route, status, started);

        if !QUIET_PATHS.contains(&path.as_str()) {
            info!(
                status_code = status.as_u16(),
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                outcome = outcome(status),
                user_agent = %user_agent,
                "Request finished"
            );
        }
        response
    }
    .instrument(span)
    .await
}
