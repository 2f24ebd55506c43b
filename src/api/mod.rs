use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
mod observability;
pub mod reports;
mod system;
pub mod validation;

pub use error::{ApiError, FieldError};

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config)?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config().server.max_upload_bytes();

    let protected_routes = Router::new()
        .route("/report", post(reports::create_report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth_middleware,
        ));

    Router::new()
        .merge(protected_routes)
        .route("/report/{id}", get(reports::download_report))
        .route("/report/{id}/status", get(reports::report_status))
        .route("/ping", get(system::ping))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .fallback(system::not_found)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state)
}
