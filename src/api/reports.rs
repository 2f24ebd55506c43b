use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::validation::{validate_csv_content_type, validate_recipients};
use super::{ApiError, AppState, FieldError};
use crate::domain::ReportId;

const SOURCE_FILE_FIELD: &str = "source_file";
const RECIPIENTS_FIELD: &str = "recipients";
const ZIP_CONTENT_TYPE: &str = "application/x-zip-compressed";
const DOWNLOAD_DISPOSITION: &str = "attachment; filename=report.zip";

#[derive(Debug, Serialize)]
pub struct ReportStatusResponse {
    pub report_id: ReportId,
    pub state: &'static str,
    pub error: Option<String>,
}

struct UploadForm {
    source: Option<(Option<String>, Vec<u8>)>,
    recipients: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        source: None,
        recipients: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed form data: {e}")))?
    {
        match field.name() {
            Some(SOURCE_FILE_FIELD) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
                form.source = Some((content_type, bytes.to_vec()));
            }
            Some(RECIPIENTS_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read recipients: {e}")))?;
                form.recipients = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

fn missing_fields(form: &UploadForm) -> Vec<FieldError> {
    let mut missing = Vec::new();
    if form.source.is_none() {
        missing.push(FieldError::missing(format!("body.{SOURCE_FILE_FIELD}")));
    }
    if form.recipients.is_none() {
        missing.push(FieldError::missing(format!("body.{RECIPIENTS_FIELD}")));
    }
    missing
}

/// `POST /report`
///
/// Accepts the CSV and recipient list, schedules generation and answers with
/// the future download link.
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let form = match multipart {
        Ok(multipart) => read_form(multipart).await?,
        Err(_) => UploadForm {
            source: None,
            recipients: None,
        },
    };

    let missing = missing_fields(&form);
    let (Some((content_type, source)), Some(raw_recipients)) = (form.source, form.recipients)
    else {
        return Err(ApiError::Validation(missing));
    };

    validate_csv_content_type(content_type.as_deref())?;
    let recipients = validate_recipients(&raw_recipients)?;

    let reports = &state.shared.reports;
    let job = reports.create(source, recipients);
    let url = reports.report_url(job.id);

    tracing::info!(
        report_id = %job.id,
        recipients = job.recipients().len(),
        "Report accepted"
    );
    reports.spawn(job);

    Ok((
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        url,
    )
        .into_response())
}

fn parse_report_id(raw: &str) -> Result<ReportId, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found("Report", raw))
}

/// `GET /report/{id}`
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_report_id(&raw_id)?;
    let path = state.shared.reports.report_path(id);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Report", id));
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, ZIP_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, DOWNLOAD_DISPOSITION),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// `GET /report/{id}/status`
pub async fn report_status(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ReportStatusResponse>, ApiError> {
    let id = parse_report_id(&raw_id)?;
    let job_state = state
        .shared
        .reports
        .status(id)
        .await
        .ok_or_else(|| ApiError::not_found("Report", id))?;

    Ok(Json(ReportStatusResponse {
        report_id: id,
        state: job_state.label(),
        error: job_state.error().map(str::to_string),
    }))
}
