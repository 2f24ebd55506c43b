use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use reportd::clients::{HttpUserDataClient, UserDataClient, UserDataError};
use reportd::config::UserInfoConfig;
use reportd::domain::UserId;
use serde_json::json;

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn profile(Path(uid): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match uid.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "numeric" => Json(json!({ "wl_id": 12345, "country": "NL", "date_of_birth": null }))
            .into_response(),
        "nested" => Json(json!({ "wl_id": { "id": 12345 } })).into_response(),
        _ => Json(json!({
            "wl_id": "wl-7",
            "country": "NL",
            "first_name": "Anna",
            "language": "nl",
            "unexpected": [1, 2, 3]
        }))
        .into_response(),
    }
}

async fn email(Path(uid): Path<String>) -> Response {
    match uid.as_str() {
        "flaky" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({ "email": format!("{uid}@remote.test") })).into_response(),
    }
}

async fn phone(Path(uid): Path<String>) -> Response {
    match uid.as_str() {
        "numeric" => Json(json!({ "phone": 31_000_000 })).into_response(),
        _ => Json(json!({ "phone": "+31000000" })).into_response(),
    }
}

async fn applicants(Path(uid): Path<String>) -> Response {
    if uid == "garbled" {
        return (
            [(header::CONTENT_TYPE, "application/json")],
            "{\"list\": [not json",
        )
            .into_response();
    }
    Json(json!({
        "list": { "items": [
            {
                "review": { "reviewResult": { "reviewAnswer": "RED" } },
                "info": { "idDocs": [{ "idDocType": "PASSPORT", "number": "REJECTED" }] }
            },
            {
                "review": { "reviewResult": { "reviewAnswer": "GREEN" } },
                "info": { "idDocs": [
                    { "idDocType": "PASSPORT", "number": "P-1", "firstNameEn": "Anna" },
                    { "idDocType": "PASSPORT", "number": "P-2" },
                    { "idDocType": "DRIVERS", "number": "D-1" }
                ] }
            }
        ] }
    }))
    .into_response()
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/profiles/{uid}", get(profile))
        .route("/profiles/{uid}/email", get(email))
        .route("/profiles/{uid}/phone", get(phone))
        .route("/applicants/by_user_uid/{uid}", get(applicants))
        .route("/v1/ping", get(ping));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn client(base_url: String) -> HttpUserDataClient {
    let config = UserInfoConfig {
        base_url,
        token: Some(TOKEN.to_string()),
        timeout_seconds: 2,
        ..UserInfoConfig::default()
    };
    HttpUserDataClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_user_assembles_all_fields() {
    let client = client(spawn_upstream().await);

    let user = client.fetch_user(&UserId::new("u-1")).await.unwrap();

    assert_eq!(user.user_uid.as_str(), "u-1");
    assert_eq!(user.wl_id, "wl-7");
    assert_eq!(user.first_name, "Anna");
    assert_eq!(user.email, "u-1@remote.test");
    assert_eq!(user.phone, "+31000000");
    assert_eq!(user.patronymic, "");

    let numbers: Vec<_> = user
        .documents
        .iter()
        .filter_map(|d| d.number.as_deref())
        .collect();
    assert_eq!(numbers, vec!["P-1", "D-1"]);

    let flat = user.flatten();
    assert_eq!(flat.get("passport_first_name_en"), Some("Anna"));
    assert_eq!(flat.get("drivers_number"), Some("D-1"));
}

#[tokio::test]
async fn test_failed_sub_calls_degrade_to_defaults() {
    let client = client(spawn_upstream().await);

    let user = client.fetch_user(&UserId::new("flaky")).await.unwrap();
    assert_eq!(user.email, "");
    assert_eq!(user.phone, "+31000000");
    assert_eq!(user.country, "NL");

    let user = client.fetch_user(&UserId::new("missing")).await.unwrap();
    assert_eq!(user.user_uid.as_str(), "missing");
    assert_eq!(user.wl_id, "");
    assert_eq!(user.country, "");
    assert_eq!(user.email, "missing@remote.test");
    assert_eq!(user.documents.len(), 2);
}

#[tokio::test]
async fn test_malformed_payload_is_a_hard_error() {
    let client = client(spawn_upstream().await);

    let result = client.fetch_user(&UserId::new("garbled")).await;
    assert!(matches!(
        result,
        Err(UserDataError::Malformed {
            endpoint: "documents",
            ..
        })
    ));
}

#[tokio::test]
async fn test_numeric_scalars_are_kept_as_text() {
    let client = client(spawn_upstream().await);

    let user = client.fetch_user(&UserId::new("numeric")).await.unwrap();
    assert_eq!(user.wl_id, "12345");
    assert_eq!(user.phone, "31000000");
    assert_eq!(user.country, "NL");
    assert_eq!(user.date_of_birth, "");

    let result = client.fetch_user(&UserId::new("nested")).await;
    assert!(matches!(
        result,
        Err(UserDataError::Malformed {
            endpoint: "profile",
            ..
        })
    ));
}

#[tokio::test]
async fn test_missing_token_is_treated_as_unavailable() {
    let config = UserInfoConfig {
        base_url: spawn_upstream().await,
        token: None,
        ..UserInfoConfig::default()
    };
    let client = HttpUserDataClient::new(&config).unwrap();

    let user = client.fetch_user(&UserId::new("u-1")).await.unwrap();
    assert_eq!(user.wl_id, "");
    assert_eq!(user.email, "u-1@remote.test");
}

#[tokio::test]
async fn test_healthcheck() {
    let healthy = client(spawn_upstream().await);
    assert!(healthy.healthcheck().await);

    let unreachable = client(closed_port_url());
    assert!(!unreachable.healthcheck().await);
}

#[tokio::test]
async fn test_unreachable_service_yields_empty_records() {
    let unreachable = client(closed_port_url());
    let user = unreachable.fetch_user(&UserId::new("u-1")).await.unwrap();
    assert_eq!(user.user_uid.as_str(), "u-1");
    assert_eq!(user.email, "");
    assert!(user.documents.is_empty());
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}
