mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use common::{GOOD_CSV, PASSWORD, Part, USERNAME, basic_auth, spawn_app, upload_request};
use http_body_util::BodyExt;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt;

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn good_upload(auth: Option<String>) -> Request<Body> {
    upload_request(
        auth,
        &[
            Part::File {
                name: "source_file",
                content_type: "text/csv",
                bytes: GOOD_CSV,
            },
            Part::Text {
                name: "recipients",
                value: "first@test.env, second@test.env",
            },
        ],
    )
}

async fn wait_for_state(app: &Router, id: &str, expected: &str) -> serde_json::Value {
    for _ in 0..100 {
        let response = get(app, &format!("/report/{id}/status")).await;
        if response.status() == StatusCode::OK {
            let json = body_json(response).await;
            if json["state"] == expected {
                return json;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("report {id} never reached state {expected}");
}

#[tokio::test]
async fn test_report_lifecycle() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(good_upload(Some(basic_auth(USERNAME, PASSWORD))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let url = String::from_utf8(body_bytes(response).await).unwrap();
    let id = url
        .strip_prefix("http://reports.test/report/")
        .expect("download url")
        .to_string();
    assert!(id.chars().all(|c| c.is_ascii_digit()));

    let status = wait_for_state(&app.router, &id, "archived").await;
    assert_eq!(status["report_id"], id.as_str());
    assert!(status["error"].is_null());

    let response = get(&app.router, &format!("/report/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=report.zip"
    );
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-zip-compressed"
    );
    let archive_bytes = body_bytes(response).await;
    assert!(!archive_bytes.is_empty());

    assert_eq!(app.users.profile_calls.load(Ordering::SeqCst), 3);

    let sent = app.outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Report was processing");
    assert_eq!(sent[0].recipients, vec!["first@test.env", "second@test.env"]);
    assert_eq!(sent[1].subject, "Report was done");
    assert!(sent[1].text.contains(&url));

    let password = sent[1]
        .text
        .split(" is ")
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .unwrap()
        .to_string();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();
    let mut xlsx = Vec::new();
    archive
        .by_name_decrypt("report.xlsx", password.as_bytes())
        .unwrap()
        .read_to_end(&mut xlsx)
        .unwrap();

    let mut workbook = zip::ZipArchive::new(std::io::Cursor::new(xlsx)).unwrap();
    let mut shared = String::new();
    workbook
        .by_name("xl/sharedStrings.xml")
        .unwrap()
        .read_to_string(&mut shared)
        .unwrap();
    for expected in [
        "user_uid",
        "amount",
        "first@test.env",
        "third@test.env",
        "wl-0b6f4f2e-1c1a-4c6e-9f55-9d3c1f0a7b21",
        "passport_number",
        "P-1",
    ] {
        assert!(shared.contains(expected), "{expected} missing from workbook");
    }
    // The uploaded email column wins over the fetched one.
    assert!(!shared.contains("@remote.test"));
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let app = spawn_app();

    let response = get(&app.router, "/report/123456").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(json["message"].is_string());

    let response = get(&app.router, "/report/123456/status").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, "/report/..%2Fsecret").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upload_requires_basic_auth() {
    let app = spawn_app();

    let response = app.router.clone().oneshot(good_upload(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Basic");
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let response = app
        .router
        .clone()
        .oneshot(good_upload(Some(basic_auth(USERNAME, "wrong"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.outbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_html_upload_is_rejected_before_job_creation() {
    let app = spawn_app();

    let request = upload_request(
        Some(basic_auth(USERNAME, PASSWORD)),
        &[
            Part::File {
                name: "source_file",
                content_type: "text/html",
                bytes: b"<html></html>",
            },
            Part::Text {
                name: "recipients",
                value: "first@test.env",
            },
        ],
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.users.profile_calls.load(Ordering::SeqCst), 0);
    assert!(app.outbox.sent.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(app.storage.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_recipients_is_a_validation_error() {
    let app = spawn_app();

    let request = upload_request(
        Some(basic_auth(USERNAME, PASSWORD)),
        &[Part::File {
            name: "source_file",
            content_type: "text/csv",
            bytes: GOOD_CSV,
        }],
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_FAILED");
    assert_eq!(json["details"].as_array().unwrap().len(), 1);
    assert_eq!(json["details"][0]["field"], "body.recipients");
    assert_eq!(json["details"][0]["code"], "VALUE_ERROR.MISSING");
}

#[tokio::test]
async fn test_invalid_recipients_are_rejected() {
    let app = spawn_app();

    let request = upload_request(
        Some(basic_auth(USERNAME, PASSWORD)),
        &[
            Part::File {
                name: "source_file",
                content_type: "text/csv",
                bytes: GOOD_CSV,
            },
            Part::Text {
                name: "recipients",
                value: "first@test.env,definitely not an address",
            },
        ],
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Invalid list of recipients"
    );

    let request = upload_request(
        Some(basic_auth(USERNAME, PASSWORD)),
        &[
            Part::File {
                name: "source_file",
                content_type: "text/csv",
                bytes: GOOD_CSV,
            },
            Part::Text {
                name: "recipients",
                value: "first@test.env,",
            },
        ],
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.users.profile_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_job_is_visible_in_status() {
    let app = spawn_app();

    let request = upload_request(
        Some(basic_auth(USERNAME, PASSWORD)),
        &[
            Part::File {
                name: "source_file",
                content_type: "text/csv",
                bytes: b"id,email\n1,a@test.env\n",
            },
            Part::Text {
                name: "recipients",
                value: "first@test.env",
            },
        ],
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let url = String::from_utf8(body_bytes(response).await).unwrap();
    let id = url.rsplit('/').next().unwrap().to_string();

    let status = wait_for_state(&app.router, &id, "failed").await;
    assert!(status["error"].as_str().unwrap().contains("user_uid"));

    let response = get(&app.router, &format!("/report/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_system_endpoints() {
    let app = spawn_app();

    let response = get(&app.router, "/ping").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"ping": "pong"}));

    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"user_info": true})
    );

    let response = get(&app.router, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app.router, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
