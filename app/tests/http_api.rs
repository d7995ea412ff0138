//! HTTP API integration tests against in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::{TestResponse, TestServer};
use chrono::Duration;
use common::{LIVE_ROUTE, TestApp};
use serde_json::{Value, json};
use shuttle_app::api::qr::{QrCredentialResponse, VerifyResponse};
use shuttle_app::api::runs::RunResponse;
use shuttle_app::api::shuttle::CountResponse;
use shuttle_testing::fixtures;

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn server(app: &TestApp) -> TestServer {
    TestServer::new(app.router()).expect("test server")
}

fn error_code(response: &TestResponse) -> String {
    response.json::<Value>()["code"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

async fn verify(server: &TestServer, token: &str, qr_code: &str, route_id: i64) -> TestResponse {
    let (name, value) = bearer(token);
    server
        .post("/api/qr/verify")
        .add_header(name, value)
        .json(&json!({ "qr_code": qr_code, "route_id": route_id }))
        .await
}

#[tokio::test]
async fn test_health_needs_no_credential() {
    let app = TestApp::new();
    let response = server(&app).get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_bad_bearer_is_unauthorized() {
    let app = TestApp::new();
    let server = server(&app);

    let response = server.get("/api/users/me/qr").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("not.a.token");
    let response = server.get("/api/shuttle/rides").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rider_fetches_and_regenerates_qr() {
    let app = TestApp::new();
    let server = server(&app);
    let token = app.alice_token();

    let (name, value) = bearer(&token);
    let first = server
        .get("/api/users/me/qr")
        .add_header(name.clone(), value.clone())
        .await;
    first.assert_status_ok();
    let first = first.json::<QrCredentialResponse>().qr_code;

    let again = server
        .get("/api/users/me/qr")
        .add_header(name.clone(), value.clone())
        .await
        .json::<QrCredentialResponse>()
        .qr_code;
    assert_eq!(first, again);

    let fresh = server.post("/api/users/me/qr").add_header(name, value).await;
    assert_eq!(fresh.status_code(), StatusCode::CREATED);
    let fresh = fresh.json::<QrCredentialResponse>().qr_code;
    assert_ne!(first, fresh);

    let payload = app.codec.decode(&fresh).expect("decodes");
    assert_eq!(payload.user_id, fixtures::ALICE);
}

#[tokio::test]
async fn test_operator_boards_rider_then_duplicate_conflicts() {
    let app = TestApp::new();
    let server = server(&app);
    let operator = app.operator_token();
    let qr = app.alice_qr();

    let response = verify(&server, &operator, &qr, fixtures::COMMUTE_ROUTE.0).await;
    response.assert_status_ok();
    let body = response.json::<VerifyResponse>();
    assert_eq!(body.user_name, "Alice Kim");
    assert_eq!(body.departure, "Osong Station");
    assert_eq!(body.destination, "Sejong Government Complex");
    assert_eq!(body.rider_count, Some(1));
    assert_eq!(app.store.records().len(), 1);

    let response = verify(&server, &operator, &qr, fixtures::COMMUTE_ROUTE.0).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "DUPLICATE_BOARDING");
    assert_eq!(app.store.records().len(), 1);
}

#[tokio::test]
async fn test_verify_rejections() {
    let app = TestApp::new();
    let server = server(&app);
    let operator = app.operator_token();
    let qr = app.alice_qr();

    let mut tampered = qr.clone().into_bytes();
    let mid = tampered.len() / 2;
    tampered[mid] = if tampered[mid] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();
    let response = verify(&server, &operator, &tampered, fixtures::COMMUTE_ROUTE.0).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "INVALID_QR_CODE");

    let response = verify(&server, &operator, &qr, 999).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = verify(&server, &app.alice_token(), &qr, fixtures::COMMUTE_ROUTE.0).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    assert!(app.store.records().is_empty());
}

#[tokio::test]
async fn test_rides_list_callers_boardings() {
    let app = TestApp::new();
    let server = server(&app);
    let operator = app.operator_token();
    verify(&server, &operator, &app.alice_qr(), fixtures::COMMUTE_ROUTE.0)
        .await
        .assert_status_ok();

    let (name, value) = bearer(&app.alice_token());
    let rides = server
        .get("/api/shuttle/rides")
        .add_header(name, value)
        .await
        .json::<Value>();

    let rides = rides.as_array().expect("array");
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0]["route_id"], fixtures::COMMUTE_ROUTE.0);
    assert_eq!(rides[0]["route_name"], "Osong Morning 1");
}

#[tokio::test]
async fn test_count_reset_and_reconcile() {
    let app = TestApp::new();
    let server = server(&app);
    let operator = app.operator_token();
    let route = fixtures::COMMUTE_ROUTE.0;
    verify(&server, &operator, &app.alice_qr(), route)
        .await
        .assert_status_ok();

    let (op_name, op_value) = bearer(&operator);
    let count_path = format!("/api/shuttle/count/{route}");
    let count = server
        .get(&count_path)
        .add_header(op_name.clone(), op_value.clone())
        .await
        .json::<CountResponse>();
    assert_eq!(count.count, 1);

    let (rider_name, rider_value) = bearer(&app.alice_token());
    let response = server
        .delete(&count_path)
        .add_header(rider_name, rider_value)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    app.clock.advance(Duration::minutes(5));
    server
        .delete(&count_path)
        .add_header(op_name.clone(), op_value.clone())
        .await
        .assert_status_ok();
    let count = server
        .get(&count_path)
        .add_header(op_name.clone(), op_value.clone())
        .await
        .json::<CountResponse>();
    assert_eq!(count.count, 0);
    assert_eq!(app.store.records().len(), 1);

    app.clock.advance(Duration::minutes(5));
    let bob_qr = app
        .codec
        .encode(fixtures::BOB, &fixtures::bob().email)
        .unwrap();
    verify(&server, &operator, &bob_qr, route)
        .await
        .assert_status_ok();

    // Rows from before the reset stay out of the rebuilt count
    let count = server
        .post(&format!("{count_path}/reconcile"))
        .add_header(op_name, op_value)
        .await
        .json::<CountResponse>();
    assert_eq!(count.count, 1);
}

#[tokio::test]
async fn test_reconcile_without_reset_spans_service_days() {
    let app = TestApp::new();
    let server = server(&app);
    let operator = app.operator_token();
    let route = fixtures::COMMUTE_ROUTE.0;
    let bob_qr = app
        .codec
        .encode(fixtures::BOB, &fixtures::bob().email)
        .unwrap();
    verify(&server, &operator, &bob_qr, route)
        .await
        .assert_status_ok();

    // Next service day, counter increments failing
    app.clock.advance(Duration::days(1));
    app.counter.set_fail_increments(true);
    let confirmed = verify(&server, &operator, &app.alice_qr(), route)
        .await
        .json::<VerifyResponse>();
    assert_eq!(confirmed.rider_count, Some(2));

    let (name, value) = bearer(&operator);
    let count = server
        .post(&format!("/api/shuttle/count/{route}/reconcile"))
        .add_header(name, value)
        .await
        .json::<CountResponse>();
    assert_eq!(count.count, 2);
}

#[tokio::test]
async fn test_route_run_lifecycle() {
    let app = TestApp::new();
    let server = server(&app);
    let (name, value) = bearer(&app.operator_token());
    let route = LIVE_ROUTE.0;

    let ended = server
        .post(&format!("/api/routes/{route}/end"))
        .add_header(name.clone(), value.clone())
        .await;
    ended.assert_status_ok();
    let ended = ended.json::<RunResponse>();
    assert_eq!(ended.status, "ENDED");
    assert!(ended.ended_at.is_some());

    let again = server
        .post(&format!("/api/routes/{route}/end"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&again), "ROUTE_ENDED");

    let started = server
        .post(&format!("/api/routes/{route}/start"))
        .add_header(name.clone(), value.clone())
        .await
        .json::<RunResponse>();
    assert_eq!(started.status, "RUNNING");

    let missing = server
        .post("/api/routes/999/end")
        .add_header(name, value)
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rider_cannot_end_route() {
    let app = TestApp::new();
    let (name, value) = bearer(&app.alice_token());

    let response = server(&app)
        .post(&format!("/api/routes/{}/end", LIVE_ROUTE.0))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rider_gets_forbidden_before_route_lookup() {
    let app = TestApp::new();
    let server = server(&app);

    for path in ["/api/routes/999/start", "/api/routes/999/end"] {
        let (name, value) = bearer(&app.alice_token());
        let response = server.post(path).add_header(name, value).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "path: {path}");
    }

    // Operators still see the missing route
    let (name, value) = bearer(&app.operator_token());
    let response = server.post("/api/routes/999/end").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
