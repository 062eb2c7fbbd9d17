//! Public pages and response headers.
//!
//! Run with: cargo test -p liquifund-integration-tests

use liquifund_integration_tests::{TestApp, location};
use reqwest::StatusCode;

// ============================================================================
// Public pages
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.get("/health").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");
}

#[tokio::test]
async fn test_landing_lists_every_plan() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.get("/").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    for code in ["CAD", "AUD", "GBP", "JPY", "EUR", "USD"] {
        assert!(body.contains(code), "missing {code}");
    }
    assert_eq!(app.backend.state.guard_calls(), 0);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.get("/no-such-page").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_referral_link_prefills_registration() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.get("/referral/LQ7ABC").await.expect("Request failed");
    assert_eq!(location(&resp), "/register?referral_code=LQ7ABC");

    let resp = app
        .get("/register?referral_code=LQ7ABC")
        .await
        .expect("Request failed");
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("value=\"LQ7ABC\""));
}

#[tokio::test]
async fn test_contact_without_form_service_reports_failure() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app
        .client
        .post(app.url("/contact"))
        .form(&[
            ("name", "Amina"),
            ("email", "amina@example.com"),
            ("message", "Hello there"),
        ])
        .send()
        .await
        .expect("Request failed");
    assert_eq!(location(&resp), "/contact?error=Failed%20to%20Send");
}

// ============================================================================
// Headers
// ============================================================================

#[tokio::test]
async fn test_security_and_request_id_headers() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.get("/about").await.expect("Request failed");
    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app
        .client
        .get(app.url("/about"))
        .header("x-request-id", "edge-1234")
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.headers()["x-request-id"], "edge-1234");
}
