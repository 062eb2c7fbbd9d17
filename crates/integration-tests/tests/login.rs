//! Login, logout and session expiry against the fake backend.
//!
//! Run with: cargo test -p liquifund-integration-tests

use std::sync::atomic::Ordering;

use liquifund_integration_tests::{PASSWORD, TestApp, location};
use liquifund_web::error::SESSION_EXPIRED_REDIRECT;
use reqwest::StatusCode;
use reqwest::header::COOKIE;

// ============================================================================
// Login routing
// ============================================================================

#[tokio::test]
async fn test_client_lands_on_client_dashboard() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.login("client@example.com").await.expect("Login failed");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/client-dashboard");

    let resp = app.get("/client-dashboard").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("LQ-0011"));
}

#[tokio::test]
async fn test_superuser_lands_on_admin_dashboard() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.login("admin@example.com").await.expect("Login failed");
    assert_eq!(location(&resp), "/admin-dashboard");
}

#[tokio::test]
async fn test_staff_lands_on_client_dashboard() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app.login("staff@example.com").await.expect("Login failed");
    assert_eq!(location(&resp), "/client-dashboard");
}

#[tokio::test]
async fn test_profile_failure_after_login_lands_on_client_dashboard_with_error() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.backend
        .state
        .profile_broken
        .store(true, Ordering::SeqCst);

    let resp = app.login("admin@example.com").await.expect("Login failed");
    assert!(location(&resp).starts_with("/client-dashboard?error="));
}

#[tokio::test]
async fn test_google_login_requires_matching_csrf_pair() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app
        .client
        .post(app.url("/login/google"))
        .form(&[("credential", "google-client@example.com")])
        .send()
        .await
        .expect("Request failed");
    assert!(location(&resp).starts_with("/login?error="));
    assert_eq!(
        app.backend.state.google_login_calls.load(Ordering::SeqCst),
        0
    );
    let resp = app.get("/client-dashboard").await.expect("Request failed");
    assert_eq!(location(&resp), "/login");

    let resp = app
        .client
        .post(app.url("/login/google"))
        .header(COOKIE, "g_csrf_token=tok-123")
        .form(&[
            ("credential", "google-client@example.com"),
            ("g_csrf_token", "tok-123"),
        ])
        .send()
        .await
        .expect("Request failed");
    assert_eq!(location(&resp), "/client-dashboard");
    assert_eq!(
        app.backend.state.google_login_calls.load(Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_wrong_password_rerenders_form() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app
        .client
        .post(app.url("/login"))
        .form(&[("email", "client@example.com"), ("password", "WrongPass1!")])
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Invalid credentials"));
    assert!(body.contains("client@example.com"));
}

#[tokio::test]
async fn test_invalid_form_makes_no_backend_call() {
    let app = TestApp::start().await.expect("Failed to start app");

    let resp = app
        .client
        .post(app.url("/login"))
        .form(&[("email", "not-an-email"), ("password", PASSWORD)])
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.backend.state.profile_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Logout and expiry
// ============================================================================

#[tokio::test]
async fn test_logout_clears_session() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");

    let resp = app
        .client
        .post(app.url("/logout"))
        .send()
        .await
        .expect("Request failed");
    assert!(location(&resp).starts_with("/login?success="));

    let resp = app.get("/client-dashboard").await.expect("Request failed");
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn test_rejected_token_clears_session_and_redirects() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");
    app.backend
        .state
        .reject_tokens
        .store(true, Ordering::SeqCst);

    let resp = app.get("/home").await.expect("Request failed");
    assert_eq!(location(&resp), SESSION_EXPIRED_REDIRECT);

    // The session is gone even once the backend recovers.
    app.backend
        .state
        .reject_tokens
        .store(false, Ordering::SeqCst);
    let before = app.backend.state.guard_calls();
    let resp = app.get("/client-dashboard").await.expect("Request failed");
    assert_eq!(location(&resp), "/login");
    assert_eq!(app.backend.state.guard_calls(), before);
}

#[tokio::test]
async fn test_rejected_token_on_json_endpoint_is_unauthorized() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");
    app.backend
        .state
        .reject_tokens
        .store(true, Ordering::SeqCst);

    let resp = app.get("/api/dashboard/live").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse body");
    assert!(body["error"].is_string());
}
