//! M-Pesa rental payments and the watch the dashboard script polls.
//!
//! Run with: cargo test -p liquifund-integration-tests

use std::sync::atomic::Ordering;
use std::time::Duration;

use liquifund_integration_tests::{TestApp, fast_polling, location};
use reqwest::StatusCode;
use serde_json::Value;

/// Start a USD rental and return the watch id from the redirect.
async fn start_rental(app: &TestApp) -> String {
    let resp = app
        .client
        .post(app.url("/client-dashboard/rent"))
        .form(&[("currency", "USD"), ("phone", "0712345678")])
        .send()
        .await
        .expect("Rent request failed");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let target = location(&resp);
    assert!(target.starts_with("/client-dashboard?tab=rent&watch="), "{target}");
    assert!(target.contains("&success="));

    target
        .split("watch=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .expect("Redirect should carry a watch id")
        .to_string()
}

/// Poll the watch until it leaves `pending`, as the dashboard script does.
async fn wait_for_outcome(app: &TestApp, watch: &str) -> Value {
    for _ in 0..200 {
        let body: Value = app
            .get(&format!("/api/dashboard/payments/{watch}"))
            .await
            .expect("Status request failed")
            .json()
            .await
            .expect("Failed to parse status");
        if body["status"] != "pending" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("payment watch never finished");
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn test_balance_change_confirms_payment() {
    let app = TestApp::with_polling(fast_polling(50))
        .await
        .expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");

    let watch = start_rental(&app).await;
    let outcome = wait_for_outcome(&app, &watch).await;

    assert_eq!(outcome["status"], "confirmed");
    assert_eq!(outcome["banner"], "Payment confirmed");
}

#[tokio::test]
async fn test_unchanged_balance_times_out() {
    let app = TestApp::with_polling(fast_polling(3))
        .await
        .expect("Failed to start app");
    app.backend
        .state
        .credit_payments
        .store(false, Ordering::SeqCst);
    app.login("client@example.com").await.expect("Login failed");

    let watch = start_rental(&app).await;
    let outcome = wait_for_outcome(&app, &watch).await;

    assert_eq!(outcome["status"], "timed_out");
    assert_eq!(outcome["banner"], "Payment timeout. Please try again.");
}

// ============================================================================
// Failures and ownership
// ============================================================================

#[tokio::test]
async fn test_rejected_push_redirects_with_reason() {
    let app = TestApp::start().await.expect("Failed to start app");
    *app.backend
        .state
        .mpesa_error
        .lock()
        .expect("Lock poisoned") = Some("Insufficient funds".to_string());
    app.login("client@example.com").await.expect("Login failed");

    let resp = app
        .client
        .post(app.url("/client-dashboard/rent"))
        .form(&[("currency", "USD"), ("phone", "0712345678")])
        .send()
        .await
        .expect("Rent request failed");
    assert_eq!(
        location(&resp),
        "/client-dashboard?tab=rent&error=Payment%20failed%3A%20Insufficient%20funds"
    );
}

#[tokio::test]
async fn test_invalid_phone_is_rejected_before_backend() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");
    let balance_calls = app.backend.state.balance_calls.load(Ordering::SeqCst);

    let resp = app
        .client
        .post(app.url("/client-dashboard/rent"))
        .form(&[("currency", "USD"), ("phone", "12345")])
        .send()
        .await
        .expect("Rent request failed");
    assert!(location(&resp).starts_with("/client-dashboard?tab=rent&error="));
    assert_eq!(
        app.backend.state.balance_calls.load(Ordering::SeqCst),
        balance_calls
    );
}

#[tokio::test]
async fn test_watch_is_private_and_cancellable() {
    let app = TestApp::with_polling(fast_polling(1000))
        .await
        .expect("Failed to start app");
    app.backend
        .state
        .credit_payments
        .store(false, Ordering::SeqCst);
    app.login("client@example.com").await.expect("Login failed");
    let watch = start_rental(&app).await;

    let stranger = TestApp::new_client().expect("Failed to build client");
    app.login_with(&stranger, "other@example.com")
        .await
        .expect("Login failed");
    let resp = stranger
        .get(app.url(&format!("/api/dashboard/payments/{watch}")))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .post(app.url(&format!("/api/dashboard/payments/{watch}/cancel")))
        .send()
        .await
        .expect("Cancel failed");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .get(&format!("/api/dashboard/payments/{watch}"))
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Live snapshot
// ============================================================================

#[tokio::test]
async fn test_live_snapshot_reports_balance_and_rentals() {
    let app = TestApp::start().await.expect("Failed to start app");
    app.login("client@example.com").await.expect("Login failed");

    let body: Value = app
        .get("/api/dashboard/live")
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Failed to parse body");

    assert_eq!(body["balance_display"], "KSh 1,000.00");
    assert_eq!(body["has_active"], true);
    assert_eq!(body["rentals"][0]["rental_id"], 11);
}
