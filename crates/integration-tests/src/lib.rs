//! End-to-end test support for the LiquiFund web front end.
//!
//! [`FakeBackend`] serves the slice of the LiquiFund REST API the front end
//! uses, on a random local port, and counts the calls it receives.
//! [`TestApp`] runs the real router against it and drives it with a
//! cookie-keeping HTTP client that does not follow redirects.
//!
//! Tokens handed out by the fake encode the user's email
//! (`access-{email}`), and the email decides the role:
//!
//! - `admin…` is a superuser
//! - `staff…` is staff but not a superuser
//! - anything else is a plain client
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p liquifund-integration-tests
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use liquifund_web::config::{LogFormat, WebConfig};
use liquifund_web::polling::{PaymentTracker, PollConfig};
use liquifund_web::state::AppState;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

/// Password the fake backend accepts for every account.
pub const PASSWORD: &str = "correct-horse-battery";

/// Amount credited to the wallet when a credited M-Pesa push is initiated.
pub const PAYMENT_CREDIT_KES: u64 = 1200;

// =============================================================================
// Fake backend
// =============================================================================

/// Knobs and counters shared with the fake backend's handlers.
#[derive(Debug)]
pub struct BackendState {
    pub profile_calls: AtomicUsize,
    pub maintenance_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub google_login_calls: AtomicUsize,
    pub maintenance_mode: AtomicBool,
    /// Profile endpoint answers 500.
    pub profile_broken: AtomicBool,
    /// Every authenticated endpoint answers 401.
    pub reject_tokens: AtomicBool,
    /// Initiating a payment credits the wallet.
    pub credit_payments: AtomicBool,
    pub balance: AtomicU64,
    /// When set, payment initiation fails with this `{error}` message.
    pub mpesa_error: Mutex<Option<String>>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            profile_calls: AtomicUsize::new(0),
            maintenance_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            google_login_calls: AtomicUsize::new(0),
            maintenance_mode: AtomicBool::new(false),
            profile_broken: AtomicBool::new(false),
            reject_tokens: AtomicBool::new(false),
            credit_payments: AtomicBool::new(true),
            balance: AtomicU64::new(1000),
            mpesa_error: Mutex::new(None),
        }
    }
}

impl BackendState {
    /// Calls that only happen when the full guard reaches the backend.
    #[must_use]
    pub fn guard_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst) + self.maintenance_calls.load(Ordering::SeqCst)
    }
}

/// A running fake of the LiquiFund REST API.
pub struct FakeBackend {
    pub url: Url,
    pub state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start the fake on a random local port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(BackendState::default());
        let addr = serve(backend_router(Arc::clone(&state))).await?;
        let url = Url::parse(&format!("http://{addr}"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Ok(Self { url, state })
    }
}

async fn serve(router: Router) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

type Shared = State<Arc<BackendState>>;

fn backend_router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/google-login/", post(google_login))
        .route("/api/auth/profile/", get(profile))
        .route("/api/auth/logout/", post(acknowledge))
        .route("/api/support/maintenance/", get(maintenance))
        .route("/api/payments/balance/", get(balance))
        .route("/api/payments/earnings/", get(earnings))
        .route("/api/payments/history/", get(history))
        .route("/api/payments/mpesa/initiate/", post(initiate_payment))
        .route("/api/rentals/user-rentals/", get(rentals))
        .route("/api/rentals/pending-returns/", get(pending_returns))
        .route("/api/rentals/admin/active/", get(admin_rentals))
        .route("/api/auth/referrals/code/", get(referral_code))
        .route("/api/auth/referrals/history/", get(referral_history))
        .route("/api/auth/referrals/admin/", get(referral_overview))
        .route("/api/auth/users/", get(users))
        .route("/api/auth/kyc/all/", get(kyc_forms))
        .route("/api/withdraw/pending/", get(withdrawals))
        .route("/api/withdraw/all/", get(withdrawals))
        .with_state(state)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type" })),
    )
        .into_response()
}

/// Email encoded in the bearer token, unless tokens are being rejected.
fn bearer_email(state: &BackendState, headers: &HeaderMap) -> Option<String> {
    if state.reject_tokens.load(Ordering::SeqCst) {
        return None;
    }
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer access-")
        .map(String::from)
}

fn profile_json(email: &str) -> Value {
    json!({
        "id": 7,
        "email": email,
        "full_name": "Test User",
        "phone_number": "0712345678",
        "is_staff": email.starts_with("staff") || email.starts_with("admin"),
        "is_superuser": email.starts_with("admin"),
        "wallet_balance": "1000.00",
    })
}

/// Answer `body` for a valid token, 401 otherwise.
fn authed(state: &BackendState, headers: &HeaderMap, body: Value) -> Response {
    match bearer_email(state, headers) {
        Some(_) => Json(body).into_response(),
        None => unauthorized(),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleCredential {
    token: String,
}

/// Google credentials are `google-{email}`.
async fn google_login(State(state): Shared, Json(body): Json<GoogleCredential>) -> Response {
    state.google_login_calls.fetch_add(1, Ordering::SeqCst);
    let Some(email) = body.token.strip_prefix("google-") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid Google token" })),
        )
            .into_response();
    };
    Json(json!({
        "access": format!("access-{email}"),
        "refresh": format!("refresh-{email}"),
        "user": profile_json(email),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(Json(credentials): Json<Credentials>) -> Response {
    if credentials.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(json!({
        "access": format!("access-{}", credentials.email),
        "refresh": format!("refresh-{}", credentials.email),
        "user": profile_json(&credentials.email),
    }))
    .into_response()
}

async fn profile(State(state): Shared, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if state.profile_broken.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    match bearer_email(&state, &headers) {
        Some(email) => Json(profile_json(&email)).into_response(),
        None => unauthorized(),
    }
}

async fn acknowledge() -> Json<Value> {
    Json(json!({ "message": "ok" }))
}

async fn maintenance(State(state): Shared) -> Json<Value> {
    state.maintenance_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "maintenance_mode": state.maintenance_mode.load(Ordering::SeqCst) }))
}

async fn balance(State(state): Shared, headers: HeaderMap) -> Response {
    state.balance_calls.fetch_add(1, Ordering::SeqCst);
    let amount = state.balance.load(Ordering::SeqCst);
    authed(&state, &headers, json!({ "balance": format!("{amount}.00") }))
}

async fn earnings(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "total_earnings": "250.00" }))
}

async fn history(State(state): Shared, headers: HeaderMap) -> Response {
    authed(
        &state,
        &headers,
        json!({ "payments": [
            { "id": 1, "amount_deducted": "1000.00", "status": "completed", "created_at": "2025-02-01 09:00:00" },
            { "id": 2, "amount_deducted": "-300.00", "status": "completed", "created_at": "2025-02-03 10:30:00" }
        ]}),
    )
}

async fn initiate_payment(State(state): Shared, headers: HeaderMap) -> Response {
    if bearer_email(&state, &headers).is_none() {
        return unauthorized();
    }
    let failure = state
        .mpesa_error
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or_default();
    if let Some(message) = failure {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }
    if state.credit_payments.load(Ordering::SeqCst) {
        state.balance.fetch_add(PAYMENT_CREDIT_KES, Ordering::SeqCst);
    }
    Json(json!({ "message": "STK push sent" })).into_response()
}

async fn rentals(State(state): Shared, headers: HeaderMap) -> Response {
    authed(
        &state,
        &headers,
        json!({ "rentals": [{
            "id": 11, "unique_id": "LQ-0011", "currency": "USD",
            "amount": "1200.00", "expected_return": "2400.00", "status": "active",
            "created_at": "2025-02-01T09:00:00Z",
            "start_date": "2025-02-01T09:00:00Z", "end_date": "2025-02-21T09:00:00Z",
            "days_remaining": 3
        }]}),
    )
}

async fn pending_returns(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "pending_returns": "2400.00" }))
}

async fn admin_rentals(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "active_rentals": [], "summary": {} }))
}

async fn referral_code(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "referral_code": "LQ7ABC" }))
}

async fn referral_history(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "referrals": [] }))
}

async fn referral_overview(State(state): Shared, headers: HeaderMap) -> Response {
    authed(
        &state,
        &headers,
        json!({ "total_referrals": 0, "referral_relationships": [], "top_referrers": [] }),
    )
}

async fn users(State(state): Shared, headers: HeaderMap) -> Response {
    authed(
        &state,
        &headers,
        json!([
            { "id": 7, "email": "client@example.com", "full_name": "Test User", "is_active": true, "wallet_balance": "1000.00" },
            { "id": 8, "email": "blocked@example.com", "full_name": "Blocked User", "is_active": false }
        ]),
    )
}

async fn kyc_forms(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!({ "kyc_forms": [] }))
}

async fn withdrawals(State(state): Shared, headers: HeaderMap) -> Response {
    authed(&state, &headers, json!([]))
}

// =============================================================================
// Application under test
// =============================================================================

/// Configuration pointing the front end at `backend`.
#[must_use]
pub fn test_config(backend: &FakeBackend) -> WebConfig {
    WebConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        api_base_url: backend.url.clone(),
        api_timeout: Duration::from_secs(2),
        session_secret: SecretString::from("integration-test-secret-6f1c9e2a4b7d8e3f5a0c1b2d"),
        google_client_id: None,
        contact_form_url: None,
        sentry_dsn: None,
        log_format: LogFormat::Text,
    }
}

/// Poll settings short enough for tests.
#[must_use]
pub const fn fast_polling(max_attempts: u32) -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(20),
        max_attempts,
    }
}

/// The front end running on a random local port.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub backend: FakeBackend,
}

impl TestApp {
    /// Start a fake backend and the front end in front of it.
    ///
    /// # Errors
    ///
    /// Returns an error if a port cannot be bound or a client cannot be built.
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_polling(PollConfig::default()).await
    }

    /// As [`TestApp::start`], with custom payment polling.
    ///
    /// # Errors
    ///
    /// Returns an error if a port cannot be bound or a client cannot be built.
    pub async fn with_polling(polling: PollConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let backend = FakeBackend::start().await?;
        let state =
            AppState::with_payment_tracker(test_config(&backend), PaymentTracker::new(polling))?;
        let addr = serve(liquifund_web::build_router(state)).await?;
        Ok(Self {
            base: format!("http://{addr}"),
            client: Self::new_client()?,
            backend,
        })
    }

    /// A fresh visitor: empty cookie jar, redirects not followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn new_client() -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Sign in as `email` with `client`.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn login_with(
        &self,
        client: &reqwest::Client,
        email: &str,
    ) -> reqwest::Result<reqwest::Response> {
        client
            .post(self.url("/login"))
            .form(&[("email", email), ("password", PASSWORD)])
            .send()
            .await
    }

    /// Sign in as `email` with the default client.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn login(&self, email: &str) -> reqwest::Result<reqwest::Response> {
        self.login_with(&self.client, email).await
    }

    /// `GET path` with the default client.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }
}

/// The `Location` header of a redirect, or an empty string.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
