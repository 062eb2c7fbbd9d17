//! HTTP route handlers for the web front end.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Landing page
//! GET  /about                  - About page
//! GET  /contact                - Public contact form
//! POST /contact                - Relay the contact form
//! GET  /health                 - Health check
//!
//! # Auth
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! POST /login/google           - Google ID token login
//! GET  /register               - Register page (?referral_code=)
//! POST /register               - Register action
//! GET  /referral/{code}        - Redirect to /register?referral_code={code}
//! GET  /forgot-password        - Forgot password page
//! POST /forgot-password        - Request a reset email
//! GET  /reset-password/{uidb64}/{token} - Reset page (token checked first)
//! POST /reset-password/{uidb64}/{token} - Set a new password
//! POST /logout                 - Logout action
//!
//! # Signed in (token only)
//! GET  /home                   - Earnings, trend chart, transactions
//! GET  /kyc                    - KYC details
//! POST /kyc                    - Update KYC details
//! GET  /withdraw               - Withdrawal form
//! POST /withdraw               - Request a withdrawal
//!
//! # Signed in (full guard)
//! GET  /referrals              - Referral code, link and history
//! GET  /client-dashboard       - Client dashboard (?tab=)
//! POST /client-dashboard/rent  - Start an M-Pesa rental payment
//! POST /client-dashboard/support        - Send a support message
//! POST /client-dashboard/account/delete - Delete the account
//!
//! # Admin (full guard + staff)
//! GET  /admin-dashboard        - Admin dashboard (?section=&search=&status=)
//! POST /admin-dashboard/users/{id}/{action}        - block | unblock | award
//! POST /admin-dashboard/withdrawals/{id}/{action}  - approve | reject | paid
//! POST /admin-dashboard/kyc/{id}/verify            - Verify a KYC form
//! POST /admin-dashboard/settings                   - Update platform switches
//! POST /admin-dashboard/support/{id}/reply         - Reply to a message
//! POST /admin-dashboard/support/{id}/read          - Mark a message read
//!
//! # Dashboard JSON (polled by static/js/dashboard.js)
//! GET  /api/dashboard/live                  - Balance and live profit
//! GET  /api/dashboard/payments/{id}         - Payment watch status
//! POST /api/dashboard/payments/{id}/cancel  - Stop a payment watch
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod client;
pub mod dashboard_api;
pub mod pages;
pub mod referrals;
pub mod support;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;

use crate::state::AppState;

// =============================================================================
// Shared query types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Redirect to `path` with an `error` message for the banner.
#[must_use]
pub fn redirect_with_error(path: &str, message: &str) -> Redirect {
    redirect_with(path, "error", message)
}

/// Redirect to `path` with a `success` message for the banner.
#[must_use]
pub fn redirect_with_success(path: &str, message: &str) -> Redirect {
    redirect_with(path, "success", message)
}

fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{separator}{key}={}",
        urlencoding::encode(message)
    ))
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/login/google", post(auth::google_login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/referral/{code}", get(auth::referral_redirect))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route(
            "/reset-password/{uidb64}/{token}",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route("/logout", post(auth::logout))
}

/// Create the client dashboard routes router.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(client::dashboard))
        .route("/rent", post(client::rent))
        .route("/support", post(support::dashboard_message))
        .route("/account/delete", post(client::delete_account))
}

/// Create the admin dashboard routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/users/{id}/{action}", post(admin::user_action))
        .route("/withdrawals/{id}/{action}", post(admin::withdrawal_action))
        .route("/kyc/{id}/verify", post(admin::verify_kyc))
        .route("/settings", post(admin::update_settings))
        .route("/support/{id}/reply", post(support::admin_reply))
        .route("/support/{id}/read", post(support::admin_mark_read))
}

/// Create the dashboard JSON routes router.
pub fn dashboard_api_routes() -> Router<AppState> {
    Router::new()
        .route("/live", get(dashboard_api::live))
        .route("/payments/{id}", get(dashboard_api::payment_status))
        .route("/payments/{id}/cancel", post(dashboard_api::cancel_payment))
}

/// Create all routes for the web front end.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Public pages
        .route("/", get(pages::landing))
        .route("/about", get(pages::about))
        .route("/contact", get(support::contact_page).post(support::contact))
        // Auth
        .merge(auth_routes())
        // Token-only pages
        .route("/home", get(account::home))
        .route("/kyc", get(account::kyc_page).post(account::update_kyc))
        .route("/withdraw", get(account::withdraw_page).post(account::withdraw))
        // Guarded pages
        .route("/referrals", get(referrals::referrals))
        .nest("/client-dashboard", client_routes())
        .nest("/admin-dashboard", admin_routes())
        .nest("/api/dashboard", dashboard_api_routes())
        .fallback(pages::not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;
    use axum::response::IntoResponse;

    #[test]
    fn test_redirect_with_encodes_message() {
        let response = redirect_with_error("/login", "Invalid credentials & more").into_response();
        assert_eq!(
            response.headers()[LOCATION],
            "/login?error=Invalid%20credentials%20%26%20more"
        );
    }

    #[test]
    fn test_redirect_with_appends_to_existing_query() {
        let response =
            redirect_with_success("/admin-dashboard?section=users", "User blocked").into_response();
        assert_eq!(
            response.headers()[LOCATION],
            "/admin-dashboard?section=users&success=User%20blocked"
        );
    }
}
