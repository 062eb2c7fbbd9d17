//! Authentication route handlers.
//!
//! Handles email and Google login, registration, referral links, password
//! reset and logout. Tokens issued by the backend are kept in the server-side
//! session (see [`crate::session`]).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use liquifund_core::Role;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tower_sessions::cookie::Cookie;
use tracing::{info, instrument, warn};

use super::{MessageQuery, redirect_with_error, redirect_with_success};
use crate::api::types::{LoginResponse, RegisterRequest};
use crate::api::{ApiClient, ApiError};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::session::{SessionError, SessionStore, SessionTokens};
use crate::state::AppState;
use crate::validation::{
    FieldErrors, Registration, validate_forgot_password, validate_login, validate_password_reset,
    validate_registration,
};

const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const GOOGLE_LOGIN_FAILED: &str = "Google login failed. Please try again.";
const PROFILE_LOAD_FAILED: &str =
    "Login successful but profile loading failed. Please refresh the page.";
const REGISTRATION_FAILED: &str =
    "Registration failed. Please check your information and try again.";
const INVALID_RESET_LINK: &str = "Invalid or expired reset link";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// What Google Identity Services posts to the login URI.
#[derive(Debug, Deserialize)]
pub struct GoogleCredentialForm {
    pub credential: String,
    #[serde(default)]
    pub g_csrf_token: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

/// Query parameters for the register page.
#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub referral_code: Option<String>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub email: String,
    pub errors: FieldErrors,
    pub google_client_id: Option<String>,
    pub google_login_uri: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub full_name: String,
    pub email: String,
    pub referral_code: String,
    pub errors: FieldErrors,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub email: String,
    pub errors: FieldErrors,
    /// Set once the reset email has been sent.
    pub sent_to: Option<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub action: String,
    pub errors: FieldErrors,
}

/// Shown when a reset link is invalid or expired.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_invalid.html")]
pub struct ResetInvalidTemplate {
    pub message: String,
}

// =============================================================================
// Post-login
// =============================================================================

/// Where a fresh login lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLanding {
    pub path: &'static str,
    /// Shown on the landing page when the profile could not be loaded.
    pub error: Option<&'static str>,
}

impl LoginLanding {
    fn into_redirect(self) -> Redirect {
        match self.error {
            Some(message) => redirect_with_error(self.path, message),
            None => Redirect::to(self.path),
        }
    }
}

/// Store the token pair, load the profile and pick the dashboard.
///
/// Superusers land on the admin dashboard, everyone else on the client
/// dashboard. If the profile cannot be fetched the user still lands on the
/// client dashboard, with an error message, and the profile embedded in the
/// login response (if any) is cached instead.
///
/// # Errors
///
/// Returns an error if the session store fails.
#[instrument(skip_all)]
pub async fn complete_login<S: SessionStore>(
    api: &ApiClient,
    store: &S,
    response: LoginResponse,
) -> Result<LoginLanding, SessionError> {
    let access = SecretString::from(response.access.clone());
    store
        .set_session(SessionTokens::new(response.access, response.refresh), None)
        .await?;

    match api.profile_with_token(&access).await {
        Ok(profile) => {
            set_sentry_user(&profile.email);
            let role = profile.landing_role();
            info!(email = %profile.email, ?role, "User logged in");
            store.set_profile(profile).await?;
            Ok(LoginLanding {
                path: role.dashboard_path(),
                error: None,
            })
        }
        Err(err) => {
            warn!(error = %err, "Profile fetch failed after login");
            if let Some(profile) = response.user {
                store.set_profile(profile).await?;
            }
            Ok(LoginLanding {
                path: Role::Client.dashboard_path(),
                error: Some(PROFILE_LOAD_FAILED),
            })
        }
    }
}

async fn finish_login(state: &AppState, session: &Session, response: LoginResponse) -> Response {
    match complete_login(state.api(), session, response).await {
        Ok(landing) => landing.into_redirect().into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to store session after login");
            redirect_with_error("/login", "Could not start your session. Please try again.")
                .into_response()
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

fn login_template(state: &AppState, query: MessageQuery) -> LoginTemplate {
    LoginTemplate {
        error: query.error,
        success: query.success,
        email: String::new(),
        errors: FieldErrors::new(),
        google_client_id: state.config().google_client_id.clone(),
        google_login_uri: format!(
            "{}/login/google",
            state.config().base_url.trim_end_matches('/')
        ),
    }
}

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    login_template(&state, query)
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let errors = validate_login(&form.email, &form.password);
    if !errors.is_empty() {
        let mut page = login_template(&state, MessageQuery::default());
        page.email = form.email;
        page.errors = errors;
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    match state.api().login(form.email.trim(), &form.password).await {
        Ok(response) => finish_login(&state, &session, response).await,
        Err(err) => {
            warn!(error = %err, "Login failed");
            let mut page = login_template(
                &state,
                MessageQuery {
                    error: Some(err.message_or(LOGIN_FAILED)),
                    success: None,
                },
            );
            page.email = form.email;
            (StatusCode::UNAUTHORIZED, page).into_response()
        }
    }
}

/// Google Identity Services double-submit check: the `g_csrf_token` cookie
/// and the posted field must both be present, non-empty and equal.
fn google_csrf_ok(headers: &HeaderMap, posted: Option<&str>) -> bool {
    let cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == "g_csrf_token")
        .map(|cookie| cookie.value().to_string());

    match (cookie.as_deref(), posted) {
        (Some(cookie), Some(posted)) => !cookie.is_empty() && cookie == posted,
        _ => false,
    }
}

/// Handle the credential posted by the Google sign-in button.
pub async fn google_login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<GoogleCredentialForm>,
) -> Response {
    if !google_csrf_ok(&headers, form.g_csrf_token.as_deref()) {
        warn!("Google login CSRF token mismatch");
        return redirect_with_error("/login", GOOGLE_LOGIN_FAILED).into_response();
    }

    match state.api().google_login(&form.credential).await {
        Ok(response) => finish_login(&state, &session, response).await,
        Err(err) => {
            warn!(error = %err, "Google login failed");
            redirect_with_error("/login", &err.message_or(GOOGLE_LOGIN_FAILED)).into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<RegisterQuery>) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error,
        success: None,
        full_name: String::new(),
        email: String::new(),
        referral_code: query.referral_code.unwrap_or_default(),
        errors: FieldErrors::new(),
    }
}

/// Handle registration form submission.
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let referral_code = form
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let mut errors = validate_registration(Registration {
        full_name: &form.full_name,
        email: &form.email,
        password: &form.password,
        confirm_password: &form.confirm_password,
    });

    let mut page = RegisterTemplate {
        error: None,
        success: None,
        full_name: form.full_name.clone(),
        email: form.email.clone(),
        referral_code: referral_code.unwrap_or_default().to_string(),
        errors: FieldErrors::new(),
    };

    if !errors.is_empty() {
        page.errors = errors;
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    let request = RegisterRequest {
        full_name: form.full_name.trim(),
        email: form.email.trim(),
        password: &form.password,
        referral_code,
    };

    match state.api().register(&request).await {
        Ok(ack) => {
            info!(email = %request.email, referred = referral_code.is_some(), "User registered");
            redirect_with_success(
                "/login",
                &ack.text_or("Registration successful! Please log in."),
            )
            .into_response()
        }
        Err(err) => {
            warn!(error = %err, "Registration failed");
            errors.merge_backend(
                &err.field_errors(),
                &["full_name", "email", "password", "referral_code"],
            );
            page.error = Some(err.message_or(REGISTRATION_FAILED));
            page.errors = errors;
            (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
        }
    }
}

/// Shared referral link: prefill the registration form.
pub async fn referral_redirect(Path(code): Path<String>) -> Redirect {
    Redirect::to(&format!(
        "/register?referral_code={}",
        urlencoding::encode(&code)
    ))
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    ForgotPasswordTemplate {
        error: query.error,
        success: query.success,
        email: String::new(),
        errors: FieldErrors::new(),
        sent_to: None,
    }
}

/// Ask the backend to email a reset link. Also used by "resend".
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let mut page = ForgotPasswordTemplate {
        error: None,
        success: None,
        email: email.clone(),
        errors: validate_forgot_password(&email),
        sent_to: None,
    };
    if !page.errors.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    match state.api().forgot_password(&email).await {
        Ok(ack) => {
            page.success = Some(ack.text_or("Password reset email sent!"));
            page.sent_to = Some(email);
            page.into_response()
        }
        Err(err) => {
            warn!(error = %err, "Forgot password request failed");
            page.error = Some(err.message_or("Could not send the reset email. Please try again."));
            (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
        }
    }
}

fn reset_action(uidb64: &str, token: &str) -> String {
    format!(
        "/reset-password/{}/{}",
        urlencoding::encode(uidb64),
        urlencoding::encode(token)
    )
}

/// Display the reset page if the link is still valid.
pub async fn reset_password_page(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    Query(query): Query<MessageQuery>,
) -> Response {
    match state.api().validate_reset_token(&uidb64, &token).await {
        Ok(()) => ResetPasswordTemplate {
            error: query.error,
            success: query.success,
            action: reset_action(&uidb64, &token),
            errors: FieldErrors::new(),
        }
        .into_response(),
        Err(err @ ApiError::Rejected(_)) => {
            info!(error = %err, "Reset link rejected");
            ResetInvalidTemplate {
                message: err.message_or(INVALID_RESET_LINK),
            }
            .into_response()
        }
        Err(err) => {
            warn!(error = %err, "Could not validate reset link");
            ResetInvalidTemplate {
                message: "Failed to validate reset link".to_string(),
            }
            .into_response()
        }
    }
}

/// Set a new password through a reset link.
pub async fn reset_password(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let mut page = ResetPasswordTemplate {
        error: None,
        success: None,
        action: reset_action(&uidb64, &token),
        errors: validate_password_reset(&form.password, &form.confirm_password),
    };
    if !page.errors.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    match state
        .api()
        .reset_password(&uidb64, &token, &form.password, &form.confirm_password)
        .await
    {
        Ok(ack) => redirect_with_success(
            "/login",
            &ack.text_or("Password reset successful. Please log in."),
        )
        .into_response(),
        Err(err) => {
            warn!(error = %err, "Password reset failed");
            page.errors
                .merge_backend(&err.field_errors(), &["password", "confirm_password"]);
            page.error = Some(err.message_or(INVALID_RESET_LINK));
            (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Tell the backend (best effort), then forget the session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    if let Err(err) = state.api().authed(&session).logout().await {
        warn!(error = %err, "Backend logout failed, clearing session anyway");
    }
    clear_sentry_user();
    if let Err(err) = session.flush().await {
        tracing::error!(error = %err, "Failed to clear session on logout");
    }
    redirect_with_success("/login", "You have been logged out.").into_response()
}
