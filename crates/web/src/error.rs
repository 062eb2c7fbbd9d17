//! Unified error handling with Sentry integration.
//!
//! Page handlers return [`Result<T>`]; an expired backend session becomes a
//! redirect to the login page, everything else a status with a short message.
//! JSON handlers wrap the same error in [`JsonError`] so the browser script
//! gets a status code and `{"error": …}` instead of a redirect.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::api::ApiError;
use crate::session::SessionError;

/// Where an expired session lands, with the reason shown on the login page.
pub const SESSION_EXPIRED_REDIRECT: &str =
    "/login?error=Your%20session%20has%20expired.%20Please%20log%20in%20again.";

/// Application-level error type for the web front end.
#[derive(Debug, Error)]
pub enum AppError {
    /// The backend rejected the session; it has already been cleared.
    #[error("Session expired")]
    SessionExpired,

    /// The backend failed or answered with something unusable.
    #[error("Upstream error: {0}")]
    Upstream(ApiError),

    /// The session store failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionExpired => Self::SessionExpired,
            ApiError::Session(inner) => Self::Session(inner),
            err if err.is_not_found() => Self::NotFound(err.to_string()),
            err => Self::Upstream(err),
        }
    }
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the visitor.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::SessionExpired => ApiError::SessionExpired.to_string(),
            Self::Upstream(err) => err.user_message(),
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::NotFound(_) => "Not found".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    fn report(&self) {
        if matches!(self, Self::Upstream(_) | Self::Session(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();
        match self {
            Self::SessionExpired => Redirect::to(SESSION_EXPIRED_REDIRECT).into_response(),
            other => (other.status(), other.public_message()).into_response(),
        }
    }
}

/// [`AppError`] rendered as JSON for the dashboard script.
#[derive(Debug)]
pub struct JsonError(pub AppError);

impl<E: Into<AppError>> From<E> for JsonError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        self.0.report();
        (
            self.0.status(),
            Json(json!({ "error": self.0.public_message() })),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Keep a page rendering when a non-essential backend call fails.
///
/// An expired session still propagates so the visitor is sent to the login
/// page; any other failure is logged and replaced by the default value.
///
/// # Errors
///
/// Returns [`AppError::SessionExpired`] or [`AppError::Session`].
pub fn or_default_logged<T: Default>(
    result: std::result::Result<T, ApiError>,
    what: &str,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::SessionExpired) => Err(AppError::SessionExpired),
        Err(ApiError::Session(err)) => Err(AppError::Session(err)),
        Err(err) => {
            tracing::warn!(error = %err, what, "Backend call failed, showing defaults");
            Ok(T::default())
        }
    }
}

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
