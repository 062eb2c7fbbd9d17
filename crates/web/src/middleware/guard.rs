//! Route guards for signed-in pages.
//!
//! Protected pages take one of the extractors below as an argument:
//!
//! - [`RequireSession`] runs the full guard: both tokens and a cached profile
//!   must be present, then the profile and the maintenance flag are fetched
//!   concurrently. Non-admins are shown the maintenance page while the flag
//!   is set.
//! - [`RequireAdmin`] is [`RequireSession`] plus an admin check.
//! - [`RequireToken`] only checks that an access token is present.
//!
//! The guard is optimistic: a present but expired token passes, and the
//! first authenticated backend call then clears the session and redirects
//! (see [`crate::api::Authed`]).

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::api::types::Profile;
use crate::routes::pages::MaintenanceTemplate;
use crate::session::{SessionError, SessionStore, has_complete_session};
use crate::state::AppState;

/// Guard progress for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Unauthenticated,
    MaintenanceBlocked,
    Authorized,
}

/// Outcome once the backend has answered.
#[must_use]
pub const fn decide(maintenance_mode: bool, is_admin: bool) -> GuardState {
    if maintenance_mode && !is_admin {
        GuardState::MaintenanceBlocked
    } else {
        GuardState::Authorized
    }
}

/// Result of [`evaluate`].
#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub state: GuardState,
    /// The fetched profile, else the cached one.
    pub profile: Option<Profile>,
    pub is_admin: bool,
}

impl GuardOutcome {
    const fn unauthenticated() -> Self {
        Self {
            state: GuardState::Unauthenticated,
            profile: None,
            is_admin: false,
        }
    }
}

/// Run the guard against a session.
///
/// Makes no backend call unless the access token, refresh token and cached
/// profile are all present. A failed profile fetch counts as "not admin" and
/// a failed maintenance fetch as "not in maintenance"; both are logged.
///
/// # Errors
///
/// Returns an error only if the session itself cannot be read or written.
pub async fn evaluate<S: SessionStore>(
    store: &S,
    api: &ApiClient,
) -> Result<GuardOutcome, SessionError> {
    debug!(state = ?GuardState::Checking, "Guard check started");

    if !has_complete_session(store).await? {
        debug!(state = ?GuardState::Unauthenticated, "No complete session");
        return Ok(GuardOutcome::unauthenticated());
    }
    let Some(token) = store.access_token().await? else {
        return Ok(GuardOutcome::unauthenticated());
    };

    let (profile, maintenance) = tokio::join!(
        api.profile_with_token(&token),
        api.maintenance_status(Some(&token)),
    );

    let (profile, is_admin) = match profile {
        Ok(profile) => {
            let is_admin = profile.is_admin();
            store.set_profile(profile.clone()).await?;
            (Some(profile), is_admin)
        }
        Err(err) => {
            warn!(error = %err, "Profile fetch failed during guard check, treating as non-admin");
            (store.cached_profile().await?, false)
        }
    };

    let maintenance_mode = match maintenance {
        Ok(status) => status.maintenance_mode,
        Err(err) => {
            warn!(error = %err, "Maintenance check failed, assuming the site is up");
            false
        }
    };

    let state = decide(maintenance_mode, is_admin);
    if state == GuardState::MaintenanceBlocked {
        info!(?state, "Blocked by maintenance mode");
    } else {
        debug!(?state, is_admin, "Guard check finished");
    }

    Ok(GuardOutcome {
        state,
        profile,
        is_admin,
    })
}

// =============================================================================
// Rejections
// =============================================================================

/// Why a guarded request was not let through.
#[derive(Debug)]
pub enum GuardRejection {
    /// Redirect to the login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Maintenance page for non-admins.
    Maintenance,
    /// Signed in, but not allowed on the admin dashboard.
    NotAdmin,
    /// The session layer is missing or the store failed.
    SessionUnavailable,
}

/// Whether the request targets a JSON endpoint under `/api/`.
///
/// Nested routers see the path with their prefix stripped, so the full path
/// is read from [`OriginalUri`] when the router recorded it.
fn is_api_request(parts: &Parts) -> bool {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
        .path()
        .starts_with("/api/")
}

impl GuardRejection {
    fn unauthenticated(parts: &Parts) -> Self {
        if is_api_request(parts) {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not signed in" })),
            )
                .into_response(),
            Self::Maintenance => {
                (StatusCode::SERVICE_UNAVAILABLE, MaintenanceTemplate::default()).into_response()
            }
            Self::NotAdmin => Redirect::to("/client-dashboard").into_response(),
            Self::SessionUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
            }
        }
    }
}

fn session_from(parts: &Parts) -> Result<Session, GuardRejection> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(GuardRejection::SessionUnavailable)
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor for pages behind the full guard.
///
/// # Example
///
/// ```rust,ignore
/// async fn referrals(guard: RequireSession) -> impl IntoResponse {
///     format!("Hello, {}!", guard.profile.display_name())
/// }
/// ```
pub struct RequireSession {
    pub session: Session,
    pub profile: Profile,
    pub is_admin: bool,
}

impl<S> FromRequestParts<S> for RequireSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let app = AppState::from_ref(state);

        let outcome = evaluate(&session, app.api()).await.map_err(|err| {
            warn!(error = %err, "Session store failed during guard check");
            GuardRejection::SessionUnavailable
        })?;

        match (outcome.state, outcome.profile) {
            (GuardState::Authorized, Some(profile)) => Ok(Self {
                session,
                profile,
                is_admin: outcome.is_admin,
            }),
            (GuardState::MaintenanceBlocked, _) => Err(GuardRejection::Maintenance),
            _ => Err(GuardRejection::unauthenticated(parts)),
        }
    }
}

/// Extractor for the admin dashboard: the full guard, then staff or
/// superuser.
pub struct RequireAdmin(pub RequireSession);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = RequireSession::from_request_parts(parts, state).await?;
        if guard.is_admin {
            Ok(Self(guard))
        } else {
            info!(email = %guard.profile.email, "Non-admin sent away from admin dashboard");
            Err(GuardRejection::NotAdmin)
        }
    }
}

/// Extractor for pages that only need an access token.
///
/// Does not call the backend and ignores maintenance mode.
pub struct RequireToken {
    pub session: Session,
    /// Cached profile, when there is one.
    pub profile: Option<Profile>,
}

impl<S> FromRequestParts<S> for RequireToken
where
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let token = session
            .access_token()
            .await
            .map_err(|_| GuardRejection::SessionUnavailable)?;
        if token.is_none() {
            return Err(GuardRejection::unauthenticated(parts));
        }
        let profile = session
            .cached_profile()
            .await
            .map_err(|_| GuardRejection::SessionUnavailable)?;
        Ok(Self { session, profile })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;

    use crate::session::{MemorySessionStore, SessionTokens};

    fn unreachable_api() -> ApiClient {
        ApiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    fn profile(email: &str) -> Profile {
        serde_json::from_value(serde_json::json!({ "email": email })).unwrap()
    }

    fn parts_for(uri: &str, original: Option<&str>) -> Parts {
        let mut request = axum::http::Request::builder().uri(uri).body(()).unwrap();
        if let Some(original) = original {
            request
                .extensions_mut()
                .insert(OriginalUri(original.parse().unwrap()));
        }
        request.into_parts().0
    }

    #[test]
    fn test_nested_api_path_is_unauthorized() {
        let nested = parts_for("/live", Some("/api/dashboard/live"));
        assert!(matches!(
            GuardRejection::unauthenticated(&nested),
            GuardRejection::Unauthorized
        ));
        let page = parts_for("/", Some("/client-dashboard"));
        assert!(matches!(
            GuardRejection::unauthenticated(&page),
            GuardRejection::RedirectToLogin
        ));
        let unnested = parts_for("/api/dashboard/live", None);
        assert!(matches!(
            GuardRejection::unauthenticated(&unnested),
            GuardRejection::Unauthorized
        ));
    }

    #[test]
    fn test_decide_table() {
        assert_eq!(decide(false, false), GuardState::Authorized);
        assert_eq!(decide(false, true), GuardState::Authorized);
        assert_eq!(decide(true, true), GuardState::Authorized);
        assert_eq!(decide(true, false), GuardState::MaintenanceBlocked);
    }

    #[tokio::test]
    async fn test_empty_session_is_unauthenticated() {
        let outcome = evaluate(&MemorySessionStore::new(), &unreachable_api())
            .await
            .unwrap();
        assert_eq!(outcome.state, GuardState::Unauthenticated);
        assert!(outcome.profile.is_none());
    }

    #[tokio::test]
    async fn test_token_without_profile_is_unauthenticated() {
        let store = MemorySessionStore::new();
        store
            .set_session(SessionTokens::new("a", "r"), None)
            .await
            .unwrap();
        let outcome = evaluate(&store, &unreachable_api()).await.unwrap();
        assert_eq!(outcome.state, GuardState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_unreachable_backend_lets_cached_session_through() {
        let store = MemorySessionStore::signed_in("a", "r", profile("wanjiku@example.com"));
        let outcome = evaluate(&store, &unreachable_api()).await.unwrap();
        assert_eq!(outcome.state, GuardState::Authorized);
        assert!(!outcome.is_admin);
        assert_eq!(outcome.profile.unwrap().email, "wanjiku@example.com");
        // A failed check never signs the user out.
        assert_eq!(store.peek_access().await.as_deref(), Some("a"));
    }
}
