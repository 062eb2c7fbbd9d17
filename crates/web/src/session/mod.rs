//! Per-visitor session state.
//!
//! Everything the front end remembers about a signed-in visitor lives behind
//! [`SessionStore`]: the backend access and refresh tokens, a cached copy of
//! the profile and the display name used in greetings. Handlers, the auth
//! guard and the API gateway depend on the trait, never on a concrete store.
//!
//! # Keys
//!
//! | Key           | Value                         |
//! |---------------|-------------------------------|
//! | `access`      | backend access token          |
//! | `refresh`     | backend refresh token         |
//! | `profile`     | [`Profile`] as JSON           |
//! | `client_name` | the profile's display name    |

mod memory;

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;

use crate::api::types::Profile;

pub use memory::MemorySessionStore;

/// Session keys.
pub mod keys {
    pub const ACCESS: &str = "access";
    pub const REFRESH: &str = "refresh";
    pub const PROFILE: &str = "profile";
    pub const CLIENT_NAME: &str = "client_name";
}

/// Failure reading or writing the session backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(String),
}

impl From<tower_sessions::session::Error> for SessionError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Token pair issued by the backend at login.
#[derive(Clone)]
pub struct SessionTokens {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl SessionTokens {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Storage for the signed-in visitor's tokens and cached profile.
///
/// Reads happen at call time, so a token written by one request is seen by
/// the next call on the same session. Concurrent writers are not
/// coordinated: the last write wins.
pub trait SessionStore: Send + Sync {
    fn access_token(&self)
    -> impl Future<Output = Result<Option<SecretString>, SessionError>> + Send;

    fn refresh_token(&self)
    -> impl Future<Output = Result<Option<SecretString>, SessionError>> + Send;

    fn cached_profile(&self) -> impl Future<Output = Result<Option<Profile>, SessionError>> + Send;

    fn client_name(&self) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Store a fresh token pair and, when known, the profile.
    fn set_session(
        &self,
        tokens: SessionTokens,
        profile: Option<Profile>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Replace the cached profile and the display name derived from it.
    fn set_profile(&self, profile: Profile) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Forget everything: tokens, profile and display name.
    fn clear_session(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

impl SessionStore for Session {
    async fn access_token(&self) -> Result<Option<SecretString>, SessionError> {
        Ok(self
            .get::<String>(keys::ACCESS)
            .await?
            .filter(|token| !token.is_empty())
            .map(SecretString::from))
    }

    async fn refresh_token(&self) -> Result<Option<SecretString>, SessionError> {
        Ok(self
            .get::<String>(keys::REFRESH)
            .await?
            .filter(|token| !token.is_empty())
            .map(SecretString::from))
    }

    async fn cached_profile(&self) -> Result<Option<Profile>, SessionError> {
        // A profile cached by an older build may not decode; treat it as absent.
        Ok(self.get::<Profile>(keys::PROFILE).await.ok().flatten())
    }

    async fn client_name(&self) -> Result<Option<String>, SessionError> {
        Ok(self.get::<String>(keys::CLIENT_NAME).await?)
    }

    async fn set_session(
        &self,
        tokens: SessionTokens,
        profile: Option<Profile>,
    ) -> Result<(), SessionError> {
        // New tokens get a new session id.
        self.cycle_id().await?;
        self.insert(keys::ACCESS, tokens.access.expose_secret())
            .await?;
        self.insert(keys::REFRESH, tokens.refresh.expose_secret())
            .await?;
        if let Some(profile) = profile {
            self.set_profile(profile).await?;
        }
        Ok(())
    }

    async fn set_profile(&self, profile: Profile) -> Result<(), SessionError> {
        self.insert(keys::CLIENT_NAME, profile.display_name())
            .await?;
        self.insert(keys::PROFILE, &profile).await?;
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), SessionError> {
        for key in [keys::ACCESS, keys::REFRESH, keys::PROFILE, keys::CLIENT_NAME] {
            self.remove_value(key).await?;
        }
        Ok(())
    }
}

/// Whether the store holds everything a protected page needs before it
/// bothers the backend: both tokens and a cached profile.
///
/// # Errors
///
/// Returns an error if the session backend cannot be read.
pub async fn has_complete_session<S: SessionStore>(store: &S) -> Result<bool, SessionError> {
    Ok(store.access_token().await?.is_some()
        && store.refresh_token().await?.is_some()
        && store.cached_profile().await?.is_some())
}
