use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use super::{SessionError, SessionStore, SessionTokens};
use crate::api::types::Profile;

#[derive(Debug, Default)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
    profile: Option<Profile>,
    client_name: Option<String>,
}

/// In-process session store.
///
/// Used by background tasks that act for a user after the request that
/// started them has finished, and by tests. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slots: Arc<Mutex<Slots>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only an access token.
    #[must_use]
    pub fn with_access_token(token: &SecretString) -> Self {
        let slots = Slots {
            access: Some(token.expose_secret().to_string()),
            ..Slots::default()
        };
        Self {
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    /// A fully signed-in store.
    #[must_use]
    pub fn signed_in(access: &str, refresh: &str, profile: Profile) -> Self {
        let slots = Slots {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
            client_name: Some(profile.display_name().to_string()),
            profile: Some(profile),
        };
        Self {
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    /// Raw access token, for assertions.
    pub async fn peek_access(&self) -> Option<String> {
        self.slots.lock().await.access.clone()
    }
}

impl SessionStore for MemorySessionStore {
    async fn access_token(&self) -> Result<Option<SecretString>, SessionError> {
        Ok(self.slots.lock().await.access.clone().map(SecretString::from))
    }

    async fn refresh_token(&self) -> Result<Option<SecretString>, SessionError> {
        Ok(self.slots.lock().await.refresh.clone().map(SecretString::from))
    }

    async fn cached_profile(&self) -> Result<Option<Profile>, SessionError> {
        Ok(self.slots.lock().await.profile.clone())
    }

    async fn client_name(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slots.lock().await.client_name.clone())
    }

    async fn set_session(
        &self,
        tokens: SessionTokens,
        profile: Option<Profile>,
    ) -> Result<(), SessionError> {
        let mut slots = self.slots.lock().await;
        slots.access = Some(tokens.access.expose_secret().to_string());
        slots.refresh = Some(tokens.refresh.expose_secret().to_string());
        if let Some(profile) = profile {
            slots.client_name = Some(profile.display_name().to_string());
            slots.profile = Some(profile);
        }
        drop(slots);
        Ok(())
    }

    async fn set_profile(&self, profile: Profile) -> Result<(), SessionError> {
        let mut slots = self.slots.lock().await;
        slots.client_name = Some(profile.display_name().to_string());
        slots.profile = Some(profile);
        drop(slots);
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), SessionError> {
        *self.slots.lock().await = Slots::default();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::has_complete_session;

    fn profile() -> Profile {
        serde_json::from_value(serde_json::json!({
            "email": "amina@example.com",
            "full_name": "Amina Otieno"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_set_session_then_clear() {
        let store = MemorySessionStore::new();
        assert!(!has_complete_session(&store).await.unwrap());

        store
            .set_session(SessionTokens::new("a", "r"), Some(profile()))
            .await
            .unwrap();
        assert!(has_complete_session(&store).await.unwrap());
        assert_eq!(store.client_name().await.unwrap().as_deref(), Some("Amina Otieno"));
        assert_eq!(store.peek_access().await.as_deref(), Some("a"));

        store.clear_session().await.unwrap();
        assert!(store.access_token().await.unwrap().is_none());
        assert!(store.cached_profile().await.unwrap().is_none());
        assert!(store.client_name().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tokens_without_profile_are_incomplete() {
        let store = MemorySessionStore::new();
        store
            .set_session(SessionTokens::new("a", "r"), None)
            .await
            .unwrap();
        assert!(!has_complete_session(&store).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemorySessionStore::new();
        let other = store.clone();
        store
            .set_session(SessionTokens::new("a", "r"), None)
            .await
            .unwrap();
        assert_eq!(other.peek_access().await.as_deref(), Some("a"));
    }
}
