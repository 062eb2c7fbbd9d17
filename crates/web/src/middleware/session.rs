//! Session middleware configuration.
//!
//! Sessions hold the backend tokens and cached profile (see
//! [`crate::session`]). The store is in-process: a restart signs everyone out,
//! which is acceptable because the backend remains the source of truth.
//! Records are evicted by moka once their expiry passes or the store is full,
//! so abandoned sessions do not accumulate.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_moka_store::MokaStore;

use crate::config::WebConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "liquifund_session";

/// Session expiry after inactivity, in seconds (1 day).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Most sessions held at once; the least recently used go first.
const MAX_SESSIONS: u64 = 100_000;

/// Derive the 64-byte cookie signing key from the configured secret.
fn signing_key(config: &WebConfig) -> Key {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Bounded in-memory session store.
#[must_use]
pub fn session_store() -> MokaStore {
    MokaStore::new(Some(MAX_SESSIONS))
}

/// Create the session layer with an evicting in-memory store and signed
/// cookies.
#[must_use]
pub fn create_session_layer(config: &WebConfig) -> SessionManagerLayer<MokaStore, SignedCookie> {
    SessionManagerLayer::new(session_store())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use tower_sessions::cookie::time::{Duration as CookieDuration, OffsetDateTime};
    use tower_sessions::session::{Id, Record};
    use tower_sessions::session_store::SessionStore as _;

    fn record(expires_in: CookieDuration) -> Record {
        let mut data = HashMap::new();
        data.insert("access".to_string(), serde_json::json!("token"));
        Record {
            id: Id::default(),
            data,
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_store_keeps_live_sessions() {
        let store = session_store();
        let mut live = record(CookieDuration::hours(1));
        store.create(&mut live).await.unwrap();
        let loaded = store.load(&live.id).await.unwrap().unwrap();
        assert_eq!(loaded.data["access"], "token");
    }

    #[tokio::test]
    async fn test_store_evicts_expired_sessions() {
        let store = session_store();
        let mut short = record(CookieDuration::milliseconds(50));
        store.create(&mut short).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.load(&short.id).await.unwrap().is_none());
    }
}
