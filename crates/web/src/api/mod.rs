//! Client for the LiquiFund REST API.
//!
//! [`ApiClient`] is the single place that turns a backend path into an HTTP
//! request: it prefixes the configured base URL, attaches the bearer token and
//! JSON content type, and serializes the body.
//!
//! Two layers sit on top of the raw [`ApiClient::fetch`]:
//!
//! - typed calls ([`ApiClient::call`]) that decode 2xx bodies and turn any
//!   other status into [`ApiError::Rejected`] with human-readable messages
//! - [`Authed`], a view bound to a [`SessionStore`] that reads the token at
//!   call time and is the one place that reacts to 401/403 by clearing the
//!   session and returning [`ApiError::SessionExpired`]
//!
//! Endpoint wrappers live in the submodules, grouped by backend area.

pub mod auth;
pub mod kyc;
pub mod payments;
pub mod referrals;
pub mod rentals;
pub mod support;
pub mod types;
pub mod users;
pub mod withdrawals;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::session::{SessionError, SessionStore};

// =============================================================================
// Errors
// =============================================================================

/// A non-2xx answer from the backend, with its error body flattened.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub status: StatusCode,
    /// Every message in the body, in the order the backend sent them.
    pub messages: Vec<String>,
    /// First message per field, for bodies shaped as a field map.
    pub fields: BTreeMap<String, String>,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.messages.is_empty() {
            write!(f, "Request failed with status {}", self.status.as_u16())
        } else {
            f.write_str(&self.messages.join(", "))
        }
    }
}

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout).
    #[error("Could not reach the server: {0}")]
    Transport(String),

    /// A 2xx response whose body was not what we expected.
    #[error("Unexpected response from the server: {0}")]
    Decode(String),

    /// The backend answered with a non-2xx status.
    #[error("{0}")]
    Rejected(Rejection),

    /// The backend answered 401 or 403 and the session was cleared.
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,

    /// The path could not be joined onto the base URL.
    #[error("Invalid API URL: {0}")]
    Url(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    /// Status of a rejected request.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Rejected(rejection) => Some(rejection.status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Field errors of a rejected request, empty for every other error.
    #[must_use]
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        match self {
            Self::Rejected(rejection) => rejection.fields.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// The backend's own messages joined with `", "`, else `fallback`.
    /// Transport failures keep their generic network message.
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Self::Rejected(rejection) if !rejection.messages.is_empty() => {
                rejection.messages.join(", ")
            }
            Self::Transport(_) | Self::SessionExpired => self.user_message(),
            _ => fallback.to_string(),
        }
    }

    /// Message safe to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Network error. Please check your connection and try again.".to_string(),
            Self::Decode(_) | Self::Url(_) | Self::Session(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Rejected(_) | Self::SessionExpired => self.to_string(),
        }
    }
}

// =============================================================================
// Error bodies
// =============================================================================

fn push_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| push_messages(item, out)),
        Value::Object(map) => map.values().for_each(|item| push_messages(item, out)),
        _ => {}
    }
}

/// Flatten a backend error body into messages and per-field errors.
///
/// Recognised shapes, in priority order:
/// `{"errors": {field: [msg]}}`, `{"detail": msg}`, `{"message": msg}`,
/// `{"error": msg}`, and a bare `{field: [msg]}` map.
#[must_use]
pub fn flatten_error_body(body: &Value) -> (Vec<String>, BTreeMap<String, String>) {
    let mut messages = Vec::new();
    let mut fields = BTreeMap::new();

    let Value::Object(map) = body else {
        push_messages(body, &mut messages);
        return (messages, fields);
    };

    let field_map = if let Some(errors) = map.get("errors") {
        push_messages(errors, &mut messages);
        errors.as_object()
    } else if let Some(text) = ["detail", "message", "error"]
        .iter()
        .find_map(|key| map.get(*key))
    {
        push_messages(text, &mut messages);
        None
    } else {
        push_messages(body, &mut messages);
        Some(map)
    };

    if let Some(field_map) = field_map {
        for (field, value) in field_map {
            let mut first = Vec::new();
            push_messages(value, &mut first);
            if let Some(message) = first.into_iter().next() {
                fields.insert(field.clone(), message);
            }
        }
    }

    (messages, fields)
}

// =============================================================================
// Requests
// =============================================================================

/// Method, extra headers and JSON body of a backend call.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the body cannot be serialized.
    pub fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?);
        Ok(self)
    }

    #[must_use]
    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Merge caller headers with the gateway defaults.
///
/// Caller headers go in first; `Authorization` (when a token is present) and
/// `Content-Type: application/json` are written last and replace any caller
/// value for the same header.
#[must_use]
pub fn merge_headers(caller: HeaderMap, token: Option<&SecretString>) -> HeaderMap {
    let mut headers = caller;
    if let Some(token) = token
        && let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
    {
        headers.insert(AUTHORIZATION, value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// HTTP client for the LiquiFund REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("liquifund-web/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for a backend path. The path is appended to the base URL
    /// verbatim, so a base URL with a path prefix keeps it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Url`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Url::parse(&format!("{base}{path}")).map_err(|e| ApiError::Url(e.to_string()))
    }

    /// Send a request and return the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] only when no response was received.
    #[instrument(skip(self, token, options), fields(method = %options.method))]
    pub async fn fetch(
        &self,
        path: &str,
        token: Option<&SecretString>,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(path)?;
        let headers = merge_headers(options.headers, token);

        let mut request = self.client.request(options.method, url).headers(headers);
        if let Some(body) = options.body {
            let bytes = serde_json::to_vec(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
            request = request.body(bytes);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status = response.status().as_u16(), "API response");
        Ok(response)
    }

    /// Send a request and decode a 2xx JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] for non-2xx responses, plus the errors
    /// of [`ApiClient::fetch`] and [`ApiError::Decode`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&SecretString>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.fetch(path, token, options).await?;
        decode(response).await
    }

    /// Send a request whose success body is irrelevant.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::call`], minus decoding.
    pub async fn call_empty(
        &self,
        path: &str,
        token: Option<&SecretString>,
        options: RequestOptions,
    ) -> Result<(), ApiError> {
        let response = self.fetch(path, token, options).await?;
        ensure_success(response).await.map(drop)
    }

    /// Bind the client to a session.
    #[must_use]
    pub const fn authed<'a, S: SessionStore>(&'a self, store: &'a S) -> Authed<'a, S> {
        Authed { api: self, store }
    }

    /// The underlying HTTP client, for calls that leave the backend (the
    /// public contact form relay).
    pub(crate) const fn http(&self) -> &Client {
        &self.client
    }
}

async fn rejection(response: Response) -> ApiError {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let (messages, fields) = flatten_error_body(&body);
    ApiError::Rejected(Rejection {
        status,
        messages,
        fields,
    })
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejection(response).await)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

// =============================================================================
// Session-bound calls
// =============================================================================

/// The API client bound to one visitor's session.
///
/// Every call reads the access token from the store when it is made, and
/// every 401/403 clears the store.
pub struct Authed<'a, S: SessionStore> {
    api: &'a ApiClient,
    store: &'a S,
}

impl<S: SessionStore> Authed<'_, S> {
    async fn send(&self, path: &str, options: RequestOptions) -> Result<Response, ApiError> {
        let token = self.store.access_token().await?;
        let response = self.api.fetch(path, token.as_ref(), options).await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!(status = response.status().as_u16(), path, "Session rejected by API, clearing");
            self.store.clear_session().await?;
            return Err(ApiError::SessionExpired);
        }

        Ok(response)
    }

    /// Typed call through the session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SessionExpired`] on 401/403, otherwise as
    /// [`ApiClient::call`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.send(path, options).await?;
        decode(response).await
    }

    /// Call through the session, ignoring the success body.
    ///
    /// # Errors
    ///
    /// As [`Authed::call`].
    pub async fn call_empty(&self, path: &str, options: RequestOptions) -> Result<(), ApiError> {
        let response = self.send(path, options).await?;
        ensure_success(response).await.map(drop)
    }

    /// Call through the session and decode the body as an optional JSON value.
    ///
    /// Used for acknowledgements whose body may be empty.
    ///
    /// # Errors
    ///
    /// As [`Authed::call`], except an empty or non-JSON success body is `None`.
    pub async fn call_lenient<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        let response = self.send(path, options).await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await.ok())
    }

    pub const fn store(&self) -> &S {
        self.store
    }

    pub const fn client(&self) -> &ApiClient {
        self.api
    }
}

/// `Accept: application/json`, for endpoints outside the backend.
#[must_use]
pub fn accept_json() -> (reqwest::header::HeaderName, HeaderValue) {
    (ACCEPT, HeaderValue::from_static("application/json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_defaults_win_over_caller_headers() {
        let mut caller = HeaderMap::new();
        caller.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        caller.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        caller.insert("x-trace", HeaderValue::from_static("1"));

        let merged = merge_headers(caller, Some(&SecretString::from("fresh")));
        assert_eq!(merged[CONTENT_TYPE], "application/json");
        assert_eq!(merged[AUTHORIZATION], "Bearer fresh");
        assert_eq!(merged["x-trace"], "1");
    }

    #[test]
    fn test_no_token_keeps_caller_authorization() {
        let mut caller = HeaderMap::new();
        caller.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let merged = merge_headers(caller, None);
        assert_eq!(merged[AUTHORIZATION], "Basic abc");
        assert_eq!(merged[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let api = client("https://api.example/backend/");
        assert_eq!(
            api.endpoint("/api/auth/login/").unwrap().as_str(),
            "https://api.example/backend/api/auth/login/"
        );
        assert_eq!(
            client("http://127.0.0.1:8000")
                .endpoint("api/payments/balance/")
                .unwrap()
                .as_str(),
            "http://127.0.0.1:8000/api/payments/balance/"
        );
    }

    #[test]
    fn test_flatten_errors_map() {
        let (messages, fields) = flatten_error_body(&json!({
            "errors": {"email": ["Enter a valid email."], "password": ["Too short.", "Too common."]}
        }));
        assert_eq!(messages, vec!["Enter a valid email.", "Too short.", "Too common."]);
        assert_eq!(fields["password"], "Too short.");
    }

    #[test]
    fn test_flatten_detail_message_and_error() {
        assert_eq!(
            flatten_error_body(&json!({"detail": "No active account found"})).0,
            vec!["No active account found"]
        );
        assert_eq!(
            flatten_error_body(&json!({"message": "Invalid token"})).0,
            vec!["Invalid token"]
        );
        assert_eq!(
            flatten_error_body(&json!({"error": "Insufficient balance"})).0,
            vec!["Insufficient balance"]
        );
    }

    #[test]
    fn test_flatten_bare_field_map() {
        let (messages, fields) = flatten_error_body(&json!({
            "email": ["user with this email already exists."],
            "non_field_errors": ["Passwords do not match"]
        }));
        assert_eq!(messages.len(), 2);
        assert_eq!(fields["email"], "user with this email already exists.");
    }

    #[test]
    fn test_rejection_display_joins_messages() {
        let rejection = Rejection {
            status: StatusCode::BAD_REQUEST,
            messages: vec!["one".into(), "two".into()],
            fields: BTreeMap::new(),
        };
        assert_eq!(rejection.to_string(), "one, two");

        let empty = Rejection {
            status: StatusCode::BAD_GATEWAY,
            messages: Vec::new(),
            fields: BTreeMap::new(),
        };
        assert_eq!(empty.to_string(), "Request failed with status 502");
    }

    #[test]
    fn test_message_or_prefers_backend_messages() {
        let rejected = ApiError::Rejected(Rejection {
            status: StatusCode::BAD_REQUEST,
            messages: vec!["No active account found".into()],
            fields: BTreeMap::new(),
        });
        assert_eq!(rejected.message_or("Login failed."), "No active account found");

        let bare = ApiError::Rejected(Rejection {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            messages: Vec::new(),
            fields: BTreeMap::new(),
        });
        assert_eq!(bare.message_or("Login failed."), "Login failed.");
    }

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = ApiError::Transport("tcp connect error: 10.0.0.3:8000".into());
        assert!(!err.user_message().contains("10.0.0.3"));
    }
}
