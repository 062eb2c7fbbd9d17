//! Web front end configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LIQUIFUND_API_BASE_URL` - Base URL of the LiquiFund REST API
//! - `LIQUIFUND_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `LIQUIFUND_HOST` - Bind address (default: 127.0.0.1)
//! - `LIQUIFUND_PORT` - Listen port (default: 3000)
//! - `LIQUIFUND_BASE_URL` - Public URL of this site (default: <http://localhost:3000>)
//! - `LIQUIFUND_API_TIMEOUT_SECS` - Per-request timeout for API calls (default: 10)
//! - `LIQUIFUND_GOOGLE_CLIENT_ID` - Enables Google sign-in
//! - `LIQUIFUND_CONTACT_FORM_URL` - Relay endpoint for the public contact form
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Web front end configuration.
///
/// Implements `Debug` manually to redact the session secret.
#[derive(Clone)]
pub struct WebConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for this site (referral links, secure cookies)
    pub base_url: String,
    /// LiquiFund REST API base URL
    pub api_base_url: Url,
    /// Timeout applied to every API request
    pub api_timeout: Duration,
    /// Session secret
    pub session_secret: SecretString,
    /// Google OAuth client ID for the sign-in button
    pub google_client_id: Option<String>,
    /// Where the public contact form is relayed
    pub contact_form_url: Option<Url>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

impl std::fmt::Debug for WebConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("api_timeout", &self.api_timeout)
            .field("session_secret", &"[REDACTED]")
            .field("google_client_id", &self.google_client_id)
            .field("contact_form_url", &self.contact_form_url.as_ref().map(Url::as_str))
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("LIQUIFUND_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LIQUIFUND_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("LIQUIFUND_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("LIQUIFUND_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("LIQUIFUND_BASE_URL", "http://localhost:3000");
        let api_base_url = parse_url("LIQUIFUND_API_BASE_URL", &get_required_env("LIQUIFUND_API_BASE_URL")?)?;
        let api_timeout = get_env_or_default(
            "LIQUIFUND_API_TIMEOUT_SECS",
            &DEFAULT_API_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("LIQUIFUND_API_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let session_secret = get_validated_secret("LIQUIFUND_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "LIQUIFUND_SESSION_SECRET")?;

        let contact_form_url = get_optional_env("LIQUIFUND_CONTACT_FORM_URL")
            .map(|raw| parse_url("LIQUIFUND_CONTACT_FORM_URL", &raw))
            .transpose()?;

        let log_format = match get_optional_env("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            host,
            port,
            base_url,
            api_base_url,
            api_timeout,
            session_secret,
            google_client_id: get_optional_env("LIQUIFUND_GOOGLE_CLIENT_ID"),
            contact_form_url,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            log_format,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS (controls the `Secure` cookie flag).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Public link a user shares to invite others.
    #[must_use]
    pub fn referral_link(&self, code: &str) -> String {
        format!(
            "{}/referral/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(code)
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> WebConfig {
        WebConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://liquifund.example/".to_string(),
            api_base_url: Url::parse("http://127.0.0.1:8000").unwrap(),
            api_timeout: Duration::from_secs(10),
            session_secret: SecretString::from("kP9$vL2!qX7@mN4#rT8&wZ1*yB6^cD3%"),
            google_client_id: None,
            contact_form_url: None,
            sentry_dsn: Some("https://key@sentry.example/1".to_string()),
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("changeme-changeme-changeme-12345", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength(&"ab".repeat(20), "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_parse_url_rejects_other_schemes() {
        assert!(parse_url("X", "ftp://files.example").is_err());
        assert!(parse_url("X", "not a url").is_err());
        assert!(parse_url("X", "https://api.example/").is_ok());
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let config = sample_config();
        assert_eq!(config.socket_addr().port(), 3000);
        assert!(config.is_secure());
    }

    #[test]
    fn test_referral_link_trims_trailing_slash() {
        let config = sample_config();
        assert_eq!(
            config.referral_link("AB 12"),
            "https://liquifund.example/referral/AB%2012"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kP9$vL2"));
        assert!(!debug_output.contains("key@sentry"));
        assert!(debug_output.contains("127.0.0.1:8000"));
    }
}
