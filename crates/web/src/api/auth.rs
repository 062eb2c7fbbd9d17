//! Authentication endpoints under `/api/auth/`.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::types::{
    Acknowledgement, ForgotPasswordRequest, GoogleLoginRequest, LoginRequest, LoginResponse,
    Profile, RegisterRequest, ResetPasswordRequest,
};
use super::{ApiClient, ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl ApiClient {
    /// Exchange email and password for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with the backend's reason on bad credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let options =
            RequestOptions::method(Method::POST).json(&LoginRequest { email, password })?;
        self.call("/api/auth/login/", None, options).await
    }

    /// Exchange a Google ID token credential for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend refuses the credential.
    #[instrument(skip_all)]
    pub async fn google_login(&self, credential: &str) -> Result<LoginResponse, ApiError> {
        let options = RequestOptions::method(Method::POST).json(&GoogleLoginRequest {
            token: credential,
        })?;
        self.call("/api/auth/google-login/", None, options).await
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with per-field errors when the backend
    /// refuses the registration.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<Acknowledgement, ApiError> {
        let options = RequestOptions::method(Method::POST).json(request)?;
        self.call("/api/auth/register/", None, options).await
    }

    /// Ask the backend to email a reset link.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend refuses.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<Acknowledgement, ApiError> {
        let options =
            RequestOptions::method(Method::POST).json(&ForgotPasswordRequest { email })?;
        self.call("/api/auth/forgot-password/", None, options).await
    }

    /// Check that a reset link is still valid.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] for invalid or expired links.
    #[instrument(skip(self, token))]
    pub async fn validate_reset_token(&self, uidb64: &str, token: &str) -> Result<(), ApiError> {
        self.call_empty(&reset_path(uidb64, token), None, RequestOptions::get())
            .await
    }

    /// Set a new password through a reset link.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the link is invalid or the password refused.
    #[instrument(skip(self, token, password, confirm_password))]
    pub async fn reset_password(
        &self,
        uidb64: &str,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Acknowledgement, ApiError> {
        let options = RequestOptions::method(Method::POST).json(&ResetPasswordRequest {
            password,
            confirm_password,
        })?;
        self.call(&reset_path(uidb64, token), None, options).await
    }

    /// Fetch the profile for an explicit token.
    ///
    /// Deliberately bypasses the session interceptor: the auth guard and the
    /// login flow decide themselves what a failure means.
    ///
    /// # Errors
    ///
    /// Returns any transport, status or decode error unchanged.
    #[instrument(skip_all)]
    pub async fn profile_with_token(&self, token: &SecretString) -> Result<Profile, ApiError> {
        self.call("/api/auth/profile/", Some(token), RequestOptions::get())
            .await
    }
}

fn reset_path(uidb64: &str, token: &str) -> String {
    format!(
        "/api/auth/reset-password/{}/{}/",
        urlencoding::encode(uidb64),
        urlencoding::encode(token)
    )
}

impl<S: SessionStore> Authed<'_, S> {
    /// Current user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SessionExpired`] if the token is no longer accepted.
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.call("/api/auth/profile/", RequestOptions::get()).await
    }

    /// Tell the backend the session is over. Callers clear the local session
    /// regardless of the outcome.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let refresh = self.store().refresh_token().await?;
        let mut options = RequestOptions::method(Method::POST);
        if let Some(refresh) = refresh {
            options = options.json(&serde_json::json!({ "refresh": refresh.expose_secret() }))?;
        }
        self.call_empty("/api/auth/logout/", options).await
    }

    /// Permanently delete the signed-in account.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.call_empty("/api/auth/delete-account/", RequestOptions::method(Method::DELETE))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_path_encodes_segments() {
        assert_eq!(
            reset_path("MTI", "c9x-4f2a/1"),
            "/api/auth/reset-password/MTI/c9x-4f2a%2F1/"
        );
    }
}
