//! Support inbox, platform settings and the public contact relay.

use liquifund_core::SupportMessageId;
use reqwest::Method;
use secrecy::SecretString;
use serde_json::json;
use tracing::instrument;
use url::Url;

use super::types::{ContactMessage, MaintenanceStatus, SupportMessage, SupportMessages, SystemSettings};
use super::{accept_json, ApiClient, ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl ApiClient {
    /// Whether the platform is in maintenance mode.
    ///
    /// Public endpoint; the token is sent when there is one.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error. Callers treat any failure as
    /// "not in maintenance".
    pub async fn maintenance_status(
        &self,
        token: Option<&SecretString>,
    ) -> Result<MaintenanceStatus, ApiError> {
        self.call("/api/support/maintenance/", token, RequestOptions::get())
            .await
    }

    /// Forward the public contact form to the configured form service.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the service is unreachable and
    /// [`ApiError::Rejected`] if it refuses the submission.
    #[instrument(skip(self, message), fields(endpoint = %endpoint))]
    pub async fn relay_contact_form(
        &self,
        endpoint: &Url,
        message: &ContactMessage,
    ) -> Result<(), ApiError> {
        let (name, value) = accept_json();
        let response = self
            .http()
            .post(endpoint.clone())
            .header(name, value)
            .form(message)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        super::ensure_success(response).await.map(drop)
    }
}

impl<S: SessionStore> Authed<'_, S> {
    /// Global platform switches (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn system_settings(&self) -> Result<SystemSettings, ApiError> {
        self.call("/api/support/settings/", RequestOptions::get())
            .await
    }

    /// Replace the global platform switches (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn update_system_settings(
        &self,
        settings: SystemSettings,
    ) -> Result<SystemSettings, ApiError> {
        let options = RequestOptions::method(Method::PATCH).json(&settings)?;
        Ok(self
            .call_lenient("/api/support/settings/", options)
            .await?
            .unwrap_or(settings))
    }

    /// Support inbox (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn support_messages(&self) -> Result<Vec<SupportMessage>, ApiError> {
        let response: SupportMessages = self
            .call("/api/support/messages/", RequestOptions::get())
            .await?;
        Ok(response.messages)
    }

    /// Post a message to the support inbox from the dashboard.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn send_support_message(&self, message: &ContactMessage) -> Result<(), ApiError> {
        let options = RequestOptions::method(Method::POST).json(message)?;
        self.call_empty("/api/support/messages/", options).await
    }

    /// Answer a support message (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn reply_to_message(&self, id: SupportMessageId, reply: &str) -> Result<(), ApiError> {
        self.patch_message(id, &json!({ "reply": reply })).await
    }

    /// Mark a support message read (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn mark_message_read(&self, id: SupportMessageId) -> Result<(), ApiError> {
        self.patch_message(id, &json!({ "is_read": true })).await
    }

    async fn patch_message(
        &self,
        id: SupportMessageId,
        body: &serde_json::Value,
    ) -> Result<(), ApiError> {
        let options = RequestOptions::method(Method::PATCH).json(body)?;
        self.call_empty(&format!("/api/support/messages/{id}/"), options)
            .await
    }
}
