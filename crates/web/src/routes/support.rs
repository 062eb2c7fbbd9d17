//! Contact and support messages.
//!
//! The same form is used in three places: the public contact page relays to
//! an external form service, the client dashboard posts to the backend's
//! support inbox, and the admin dashboard reads and answers that inbox.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use liquifund_core::SupportMessageId;
use serde::Deserialize;
use tracing::{info, warn};

use super::admin::AdminSection;
use super::client::ClientTab;
use super::{MessageQuery, redirect_with_error, redirect_with_success};
use crate::api::ApiError;
use crate::api::types::ContactMessage;
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdmin, RequireSession};
use crate::state::AppState;
use crate::validation::{FieldErrors, validate_contact};

/// Where a support form was submitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportMode {
    /// Public contact page, relayed to the form service.
    PublicContact,
    /// Client dashboard, posted to the support inbox.
    DashboardSupport,
    /// Admin dashboard: the inbox itself.
    AdminSupport,
}

impl SupportMode {
    /// Page the visitor returns to after submitting.
    #[must_use]
    pub fn return_path(&self) -> String {
        match self {
            Self::PublicContact => "/contact".to_string(),
            Self::DashboardSupport => ClientTab::Support.path(),
            Self::AdminSupport => AdminSection::Support.path(),
        }
    }
}

/// Result of sending a message, as shown on the submit button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    Failed,
    NetworkError,
}

impl SendStatus {
    #[must_use]
    pub fn from_result(result: &std::result::Result<(), ApiError>) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(ApiError::Transport(_)) => Self::NetworkError,
            Err(_) => Self::Failed,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Sent => "Message Sent!",
            Self::Failed => "Failed to Send",
            Self::NetworkError => "Network Error",
        }
    }

    fn redirect(self, mode: SupportMode) -> Redirect {
        let path = mode.return_path();
        match self {
            Self::Sent => redirect_with_success(&path, self.label()),
            Self::Failed | Self::NetworkError => redirect_with_error(&path, self.label()),
        }
    }
}

/// Contact form data.
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    fn validate(&self) -> std::result::Result<ContactMessage, FieldErrors> {
        let message = ContactMessage {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
        };
        validate_contact(&message.name, &message.email, &message.message)
            .into_result()
            .map(|()| message)
    }
}

// =============================================================================
// Public contact page
// =============================================================================

/// Public contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub form: ContactForm,
    pub errors: FieldErrors,
}

/// Display the contact page.
pub async fn contact_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    ContactTemplate {
        error: query.error,
        success: query.success,
        form: ContactForm::default(),
        errors: FieldErrors::new(),
    }
}

/// Relay the public contact form.
pub async fn contact(State(state): State<AppState>, Form(form): Form<ContactForm>) -> Response {
    let message = match form.validate() {
        Ok(message) => message,
        Err(errors) => {
            let page = ContactTemplate {
                error: None,
                success: None,
                form,
                errors,
            };
            return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
        }
    };

    let status = match state.config().contact_form_url.as_ref() {
        Some(endpoint) => {
            let result = state.api().relay_contact_form(endpoint, &message).await;
            if let Err(err) = &result {
                warn!(error = %err, "Contact form relay failed");
            }
            SendStatus::from_result(&result)
        }
        None => {
            warn!("Contact form submitted but no form service is configured");
            SendStatus::Failed
        }
    };
    status.redirect(SupportMode::PublicContact).into_response()
}

// =============================================================================
// Dashboard support
// =============================================================================

/// Send a message to the support inbox from the client dashboard.
pub async fn dashboard_message(
    State(state): State<AppState>,
    guard: RequireSession,
    Form(form): Form<ContactForm>,
) -> Result<Redirect> {
    let mode = SupportMode::DashboardSupport;
    let message = match form.validate() {
        Ok(message) => message,
        Err(errors) => {
            let reason = errors.first().unwrap_or("Please fill in every field");
            return Ok(redirect_with_error(&mode.return_path(), reason));
        }
    };

    let result = state
        .api()
        .authed(&guard.session)
        .send_support_message(&message)
        .await;
    match result {
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        result => {
            if let Err(err) = &result {
                warn!(error = %err, "Support message failed");
            } else {
                info!(email = %guard.profile.email, "Support message sent");
            }
            Ok(SendStatus::from_result(&result).redirect(mode))
        }
    }
}

// =============================================================================
// Admin inbox
// =============================================================================

/// Reply form data.
#[derive(Debug, Deserialize)]
pub struct ReplyForm {
    pub reply: String,
}

/// Answer a support message.
pub async fn admin_reply(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Path(id): Path<SupportMessageId>,
    Form(form): Form<ReplyForm>,
) -> Result<Redirect> {
    let path = SupportMode::AdminSupport.return_path();
    let reply = form.reply.trim();
    if reply.is_empty() {
        return Ok(Redirect::to(&path));
    }

    match state
        .api()
        .authed(&guard.session)
        .reply_to_message(id, reply)
        .await
    {
        Ok(()) => {
            info!(message_id = %id, "Support reply sent");
            Ok(redirect_with_success(&path, "Reply sent"))
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(message_id = %id, error = %err, "Failed to send reply");
            Ok(redirect_with_error(&path, &err.message_or("Failed to send reply")))
        }
    }
}

/// Mark a support message read.
pub async fn admin_mark_read(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Path(id): Path<SupportMessageId>,
) -> Result<Redirect> {
    let path = SupportMode::AdminSupport.return_path();
    match state
        .api()
        .authed(&guard.session)
        .mark_message_read(id)
        .await
    {
        Ok(()) => Ok(Redirect::to(&path)),
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(message_id = %id, error = %err, "Failed to mark message read");
            Ok(redirect_with_error(&path, &err.message_or("Failed to mark as read")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn test_send_status_from_result() {
        assert_eq!(SendStatus::from_result(&Ok(())), SendStatus::Sent);
        assert_eq!(
            SendStatus::from_result(&Err(ApiError::Transport("refused".into()))),
            SendStatus::NetworkError
        );
        assert_eq!(
            SendStatus::from_result(&Err(ApiError::Decode("bad".into()))),
            SendStatus::Failed
        );
    }

    #[test]
    fn test_redirect_targets_follow_mode() {
        let sent = SendStatus::Sent
            .redirect(SupportMode::DashboardSupport)
            .into_response();
        assert_eq!(
            sent.headers()[LOCATION],
            "/client-dashboard?tab=support&success=Message%20Sent%21"
        );
        let failed = SendStatus::Failed
            .redirect(SupportMode::PublicContact)
            .into_response();
        assert_eq!(failed.headers()[LOCATION], "/contact?error=Failed%20to%20Send");
    }

    #[test]
    fn test_contact_form_trims_and_validates() {
        let form = ContactForm {
            name: "  Amina ".into(),
            email: "amina@example.com".into(),
            message: " Hello ".into(),
        };
        let message = form.validate().unwrap_or_else(|_| panic!("valid form"));
        assert_eq!(message.name, "Amina");
        assert_eq!(message.message, "Hello");

        let empty = ContactForm::default();
        assert!(empty.validate().is_err());
    }
}
