//! JSON endpoints polled by `static/js/dashboard.js`.
//!
//! Errors come back as `{"error": …}` with a status code; a 401 tells the
//! script to send the visitor to the login page.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use liquifund_core::Kes;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, JsonError};
use crate::insights::{LiveProfit, ProfitEstimator};
use crate::middleware::RequireToken;
use crate::polling::PaymentStatus;
use crate::state::AppState;

/// Body of `GET /api/dashboard/live`.
#[derive(Debug, Serialize)]
pub struct LiveSnapshot {
    pub balance: Kes,
    /// Balance formatted for display.
    pub balance_display: String,
    pub has_active: bool,
    pub total_profit: String,
    pub rentals: Vec<LiveProfit>,
}

/// Current balance and estimated live profit of every rental.
pub async fn live(
    State(state): State<AppState>,
    guard: RequireToken,
) -> Result<Json<LiveSnapshot>, JsonError> {
    let authed = state.api().authed(&guard.session);
    let (balance, rentals) = tokio::join!(authed.balance(), authed.user_rentals());
    let balance = balance?;
    let rentals = rentals?;

    let estimator = ProfitEstimator::live();
    let now = Utc::now();
    Ok(Json(LiveSnapshot {
        balance,
        balance_display: balance.to_string(),
        has_active: rentals.iter().any(|r| r.status.is_active()),
        total_profit: estimator.total(&rentals, now),
        rentals: estimator.snapshot(&rentals, now),
    }))
}

/// Body of `GET /api/dashboard/payments/{id}`.
#[derive(Debug, Serialize)]
pub struct PaymentStatusBody {
    #[serde(flatten)]
    pub status: PaymentStatus,
    /// Text for the payment banner.
    pub banner: String,
}

impl From<PaymentStatus> for PaymentStatusBody {
    fn from(status: PaymentStatus) -> Self {
        let banner = match &status {
            PaymentStatus::Pending { .. } => "Check your phone for M-Pesa prompt...".to_string(),
            PaymentStatus::Confirmed { .. } => "Payment confirmed".to_string(),
            PaymentStatus::TimedOut => "Payment timeout. Please try again.".to_string(),
            PaymentStatus::Failed { message } => format!("Payment failed: {message}"),
        };
        Self { status, banner }
    }
}

fn owner_email(guard: &RequireToken) -> Result<String, JsonError> {
    guard
        .profile
        .as_ref()
        .map(|p| p.email.clone())
        .ok_or_else(|| JsonError(AppError::NotFound("payment watch".to_string())))
}

/// Status of a payment watch started by this visitor.
pub async fn payment_status(
    State(state): State<AppState>,
    guard: RequireToken,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentStatusBody>, JsonError> {
    let owner = owner_email(&guard)?;
    state
        .payments()
        .status(id, &owner)
        .await
        .map(|status| Json(status.into()))
        .ok_or_else(|| JsonError(AppError::NotFound("payment watch".to_string())))
}

/// Stop a payment watch, e.g. when the visitor leaves the page.
pub async fn cancel_payment(
    State(state): State<AppState>,
    guard: RequireToken,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, JsonError> {
    let owner = owner_email(&guard)?;
    if state.payments().cancel(id, &owner).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonError(AppError::NotFound("payment watch".to_string())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_is_flat() {
        let body = PaymentStatusBody::from(PaymentStatus::Failed {
            message: "Insufficient funds".into(),
        });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["message"], "Insufficient funds");
        assert_eq!(value["banner"], "Payment failed: Insufficient funds");
    }

    #[test]
    fn test_timeout_message() {
        let body = PaymentStatusBody::from(PaymentStatus::TimedOut);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "timed_out");
        assert_eq!(value["banner"], "Payment timeout. Please try again.");
    }
}
