//! Client dashboard: rentals, wallet, renting a currency, referrals, account
//! and support.
//!
//! The page is rendered once per visit. Live numbers (balance and the
//! estimated profit of active rentals) are refreshed by `static/js/dashboard.js`
//! polling `/api/dashboard/live`, and a started payment is followed through
//! `/api/dashboard/payments/{id}`.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use liquifund_core::{CurrencyCode, Kes, RentalPlan};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::account::newest_first;
use super::pages::{PlanView, plan_catalogue};
use super::referrals::{ReferralPanel, load_panel};
use super::{redirect_with_error, redirect_with_success};
use crate::api::ApiError;
use crate::api::types::{Profile, Rental};
use crate::error::{AppError, Result, or_default_logged};
use crate::filters;
use crate::insights::{Fluctuation, ProfitEstimator, Transaction};
use crate::middleware::RequireSession;
use crate::polling::ApiBalance;
use crate::session::{MemorySessionStore, SessionStore};
use crate::state::AppState;
use crate::validation::validate_mpesa_phone;

// =============================================================================
// Tabs
// =============================================================================

/// Dashboard tab, from `?tab=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientTab {
    #[default]
    Rentals,
    Wallet,
    Rent,
    Referrals,
    Account,
    Support,
}

impl ClientTab {
    pub const ALL: [Self; 6] = [
        Self::Rentals,
        Self::Wallet,
        Self::Rent,
        Self::Referrals,
        Self::Account,
        Self::Support,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rentals => "rentals",
            Self::Wallet => "wallet",
            Self::Rent => "rent",
            Self::Referrals => "referrals",
            Self::Account => "account",
            Self::Support => "support",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rentals => "My Rentals",
            Self::Wallet => "Wallet",
            Self::Rent => "Rent Currency",
            Self::Referrals => "Referrals",
            Self::Account => "Account Settings",
            Self::Support => "Support",
        }
    }

    /// Path of the dashboard opened on this tab.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/client-dashboard?tab={}", self.as_str())
    }

    /// Unknown or missing values open the rentals tab.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for ClientTab {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| format!("unknown tab: {s}"))
    }
}

/// Navigation entry.
#[derive(Debug, Clone)]
pub struct NavItem {
    pub id: &'static str,
    pub label: &'static str,
    pub active: bool,
}

fn nav_items(current: ClientTab) -> Vec<NavItem> {
    ClientTab::ALL
        .into_iter()
        .map(|tab| NavItem {
            id: tab.as_str(),
            label: tab.label(),
            active: tab == current,
        })
        .collect()
}

// =============================================================================
// View models
// =============================================================================

/// A rental row with its estimated live profit.
#[derive(Debug, Clone)]
pub struct RentalRow {
    pub id: String,
    pub reference: String,
    pub currency: String,
    pub amount: Kes,
    pub expected_return: Kes,
    pub status: &'static str,
    pub is_active: bool,
    pub days_remaining: Option<i64>,
    pub profit: String,
    pub percent_complete: u8,
}

/// Rows for every rental, in backend order.
#[must_use]
pub fn rental_rows<F: Fluctuation>(rentals: &[Rental], estimator: &ProfitEstimator<F>) -> Vec<RentalRow> {
    let now = Utc::now();
    rentals
        .iter()
        .zip(estimator.snapshot(rentals, now))
        .map(|(rental, live)| RentalRow {
            id: rental.id.to_string(),
            reference: rental.reference(),
            currency: rental.currency.clone(),
            amount: rental.amount,
            expected_return: rental.expected_return,
            status: rental.status.as_str(),
            is_active: rental.status.is_active(),
            days_remaining: rental.days_remaining,
            profit: live.profit,
            percent_complete: live.percent_complete,
        })
        .collect()
}

/// Headline numbers shown on every tab.
#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub balance: Kes,
    pub total_earnings: Kes,
    pub pending_returns: Kes,
    /// Sum of expected returns across all rentals.
    pub doubled_money: Kes,
    pub active_rentals: usize,
    pub live_profit: String,
}

/// Client dashboard query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
    /// Payment watch to follow, set after a rental payment is started.
    pub watch: Option<Uuid>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Client dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "client/dashboard.html")]
pub struct ClientDashboardTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub tab: &'static str,
    pub nav: Vec<NavItem>,
    pub client_name: String,
    pub profile: Profile,
    pub stats: DashboardStats,
    pub rentals: Vec<RentalRow>,
    pub plans: Vec<PlanView>,
    pub watch: Option<String>,
    pub transactions: Vec<Transaction>,
    pub referrals: Option<ReferralPanel>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the client dashboard.
pub async fn dashboard(
    State(state): State<AppState>,
    guard: RequireSession,
    Query(query): Query<DashboardQuery>,
) -> Result<Response> {
    let tab = ClientTab::from_query(query.tab.as_deref());
    let authed = state.api().authed(&guard.session);

    let (balance, earnings, pending, rentals) = tokio::join!(
        authed.balance(),
        authed.earnings(),
        authed.pending_returns(),
        authed.user_rentals(),
    );
    let balance = or_default_logged(balance, "balance")?;
    let total_earnings = or_default_logged(earnings, "earnings")?;
    let pending_returns = or_default_logged(pending, "pending returns")?;
    let rentals = or_default_logged(rentals, "rentals")?;

    let transactions = if tab == ClientTab::Wallet {
        let history = or_default_logged(authed.payment_history().await, "payment history")?;
        newest_first(history.iter().map(Transaction::from).collect())
    } else {
        Vec::new()
    };
    let referrals = if tab == ClientTab::Referrals {
        Some(load_panel(&state, &guard).await?)
    } else {
        None
    };

    let estimator = ProfitEstimator::live();
    let stats = DashboardStats {
        balance,
        total_earnings,
        pending_returns,
        doubled_money: rentals.iter().map(|r| r.expected_return).sum(),
        active_rentals: rentals.iter().filter(|r| r.status.is_active()).count(),
        live_profit: estimator.total(&rentals, Utc::now()),
    };

    Ok(ClientDashboardTemplate {
        error: query.error,
        success: query.success,
        tab: tab.as_str(),
        nav: nav_items(tab),
        client_name: guard.profile.display_name().to_string(),
        profile: guard.profile.clone(),
        stats,
        rentals: rental_rows(&rentals, &estimator),
        plans: plan_catalogue(),
        watch: query.watch.map(|id| id.to_string()),
        transactions,
        referrals,
    }
    .into_response())
}

/// Rent form data.
#[derive(Debug, Deserialize)]
pub struct RentForm {
    pub currency: String,
    pub phone: String,
}

/// Start an M-Pesa STK push for a rental and begin watching for the balance
/// change that confirms it.
pub async fn rent(
    State(state): State<AppState>,
    guard: RequireSession,
    Form(form): Form<RentForm>,
) -> Result<Redirect> {
    let rent_tab = ClientTab::Rent.path();

    let phone = match validate_mpesa_phone(form.phone.trim()) {
        Ok(phone) => phone,
        Err(errors) => {
            let message = errors.first().unwrap_or("Invalid phone number");
            return Ok(redirect_with_error(&rent_tab, message));
        }
    };
    let plan = CurrencyCode::from_str(form.currency.trim())
        .ok()
        .and_then(RentalPlan::for_currency)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown currency: {}", form.currency)))?;

    let Some(token) = guard.session.access_token().await? else {
        return Err(AppError::SessionExpired);
    };
    let authed = state.api().authed(&guard.session);

    let initial = match authed.balance().await {
        Ok(balance) => balance,
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, "Could not read balance before payment");
            return Ok(payment_failed(&rent_tab, &err));
        }
    };

    if let Err(err) = authed.initiate_mpesa_payment(&phone, plan.currency).await {
        if matches!(err, ApiError::SessionExpired | ApiError::Session(_)) {
            return Err(err.into());
        }
        warn!(error = %err, currency = plan.currency.code(), "M-Pesa initiation failed");
        return Ok(payment_failed(&rent_tab, &err));
    }

    let source = ApiBalance::new(
        state.api().clone(),
        MemorySessionStore::with_access_token(&token),
    );
    let watch_id = state
        .payments()
        .start(&guard.profile.email, source, initial)
        .await;
    info!(
        watch_id = %watch_id,
        currency = plan.currency.code(),
        "M-Pesa payment initiated"
    );

    Ok(redirect_with_success(
        &format!("{rent_tab}&watch={watch_id}"),
        "Check your phone for M-Pesa prompt...",
    ))
}

fn payment_failed(path: &str, err: &ApiError) -> Redirect {
    let reason = err.message_or("Payment initiation failed");
    redirect_with_error(path, &format!("Payment failed: {reason}"))
}

/// Delete the signed-in account, then sign out.
pub async fn delete_account(
    State(state): State<AppState>,
    guard: RequireSession,
) -> Result<Redirect> {
    let account_tab = ClientTab::Account.path();
    match state.api().authed(&guard.session).delete_account().await {
        Ok(()) => {
            info!(email = %guard.profile.email, "Account deleted");
            guard.session.clear_session().await?;
            crate::error::clear_sentry_user();
            Ok(redirect_with_success("/login", "Account deleted successfully"))
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(error = %err, "Account deletion failed");
            Ok(redirect_with_error(
                &account_tab,
                &err.message_or("Failed to delete account. Please try again."),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::insights::NoFluctuation;
    use axum::http::header::LOCATION;
    use serde_json::json;

    #[test]
    fn test_tab_from_query() {
        assert_eq!(ClientTab::from_query(Some("rent")), ClientTab::Rent);
        assert_eq!(ClientTab::from_query(Some("bogus")), ClientTab::Rentals);
        assert_eq!(ClientTab::from_query(None), ClientTab::Rentals);
        assert_eq!(ClientTab::Support.path(), "/client-dashboard?tab=support");
    }

    #[test]
    fn test_nav_marks_current_tab() {
        let nav = nav_items(ClientTab::Wallet);
        assert_eq!(nav.len(), 6);
        let active: Vec<&str> = nav.iter().filter(|n| n.active).map(|n| n.id).collect();
        assert_eq!(active, vec!["wallet"]);
    }

    #[test]
    fn test_rental_rows_estimate_only_active() {
        let rentals: Vec<Rental> = serde_json::from_value(json!([
            {
                "id": 1, "currency": "USD", "amount": 1200, "expected_return": 2400,
                "status": "active", "created_at": "2020-01-01T00:00:00Z",
                "end_date": "2020-01-21T00:00:00Z"
            },
            {
                "id": 2, "currency": "CAD", "amount": 100, "expected_return": 200,
                "status": "completed", "created_at": "2020-01-01T00:00:00Z"
            }
        ]))
        .unwrap();
        let rows = rental_rows(&rentals, &ProfitEstimator::new(NoFluctuation));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].profit, "1200.00");
        assert_eq!(rows[0].percent_complete, 100);
        assert!(rows[0].is_active);
        assert_eq!(rows[1].profit, "0.00");
        assert!(!rows[1].is_active);
    }

    #[test]
    fn test_payment_failed_message() {
        let err = ApiError::Rejected(crate::api::Rejection {
            status: reqwest::StatusCode::BAD_REQUEST,
            messages: vec!["Insufficient funds".to_string()],
            fields: std::collections::BTreeMap::new(),
        });
        let response = payment_failed("/client-dashboard?tab=rent", &err).into_response();
        assert_eq!(
            response.headers()[LOCATION],
            "/client-dashboard?tab=rent&error=Payment%20failed%3A%20Insufficient%20funds"
        );
    }
}
