//! Pages that only need an access token: earnings, KYC and withdrawals.
//!
//! These skip the maintenance check. An expired token is caught by the first
//! backend call, which clears the session and redirects to the login page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDateTime;
use liquifund_core::{Kes, MINIMUM_WITHDRAWAL_KES};
use serde::Deserialize;
use tracing::{info, warn};

use super::{MessageQuery, redirect_with_success};
use crate::api::ApiError;
use crate::api::types::{KycDetails, ReferralEntry};
use crate::error::{AppError, Result, or_default_logged};
use crate::filters;
use crate::insights::trend::TrendPoint;
use crate::insights::{ChartFrame, EarningsTrend, Transaction};
use crate::middleware::RequireToken;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::validation::{FieldErrors, validate_kyc, validate_withdrawal};

/// Quick-pick withdrawal amounts, in KES.
const QUICK_AMOUNTS: [u32; 5] = [300, 500, 1000, 2000, 5000];

async fn greeting_name<S: SessionStore>(store: &S) -> String {
    store
        .client_name()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| "there".to_string())
}

// =============================================================================
// Earnings (/home)
// =============================================================================

/// One y-axis label and where it sits.
#[derive(Debug, Clone)]
pub struct AxisTick {
    pub y: String,
    pub label: String,
}

/// Earnings page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/home.html")]
pub struct HomeTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub client_name: String,
    pub total_earnings: Kes,
    pub deposits_total: Kes,
    pub frame: ChartFrame,
    pub line_path: String,
    pub area_path: String,
    pub points: Vec<TrendPoint>,
    pub ticks: Vec<AxisTick>,
    pub transactions: Vec<Transaction>,
    pub referrals: Vec<ReferralEntry>,
}

/// Chart fields for the earnings page.
fn chart_ticks(trend: &EarningsTrend) -> Vec<AxisTick> {
    trend
        .frame()
        .grid_lines()
        .into_iter()
        .zip(trend.y_ticks())
        .map(|(y, label)| AxisTick { y, label })
        .collect()
}

/// Display the earnings page.
pub async fn home(
    State(state): State<AppState>,
    guard: RequireToken,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let authed = state.api().authed(&guard.session);
    let (history, earnings, referrals) = tokio::join!(
        authed.payment_history(),
        authed.earnings(),
        authed.referral_history(),
    );
    let history = or_default_logged(history, "payment history")?;
    let total_earnings = or_default_logged(earnings, "earnings")?;
    let referrals = or_default_logged(referrals, "referral history")?;

    let transactions: Vec<Transaction> = history.iter().map(Transaction::from).collect();
    let trend = EarningsTrend::from_transactions(&transactions, ChartFrame::default());

    Ok(HomeTemplate {
        error: query.error,
        success: query.success,
        client_name: greeting_name(&guard.session).await,
        total_earnings,
        deposits_total: trend.total(),
        frame: trend.frame(),
        line_path: trend.line_path(),
        area_path: trend.area_path(),
        points: trend.points(),
        ticks: chart_ticks(&trend),
        transactions: newest_first(transactions),
        referrals,
    }
    .into_response())
}

// =============================================================================
// KYC
// =============================================================================

/// KYC form data.
#[derive(Debug, Deserialize)]
pub struct KycForm {
    pub national_id: String,
    pub address: String,
}

/// KYC page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/kyc.html")]
pub struct KycTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub details: KycDetails,
    pub errors: FieldErrors,
}

/// Display the KYC form with the current details.
pub async fn kyc_page(
    State(state): State<AppState>,
    guard: RequireToken,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let (details, error) = match state.api().authed(&guard.session).kyc_details().await {
        Ok(details) => (details, query.error),
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, "Could not load KYC details");
            (KycDetails::default(), Some(err.message_or("Error fetching KYC details.")))
        }
    };

    Ok(KycTemplate {
        error,
        success: query.success,
        details,
        errors: FieldErrors::new(),
    }
    .into_response())
}

/// Update the national id and address.
pub async fn update_kyc(
    State(state): State<AppState>,
    guard: RequireToken,
    Form(form): Form<KycForm>,
) -> Result<Response> {
    let details = KycDetails {
        national_id: form.national_id.trim().to_string(),
        address: form.address.trim().to_string(),
    };
    let errors = validate_kyc(&details.national_id, &details.address);
    if !errors.is_empty() {
        let page = KycTemplate {
            error: Some("Please fix the errors in the form".to_string()),
            success: None,
            details,
            errors,
        };
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    match state.api().authed(&guard.session).update_kyc(&details).await {
        Ok(()) => {
            info!("KYC details updated");
            Ok(redirect_with_success("/kyc", "KYC details updated successfully.").into_response())
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(error = %err, "KYC update failed");
            let mut errors = FieldErrors::new();
            errors.merge_backend(&err.field_errors(), &["national_id", "address"]);
            let page = KycTemplate {
                error: Some(err.message_or("Error updating KYC details.")),
                success: None,
                details,
                errors,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

// =============================================================================
// Withdraw
// =============================================================================

/// Withdrawal form data.
#[derive(Debug, Deserialize)]
pub struct WithdrawForm {
    pub mobile_number: String,
    pub amount: String,
}

/// Withdraw page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/withdraw.html")]
pub struct WithdrawTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub balance: Option<Kes>,
    pub minimum: u32,
    pub quick_amounts: Vec<u32>,
    pub mobile_number: String,
    pub amount: String,
    pub errors: FieldErrors,
}

impl WithdrawTemplate {
    fn new(balance: Option<Kes>) -> Self {
        Self {
            error: None,
            success: None,
            balance,
            minimum: MINIMUM_WITHDRAWAL_KES,
            quick_amounts: QUICK_AMOUNTS.to_vec(),
            mobile_number: String::new(),
            amount: String::new(),
            errors: FieldErrors::new(),
        }
    }
}

/// Display the withdrawal form.
pub async fn withdraw_page(
    State(state): State<AppState>,
    guard: RequireToken,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    let balance = match state.api().authed(&guard.session).balance().await {
        Ok(balance) => Some(balance),
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, "Could not load balance for withdraw page");
            None
        }
    };

    let mut page = WithdrawTemplate::new(balance);
    page.error = query.error;
    page.success = query.success;
    Ok(page.into_response())
}

/// Submit a withdrawal request.
pub async fn withdraw(
    State(state): State<AppState>,
    guard: RequireToken,
    Form(form): Form<WithdrawForm>,
) -> Result<Response> {
    let input = match validate_withdrawal(&form.mobile_number, &form.amount) {
        Ok(input) => input,
        Err(errors) => {
            let mut page = WithdrawTemplate::new(None);
            page.error = errors.first().map(str::to_string);
            page.mobile_number = form.mobile_number;
            page.amount = form.amount;
            page.errors = errors;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let authed = state.api().authed(&guard.session);
    match authed
        .request_withdrawal(&input.mobile_number, input.amount)
        .await
    {
        Ok(_) => {
            info!(amount = %input.amount, "Withdrawal requested");
            Ok(redirect_with_success(
                "/withdraw",
                "Withdrawal request submitted successfully! Expect your funds within 48 hours.",
            )
            .into_response())
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(AppError::from(err)),
        Err(err) => {
            warn!(error = %err, "Withdrawal request failed");
            let mut page = WithdrawTemplate::new(None);
            page.error = Some(err.message_or("Failed to process withdrawal. Try again."));
            page.mobile_number = form.mobile_number;
            page.amount = form.amount;
            page.errors
                .merge_backend(&err.field_errors(), &["mobile_number", "amount"]);
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Transactions newest first, as listed under the chart.
#[must_use]
pub fn newest_first(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    transactions
}

/// `2025-03-01 09:00` style timestamp for tables.
#[must_use]
pub fn short_timestamp(at: &NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::insights::TransactionKind;
    use liquifund_core::PaymentId;

    fn tx(id: i64, when: &str) -> Transaction {
        Transaction {
            id: PaymentId::new(id),
            kind: TransactionKind::Deposit,
            amount: Kes::from_shillings(100),
            created_at: NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn test_newest_first() {
        let sorted = newest_first(vec![
            tx(1, "2025-03-01 09:00:00"),
            tx(2, "2025-03-03 09:00:00"),
            tx(3, "2025-03-02 09:00:00"),
        ]);
        let ids: Vec<i64> = sorted.iter().map(|t| t.id.as_i64()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(short_timestamp(&sorted[0].created_at), "2025-03-03 09:00");
    }

    #[test]
    fn test_chart_ticks_pair_grid_and_labels() {
        let trend = EarningsTrend::from_transactions(
            &[tx(1, "2025-03-01 09:00:00"), tx(2, "2025-03-02 09:00:00")],
            ChartFrame::default(),
        );
        let ticks = chart_ticks(&trend);
        assert_eq!(ticks.len(), 5);
        assert_eq!(ticks[0].y, "30.00");
        assert_eq!(ticks[0].label, "200.00");
        assert_eq!(ticks[4].label, "100.00");
    }

    #[test]
    fn test_withdraw_template_defaults() {
        let page = WithdrawTemplate::new(None);
        assert_eq!(page.minimum, 300);
        assert_eq!(page.quick_amounts, vec![300, 500, 1000, 2000, 5000]);
    }
}
