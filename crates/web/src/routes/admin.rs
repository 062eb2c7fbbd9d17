//! Admin dashboard: overview, users, withdrawals, referrals, rentals, KYC,
//! support inbox and platform settings.
//!
//! Each section loads only what it shows. Filters and grouping run on the
//! server over the freshly fetched lists (see [`crate::insights`]), and every
//! action redirects back to its section with a message.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use liquifund_core::{
    Kes, KycFormId, KycStatus, UserId, WithdrawalAction, WithdrawalId, WithdrawalStatus,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::{redirect_with_error, redirect_with_success};
use crate::api::ApiError;
use crate::api::types::{
    AdminRentals, AdminUser, KycForm, ReferralOverview, SupportMessage, SystemSettings, Withdrawal,
};
use crate::api::users::{AccountAction, WALLET_AWARD_KES};
use crate::error::{AppError, Result, or_default_logged};
use crate::filters;
use crate::insights::{
    ReferralFilter, ReferrerGroup, StatusCount, UserWithdrawals, WithdrawalFilter,
    enrich_withdrawals, group_referrals_by_referrer, group_withdrawals_by_user,
    withdrawal_status_breakdown,
};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

// =============================================================================
// Sections
// =============================================================================

/// Dashboard section, from `?section=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminSection {
    #[default]
    Overview,
    Users,
    Withdrawals,
    Referrals,
    Rentals,
    Kyc,
    Support,
    Settings,
}

impl AdminSection {
    pub const ALL: [Self; 8] = [
        Self::Overview,
        Self::Users,
        Self::Withdrawals,
        Self::Referrals,
        Self::Rentals,
        Self::Kyc,
        Self::Support,
        Self::Settings,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Users => "users",
            Self::Withdrawals => "withdrawals",
            Self::Referrals => "referrals",
            Self::Rentals => "rentals",
            Self::Kyc => "kyc",
            Self::Support => "support",
            Self::Settings => "settings",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Users => "Users",
            Self::Withdrawals => "Withdrawals",
            Self::Referrals => "Referrals",
            Self::Rentals => "Rentals",
            Self::Kyc => "KYC Verifications",
            Self::Support => "Support",
            Self::Settings => "Settings",
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        format!("/admin-dashboard?section={}", self.as_str())
    }

    /// Unknown or missing values open the overview.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for AdminSection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section: {s}"))
    }
}

/// Sidebar entry.
#[derive(Debug, Clone)]
pub struct SectionLink {
    pub id: &'static str,
    pub label: &'static str,
    pub active: bool,
}

fn section_links(current: AdminSection) -> Vec<SectionLink> {
    AdminSection::ALL
        .into_iter()
        .map(|section| SectionLink {
            id: section.as_str(),
            label: section.label(),
            active: section == current,
        })
        .collect()
}

// =============================================================================
// Filters
// =============================================================================

/// Withdrawal status filter from `?status=`.
///
/// The withdrawals section defaults to pending; `all` shows every status.
#[must_use]
pub fn withdrawal_status_filter(value: Option<&str>) -> Option<WithdrawalStatus> {
    match value.map(str::trim) {
        None | Some("") => Some(WithdrawalStatus::Pending),
        Some("all") => None,
        Some(other) => Some(other.parse().unwrap_or(WithdrawalStatus::Pending)),
    }
}

/// Account state filter for the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserStatusFilter {
    #[default]
    All,
    Active,
    Blocked,
}

impl UserStatusFilter {
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("active") => Self::Active,
            Some("blocked") => Self::Blocked,
            _ => Self::All,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }
}

/// Users matching a case-insensitive search on name or email and the
/// account state filter, in input order.
#[must_use]
pub fn filter_users(users: Vec<AdminUser>, search: &str, status: UserStatusFilter) -> Vec<AdminUser> {
    let needle = search.trim().to_lowercase();
    users
        .into_iter()
        .filter(|user| match status {
            UserStatusFilter::All => true,
            UserStatusFilter::Active => user.is_active,
            UserStatusFilter::Blocked => !user.is_active,
        })
        .filter(|user| {
            needle.is_empty()
                || user.email.to_lowercase().contains(&needle)
                || user.full_name.to_lowercase().contains(&needle)
        })
        .collect()
}

// =============================================================================
// Overview
// =============================================================================

/// Counters on the overview section.
#[derive(Debug, Clone, Default)]
pub struct AdminOverview {
    pub total_users: usize,
    pub active_users: usize,
    pub total_wallet_balance: Kes,
    pub pending_withdrawals: usize,
    pub total_withdrawals: usize,
    pub pending_kyc: usize,
    pub total_referrals: u64,
    pub active_rentals: u64,
    pub locked_amount: Kes,
    pub expected_returns: Kes,
    pub mature_rentals: u64,
}

impl AdminOverview {
    #[must_use]
    pub fn compute(
        users: &[AdminUser],
        pending: &[Withdrawal],
        withdrawals: &[Withdrawal],
        kyc: &[KycForm],
        referrals: &ReferralOverview,
        rentals: &AdminRentals,
    ) -> Self {
        Self {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.is_active).count(),
            total_wallet_balance: users.iter().map(|u| u.wallet_balance).sum(),
            pending_withdrawals: pending.len(),
            total_withdrawals: withdrawals.len(),
            pending_kyc: kyc.iter().filter(|f| f.status == KycStatus::Pending).count(),
            total_referrals: referrals.total_referrals,
            active_rentals: rentals.summary.total_active_rentals,
            locked_amount: rentals.summary.total_locked_amount,
            expected_returns: rentals.summary.total_expected_returns,
            mature_rentals: rentals.summary.total_mature_rentals,
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Admin dashboard query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub section: Option<String>,
    #[serde(default)]
    pub search: String,
    pub status: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Withdrawals section data.
#[derive(Debug, Clone)]
pub struct WithdrawalsView {
    pub groups: Vec<UserWithdrawals>,
    pub breakdown: Vec<StatusCount>,
    pub shown: usize,
    /// `all` or a status name, for the filter control.
    pub status: &'static str,
}

impl WithdrawalsView {
    /// Bar width for one status, as a share of the withdrawals shown.
    #[must_use]
    pub fn share(&self, count: &StatusCount) -> usize {
        count.percent_of(self.shown)
    }
}

/// Referrals section data.
#[derive(Debug, Clone)]
pub struct ReferralsView {
    pub total: u64,
    pub groups: Vec<ReferrerGroup>,
    pub top_referrers: Vec<crate::api::types::TopReferrer>,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub section: &'static str,
    pub links: Vec<SectionLink>,
    pub admin_name: String,
    pub search: String,
    pub user_status: &'static str,
    pub award_amount: u32,
    pub overview: Option<AdminOverview>,
    pub users: Option<Vec<AdminUser>>,
    pub withdrawals: Option<WithdrawalsView>,
    pub referrals: Option<ReferralsView>,
    pub rentals: Option<AdminRentals>,
    pub kyc_forms: Option<Vec<KycForm>>,
    pub messages: Option<Vec<SupportMessage>>,
    pub settings: Option<SystemSettings>,
}

impl AdminDashboardTemplate {
    fn new(section: AdminSection, admin_name: String, query: AdminQuery) -> Self {
        Self {
            error: query.error,
            success: query.success,
            section: section.as_str(),
            links: section_links(section),
            admin_name,
            search: query.search,
            user_status: UserStatusFilter::from_query(query.status.as_deref()).as_str(),
            award_amount: WALLET_AWARD_KES,
            overview: None,
            users: None,
            withdrawals: None,
            referrals: None,
            rentals: None,
            kyc_forms: None,
            messages: None,
            settings: None,
        }
    }
}

/// Display the admin dashboard.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Query(query): Query<AdminQuery>,
) -> Result<Response> {
    let section = AdminSection::from_query(query.section.as_deref());
    let authed = state.api().authed(&guard.session);
    let search = query.search.clone();
    let status = query.status.clone();
    let mut page =
        AdminDashboardTemplate::new(section, guard.profile.display_name().to_string(), query);

    match section {
        AdminSection::Overview => {
            let (users, pending, all, kyc, referrals, rentals) = tokio::join!(
                authed.users(),
                authed.pending_withdrawals(),
                authed.all_withdrawals(),
                authed.kyc_forms(),
                authed.referral_overview(),
                authed.admin_active_rentals(),
            );
            page.overview = Some(AdminOverview::compute(
                &or_default_logged(users, "users")?,
                &or_default_logged(pending, "pending withdrawals")?,
                &or_default_logged(all, "withdrawals")?,
                &or_default_logged(kyc, "KYC forms")?,
                &or_default_logged(referrals, "referral overview")?,
                &or_default_logged(rentals, "active rentals")?,
            ));
        }
        AdminSection::Users => {
            let users = or_default_logged(authed.users().await, "users")?;
            let filter = UserStatusFilter::from_query(status.as_deref());
            page.users = Some(filter_users(users, &search, filter));
        }
        AdminSection::Withdrawals => {
            let (withdrawals, users) = tokio::join!(authed.all_withdrawals(), authed.users());
            let mut withdrawals = or_default_logged(withdrawals, "withdrawals")?;
            let users = or_default_logged(users, "users")?;
            enrich_withdrawals(&mut withdrawals, &users);

            let filter = WithdrawalFilter {
                search,
                status: withdrawal_status_filter(status.as_deref()),
            };
            let filtered = filter.apply(withdrawals);
            page.withdrawals = Some(WithdrawalsView {
                breakdown: withdrawal_status_breakdown(&filtered),
                shown: filtered.len(),
                status: filter.status.map_or("all", |s| s.as_str()),
                groups: group_withdrawals_by_user(filtered),
            });
        }
        AdminSection::Referrals => {
            let overview = or_default_logged(authed.referral_overview().await, "referral overview")?;
            let filtered = ReferralFilter { search }.apply(overview.referral_relationships);
            page.referrals = Some(ReferralsView {
                total: overview.total_referrals,
                groups: group_referrals_by_referrer(filtered),
                top_referrers: overview.top_referrers,
            });
        }
        AdminSection::Rentals => {
            page.rentals = Some(or_default_logged(
                authed.admin_active_rentals().await,
                "active rentals",
            )?);
        }
        AdminSection::Kyc => {
            page.kyc_forms = Some(or_default_logged(authed.kyc_forms().await, "KYC forms")?);
        }
        AdminSection::Support => {
            page.messages = Some(or_default_logged(
                authed.support_messages().await,
                "support messages",
            )?);
        }
        AdminSection::Settings => {
            page.settings = Some(or_default_logged(
                authed.system_settings().await,
                "system settings",
            )?);
        }
    }

    Ok(page.into_response())
}

// =============================================================================
// Actions
// =============================================================================

/// Action on a user account, from the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Access(AccountAction),
    Award,
}

impl FromStr for UserAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Access(AccountAction::Block)),
            "unblock" => Ok(Self::Access(AccountAction::Unblock)),
            "award" => Ok(Self::Award),
            other => Err(format!("invalid user action: {other}")),
        }
    }
}

fn action_failed(err: &ApiError, what: &str) -> String {
    err.message_or(&format!("Failed to {what}. Please try again."))
}

/// Block, unblock or award a user.
pub async fn user_action(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Path((id, action)): Path<(UserId, String)>,
) -> Result<Redirect> {
    let action = UserAction::from_str(&action).map_err(AppError::BadRequest)?;
    let path = AdminSection::Users.path();
    let authed = state.api().authed(&guard.session);

    match action {
        UserAction::Access(access) => {
            let verb = access.as_path_segment();
            match authed.set_user_access(id, access).await {
                Ok(()) => {
                    info!(user_id = %id, action = verb, "User access changed");
                    Ok(redirect_with_success(&path, &format!("User {verb}ed successfully")))
                }
                Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
                Err(err) => {
                    warn!(user_id = %id, action = verb, error = %err, "User access change failed");
                    Ok(redirect_with_error(&path, &action_failed(&err, &format!("{verb} user"))))
                }
            }
        }
        UserAction::Award => match authed.award_wallet(id).await {
            Ok(ack) => {
                info!(user_id = %id, amount = WALLET_AWARD_KES, "Wallet awarded");
                Ok(redirect_with_success(
                    &path,
                    &ack.text_or("Awarded Ksh50 and KYC verified!"),
                ))
            }
            Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
            Err(err) => {
                warn!(user_id = %id, error = %err, "Wallet award failed");
                let reason = err.message_or("Failed to award wallet.");
                Ok(redirect_with_error(
                    &path,
                    &format!("Failed to award wallet: {reason}"),
                ))
            }
        },
    }
}

const fn action_past_tense(action: WithdrawalAction) -> &'static str {
    match action {
        WithdrawalAction::Approve => "approved",
        WithdrawalAction::Reject => "rejected",
        WithdrawalAction::Paid => "marked as paid",
    }
}

/// Approve, reject or mark paid a withdrawal.
pub async fn withdrawal_action(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Path((id, action)): Path<(WithdrawalId, String)>,
) -> Result<Redirect> {
    let action = WithdrawalAction::from_str(&action).map_err(AppError::BadRequest)?;
    let path = AdminSection::Withdrawals.path();

    match state
        .api()
        .authed(&guard.session)
        .act_on_withdrawal(action, id)
        .await
    {
        Ok(_) => {
            info!(withdrawal_id = %id, %action, "Withdrawal updated");
            Ok(redirect_with_success(
                &path,
                &format!("Withdrawal {} successfully", action_past_tense(action)),
            ))
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(withdrawal_id = %id, %action, error = %err, "Withdrawal action failed");
            let what = format!("{} withdrawal", action.as_path_segment());
            Ok(redirect_with_error(&path, &action_failed(&err, &what)))
        }
    }
}

/// Verify a KYC submission.
pub async fn verify_kyc(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Path(id): Path<KycFormId>,
) -> Result<Redirect> {
    let path = AdminSection::Kyc.path();
    match state.api().authed(&guard.session).verify_kyc(id).await {
        Ok(()) => {
            info!(kyc_id = %id, "KYC verified");
            Ok(redirect_with_success(&path, "KYC verified!"))
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(kyc_id = %id, error = %err, "KYC verification failed");
            Ok(redirect_with_error(&path, &err.message_or("Failed to verify KYC.")))
        }
    }
}

/// Settings form. Unchecked boxes are absent from the body.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub maintenance_mode: Option<String>,
    pub email_notifications: Option<String>,
}

impl From<SettingsForm> for SystemSettings {
    fn from(form: SettingsForm) -> Self {
        Self {
            maintenance_mode: form.maintenance_mode.is_some(),
            email_notifications: form.email_notifications.is_some(),
        }
    }
}

/// Update the platform switches.
///
/// Nothing is stored locally: on failure the page shows whatever the backend
/// still holds, with an error message.
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAdmin(guard): RequireAdmin,
    Form(form): Form<SettingsForm>,
) -> Result<Redirect> {
    let path = AdminSection::Settings.path();
    let requested = SystemSettings::from(form);
    match state
        .api()
        .authed(&guard.session)
        .update_system_settings(requested)
        .await
    {
        Ok(saved) => {
            info!(
                maintenance_mode = saved.maintenance_mode,
                email_notifications = saved.email_notifications,
                "System settings updated"
            );
            Ok(redirect_with_success(&path, "Settings updated"))
        }
        Err(err @ (ApiError::SessionExpired | ApiError::Session(_))) => Err(err.into()),
        Err(err) => {
            warn!(error = %err, "System settings update failed");
            Ok(redirect_with_error(&path, &err.message_or("Failed to update settings")))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<AdminUser> {
        serde_json::from_value(json!([
            { "id": 1, "email": "amina@example.com", "full_name": "Amina Otieno", "wallet_balance": "100.00" },
            { "id": 2, "email": "brian@example.com", "full_name": "Brian Kip", "is_active": false, "wallet_balance": 50 },
            { "id": 3, "email": "carol@example.com", "full_name": "Carol Amina" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_section_from_query() {
        assert_eq!(AdminSection::from_query(Some("kyc")), AdminSection::Kyc);
        assert_eq!(AdminSection::from_query(Some("audit")), AdminSection::Overview);
        assert_eq!(AdminSection::Settings.path(), "/admin-dashboard?section=settings");
        let links = section_links(AdminSection::Users);
        assert_eq!(links.iter().filter(|l| l.active).count(), 1);
    }

    #[test]
    fn test_withdrawal_status_filter_defaults_to_pending() {
        assert_eq!(withdrawal_status_filter(None), Some(WithdrawalStatus::Pending));
        assert_eq!(withdrawal_status_filter(Some("all")), None);
        assert_eq!(
            withdrawal_status_filter(Some("paid")),
            Some(WithdrawalStatus::Paid)
        );
    }

    #[test]
    fn test_breakdown_share_of_shown() {
        let view = WithdrawalsView {
            groups: Vec::new(),
            breakdown: vec![
                StatusCount { status: WithdrawalStatus::Pending, count: 3 },
                StatusCount { status: WithdrawalStatus::Paid, count: 1 },
            ],
            shown: 4,
            status: "all",
        };
        let shares: Vec<usize> = view.breakdown.iter().map(|c| view.share(c)).collect();
        assert_eq!(shares, vec![75, 25]);

        let empty = WithdrawalsView { shown: 0, ..view };
        assert_eq!(empty.share(&empty.breakdown[0]), 0);
    }

    #[test]
    fn test_filter_users_by_search_and_state() {
        let found = filter_users(users(), "amina", UserStatusFilter::All);
        assert_eq!(found.len(), 2);
        let blocked = filter_users(users(), "", UserStatusFilter::Blocked);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].email, "brian@example.com");
        let active = filter_users(users(), "brian", UserStatusFilter::Active);
        assert!(active.is_empty());
    }

    #[test]
    fn test_overview_counts() {
        let overview = AdminOverview::compute(
            &users(),
            &[],
            &[],
            &[],
            &ReferralOverview {
                total_referrals: 4,
                ..Default::default()
            },
            &AdminRentals::default(),
        );
        assert_eq!(overview.total_users, 3);
        assert_eq!(overview.active_users, 2);
        assert_eq!(overview.total_wallet_balance, Kes::from_shillings(150));
        assert_eq!(overview.total_referrals, 4);
    }

    #[test]
    fn test_user_action_parse() {
        assert_eq!(
            "block".parse::<UserAction>(),
            Ok(UserAction::Access(AccountAction::Block))
        );
        assert_eq!("award".parse::<UserAction>(), Ok(UserAction::Award));
        assert!("delete".parse::<UserAction>().is_err());
    }

    #[test]
    fn test_settings_form_checkboxes() {
        let settings = SystemSettings::from(SettingsForm {
            maintenance_mode: Some("on".into()),
            email_notifications: None,
        });
        assert!(settings.maintenance_mode);
        assert!(!settings.email_notifications);
    }
}
