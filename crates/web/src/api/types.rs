//! Request and response bodies exchanged with the LiquiFund REST API.
//!
//! The backend owns these shapes. Fields the UI can live without are
//! `#[serde(default)]` so an added or missing column does not take a whole
//! screen down.

use chrono::{DateTime, NaiveDateTime, Utc};
use liquifund_core::{
    CurrencyCode, KycFormId, KycStatus, Kes, PaymentId, ReferralStatus, RentalId, RentalStatus,
    Role, SupportMessageId, UserId, WithdrawalId, WithdrawalStatus,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// Auth
// =============================================================================

/// Access and refresh tokens returned by the login endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<Profile>,
}

/// The user who referred the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referrer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<UserId>,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub wallet_balance: Option<Kes>,
    #[serde(default)]
    pub referred_by: Option<Referrer>,
}

impl Profile {
    /// Staff and superusers may use the site during maintenance.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    /// Dashboard chosen after login. Only superusers land on the admin dashboard.
    #[must_use]
    pub const fn landing_role(&self) -> Role {
        if self.is_superuser {
            Role::Admin
        } else {
            Role::Client
        }
    }

    /// Name shown in greetings, falling back to the email's local part.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if name.is_empty() {
            self.email.split('@').next().unwrap_or(&self.email)
        } else {
            name
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GoogleLoginRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub password: &'a str,
    pub confirm_password: &'a str,
}

/// Generic `{message}` / `{detail}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl Acknowledgement {
    #[must_use]
    pub fn text_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.detail.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

// =============================================================================
// Support & settings
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MaintenanceStatus {
    #[serde(default)]
    pub maintenance_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub email_notifications: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupportMessage {
    pub id: SupportMessageId,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Deserialize)]
pub struct SupportMessages {
    #[serde(default)]
    pub messages: Vec<SupportMessage>,
}

/// A message from the support or contact form.
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BalanceResponse {
    pub balance: Kes,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EarningsResponse {
    #[serde(default)]
    pub total_earnings: Kes,
}

#[derive(Debug, Serialize)]
pub struct MpesaPaymentRequest<'a> {
    pub phone: &'a str,
    pub currency: CurrencyCode,
}

/// One entry of the wallet ledger. Positive `amount_deducted` is money in.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub amount_deducted: Kes,
    #[serde(default)]
    pub status: String,
    #[serde(with = "backend_datetime")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct PaymentHistory {
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

// =============================================================================
// Rentals
// =============================================================================

const fn default_duration_days() -> u32 {
    liquifund_core::RENTAL_DURATION_DAYS
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    #[serde(default)]
    pub unique_id: Option<String>,
    pub currency: String,
    pub amount: Kes,
    pub expected_return: Kes,
    pub status: RentalStatus,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_mature: bool,
    #[serde(default)]
    pub days_remaining: Option<i64>,
}

impl Rental {
    /// Reference shown to users, falling back to the numeric id.
    #[must_use]
    pub fn reference(&self) -> String {
        self.unique_id
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

#[derive(Debug, Deserialize)]
pub struct UserRentals {
    #[serde(default)]
    pub rentals: Vec<Rental>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PendingReturns {
    #[serde(default)]
    pub pending_returns: Kes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminRental {
    #[serde(flatten)]
    pub rental: Rental,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_full_name: Option<String>,
    #[serde(default)]
    pub time_remaining: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RentalSummary {
    #[serde(default)]
    pub total_active_rentals: u64,
    #[serde(default)]
    pub total_locked_amount: Kes,
    #[serde(default)]
    pub total_expected_returns: Kes,
    #[serde(default)]
    pub total_mature_rentals: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminRentals {
    #[serde(default)]
    pub active_rentals: Vec<AdminRental>,
    #[serde(default)]
    pub summary: RentalSummary,
}

// =============================================================================
// Withdrawals
// =============================================================================

/// The `user` field of a withdrawal: a bare primary key or an embedded record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WithdrawalUser {
    Id(UserId),
    Record(UserSnapshot),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserSnapshot {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl UserSnapshot {
    /// True when the snapshot carries something worth displaying.
    #[must_use]
    pub const fn has_details(&self) -> bool {
        self.email.is_some() || self.full_name.is_some() || self.phone_number.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    #[serde(default)]
    pub user: Option<WithdrawalUser>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_phone_number: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    pub amount: Kes,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    /// Owning user id: the embedded user's id, then `user_id`.
    #[must_use]
    pub fn owner_id(&self) -> Option<UserId> {
        match &self.user {
            Some(WithdrawalUser::Id(id)) => Some(*id),
            Some(WithdrawalUser::Record(snapshot)) => snapshot.id.or(self.user_id),
            None => self.user_id,
        }
    }

    fn snapshot(&self) -> Option<&UserSnapshot> {
        match &self.user {
            Some(WithdrawalUser::Record(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    /// Email shown for the owner: `user_email`, then the embedded user's email.
    #[must_use]
    pub fn owner_email(&self) -> Option<&str> {
        self.user_email
            .as_deref()
            .or_else(|| self.snapshot().and_then(|s| s.email.as_deref()))
    }

    /// Phone shown for the owner: `user_phone_number`, then the embedded user's phone.
    #[must_use]
    pub fn owner_phone(&self) -> Option<&str> {
        self.user_phone_number
            .as_deref()
            .or_else(|| self.snapshot().and_then(|s| s.phone_number.as_deref()))
    }

    #[must_use]
    pub fn owner_name(&self) -> Option<&str> {
        self.user_name
            .as_deref()
            .or_else(|| self.snapshot().and_then(|s| s.full_name.as_deref()))
    }
}

#[derive(Debug, Serialize)]
pub struct WithdrawalRequest<'a> {
    pub mobile_number: &'a str,
    pub amount: rust_decimal::Decimal,
}

// =============================================================================
// Referrals
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReferralCode {
    pub referral_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferralEntry {
    #[serde(default)]
    pub referred_name: Option<String>,
    #[serde(default)]
    pub referred_email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ReferralStatus,
    #[serde(default)]
    pub reward: Kes,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferralHistory {
    #[serde(default)]
    pub referrals: Vec<ReferralEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferralRelationship {
    #[serde(default)]
    pub referrer_id: Option<UserId>,
    #[serde(default)]
    pub referrer_email: Option<String>,
    #[serde(default)]
    pub referrer_full_name: Option<String>,
    #[serde(default)]
    pub referred_id: Option<UserId>,
    #[serde(default)]
    pub referred_email: Option<String>,
    #[serde(default)]
    pub referred_full_name: Option<String>,
    #[serde(default)]
    pub date_referred: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopReferrer {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub referral_count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferralOverview {
    #[serde(default)]
    pub total_referrals: u64,
    #[serde(default)]
    pub referral_relationships: Vec<ReferralRelationship>,
    #[serde(default)]
    pub top_referrers: Vec<TopReferrer>,
}

// =============================================================================
// KYC
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct KycForm {
    pub id: KycFormId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: KycStatus,
    pub date_submitted: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KycForms {
    #[serde(default)]
    pub kyc_forms: Vec<KycForm>,
}

/// The signed-in user's own KYC details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycDetails {
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub address: String,
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AdminUser {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub wallet_balance: Kes,
}

const fn default_true() -> bool {
    true
}

/// The user list arrives either bare or wrapped in a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UserList {
    Plain(Vec<AdminUser>),
    Paged { results: Vec<AdminUser> },
}

impl UserList {
    #[must_use]
    pub fn into_vec(self) -> Vec<AdminUser> {
        match self {
            Self::Plain(users) | Self::Paged { results: users } => users,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AwardWalletRequest {
    pub amount: rust_decimal::Decimal,
}

// =============================================================================
// Timestamps
// =============================================================================

/// Payment history timestamps come as `%Y-%m-%d %H:%M:%S`; RFC 3339 is
/// accepted too.
mod backend_datetime {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.naive_utc()))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_without_staff_flag_is_not_admin() {
        let profile: Profile = serde_json::from_value(json!({
            "id": 3,
            "email": "jane@example.com",
            "full_name": "Jane Wanjiku",
            "is_superuser": false,
            "wallet_balance": "150.00"
        }))
        .unwrap();
        assert!(!profile.is_admin());
        assert_eq!(profile.landing_role(), Role::Client);
        assert_eq!(profile.display_name(), "Jane Wanjiku");
    }

    #[test]
    fn test_staff_is_admin_but_lands_on_client_dashboard() {
        let profile: Profile = serde_json::from_value(json!({
            "email": "ops@example.com",
            "is_staff": true
        }))
        .unwrap();
        assert!(profile.is_admin());
        assert_eq!(profile.landing_role(), Role::Client);
        assert_eq!(profile.display_name(), "ops");
    }

    #[test]
    fn test_withdrawal_user_may_be_id_or_record() {
        let by_id: Withdrawal = serde_json::from_value(json!({
            "id": 1, "user": 9, "amount": 500, "status": "pending",
            "created_at": "2025-03-01T08:00:00Z", "user_email": "a@x.com"
        }))
        .unwrap();
        assert_eq!(by_id.owner_id(), Some(UserId::new(9)));
        assert_eq!(by_id.owner_email(), Some("a@x.com"));

        let by_record: Withdrawal = serde_json::from_value(json!({
            "id": 2, "user": {"id": 4, "email": "b@x.com", "phone_number": "0711000000"},
            "amount": "750.50", "status": "approved",
            "created_at": "2025-03-01T08:00:00+03:00"
        }))
        .unwrap();
        assert_eq!(by_record.owner_id(), Some(UserId::new(4)));
        assert_eq!(by_record.owner_email(), Some("b@x.com"));
        assert_eq!(by_record.owner_phone(), Some("0711000000"));
    }

    #[test]
    fn test_payment_record_accepts_backend_timestamp_format() {
        let record: PaymentRecord = serde_json::from_value(json!({
            "id": 5, "amount_deducted": "-1200.00", "status": "completed",
            "created_at": "2025-02-14 09:30:00"
        }))
        .unwrap();
        assert_eq!(record.created_at.to_string(), "2025-02-14 09:30:00");
        assert!(!record.amount_deducted.is_positive());
    }

    #[test]
    fn test_user_list_accepts_both_envelopes() {
        let plain: UserList =
            serde_json::from_value(json!([{ "id": 1, "email": "a@x.com" }])).unwrap();
        let paged: UserList =
            serde_json::from_value(json!({ "results": [{ "id": 1, "email": "a@x.com" }] }))
                .unwrap();
        assert_eq!(plain.into_vec().len(), 1);
        let users = paged.into_vec();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_active);
    }

    #[test]
    fn test_rental_defaults_duration() {
        let rental: Rental = serde_json::from_value(json!({
            "id": 1, "currency": "USD", "amount": 1200.0, "expected_return": 2400.0,
            "status": "active", "created_at": "2025-01-01T00:00:00Z", "end_date": null
        }))
        .unwrap();
        assert_eq!(rental.duration_days, 20);
        assert_eq!(rental.reference(), "#1");
    }
}
