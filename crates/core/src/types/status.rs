//! Status enums for backend records.
//!
//! Status transitions are owned by the backend. The front end only reads
//! these values and, for withdrawals and KYC forms, requests a transition
//! through an admin action.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a currency rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl RentalStatus {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Processing,
    Approved,
    Paid,
    Rejected,
}

impl WithdrawalStatus {
    /// Every status, in the order the admin filter lists them.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Approved,
        Self::Paid,
        Self::Rejected,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
        }
    }

    /// Admin actions that make sense from this status.
    #[must_use]
    pub const fn available_actions(&self) -> &'static [WithdrawalAction] {
        match self {
            Self::Pending | Self::Processing => {
                &[WithdrawalAction::Approve, WithdrawalAction::Reject]
            }
            Self::Approved => &[WithdrawalAction::Paid, WithdrawalAction::Reject],
            Self::Paid | Self::Rejected => &[],
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid withdrawal status: {s}"))
    }
}

/// An admin transition request for a withdrawal.
///
/// The path segment is the action name the backend routes on
/// (`/api/withdraw/{action}/{id}/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalAction {
    Approve,
    Reject,
    Paid,
}

impl WithdrawalAction {
    #[must_use]
    pub const fn as_path_segment(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Paid => "paid",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Paid => "Mark paid",
        }
    }
}

impl fmt::Display for WithdrawalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path_segment())
    }
}

impl std::str::FromStr for WithdrawalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("invalid withdrawal action: {s}")),
        }
    }
}

/// Whether a referred user has completed the qualifying action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    #[default]
    Pending,
    Completed,
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Review state of a KYC submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    Pending,
    Verified,
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Verified => f.write_str("verified"),
        }
    }
}

/// Which dashboard a signed-in user lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    /// Dashboard path for this role.
    #[must_use]
    pub const fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Admin => "/admin-dashboard",
            Self::Client => "/client-dashboard",
        }
    }
}
