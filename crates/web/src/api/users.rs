//! Admin user management under `/api/auth/users/`.

use liquifund_core::UserId;
use reqwest::Method;
use rust_decimal::Decimal;

use super::types::{Acknowledgement, AdminUser, AwardWalletRequest, UserList};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

/// Amount credited by the "award wallet" action, in KES.
pub const WALLET_AWARD_KES: u32 = 50;

/// Block or unblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    Block,
    Unblock,
}

impl AccountAction {
    #[must_use]
    pub const fn as_path_segment(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }
}

impl<S: SessionStore> Authed<'_, S> {
    /// Every registered user.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn users(&self) -> Result<Vec<AdminUser>, ApiError> {
        let list: UserList = self
            .call("/api/auth/users/", RequestOptions::get())
            .await?;
        Ok(list.into_vec())
    }

    /// Block or unblock a user.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn set_user_access(&self, id: UserId, action: AccountAction) -> Result<(), ApiError> {
        self.call_empty(
            &format!("/api/auth/users/{id}/{}/", action.as_path_segment()),
            RequestOptions::method(Method::POST),
        )
        .await
    }

    /// Credit a user's wallet with the fixed award amount.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn award_wallet(&self, id: UserId) -> Result<Acknowledgement, ApiError> {
        let options = RequestOptions::method(Method::POST).json(&AwardWalletRequest {
            amount: Decimal::from(WALLET_AWARD_KES),
        })?;
        Ok(self
            .call_lenient(&format!("/api/auth/users/{id}/award-wallet/"), options)
            .await?
            .unwrap_or_default())
    }
}
