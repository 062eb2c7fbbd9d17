//! Referral endpoints under `/api/auth/referrals/`.

use super::types::{ReferralCode, ReferralEntry, ReferralHistory, ReferralOverview};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl<S: SessionStore> Authed<'_, S> {
    /// The signed-in user's shareable code.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn referral_code(&self) -> Result<String, ApiError> {
        let response: ReferralCode = self
            .call("/api/auth/referrals/code/", RequestOptions::get())
            .await?;
        Ok(response.referral_code)
    }

    /// Users the signed-in user has referred.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn referral_history(&self) -> Result<Vec<ReferralEntry>, ApiError> {
        let response: ReferralHistory = self
            .call("/api/auth/referrals/history/", RequestOptions::get())
            .await?;
        Ok(response.referrals)
    }

    /// Every referral relationship on the platform (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn referral_overview(&self) -> Result<ReferralOverview, ApiError> {
        self.call("/api/auth/referrals/admin/", RequestOptions::get())
            .await
    }
}
