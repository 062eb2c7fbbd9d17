//! Withdrawal endpoints under `/api/withdraw/`.

use liquifund_core::{Kes, MpesaPhone, WithdrawalAction, WithdrawalId};
use reqwest::Method;

use super::types::{Acknowledgement, Withdrawal, WithdrawalRequest};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl<S: SessionStore> Authed<'_, S> {
    /// Ask for wallet funds to be sent to a mobile number.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] when the backend refuses (insufficient
    /// balance, below minimum).
    pub async fn request_withdrawal(
        &self,
        mobile_number: &MpesaPhone,
        amount: Kes,
    ) -> Result<Acknowledgement, ApiError> {
        let options = RequestOptions::method(Method::POST).json(&WithdrawalRequest {
            mobile_number: mobile_number.as_str(),
            amount: amount.amount(),
        })?;
        Ok(self
            .call_lenient("/api/withdraw/", options)
            .await?
            .unwrap_or_default())
    }

    /// Withdrawals awaiting review (admin only). A 404 means none.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, ApiError> {
        self.withdrawal_list("/api/withdraw/pending/").await
    }

    /// Every withdrawal in any status (admin only). A 404 means none.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn all_withdrawals(&self) -> Result<Vec<Withdrawal>, ApiError> {
        self.withdrawal_list("/api/withdraw/all/").await
    }

    async fn withdrawal_list(&self, path: &str) -> Result<Vec<Withdrawal>, ApiError> {
        match self.call(path, RequestOptions::get()).await {
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    /// Approve, reject or mark a withdrawal paid (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn act_on_withdrawal(
        &self,
        action: WithdrawalAction,
        id: WithdrawalId,
    ) -> Result<Acknowledgement, ApiError> {
        let path = format!("/api/withdraw/{}/{id}/", action.as_path_segment());
        Ok(self
            .call_lenient(&path, RequestOptions::method(Method::POST))
            .await?
            .unwrap_or_default())
    }
}
