//! Wallet and payment endpoints under `/api/payments/`.

use liquifund_core::{CurrencyCode, Kes, MpesaPhone};
use reqwest::Method;

use super::types::{Acknowledgement, BalanceResponse, EarningsResponse, MpesaPaymentRequest, PaymentHistory, PaymentRecord};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl<S: SessionStore> Authed<'_, S> {
    /// Authoritative wallet balance.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn balance(&self) -> Result<Kes, ApiError> {
        let response: BalanceResponse = self
            .call("/api/payments/balance/", RequestOptions::get())
            .await?;
        Ok(response.balance)
    }

    /// Lifetime earnings from matured rentals.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn earnings(&self) -> Result<Kes, ApiError> {
        let response: EarningsResponse = self
            .call("/api/payments/earnings/", RequestOptions::get())
            .await?;
        Ok(response.total_earnings)
    }

    /// Wallet ledger, newest first as the backend sends it.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn payment_history(&self) -> Result<Vec<PaymentRecord>, ApiError> {
        let response: PaymentHistory = self
            .call("/api/payments/history/", RequestOptions::get())
            .await?;
        Ok(response.payments)
    }

    /// Start an M-Pesa STK push for a rental. Completion is only observable
    /// as a balance change.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with the backend's `{error}` message.
    pub async fn initiate_mpesa_payment(
        &self,
        phone: &MpesaPhone,
        currency: CurrencyCode,
    ) -> Result<Acknowledgement, ApiError> {
        let options = RequestOptions::method(Method::POST).json(&MpesaPaymentRequest {
            phone: phone.as_str(),
            currency,
        })?;
        Ok(self
            .call_lenient("/api/payments/mpesa/initiate/", options)
            .await?
            .unwrap_or_default())
    }
}
