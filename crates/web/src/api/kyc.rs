//! KYC endpoints.
//!
//! The user's own record is served from `/api/kyc/`; the admin review list and
//! verification live under `/api/auth/kyc/`.

use liquifund_core::KycFormId;
use reqwest::Method;

use super::types::{KycDetails, KycForm, KycForms};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

const OWN_KYC_PATH: &str = "/api/kyc/";

impl<S: SessionStore> Authed<'_, S> {
    /// The signed-in user's KYC details. A 404 means nothing submitted yet.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn kyc_details(&self) -> Result<KycDetails, ApiError> {
        match self.call(OWN_KYC_PATH, RequestOptions::get()).await {
            Err(err) if err.is_not_found() => Ok(KycDetails::default()),
            other => other,
        }
    }

    /// Submit or update the signed-in user's KYC details.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with field errors when the backend refuses.
    pub async fn update_kyc(&self, details: &KycDetails) -> Result<(), ApiError> {
        let options = RequestOptions::method(Method::PUT).json(details)?;
        self.call_empty(OWN_KYC_PATH, options).await
    }

    /// All KYC submissions (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn kyc_forms(&self) -> Result<Vec<KycForm>, ApiError> {
        let response: KycForms = self
            .call("/api/auth/kyc/all/", RequestOptions::get())
            .await?;
        Ok(response.kyc_forms)
    }

    /// Mark a submission verified (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn verify_kyc(&self, id: KycFormId) -> Result<(), ApiError> {
        self.call_empty(
            &format!("/api/auth/kyc/{id}/verify/"),
            RequestOptions::method(Method::POST),
        )
        .await
    }
}
