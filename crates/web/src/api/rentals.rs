//! Rental endpoints under `/api/rentals/`.

use liquifund_core::Kes;

use super::types::{AdminRentals, PendingReturns, Rental, UserRentals};
use super::{ApiError, Authed, RequestOptions};
use crate::session::SessionStore;

impl<S: SessionStore> Authed<'_, S> {
    /// The signed-in user's rentals.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn user_rentals(&self) -> Result<Vec<Rental>, ApiError> {
        let response: UserRentals = self
            .call("/api/rentals/user-rentals/", RequestOptions::get())
            .await?;
        Ok(response.rentals)
    }

    /// Sum of returns still locked in active rentals.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn pending_returns(&self) -> Result<Kes, ApiError> {
        let response: PendingReturns = self
            .call("/api/rentals/pending-returns/", RequestOptions::get())
            .await?;
        Ok(response.pending_returns)
    }

    /// Every active rental with a platform-wide summary (admin only).
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error.
    pub async fn admin_active_rentals(&self) -> Result<AdminRentals, ApiError> {
        self.call("/api/rentals/admin/active/", RequestOptions::get())
            .await
    }
}
