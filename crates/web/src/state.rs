//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::WebConfig;
use crate::polling::PaymentTracker;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration, the backend API client and the payment watches.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    api: ApiClient,
    payments: PaymentTracker,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebConfig) -> Result<Self, ApiError> {
        Self::with_payment_tracker(config, PaymentTracker::default())
    }

    /// Create the state with a specific payment tracker (shorter poll
    /// intervals in tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_payment_tracker(
        config: WebConfig,
        payments: PaymentTracker,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(config.api_base_url.clone(), config.api_timeout)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                payments,
            }),
        })
    }

    /// Get a reference to the web configuration.
    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the payment watches.
    #[must_use]
    pub fn payments(&self) -> &PaymentTracker {
        &self.inner.payments
    }
}
