//! Background polling for M-Pesa payment confirmation.
//!
//! An STK push completes on the user's phone, and the only signal the front
//! end gets is the wallet balance changing. After a push is initiated a
//! background task checks the balance once per interval, up to a fixed number
//! of attempts, and publishes a [`PaymentStatus`] the dashboard script polls.
//!
//! Checks are fired on a fixed cadence without waiting for the previous one,
//! so answers can arrive out of order. Each check carries its attempt number
//! and [`AttemptTracker`] drops answers older than the newest one applied.
//!
//! Tasks are owned by [`PollHandle`]s; dropping the handle aborts the task
//! and every check still in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use liquifund_core::Kes;
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiError};
use crate::session::MemorySessionStore;

/// Time between balance checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Balance checks before giving up.
pub const MAX_ATTEMPTS: u32 = 60;

/// How long a finished or abandoned watch stays queryable.
const WATCH_TTL: Duration = Duration::from_secs(15 * 60);

// =============================================================================
// Task ownership
// =============================================================================

/// Owner of a background polling task.
///
/// The task is aborted by [`PollHandle::stop`] or when the handle is dropped.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    #[must_use]
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Status
// =============================================================================

/// Progress of a payment watch, as served to the dashboard script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending { attempts: u32 },
    Confirmed { balance: Kes },
    TimedOut,
    Failed { message: String },
}

impl PaymentStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

/// Newest-wins ordering for out-of-order check results.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    newest_applied: Option<u32>,
}

impl AttemptTracker {
    /// Record `attempt` and report whether its result should be applied.
    pub fn accept(&mut self, attempt: u32) -> bool {
        if self.newest_applied.is_some_and(|newest| attempt <= newest) {
            return false;
        }
        self.newest_applied = Some(attempt);
        true
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Where balance checks come from.
pub trait BalanceSource: Send + Sync + 'static {
    fn balance(&self) -> impl Future<Output = Result<Kes, ApiError>> + Send;
}

/// Balance read through the API with a token captured when the watch started.
///
/// The visitor's cookie session is not reachable from a background task, so
/// the access token is copied into a private store.
#[derive(Debug, Clone)]
pub struct ApiBalance {
    api: ApiClient,
    store: MemorySessionStore,
}

impl ApiBalance {
    #[must_use]
    pub const fn new(api: ApiClient, store: MemorySessionStore) -> Self {
        Self { api, store }
    }
}

impl BalanceSource for ApiBalance {
    async fn balance(&self) -> Result<Kes, ApiError> {
        self.api.authed(&self.store).balance().await
    }
}

/// Interval and attempt budget of a watch.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Check the balance until it differs from `initial` or the attempts run out.
///
/// Every applied result is published on `status`. Transient check failures
/// are logged and count as attempts; a rejected session ends the watch.
pub async fn poll_balance_change<B: BalanceSource>(
    source: Arc<B>,
    initial: Kes,
    config: PollConfig,
    status: watch::Sender<PaymentStatus>,
) -> PaymentStatus {
    let mut ticker = tokio::time::interval(config.interval);
    let mut in_flight: JoinSet<(u32, Result<Kes, ApiError>)> = JoinSet::new();
    let mut tracker = AttemptTracker::default();
    let mut issued = 0u32;

    let outcome = loop {
        if issued >= config.max_attempts && in_flight.is_empty() {
            break PaymentStatus::TimedOut;
        }

        tokio::select! {
            _ = ticker.tick(), if issued < config.max_attempts => {
                issued += 1;
                let attempt = issued;
                let source = Arc::clone(&source);
                in_flight.spawn(async move { (attempt, source.balance().await) });
            }
            Some(joined) = in_flight.join_next() => {
                let Ok((attempt, result)) = joined else {
                    continue;
                };
                if !tracker.accept(attempt) {
                    debug!(attempt, "Ignoring stale balance check");
                    continue;
                }
                match result {
                    Ok(balance) if balance != initial => {
                        break PaymentStatus::Confirmed { balance };
                    }
                    Ok(_) => {
                        status.send_replace(PaymentStatus::Pending { attempts: attempt });
                    }
                    Err(ApiError::SessionExpired) => {
                        break PaymentStatus::Failed {
                            message: ApiError::SessionExpired.to_string(),
                        };
                    }
                    Err(err) => {
                        warn!(attempt, error = %err, "Balance check failed");
                        status.send_replace(PaymentStatus::Pending { attempts: attempt });
                    }
                }
            }
        }
    };

    in_flight.abort_all();
    status.send_replace(outcome.clone());
    outcome
}

// =============================================================================
// Tracker
// =============================================================================

struct PaymentWatch {
    owner: String,
    status: watch::Receiver<PaymentStatus>,
    _task: PollHandle,
}

/// Registry of running payment watches, keyed by a random watch id.
///
/// Entries expire after 15 minutes; expiry or [`PaymentTracker::cancel`]
/// drops the [`PollHandle`] and so stops the task.
#[derive(Clone)]
pub struct PaymentTracker {
    watches: Cache<Uuid, Arc<PaymentWatch>>,
    config: PollConfig,
}

impl std::fmt::Debug for PaymentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentTracker")
            .field("watches", &self.watches.entry_count())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for PaymentTracker {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

impl PaymentTracker {
    #[must_use]
    pub fn new(config: PollConfig) -> Self {
        let watches = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(WATCH_TTL)
            .build();
        Self { watches, config }
    }

    /// Start watching for a balance change on behalf of `owner`.
    pub async fn start<B: BalanceSource>(&self, owner: &str, source: B, initial: Kes) -> Uuid {
        let id = Uuid::new_v4();
        let (sender, receiver) = watch::channel(PaymentStatus::Pending { attempts: 0 });
        let config = self.config;
        let source = Arc::new(source);

        let task = PollHandle::spawn(async move {
            let outcome = poll_balance_change(source, initial, config, sender).await;
            info!(watch_id = %id, ?outcome, "Payment watch finished");
        });

        self.watches
            .insert(
                id,
                Arc::new(PaymentWatch {
                    owner: owner.to_string(),
                    status: receiver,
                    _task: task,
                }),
            )
            .await;
        id
    }

    /// Current status of a watch. `None` if it expired, never existed or
    /// belongs to someone else.
    pub async fn status(&self, id: Uuid, owner: &str) -> Option<PaymentStatus> {
        let watch = self.watches.get(&id).await?;
        (watch.owner == owner).then(|| watch.status.borrow().clone())
    }

    /// Stop a watch. Returns whether one was removed.
    pub async fn cancel(&self, id: Uuid, owner: &str) -> bool {
        match self.watches.get(&id).await {
            Some(watch) if watch.owner == owner => {
                self.watches.invalidate(&id).await;
                debug!(watch_id = %id, "Payment watch cancelled");
                true
            }
            _ => false,
        }
    }
}
