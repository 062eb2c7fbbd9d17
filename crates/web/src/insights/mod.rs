//! Values derived from backend data for display.
//!
//! Everything here is a pure function of its inputs (plus the clock and a
//! random source where noted) and never feeds back into an API call.

pub mod grouping;
pub mod profit;
pub mod trend;

pub use grouping::{
    GroupKey, ReferralFilter, ReferrerGroup, StatusCount, UserWithdrawals, WithdrawalFilter,
    enrich_withdrawals, group_referrals_by_referrer, group_withdrawals_by_user,
    withdrawal_status_breakdown,
};
pub use profit::{Fluctuation, LiveProfit, NoFluctuation, ProfitEstimator, RandomFluctuation};
pub use trend::{ChartFrame, EarningsTrend, Transaction, TransactionKind};
