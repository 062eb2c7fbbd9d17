//! Estimated live profit for active rentals.
//!
//! The dashboard shows a profit figure that creeps up while a rental runs.
//! It is interpolated from the rental's dates with a small random wobble and
//! is purely cosmetic: the wallet balance from the backend is the only
//! authoritative number, and nothing here is ever sent back.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use liquifund_core::RentalId;

use crate::api::types::Rental;

/// Source of the display wobble, in `[-5, 5)` shillings.
pub trait Fluctuation {
    fn sample(&self) -> f64;
}

/// `(random - 0.5) * 10`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomFluctuation;

impl Fluctuation for RandomFluctuation {
    fn sample(&self) -> f64 {
        (rand::rng().random::<f64>() - 0.5) * 10.0
    }
}

/// No wobble, for deterministic output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFluctuation;

impl Fluctuation for NoFluctuation {
    fn sample(&self) -> f64 {
        0.0
    }
}

/// Per-rental estimate served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveProfit {
    pub rental_id: RentalId,
    /// Estimated profit so far, two decimals.
    pub profit: String,
    /// Whole percent of the rental period elapsed.
    pub percent_complete: u8,
}

/// Fraction of `[start, end]` elapsed at `now`, clamped to `[0, 1]`.
///
/// A malformed window (`end <= start`) counts as complete.
#[must_use]
pub fn progress(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let total = (end - start).num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = (now - start).num_milliseconds() as f64 / total as f64;
    ratio.clamp(0.0, 1.0)
}

/// Start and end of a rental's earning window.
///
/// Starts at `created_at`, falling back to `start_date`; ends at `end_date`,
/// or `duration_days` after the start when absent. `None` when the backend
/// sent neither start timestamp.
#[must_use]
pub fn rental_window(rental: &Rental) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = rental.created_at.or(rental.start_date)?;
    let end = rental
        .end_date
        .unwrap_or_else(|| start + Duration::days(i64::from(rental.duration_days)));
    Some((start, end))
}

/// Elapsed fraction of the rental's window, 0 when it has no start.
fn rental_progress(rental: &Rental, now: DateTime<Utc>) -> f64 {
    rental_window(rental).map_or(0.0, |(start, end)| progress(start, end, now))
}

/// Interpolates profit for active rentals.
#[derive(Debug, Clone, Default)]
pub struct ProfitEstimator<F: Fluctuation = RandomFluctuation> {
    fluctuation: F,
}

impl ProfitEstimator<RandomFluctuation> {
    /// Estimator used for the dashboard, with the random wobble.
    #[must_use]
    pub const fn live() -> Self {
        Self::new(RandomFluctuation)
    }
}

impl<F: Fluctuation> ProfitEstimator<F> {
    #[must_use]
    pub const fn new(fluctuation: F) -> Self {
        Self { fluctuation }
    }

    /// Estimated profit at `now`, never negative. `None` for rentals that
    /// are not active.
    #[must_use]
    pub fn estimate(&self, rental: &Rental, now: DateTime<Utc>) -> Option<f64> {
        if !rental.status.is_active() {
            return None;
        }
        let full_profit = (rental.expected_return.amount() - rental.amount.amount())
            .to_f64()
            .unwrap_or(0.0);
        let estimate = full_profit * rental_progress(rental, now) + self.fluctuation.sample();
        Some(estimate.max(0.0))
    }

    /// Display string for one rental: the estimate to two decimals, or
    /// `0.00` for rentals that are not active.
    #[must_use]
    pub fn display(&self, rental: &Rental, now: DateTime<Utc>) -> String {
        format!("{:.2}", self.estimate(rental, now).unwrap_or(0.0))
    }

    /// Estimates for every rental, in input order.
    #[must_use]
    pub fn snapshot(&self, rentals: &[Rental], now: DateTime<Utc>) -> Vec<LiveProfit> {
        rentals
            .iter()
            .map(|rental| LiveProfit {
                rental_id: rental.id,
                profit: self.display(rental, now),
                percent_complete: percent(rental_progress(rental, now)),
            })
            .collect()
    }

    /// Sum of the active estimates, two decimals.
    #[must_use]
    pub fn total(&self, rentals: &[Rental], now: DateTime<Utc>) -> String {
        let sum: f64 = rentals.iter().filter_map(|r| self.estimate(r, now)).sum();
        format!("{sum:.2}")
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(progress: f64) -> u8 {
    (progress * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn rental(status: &str, created: &str, end: Option<&str>) -> Rental {
        serde_json::from_value(json!({
            "id": 7,
            "currency": "USD",
            "amount": "1200",
            "expected_return": "2400",
            "status": status,
            "created_at": created,
            "end_date": end,
        }))
        .unwrap()
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_progress_clamps() {
        assert!((progress(at(1), at(11), at(6)) - 0.5).abs() < f64::EPSILON);
        assert!((progress(at(5), at(11), at(1))).abs() < f64::EPSILON);
        assert!((progress(at(1), at(11), at(20)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_window_counts_as_complete() {
        assert!((progress(at(10), at(10), at(1)) - 1.0).abs() < f64::EPSILON);
        assert!((progress(at(10), at(2), at(5)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_halfway_rental_earns_half_profit() {
        let rental = rental("active", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"));
        let estimator = ProfitEstimator::new(NoFluctuation);
        assert_eq!(estimator.display(&rental, at(11)), "600.00");
    }

    #[test]
    fn test_missing_end_date_uses_duration() {
        let rental = rental("active", "2025-03-01T00:00:00Z", None);
        let (_, end) = rental_window(&rental).unwrap();
        assert_eq!(end, at(21));
    }

    #[test]
    fn test_window_falls_back_to_start_date() {
        let rental: Rental = serde_json::from_value(json!({
            "id": 8, "currency": "CAD", "amount": "100", "expected_return": "200",
            "status": "active", "start_date": "2025-03-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(rental_window(&rental), Some((at(1), at(21))));

        let undated: Rental = serde_json::from_value(json!({
            "id": 9, "currency": "CAD", "amount": "100", "expected_return": "200",
            "status": "active"
        }))
        .unwrap();
        assert_eq!(rental_window(&undated), None);
        let estimator = ProfitEstimator::new(NoFluctuation);
        assert_eq!(estimator.display(&undated, at(11)), "0.00");
    }

    #[test]
    fn test_finished_rental_caps_at_full_profit() {
        let rental = rental("active", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"));
        let estimator = ProfitEstimator::new(NoFluctuation);
        let at_end = estimator.estimate(&rental, at(21)).unwrap();
        assert!((at_end - 1200.0).abs() < f64::EPSILON);
        assert_eq!(estimator.display(&rental, at(30)), "1200.00");
        assert_eq!(estimator.snapshot(&[rental], at(30))[0].percent_complete, 100);
    }

    #[test]
    fn test_live_estimator_wobble_stays_small() {
        let rental = rental("active", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"));
        let estimate = ProfitEstimator::live().estimate(&rental, at(11)).unwrap();
        assert!((595.0..605.0).contains(&estimate));
    }

    #[test]
    fn test_inactive_rental_shows_zero() {
        let rental = rental("completed", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"));
        let estimator = ProfitEstimator::new(NoFluctuation);
        assert_eq!(estimator.estimate(&rental, at(11)), None);
        assert_eq!(estimator.display(&rental, at(11)), "0.00");
    }

    #[test]
    fn test_estimate_never_negative() {
        struct Down;
        impl Fluctuation for Down {
            fn sample(&self) -> f64 {
                -5.0
            }
        }
        let rental = rental("active", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"));
        assert_eq!(ProfitEstimator::new(Down).display(&rental, at(1)), "0.00");
    }

    #[test]
    fn test_random_fluctuation_is_bounded() {
        for _ in 0..1000 {
            let sample = RandomFluctuation.sample();
            assert!((-5.0..5.0).contains(&sample));
        }
    }

    #[test]
    fn test_snapshot_reports_percent() {
        let rentals = vec![rental("active", "2025-03-01T00:00:00Z", Some("2025-03-21T00:00:00Z"))];
        let snapshot = ProfitEstimator::new(NoFluctuation).snapshot(&rentals, at(6));
        assert_eq!(snapshot[0].percent_complete, 25);
        assert_eq!(snapshot[0].profit, "300.00");
    }
}
