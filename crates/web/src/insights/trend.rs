//! Cumulative earnings chart for the earnings page.
//!
//! Deposits are sorted by time and summed; each running total becomes one
//! point. Points are spaced evenly by index, not by time, and scaled between
//! the series minimum and maximum. The output is an SVG path string, formatted
//! with two decimals so the same input always yields the same string.

use chrono::NaiveDateTime;
use liquifund_core::{Kes, PaymentId};
use rust_decimal::prelude::ToPrimitive;

use crate::api::types::PaymentRecord;

/// Deposit or withdrawal, from the sign of the ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdraw",
        }
    }
}

/// A wallet ledger entry as shown in the transaction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: PaymentId,
    pub kind: TransactionKind,
    /// Always non-negative; the sign lives in `kind`.
    pub amount: Kes,
    pub created_at: NaiveDateTime,
}

impl From<&PaymentRecord> for Transaction {
    fn from(record: &PaymentRecord) -> Self {
        let kind = if record.amount_deducted.is_positive() {
            TransactionKind::Deposit
        } else {
            TransactionKind::Withdrawal
        };
        Self {
            id: record.id,
            kind,
            amount: record.amount_deducted.abs(),
            created_at: record.created_at,
        }
    }
}

/// Plot area of the chart, in SVG user units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartFrame {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl Default for ChartFrame {
    fn default() -> Self {
        Self {
            width: 400,
            height: 200,
            padding: 30,
        }
    }
}

impl ChartFrame {
    fn left(&self) -> f64 {
        f64::from(self.padding)
    }

    fn right(&self) -> f64 {
        f64::from(self.width) - f64::from(self.padding)
    }

    fn bottom(&self) -> f64 {
        f64::from(self.height) - f64::from(self.padding)
    }

    fn plot_width(&self) -> f64 {
        self.right() - self.left()
    }

    fn plot_height(&self) -> f64 {
        self.bottom() - f64::from(self.padding)
    }

    /// Y positions of the horizontal grid lines, top to bottom.
    #[must_use]
    pub fn grid_lines(&self) -> Vec<String> {
        (0..5)
            .map(|i| fmt2(f64::from(self.padding) + f64::from(i) * self.plot_height() / 4.0))
            .collect()
    }
}

/// One plotted point.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub x: String,
    pub y: String,
    pub date: NaiveDateTime,
    pub total: Kes,
}

/// Running deposit totals and their chart geometry.
#[derive(Debug, Clone, Default)]
pub struct EarningsTrend {
    frame: ChartFrame,
    points: Vec<(NaiveDateTime, Kes)>,
}

fn fmt2(value: f64) -> String {
    format!("{value:.2}")
}

impl EarningsTrend {
    /// Build the trend from every transaction; withdrawals are ignored.
    #[must_use]
    pub fn from_transactions(transactions: &[Transaction], frame: ChartFrame) -> Self {
        let mut deposits: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Deposit)
            .collect();
        // Stable, so same-instant deposits keep their input order.
        deposits.sort_by_key(|t| t.created_at);

        let mut running = Kes::ZERO;
        let points = deposits
            .into_iter()
            .map(|t| {
                running = running + t.amount;
                (t.created_at, running)
            })
            .collect();

        Self { frame, points }
    }

    #[must_use]
    pub const fn frame(&self) -> ChartFrame {
        self.frame
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Final running total, zero when there are no deposits.
    #[must_use]
    pub fn total(&self) -> Kes {
        self.points.last().map_or(Kes::ZERO, |(_, total)| *total)
    }

    fn bounds(&self) -> (f64, f64) {
        let values = self.points.iter().map(|(_, total)| as_f64(*total));
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }

    fn coordinates(&self) -> Vec<(f64, f64)> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let (min, max) = self.bounds();
        let range = if (max - min).abs() < f64::EPSILON { 1.0 } else { max - min };
        #[allow(clippy::cast_precision_loss)]
        let steps = self.points.len().saturating_sub(1).max(1) as f64;

        self.points
            .iter()
            .enumerate()
            .map(|(i, (_, total))| {
                #[allow(clippy::cast_precision_loss)]
                let x = self.frame.left() + self.frame.plot_width() * i as f64 / steps;
                let y = self.frame.bottom() - (as_f64(*total) - min) / range * self.frame.plot_height();
                (x, y)
            })
            .collect()
    }

    /// `M x,y L x,y …`, empty when there are no deposits.
    #[must_use]
    pub fn line_path(&self) -> String {
        self.coordinates()
            .iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let command = if i == 0 { 'M' } else { 'L' };
                format!("{command} {},{}", fmt2(*x), fmt2(*y))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The line closed down to the x axis, for the filled area.
    #[must_use]
    pub fn area_path(&self) -> String {
        let line = self.line_path();
        if line.is_empty() {
            return line;
        }
        format!(
            "{line} L {right},{bottom} L {left},{bottom} Z",
            right = fmt2(self.frame.right()),
            left = fmt2(self.frame.left()),
            bottom = fmt2(self.frame.bottom()),
        )
    }

    /// Plotted points with their labels.
    #[must_use]
    pub fn points(&self) -> Vec<TrendPoint> {
        self.coordinates()
            .into_iter()
            .zip(&self.points)
            .map(|((x, y), (date, total))| TrendPoint {
                x: fmt2(x),
                y: fmt2(y),
                date: *date,
                total: *total,
            })
            .collect()
    }

    /// Five axis labels from the series maximum down to its minimum, aligned
    /// with [`ChartFrame::grid_lines`].
    #[must_use]
    pub fn y_ticks(&self) -> Vec<String> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let (min, max) = self.bounds();
        (0..5)
            .map(|i| fmt2(max - (max - min) * f64::from(i) / 4.0))
            .collect()
    }
}

fn as_f64(amount: Kes) -> f64 {
    amount.amount().to_f64().unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tx(id: i64, kind: TransactionKind, amount: u32, when: &str) -> Transaction {
        Transaction {
            id: PaymentId::new(id),
            kind,
            amount: Kes::from_shillings(amount),
            created_at: NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    fn trend(transactions: &[Transaction]) -> EarningsTrend {
        EarningsTrend::from_transactions(transactions, ChartFrame::default())
    }

    #[test]
    fn test_empty_input_gives_empty_paths() {
        let trend = trend(&[]);
        assert_eq!(trend.line_path(), "");
        assert_eq!(trend.area_path(), "");
        assert!(trend.y_ticks().is_empty());
        assert_eq!(trend.total(), Kes::ZERO);
    }

    #[test]
    fn test_single_point_sits_on_left_edge_and_baseline() {
        let trend = trend(&[tx(1, TransactionKind::Deposit, 100, "2025-03-01 09:00:00")]);
        assert_eq!(trend.line_path(), "M 30.00,170.00");
        assert!(!trend.line_path().contains("NaN"));
    }

    #[test]
    fn test_running_total_sorted_by_time() {
        let trend = trend(&[
            tx(1, TransactionKind::Deposit, 300, "2025-03-03 09:00:00"),
            tx(2, TransactionKind::Withdrawal, 999, "2025-03-02 09:00:00"),
            tx(3, TransactionKind::Deposit, 100, "2025-03-01 09:00:00"),
            tx(4, TransactionKind::Deposit, 200, "2025-03-02 09:00:00"),
        ]);
        assert_eq!(trend.total(), Kes::from_shillings(600));
        // totals 100, 300, 600 -> x 30, 200, 370
        assert_eq!(
            trend.line_path(),
            "M 30.00,170.00 L 200.00,114.00 L 370.00,30.00"
        );
        assert_eq!(
            trend.area_path(),
            "M 30.00,170.00 L 200.00,114.00 L 370.00,30.00 L 370.00,170.00 L 30.00,170.00 Z"
        );
    }

    #[test]
    fn test_path_is_deterministic() {
        let input = [
            tx(1, TransactionKind::Deposit, 150, "2025-03-01 09:00:00"),
            tx(2, TransactionKind::Deposit, 150, "2025-03-01 09:00:00"),
        ];
        assert_eq!(trend(&input).line_path(), trend(&input).line_path());
    }

    #[test]
    fn test_y_ticks_span_min_to_max() {
        let trend = trend(&[
            tx(1, TransactionKind::Deposit, 100, "2025-03-01 09:00:00"),
            tx(2, TransactionKind::Deposit, 400, "2025-03-02 09:00:00"),
        ]);
        assert_eq!(
            trend.y_ticks(),
            vec!["500.00", "400.00", "300.00", "200.00", "100.00"]
        );
        assert_eq!(
            ChartFrame::default().grid_lines(),
            vec!["30.00", "65.00", "100.00", "135.00", "170.00"]
        );
    }

    #[test]
    fn test_sign_of_ledger_entry_sets_kind() {
        let record: PaymentRecord = serde_json::from_value(serde_json::json!({
            "id": 4,
            "amount_deducted": "-250.00",
            "status": "completed",
            "created_at": "2025-03-01 09:00:00"
        }))
        .unwrap();
        let tx = Transaction::from(&record);
        assert_eq!(tx.kind, TransactionKind::Withdrawal);
        assert_eq!(tx.amount, Kes::from_shillings(250));
    }
}
