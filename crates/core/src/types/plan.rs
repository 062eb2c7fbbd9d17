//! The rental plan catalogue.
//!
//! A user "rents" a foreign currency position for a fixed KES price. After
//! [`RENTAL_DURATION_DAYS`] the backend credits [`RETURN_MULTIPLIER`] times the
//! price back to the wallet.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Length of every rental, in days.
pub const RENTAL_DURATION_DAYS: u32 = 20;

/// Payout multiple applied to the rental price at maturity.
pub const RETURN_MULTIPLIER: u32 = 2;

/// Currencies offered for rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    Cad,
    Aud,
    Gbp,
    Jpy,
    Eur,
    Usd,
}

impl CurrencyCode {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
            Self::Eur => "EUR",
            Self::Usd => "USD",
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cad => "Canadian Dollar",
            Self::Aud => "Australian Dollar",
            Self::Gbp => "British Pound",
            Self::Jpy => "Japanese Yen",
            Self::Eur => "Euro",
            Self::Usd => "US Dollar",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "GBP" => Ok(Self::Gbp),
            "JPY" => Ok(Self::Jpy),
            "EUR" => Ok(Self::Eur),
            "USD" => Ok(Self::Usd),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// One entry of the rental catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalPlan {
    pub currency: CurrencyCode,
    price_kes: u32,
}

const CATALOGUE: [RentalPlan; 6] = [
    RentalPlan::new(CurrencyCode::Cad, 100),
    RentalPlan::new(CurrencyCode::Aud, 250),
    RentalPlan::new(CurrencyCode::Gbp, 500),
    RentalPlan::new(CurrencyCode::Jpy, 750),
    RentalPlan::new(CurrencyCode::Eur, 1000),
    RentalPlan::new(CurrencyCode::Usd, 1200),
];

impl RentalPlan {
    const fn new(currency: CurrencyCode, price_kes: u32) -> Self {
        Self {
            currency,
            price_kes,
        }
    }

    /// All plans, cheapest first.
    #[must_use]
    pub const fn catalogue() -> &'static [Self] {
        &CATALOGUE
    }

    /// Look up the plan for a currency.
    #[must_use]
    pub fn for_currency(currency: CurrencyCode) -> Option<Self> {
        CATALOGUE.iter().copied().find(|p| p.currency == currency)
    }

    #[must_use]
    pub fn price(&self) -> Decimal {
        Decimal::from(self.price_kes)
    }

    /// Amount credited at maturity.
    #[must_use]
    pub fn expected_return(&self) -> Decimal {
        Decimal::from(self.price_kes * RETURN_MULTIPLIER)
    }

    #[must_use]
    pub fn profit(&self) -> Decimal {
        self.expected_return() - self.price()
    }

    #[must_use]
    pub const fn duration_days(&self) -> u32 {
        RENTAL_DURATION_DAYS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_prices() {
        let prices: Vec<(&str, Decimal)> = RentalPlan::catalogue()
            .iter()
            .map(|p| (p.currency.code(), p.price()))
            .collect();
        assert_eq!(
            prices,
            vec![
                ("CAD", Decimal::from(100)),
                ("AUD", Decimal::from(250)),
                ("GBP", Decimal::from(500)),
                ("JPY", Decimal::from(750)),
                ("EUR", Decimal::from(1000)),
                ("USD", Decimal::from(1200)),
            ]
        );
    }

    #[test]
    fn test_return_doubles_price() {
        let usd = RentalPlan::for_currency(CurrencyCode::Usd).unwrap();
        assert_eq!(usd.expected_return(), Decimal::from(2400));
        assert_eq!(usd.profit(), Decimal::from(1200));
        assert_eq!(usd.duration_days(), 20);
    }

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!("eur".parse::<CurrencyCode>(), Ok(CurrencyCode::Eur));
        assert!("KES".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&CurrencyCode::Jpy).unwrap(), "\"JPY\"");
    }
}
