//! Core types for LiquiFund.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod plan;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Kes, MINIMUM_WITHDRAWAL_KES};
pub use phone::{MpesaPhone, PhoneError};
pub use plan::{CurrencyCode, RENTAL_DURATION_DAYS, RETURN_MULTIPLIER, RentalPlan};
pub use status::*;
