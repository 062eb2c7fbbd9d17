//! Form validation run before anything is sent to the backend.
//!
//! Each validator returns the first problem per field. Messages are the ones
//! shown next to the form inputs.

use std::collections::BTreeMap;

use liquifund_core::{Email, Kes, MINIMUM_WITHDRAWAL_KES, MpesaPhone};
use rust_decimal::Decimal;

/// Characters that count as "special" for registration passwords.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_PASSWORD_LEN: usize = 8;
const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=50;

/// Field name to message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless the field already has one.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First error in field order, for a page-level banner.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    /// `Ok(())` when no field failed.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Merge backend field errors, keeping only fields this form knows.
    pub fn merge_backend(&mut self, fields: &BTreeMap<String, String>, known: &[&'static str]) {
        for field in known {
            if let Some(message) = fields.get(*field) {
                self.add(field, message.clone());
            }
        }
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if let Err(err) = Email::parse(email) {
        errors.add("email", err.to_string());
    }
}

fn check_confirmation(errors: &mut FieldErrors, password: &str, confirmation: &str) {
    if password != confirmation {
        errors.add("confirm_password", "Passwords do not match");
    }
}

/// Email and password present, password at least 8 characters.
#[must_use]
pub fn validate_login(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 8 characters");
    }
    errors
}

/// Registration fields.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

/// Name of 2 to 50 letters and spaces; a valid email; a password of at
/// least 8 characters mixing upper case, lower case, a digit and a special
/// character; a matching confirmation.
#[must_use]
pub fn validate_registration(form: Registration<'_>) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name = form.full_name.trim();
    if name.is_empty() {
        errors.add("full_name", "Full name is required");
    } else if !NAME_LEN.contains(&name.chars().count()) {
        errors.add("full_name", "Full name must be between 2 and 50 characters");
    } else if !name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        errors.add("full_name", "Full name can only contain letters and spaces");
    }

    check_email(&mut errors, form.email);

    let password = form.password;
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 8 characters");
    } else if !password.chars().any(char::is_uppercase) {
        errors.add("password", "Password must contain an uppercase letter");
    } else if !password.chars().any(char::is_lowercase) {
        errors.add("password", "Password must contain a lowercase letter");
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.add("password", "Password must contain a number");
    } else if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        errors.add("password", "Password must contain a special character");
    }

    check_confirmation(&mut errors, password, form.confirm_password);
    errors
}

/// At least 8 characters with lower case, upper case and a digit, and a
/// matching confirmation.
#[must_use]
pub fn validate_password_reset(password: &str, confirmation: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 8 characters long");
    } else if !(password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
        && password.chars().any(|c| c.is_ascii_digit()))
    {
        errors.add(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        );
    }
    check_confirmation(&mut errors, password, confirmation);
    errors
}

#[must_use]
pub fn validate_forgot_password(email: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);
    errors
}

/// M-Pesa number for a payment.
///
/// # Errors
///
/// Returns the field errors when the number is not `0` followed by 9 digits.
pub fn validate_mpesa_phone(phone: &str) -> Result<MpesaPhone, FieldErrors> {
    MpesaPhone::parse(phone).map_err(|err| {
        let mut errors = FieldErrors::new();
        errors.add("phone", err.to_string());
        errors
    })
}

/// A validated withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalInput {
    pub mobile_number: MpesaPhone,
    pub amount: Kes,
}

/// Mobile number `0` plus 9 digits; amount a number of at least KSh 300.
///
/// # Errors
///
/// Returns the field errors for `mobile_number` and `amount`.
pub fn validate_withdrawal(mobile_number: &str, amount: &str) -> Result<WithdrawalInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let phone = MpesaPhone::parse(mobile_number)
        .map_err(|err| errors.add("mobile_number", err.to_string()))
        .ok();

    let minimum = Decimal::from(MINIMUM_WITHDRAWAL_KES);
    let amount = match amount.trim().parse::<Decimal>() {
        Ok(value) if value >= minimum => Some(Kes::new(value)),
        Ok(_) => {
            errors.add("amount", format!("Minimum withdrawal is KSh {MINIMUM_WITHDRAWAL_KES}"));
            None
        }
        Err(_) if amount.trim().is_empty() => {
            errors.add("amount", "Amount is required");
            None
        }
        Err(_) => {
            errors.add("amount", "Enter a valid amount");
            None
        }
    };

    match (phone, amount) {
        (Some(mobile_number), Some(amount)) if errors.is_empty() => Ok(WithdrawalInput {
            mobile_number,
            amount,
        }),
        _ => Err(errors),
    }
}

/// National id and address both required.
#[must_use]
pub fn validate_kyc(national_id: &str, address: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if national_id.trim().is_empty() {
        errors.add("national_id", "National ID is required");
    }
    if address.trim().is_empty() {
        errors.add("address", "Address is required");
    }
    errors
}

/// Name, email and message for a contact or support message.
#[must_use]
pub fn validate_contact(name: &str, email: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    check_email(&mut errors, email);
    if message.trim().is_empty() {
        errors.add("message", "Message is required");
    }
    errors
}
