//! M-Pesa mobile numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`MpesaPhone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is required")]
    Empty,
    #[error("Phone number must be 10 digits starting with 0 (e.g. 0712345678)")]
    InvalidFormat,
}

/// A Safaricom-style local mobile number: a leading `0` followed by nine digits.
///
/// ```
/// use liquifund_core::MpesaPhone;
///
/// assert!(MpesaPhone::parse("0712345678").is_ok());
/// assert!(MpesaPhone::parse("712345678").is_err());
/// assert!(MpesaPhone::parse("+254712345678").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MpesaPhone(String);

impl MpesaPhone {
    const LENGTH: usize = 10;

    /// Parse a phone number, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] for blank input and
    /// [`PhoneError::InvalidFormat`] unless the input is exactly ten ASCII
    /// digits beginning with `0`.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let valid = s.len() == Self::LENGTH
            && s.starts_with('0')
            && s.bytes().all(|b| b.is_ascii_digit());
        if !valid {
            return Err(PhoneError::InvalidFormat);
        }

        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MpesaPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_local_numbers() {
        assert!(MpesaPhone::parse("0712345678").is_ok());
        assert!(MpesaPhone::parse(" 0112345678 ").is_ok());
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert_eq!(MpesaPhone::parse(""), Err(PhoneError::Empty));
        assert_eq!(MpesaPhone::parse("071234567"), Err(PhoneError::InvalidFormat));
        assert_eq!(MpesaPhone::parse("07123456789"), Err(PhoneError::InvalidFormat));
        assert_eq!(MpesaPhone::parse("1712345678"), Err(PhoneError::InvalidFormat));
        assert_eq!(MpesaPhone::parse("07123a5678"), Err(PhoneError::InvalidFormat));
        assert_eq!(MpesaPhone::parse("0712 45678"), Err(PhoneError::InvalidFormat));
    }
}
