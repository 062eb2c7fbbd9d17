//! Newtype IDs for backend entity references.
//!
//! The LiquiFund API identifies every record with an integer primary key.
//! Wrapping each in its own type keeps a withdrawal id from being passed where
//! a KYC form id is expected when building action URLs.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
/// - `FromStr`, so ids can be taken straight from path segments
///
/// # Example
///
/// ```rust
/// # use liquifund_core::define_id;
/// define_id!(UserId);
/// define_id!(RentalId);
///
/// let user_id = UserId::new(1);
/// let rental_id = RentalId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: UserId = rental_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Backend entity IDs
define_id!(UserId);
define_id!(RentalId);
define_id!(WithdrawalId);
define_id!(PaymentId);
define_id!(KycFormId);
define_id!(SupportMessageId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_path_segment() {
        let id: WithdrawalId = "42".parse().unwrap();
        assert_eq!(id, WithdrawalId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("abc".parse::<KycFormId>().is_err());
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(id.as_i64(), 7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
