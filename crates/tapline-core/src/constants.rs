//! Core constants for in-person payment collection.
//!
//! These values describe the charge policy applied to every payment intent
//! created by the workflow, plus the limits enforced on user input before
//! anything reaches the terminal SDK.
//!
//! # Usage
//!
//! ```
//! use tapline_core::constants::*;
//!
//! assert_eq!(DEFAULT_CURRENCY_CODE, "usd");
//! assert_eq!(CARD_PRESENT, "card_present");
//!
//! fn within_limits(minor_units: i64) -> bool {
//!     minor_units >= MIN_AMOUNT_MINOR_UNITS && minor_units <= MAX_AMOUNT_MINOR_UNITS
//! }
//! assert!(within_limits(1000));
//! assert!(!within_limits(0));
//! ```

// ============================================================================
// Charge policy
// ============================================================================

/// Currency code used for every charge collected in person.
pub const DEFAULT_CURRENCY_CODE: &str = "usd";

/// Number of decimal places between major and minor units for USD.
pub const USD_MINOR_UNIT_EXPONENT: u32 = 2;

/// Payment method type for tap, insert or swipe on a physical reader.
pub const CARD_PRESENT: &str = "card_present";

/// Offline behavior wire value: go online when possible, tolerate offline.
pub const PREFER_ONLINE: &str = "prefer_online";

// ============================================================================
// Amount limits
// ============================================================================

/// Smallest chargeable amount in minor units.
pub const MIN_AMOUNT_MINOR_UNITS: i64 = 1;

/// Largest chargeable amount in minor units (999,999.99 USD).
///
/// The card networks reject anything with more than eight digits in minor
/// units, so larger inputs are refused before an intent is created.
pub const MAX_AMOUNT_MINOR_UNITS: i64 = 99_999_999;

// ============================================================================
// Identifiers
// ============================================================================

/// Maximum length accepted for reader, location and intent identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Prefix of payment intent identifiers assigned by the payment backend.
pub const PAYMENT_INTENT_ID_PREFIX: &str = "pi_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_limits_are_ordered() {
        assert!(MIN_AMOUNT_MINOR_UNITS > 0);
        assert!(MIN_AMOUNT_MINOR_UNITS < MAX_AMOUNT_MINOR_UNITS);
    }

    #[test]
    fn test_max_amount_has_eight_digits() {
        assert_eq!(MAX_AMOUNT_MINOR_UNITS.to_string().len(), 8);
    }
}
