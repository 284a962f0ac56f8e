//! Property-based tests for charge amount validation.
//!
//! Amounts are the only user-controlled value that reaches the terminal SDK,
//! so every rejection rule is checked over the whole input space.

use proptest::prelude::*;
use tapline_core::constants::{MAX_AMOUNT_MINOR_UNITS, MIN_AMOUNT_MINOR_UNITS};
use tapline_core::{Amount, Currency, Error};

proptest! {
    #[test]
    fn prop_non_positive_amounts_are_rejected(minor in i64::MIN..=0i64) {
        prop_assert_eq!(Amount::new(minor), Err(Error::NonPositiveAmount(minor)));
    }

    #[test]
    fn prop_amounts_in_range_are_accepted(minor in MIN_AMOUNT_MINOR_UNITS..=MAX_AMOUNT_MINOR_UNITS) {
        let amount = Amount::new(minor).unwrap();
        prop_assert_eq!(amount.minor_units(), minor);
    }

    #[test]
    fn prop_amounts_above_limit_are_rejected(minor in (MAX_AMOUNT_MINOR_UNITS + 1)..=i64::MAX) {
        let rejected = matches!(Amount::new(minor), Err(Error::AmountTooLarge { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn prop_major_input_with_cents_is_exact(dollars in 0i64..=999_999, cents in 0i64..=99) {
        prop_assume!(dollars > 0 || cents > 0);
        let input = format!("{}.{:02}", dollars, cents);
        let amount = Amount::parse_major(&input, Currency::Usd).unwrap();
        prop_assert_eq!(amount.minor_units(), dollars * 100 + cents);
    }

    #[test]
    fn prop_negative_major_input_is_rejected(dollars in 0i64..=999_999, cents in 0i64..=99) {
        let input = format!("-{}.{:02}", dollars, cents);
        let rejected = matches!(
            Amount::parse_major(&input, Currency::Usd),
            Err(Error::NonPositiveAmount(_))
        );
        prop_assert!(rejected);
    }
}
