use crate::{
    Result,
    constants::{
        DEFAULT_CURRENCY_CODE, MAX_AMOUNT_MINOR_UNITS, MAX_IDENTIFIER_LENGTH,
        MIN_AMOUNT_MINOR_UNITS, USD_MINOR_UNIT_EXPONENT,
    },
    error::Error,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Charge amount in minor currency units (e.g. cents).
///
/// Always positive and never above [`MAX_AMOUNT_MINOR_UNITS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Create an amount from minor units.
    ///
    /// # Errors
    /// Returns `Error::NonPositiveAmount` for zero or negative values and
    /// `Error::AmountTooLarge` above the per-charge maximum.
    pub fn new(minor_units: i64) -> Result<Self> {
        if minor_units < MIN_AMOUNT_MINOR_UNITS {
            return Err(Error::NonPositiveAmount(minor_units));
        }
        if minor_units > MAX_AMOUNT_MINOR_UNITS {
            return Err(Error::AmountTooLarge {
                amount: minor_units.to_string(),
                max: MAX_AMOUNT_MINOR_UNITS,
            });
        }
        Ok(Amount(minor_units))
    }

    /// Parse user input expressed in major units ("10.00", "3.5", "12").
    ///
    /// The value is scaled by the currency exponent and rounded half away
    /// from zero, so "0.005" becomes one cent.
    ///
    /// # Errors
    /// Returns `Error::InvalidAmountInput` when the input is not a decimal
    /// number, plus the errors of [`Amount::new`] for the converted value.
    ///
    /// # Examples
    /// ```
    /// use tapline_core::{Amount, Currency};
    ///
    /// let amount = Amount::parse_major("10.00", Currency::Usd).unwrap();
    /// assert_eq!(amount.minor_units(), 1000);
    /// ```
    pub fn parse_major(input: &str, currency: Currency) -> Result<Self> {
        let trimmed = input.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| Error::InvalidAmountInput(trimmed.to_string()))?;

        let scale = Decimal::from(10_i64.pow(currency.minor_unit_exponent()));
        let minor = value
            .checked_mul(scale)
            .ok_or_else(|| Error::AmountTooLarge {
                amount: trimmed.to_string(),
                max: MAX_AMOUNT_MINOR_UNITS,
            })?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        let minor = minor.to_i64().ok_or_else(|| Error::AmountTooLarge {
            amount: trimmed.to_string(),
            max: MAX_AMOUNT_MINOR_UNITS,
        })?;

        Amount::new(minor)
    }

    /// Get the amount in minor units.
    #[must_use]
    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Currency accepted for in-person charges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Currency {
    #[default]
    Usd,
}

impl Currency {
    /// Lowercase ISO 4217 code as expected by the terminal SDK.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => DEFAULT_CURRENCY_CODE,
        }
    }

    /// Decimal places between major and minor units.
    #[must_use]
    pub fn minor_unit_exponent(&self) -> u32 {
        match self {
            Currency::Usd => USD_MINOR_UNIT_EXPONENT,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Currency::Usd),
            other => Err(Error::UnsupportedCurrency(other.to_string())),
        }
    }
}

fn validate_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LENGTH
        && value.is_ascii()
        && !value.chars().any(|c| c.is_ascii_whitespace())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $error:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            ///
            /// # Errors
            /// Returns an error if the value is empty, contains whitespace or
            /// non-ASCII characters, or is longer than 255 bytes.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                if !validate_identifier(&value) {
                    return Err(Error::$error(value));
                }
                Ok($name(value))
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                $name::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                $name::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

identifier!(
    /// Opaque, device-specific reader identifier (serial number or SDK id).
    ReaderId,
    InvalidReaderId
);

identifier!(
    /// Terminal location a reader is registered to at connect time.
    LocationId,
    InvalidLocationId
);

identifier!(
    /// Payment intent identifier assigned by the payment backend.
    PaymentIntentId,
    InvalidPaymentIntentId
);

/// How the terminal SDK looks for readers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiscoveryMethod {
    /// The phone itself acts as the reader (tap to pay).
    #[default]
    LocalMobile,

    /// External reader reachable over Bluetooth LE.
    BluetoothScan,

    /// Smart reader registered to the backend and reachable over the network.
    Internet,
}

impl DiscoveryMethod {
    /// SDK wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::LocalMobile => "localMobile",
            DiscoveryMethod::BluetoothScan => "bluetoothScan",
            DiscoveryMethod::Internet => "internet",
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DiscoveryMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "localMobile" | "local_mobile" | "local-mobile" => Ok(DiscoveryMethod::LocalMobile),
            "bluetoothScan" | "bluetooth_scan" | "bluetooth-scan" => {
                Ok(DiscoveryMethod::BluetoothScan)
            }
            "internet" => Ok(DiscoveryMethod::Internet),
            other => Err(Error::UnknownDiscoveryMethod(other.to_string())),
        }
    }
}

/// Payment method types an intent may be collected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PaymentMethodType {
    /// Physical card interaction: tap, insert or swipe.
    CardPresent,
}

impl PaymentMethodType {
    /// SDK wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::CardPresent => crate::constants::CARD_PRESENT,
        }
    }
}

/// Whether an intent may be created and confirmed without connectivity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineBehavior {
    /// Use the network when available and queue offline otherwise.
    #[default]
    PreferOnline,

    /// Fail when the network is unavailable.
    RequireOnline,

    /// Always store and forward.
    ForceOffline,
}

impl OfflineBehavior {
    /// SDK wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OfflineBehavior::PreferOnline => crate::constants::PREFER_ONLINE,
            OfflineBehavior::RequireOnline => "require_online",
            OfflineBehavior::ForceOffline => "force_offline",
        }
    }
}

/// Device location permission as reported by the operating system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPermission {
    Granted,
    Denied,
    #[default]
    Unknown,
}

impl LocationPermission {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, LocationPermission::Granted)
    }
}

impl fmt::Display for LocationPermission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LocationPermission::Granted => "granted",
            LocationPermission::Denied => "denied",
            LocationPermission::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.00", 1000)]
    #[case("10", 1000)]
    #[case("3.5", 350)]
    #[case(" 0.01 ", 1)]
    #[case("0.005", 1)] // rounds half away from zero
    #[case("12.344", 1234)]
    #[case("999999.99", 99_999_999)]
    fn test_amount_parse_major_valid(#[case] input: &str, #[case] expected: i64) {
        let amount = Amount::parse_major(input, Currency::Usd).unwrap();
        assert_eq!(amount.minor_units(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("0.00")]
    #[case("-5.00")]
    #[case("0.004")] // rounds to zero
    fn test_amount_parse_major_non_positive(#[case] input: &str) {
        let result = Amount::parse_major(input, Currency::Usd);
        assert!(matches!(result, Err(Error::NonPositiveAmount(_))));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("10,00")]
    #[case("1.2.3")]
    fn test_amount_parse_major_garbage(#[case] input: &str) {
        let result = Amount::parse_major(input, Currency::Usd);
        assert!(matches!(result, Err(Error::InvalidAmountInput(_))));
    }

    #[test]
    fn test_amount_parse_major_too_large() {
        let result = Amount::parse_major("1000000.00", Currency::Usd);
        assert!(matches!(result, Err(Error::AmountTooLarge { .. })));

        let huge = "79228162514264337593543950335";
        assert!(matches!(
            Amount::parse_major(huge, Currency::Usd),
            Err(Error::AmountTooLarge { .. })
        ));
    }

    #[test]
    fn test_amount_serde_rejects_non_positive() {
        let amount: Amount = serde_json::from_str("1000").unwrap();
        assert_eq!(amount.minor_units(), 1000);
        assert!(serde_json::from_str::<Amount>("0").is_err());
    }

    #[test]
    fn test_currency() {
        assert_eq!(Currency::default(), Currency::Usd);
        assert_eq!(Currency::Usd.code(), "usd");
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("eur".parse::<Currency>().is_err());
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"usd\"");
    }

    #[rstest]
    #[case("tml_FrcFgksbiIZZ2V")]
    #[case("SIMULATOR-1")]
    fn test_location_id_valid(#[case] input: &str) {
        let id: LocationId = input.parse().unwrap();
        assert_eq!(id.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("tml with space")]
    #[case("tml_ñ")]
    fn test_location_id_invalid(#[case] input: &str) {
        assert!(matches!(
            LocationId::new(input),
            Err(Error::InvalidLocationId(_))
        ));
    }

    #[test]
    fn test_identifier_length_limit() {
        let long = "r".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(ReaderId::new(long).is_err());
        assert!(ReaderId::new("r".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[rstest]
    #[case("localMobile", DiscoveryMethod::LocalMobile)]
    #[case("local-mobile", DiscoveryMethod::LocalMobile)]
    #[case("bluetooth_scan", DiscoveryMethod::BluetoothScan)]
    #[case("internet", DiscoveryMethod::Internet)]
    fn test_discovery_method_parse(#[case] input: &str, #[case] expected: DiscoveryMethod) {
        assert_eq!(input.parse::<DiscoveryMethod>().unwrap(), expected);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(PaymentMethodType::CardPresent.as_str(), "card_present");
        assert_eq!(OfflineBehavior::PreferOnline.as_str(), "prefer_online");
        assert_eq!(OfflineBehavior::default(), OfflineBehavior::PreferOnline);
        assert_eq!(
            serde_json::to_string(&PaymentMethodType::CardPresent).unwrap(),
            "\"card_present\""
        );
    }

    #[test]
    fn test_location_permission() {
        assert!(LocationPermission::Granted.is_granted());
        assert!(!LocationPermission::Denied.is_granted());
        assert_eq!(LocationPermission::default(), LocationPermission::Unknown);
    }
}
