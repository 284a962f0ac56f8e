//! Error payload reported by the payment terminal SDK.
//!
//! Every SDK call settles with either a result or a structured error. The
//! error carries a machine-readable code and the SDK's human-readable
//! message; the workflow passes it through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result type alias for terminal SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Machine-readable classification of an SDK failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SdkErrorCode {
    /// `initialize` has not completed.
    NotInitialized,

    /// The reader cannot be reached over its transport.
    ReaderUnreachable,

    /// The reader already has a session with another client.
    AlreadyConnected,

    /// No reader is connected.
    NotConnected,

    /// The location id was rejected by the backend.
    InvalidLocation,

    /// The card or the charge was declined.
    Declined,

    /// The card holder or operator cancelled the interaction.
    Canceled,

    /// The operation did not complete in time.
    Timeout,

    /// The backend could not be reached and offline mode did not apply.
    Network,

    /// The request was malformed.
    InvalidRequest,

    /// Any other vendor code, kept verbatim.
    Other(String),
}

impl fmt::Display for SdkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "not_initialized"),
            Self::ReaderUnreachable => write!(f, "reader_unreachable"),
            Self::AlreadyConnected => write!(f, "already_connected"),
            Self::NotConnected => write!(f, "not_connected"),
            Self::InvalidLocation => write!(f, "invalid_location"),
            Self::Declined => write!(f, "declined"),
            Self::Canceled => write!(f, "canceled"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Structured error returned by the terminal SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct SdkError {
    /// Classification of the failure.
    pub code: SdkErrorCode,

    /// Human-readable message, shown to the operator as is.
    pub message: String,
}

impl SdkError {
    /// Create an error with an explicit code.
    pub fn new(code: SdkErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a new not-initialized error.
    pub fn not_initialized() -> Self {
        Self::new(
            SdkErrorCode::NotInitialized,
            "The terminal has not been initialized",
        )
    }

    /// Create a new reader-unreachable error.
    pub fn reader_unreachable(reader: impl fmt::Display) -> Self {
        Self::new(
            SdkErrorCode::ReaderUnreachable,
            format!("Reader {} is unreachable", reader),
        )
    }

    /// Create a new already-connected error.
    pub fn already_connected(reader: impl fmt::Display) -> Self {
        Self::new(
            SdkErrorCode::AlreadyConnected,
            format!("Reader {} is already connected to another session", reader),
        )
    }

    /// Create a new not-connected error.
    pub fn not_connected() -> Self {
        Self::new(SdkErrorCode::NotConnected, "No reader is connected")
    }

    /// Create a new declined error.
    pub fn declined(message: impl Into<String>) -> Self {
        Self::new(SdkErrorCode::Declined, message)
    }

    /// Create a new canceled error.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(SdkErrorCode::Canceled, message)
    }

    /// Create a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SdkErrorCode::Network, message)
    }

    /// Create a new invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SdkErrorCode::InvalidRequest, message)
    }

    /// Create an error with a vendor code that has no dedicated variant.
    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SdkErrorCode::Other(code.into()), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message_verbatim() {
        let error = SdkError::declined("Your card was declined.");
        assert_eq!(error.to_string(), "Your card was declined.");
        assert_eq!(error.code, SdkErrorCode::Declined);
    }

    #[test]
    fn test_reader_unreachable_error() {
        let error = SdkError::reader_unreachable("SIMULATOR-1");
        assert_eq!(error.code, SdkErrorCode::ReaderUnreachable);
        assert_eq!(error.to_string(), "Reader SIMULATOR-1 is unreachable");
    }

    #[test]
    fn test_other_keeps_vendor_code() {
        let error = SdkError::other("bluetooth_disabled", "Bluetooth is off");
        assert_eq!(error.code.to_string(), "bluetooth_disabled");
    }

    #[test]
    fn test_serialization() {
        let error = SdkError::already_connected("SIMULATOR-1");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "already_connected");

        let back: SdkError = serde_json::from_value(json).unwrap();
        assert_eq!(back, error);
    }
}
