//! Workflow error taxonomy.
//!
//! SDK failures are wrapped per stage and never reclassified: the payload
//! is the terminal's [`SdkError`] as received. Everything else is a local
//! refusal that happens before the SDK is called.

use tapline_core::ReaderId;
use tapline_terminal::SdkError;
use thiserror::Error;

use crate::state_machine::{Stage, WorkflowState};

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    // Stage failures reported by the terminal SDK
    #[error("Terminal initialization failed: {0}")]
    Initialization(#[source] SdkError),

    #[error("Reader discovery failed: {0}")]
    Discovery(#[source] SdkError),

    #[error("Reader connection failed: {0}")]
    Connection(#[source] SdkError),

    #[error("Payment intent creation failed: {0}")]
    Intent(#[source] SdkError),

    #[error("Payment collection failed: {0}")]
    Collect(#[source] SdkError),

    #[error("Payment confirmation failed: {0}")]
    Confirm(#[source] SdkError),

    #[error("Reader disconnection failed: {0}")]
    Disconnect(#[source] SdkError),

    // Local refusals
    #[error(transparent)]
    Domain(#[from] tapline_core::Error),

    #[error("Another operation is in progress: {0}")]
    OperationInProgress(Stage),

    #[error("{operation} requires {expected}, but the workflow is {actual}")]
    Precondition {
        operation: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("Terminal has not been initialized")]
    NotInitialized,

    #[error("Location permission has not been granted")]
    LocationPermissionDenied,

    #[error("No terminal location is configured or resolvable")]
    MissingLocation,

    #[error("No reader has been discovered")]
    NoReaderDiscovered,

    #[error("Reader {held} already holds the only live connection")]
    ReaderConnectionHeld { held: ReaderId },

    #[error("Unexpected terminal response: {0}")]
    UnexpectedResponse(String),
}

impl WorkflowError {
    /// Build a precondition failure against the current state.
    pub fn precondition(
        operation: &'static str,
        expected: &'static str,
        actual: &WorkflowState,
    ) -> Self {
        Self::Precondition {
            operation,
            expected,
            actual: actual.to_string(),
        }
    }

    /// The SDK payload, if this error came from the terminal.
    pub fn sdk_error(&self) -> Option<&SdkError> {
        match self {
            Self::Initialization(e)
            | Self::Discovery(e)
            | Self::Connection(e)
            | Self::Intent(e)
            | Self::Collect(e)
            | Self::Confirm(e)
            | Self::Disconnect(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_keep_sdk_message() {
        let sdk = SdkError::declined("Your card was declined.");
        let error = WorkflowError::Collect(sdk.clone());

        assert!(matches!(error, WorkflowError::Collect(_)));
        assert_eq!(error.sdk_error(), Some(&sdk));
        assert_eq!(
            error.to_string(),
            "Payment collection failed: Your card was declined."
        );
    }

    #[test]
    fn test_precondition_message() {
        let error = WorkflowError::precondition(
            "collect_payment",
            "a pending payment intent",
            &WorkflowState::ReaderConnected,
        );
        assert_eq!(
            error.to_string(),
            "collect_payment requires a pending payment intent, but the workflow is ReaderConnected"
        );
        assert!(error.sdk_error().is_none());
    }

    #[test]
    fn test_domain_error_is_transparent() {
        let error: WorkflowError = tapline_core::Error::NonPositiveAmount(0).into();
        assert_eq!(
            error.to_string(),
            "Amount must be a positive number of minor units, got 0"
        );
    }
}
