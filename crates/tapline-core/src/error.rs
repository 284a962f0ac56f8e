use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Amount errors
    #[error("Amount must be a positive number of minor units, got {0}")]
    NonPositiveAmount(i64),

    #[error("Amount {amount} exceeds the maximum of {max} minor units")]
    AmountTooLarge { amount: String, max: i64 },

    #[error("Invalid amount input: {0}")]
    InvalidAmountInput(String),

    // Identifier errors
    #[error("Invalid reader identifier: {0}")]
    InvalidReaderId(String),

    #[error("Invalid location identifier: {0}")]
    InvalidLocationId(String),

    #[error("Invalid payment intent identifier: {0}")]
    InvalidPaymentIntentId(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Unknown discovery method: {0}")]
    UnknownDiscoveryMethod(String),

    // Lifecycle errors
    #[error("Invalid payment intent transition from {from} to {to}")]
    InvalidIntentTransition { from: String, to: String },

    #[error("Invalid reader transition from {from} to {to}")]
    InvalidReaderTransition { from: String, to: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, Error>;
