//! Domain types for in-person card payment collection.
//!
//! Amounts, identifiers, payment intents and readers shared by the terminal
//! adapters and the workflow orchestrator.

pub mod constants;
pub mod error;
pub mod intent;
pub mod reader;
pub mod types;

pub use error::{Error, Result};
pub use intent::{IntentStatus, PaymentIntent};
pub use reader::{Reader, ReaderConnectionState};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
