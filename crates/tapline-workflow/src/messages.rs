//! Operator-facing prompt texts.
//!
//! # Usage
//!
//! ```
//! use tapline_workflow::messages::PromptMessages;
//!
//! let prompt = PromptMessages::location_required();
//! assert_eq!(prompt.title, "Access to location");
//! assert_eq!(prompt.action.unwrap().label, "Activate");
//! ```

use tapline_terminal::{Prompt, PromptActionKind};

/// Titles and bodies of every prompt the workflow shows.
pub struct PromptMessages;

impl PromptMessages {
    pub const LOCATION_TITLE: &'static str = "Access to location";

    pub const LOCATION_MESSAGE: &'static str =
        "To use the app, you need to allow the use of your device location.";

    pub const LOCATION_ACTION: &'static str = "Activate";

    pub const READER_CONNECTED: &'static str = "Reader connected successfully";

    pub const INTENT_CREATED: &'static str = "Payment intent created successfully";

    pub const PAYMENT_COLLECTED: &'static str = "Payment successfully collected";

    pub const PAYMENT_CONFIRMED: &'static str = "Payment successfully confirmed!";

    pub const PAYMENT_CONFIRMED_MESSAGE: &'static str = "Congratulations";

    pub const DISCOVERY_ERROR: &'static str = "Error discovering readers";

    pub const CONNECT_ERROR: &'static str = "Error connecting reader";

    pub const INTENT_ERROR: &'static str = "Error creating payment intent";

    /// Shown as a blocking modal.
    pub const COLLECT_ERROR: &'static str = "Error collecting payment";

    pub const CONFIRM_ERROR: &'static str = "Error confirming payment";

    /// Modal asking the operator to enable location access.
    pub fn location_required() -> Prompt {
        Prompt::new(Self::LOCATION_TITLE)
            .with_message(Self::LOCATION_MESSAGE)
            .with_action(Self::LOCATION_ACTION, PromptActionKind::OpenSettings)
    }

    pub fn payment_confirmed() -> Prompt {
        Prompt::new(Self::PAYMENT_CONFIRMED).with_message(Self::PAYMENT_CONFIRMED_MESSAGE)
    }

    /// Failure notice carrying the terminal's message verbatim.
    pub fn failure(title: &str, reason: &str) -> Prompt {
        Prompt::new(title).with_message(reason)
    }
}
