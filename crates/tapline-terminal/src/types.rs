//! Request and prompt types shared by the collaborator traits.

use serde::{Deserialize, Serialize};
use tapline_core::{
    Amount, Currency, DiscoveryMethod, OfflineBehavior, PaymentIntent, PaymentMethodType,
};

/// Parameters for `discover_readers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Transport used to look for readers.
    pub discovery_method: DiscoveryMethod,

    /// Report simulated readers instead of real hardware.
    pub simulated: bool,
}

impl DiscoveryConfig {
    pub fn new(discovery_method: DiscoveryMethod, simulated: bool) -> Self {
        Self {
            discovery_method,
            simulated,
        }
    }
}

/// Parameters for `create_payment_intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIntentParams {
    pub amount: Amount,
    pub currency: Currency,
    pub payment_method_types: Vec<PaymentMethodType>,
    pub offline_behavior: OfflineBehavior,
}

impl CreateIntentParams {
    /// Card-present, prefer-online parameters for `amount`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_core::{Amount, Currency, OfflineBehavior, PaymentMethodType};
    /// use tapline_terminal::CreateIntentParams;
    ///
    /// let params = CreateIntentParams::card_present(Amount::new(1000).unwrap(), Currency::Usd);
    /// assert_eq!(params.payment_method_types, vec![PaymentMethodType::CardPresent]);
    /// assert_eq!(params.offline_behavior, OfflineBehavior::PreferOnline);
    /// ```
    pub fn card_present(amount: Amount, currency: Currency) -> Self {
        let template = PaymentIntent::card_present(amount, currency);
        Self {
            amount,
            currency,
            payment_method_types: template.payment_method_types,
            offline_behavior: template.offline_behavior,
        }
    }

    /// Override the offline behavior.
    pub fn with_offline_behavior(mut self, offline_behavior: OfflineBehavior) -> Self {
        self.offline_behavior = offline_behavior;
        self
    }
}

/// What the single action of a prompt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptActionKind {
    /// Open the system settings page of the app.
    OpenSettings,

    /// Re-run the operation that failed.
    Retry,
}

/// The one action a prompt may offer besides dismissing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAction {
    /// Button label.
    pub label: String,
    pub kind: PromptActionKind,
}

/// A message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub title: String,
    pub message: Option<String>,
    pub action: Option<PromptAction>,
}

impl Prompt {
    /// Create a prompt with a title only.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            action: None,
        }
    }

    /// Set the body text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Offer a single action.
    pub fn with_action(mut self, label: impl Into<String>, kind: PromptActionKind) -> Self {
        self.action = Some(PromptAction {
            label: label.into(),
            kind,
        });
        self
    }
}

/// How the operator closed a blocking prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptResponse {
    /// Closed without choosing the action.
    #[default]
    Dismissed,

    /// Chose the prompt's action.
    ActionSelected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("Access to location")
            .with_message("Allow location")
            .with_action("Activate", PromptActionKind::OpenSettings);

        assert_eq!(prompt.title, "Access to location");
        assert_eq!(prompt.message.as_deref(), Some("Allow location"));
        let action = prompt.action.unwrap();
        assert_eq!(action.label, "Activate");
        assert_eq!(action.kind, PromptActionKind::OpenSettings);
    }

    #[test]
    fn test_discovery_config_serialization() {
        let config = DiscoveryConfig::new(DiscoveryMethod::LocalMobile, true);
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["discovery_method"], "local_mobile");
        assert_eq!(json["simulated"], true);
    }

    #[test]
    fn test_prompt_response_default() {
        assert_eq!(PromptResponse::default(), PromptResponse::Dismissed);
    }
}
