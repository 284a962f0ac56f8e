//! Payment intent model and lifecycle.
//!
//! A payment intent is the backend record of one charge attempt. The
//! workflow owns exactly one intent at a time and only ever changes its
//! lifecycle status between stages.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──► Pending ──► MethodCollected ──► Confirmed
//!    │           │               │
//!    └───────────┴───────────────┴──────────► Failed(reason)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Amount, Currency, OfflineBehavior, PaymentIntentId, PaymentMethodType, Result, error::Error,
};

/// Lifecycle status of a payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntentStatus {
    /// Built locally, not yet known to the backend (no id).
    Created,

    /// Created by the backend, waiting for a card.
    Pending,

    /// A payment method is attached, waiting for confirmation.
    MethodCollected,

    /// Captured. Terminal success.
    Confirmed,

    /// Terminal failure with the backend's reason.
    Failed { reason: String },
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentStatus::Created => write!(f, "Created"),
            IntentStatus::Pending => write!(f, "Pending"),
            IntentStatus::MethodCollected => write!(f, "MethodCollected"),
            IntentStatus::Confirmed => write!(f, "Confirmed"),
            IntentStatus::Failed { .. } => write!(f, "Failed"),
        }
    }
}

impl IntentStatus {
    /// Check if the lifecycle allows moving to `target`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_core::IntentStatus;
    ///
    /// assert!(IntentStatus::Pending.can_transition_to(&IntentStatus::MethodCollected));
    /// assert!(!IntentStatus::Pending.can_transition_to(&IntentStatus::Confirmed));
    /// ```
    pub fn can_transition_to(&self, target: &IntentStatus) -> bool {
        matches!(
            (self, target),
            (IntentStatus::Created, IntentStatus::Pending)
                | (IntentStatus::Pending, IntentStatus::MethodCollected)
                | (IntentStatus::MethodCollected, IntentStatus::Confirmed)
                | (
                    IntentStatus::Created
                        | IntentStatus::Pending
                        | IntentStatus::MethodCollected,
                    IntentStatus::Failed { .. }
                )
        )
    }

    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Confirmed | IntentStatus::Failed { .. })
    }
}

/// A charge request tracked by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Backend identifier, absent while `Created`.
    pub id: Option<PaymentIntentId>,

    /// Amount in minor units.
    pub amount: Amount,

    pub currency: Currency,

    /// Allowed payment methods (always card present for this workflow).
    pub payment_method_types: Vec<PaymentMethodType>,

    pub offline_behavior: OfflineBehavior,

    /// Current lifecycle status.
    #[serde(flatten)]
    pub status: IntentStatus,

    /// Payment method attached during collection.
    pub payment_method_id: Option<String>,

    /// When the backend created the intent.
    pub created_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
    /// Build a new, not yet created, card-present intent.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_core::{Amount, Currency, IntentStatus, PaymentIntent};
    ///
    /// let intent = PaymentIntent::card_present(Amount::new(1000).unwrap(), Currency::Usd);
    /// assert_eq!(intent.status, IntentStatus::Created);
    /// assert!(intent.id.is_none());
    /// ```
    pub fn card_present(amount: Amount, currency: Currency) -> Self {
        Self {
            id: None,
            amount,
            currency,
            payment_method_types: vec![PaymentMethodType::CardPresent],
            offline_behavior: OfflineBehavior::PreferOnline,
            status: IntentStatus::Created,
            payment_method_id: None,
            created_at: None,
        }
    }

    /// Mark the intent as created by the backend.
    ///
    /// # Errors
    /// Returns `Error::InvalidIntentTransition` unless the intent is `Created`.
    pub fn mark_pending(&mut self, id: PaymentIntentId, created_at: DateTime<Utc>) -> Result<()> {
        self.advance(IntentStatus::Pending)?;
        self.id = Some(id);
        self.created_at = Some(created_at);
        Ok(())
    }

    /// Attach the collected payment method.
    ///
    /// # Errors
    /// Returns `Error::InvalidIntentTransition` unless the intent is `Pending`.
    pub fn mark_method_collected(&mut self, payment_method_id: impl Into<String>) -> Result<()> {
        self.advance(IntentStatus::MethodCollected)?;
        self.payment_method_id = Some(payment_method_id.into());
        Ok(())
    }

    /// Mark the intent as captured.
    ///
    /// # Errors
    /// Returns `Error::InvalidIntentTransition` unless the intent is `MethodCollected`.
    pub fn mark_confirmed(&mut self) -> Result<()> {
        self.advance(IntentStatus::Confirmed)
    }

    /// Mark the intent as failed for good.
    ///
    /// # Errors
    /// Returns `Error::InvalidIntentTransition` if the intent is already terminal.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.advance(IntentStatus::Failed {
            reason: reason.into(),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == IntentStatus::Pending
    }

    pub fn is_method_collected(&self) -> bool {
        self.status == IntentStatus::MethodCollected
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == IntentStatus::Confirmed
    }

    fn advance(&mut self, target: IntentStatus) -> Result<()> {
        if !self.status.can_transition_to(&target) {
            return Err(Error::InvalidIntentTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> PaymentIntent {
        PaymentIntent::card_present(Amount::new(1000).unwrap(), Currency::Usd)
    }

    #[test]
    fn test_card_present_defaults() {
        let intent = intent();
        assert_eq!(
            intent.payment_method_types,
            vec![PaymentMethodType::CardPresent]
        );
        assert_eq!(intent.offline_behavior, OfflineBehavior::PreferOnline);
        assert_eq!(intent.currency, Currency::Usd);
        assert!(intent.created_at.is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut intent = intent();
        intent
            .mark_pending(PaymentIntentId::new("pi_123").unwrap(), Utc::now())
            .unwrap();
        assert!(intent.is_pending());
        assert_eq!(intent.id.as_ref().unwrap().as_str(), "pi_123");

        intent.mark_method_collected("pm_card_visa").unwrap();
        assert!(intent.is_method_collected());
        assert_eq!(intent.payment_method_id.as_deref(), Some("pm_card_visa"));

        intent.mark_confirmed().unwrap();
        assert!(intent.is_confirmed());
        assert!(intent.status.is_terminal());
    }

    #[test]
    fn test_cannot_skip_collection() {
        let mut intent = intent();
        intent
            .mark_pending(PaymentIntentId::new("pi_123").unwrap(), Utc::now())
            .unwrap();

        let result = intent.mark_confirmed();
        assert!(matches!(
            result,
            Err(Error::InvalidIntentTransition { ref from, ref to })
                if from == "Pending" && to == "Confirmed"
        ));
        assert!(intent.is_pending());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut intent = intent();
        intent.mark_failed("card_declined").unwrap();
        assert!(intent.status.is_terminal());
        assert!(intent.mark_failed("again").is_err());
        assert!(
            intent
                .mark_pending(PaymentIntentId::new("pi_1").unwrap(), Utc::now())
                .is_err()
        );
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let mut intent = intent();
        intent
            .mark_pending(PaymentIntentId::new("pi_123").unwrap(), Utc::now())
            .unwrap();

        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["amount"], 1000);
        assert_eq!(json["currency"], "usd");
        assert_eq!(json["payment_method_types"][0], "card_present");
        assert_eq!(json["offline_behavior"], "prefer_online");

        let back: PaymentIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }
}
