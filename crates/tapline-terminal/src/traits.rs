//! Collaborator trait definitions.
//!
//! This module defines the interfaces between the payment workflow and the
//! outside world: the payment terminal SDK, the device location services and
//! the prompt surface the operator sees. Each trait is implemented by a mock
//! in [`crate::mock`] and, in an application, by the platform bindings.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use tapline_core::{LocationId, LocationPermission, PaymentIntent, Reader};

use crate::discovery::ReaderUpdates;
use crate::error::Result;
use crate::types::{CreateIntentParams, DiscoveryConfig, Prompt, PromptResponse};

/// Payment terminal SDK abstraction.
///
/// Every method settles with either a typed result or an
/// [`SdkError`](crate::SdkError). Results are validated by the caller; the
/// SDK is not trusted to return the intent or reader that was asked for.
///
/// # Object Safety
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters:
///
/// ```no_run
/// use tapline_core::{Amount, Currency, PaymentIntent};
/// use tapline_terminal::{CreateIntentParams, PaymentTerminal, Result};
///
/// async fn charge<T: PaymentTerminal>(terminal: &T) -> Result<PaymentIntent> {
///     let params = CreateIntentParams::card_present(Amount::new(1000).unwrap(), Currency::Usd);
///     let intent = terminal.create_payment_intent(params).await?;
///     let intent = terminal.collect_payment_method(&intent).await?;
///     terminal.confirm_payment_intent(&intent).await
/// }
/// ```
pub trait PaymentTerminal: Send + Sync {
    /// Initialize the SDK. Must complete before discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot fetch its connection token or
    /// the platform refuses to load it.
    async fn initialize(&self) -> Result<()>;

    /// Start looking for readers.
    ///
    /// Returns a lazy, unbounded stream of reader sets; every update
    /// replaces the previous one. The local radio stays active until the
    /// returned [`ReaderUpdates`] is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK is not initialized or the transport is
    /// unavailable.
    async fn discover_readers(&self, config: DiscoveryConfig) -> Result<ReaderUpdates>;

    /// Open a session with a local-mobile reader for `location_id`.
    ///
    /// Returns the reader in the `Connected` state.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reader is unreachable
    /// - The reader is already connected to another session
    /// - The location id is rejected
    async fn connect_local_mobile_reader(
        &self,
        reader: &Reader,
        location_id: &LocationId,
    ) -> Result<Reader>;

    /// End the current reader session.
    ///
    /// # Errors
    ///
    /// Returns an error if no reader is connected.
    async fn disconnect_reader(&self) -> Result<()>;

    /// Create a pending payment intent.
    ///
    /// # Errors
    ///
    /// Returns the backend's error verbatim (invalid request, network, ...).
    async fn create_payment_intent(&self, params: CreateIntentParams) -> Result<PaymentIntent>;

    /// Wait for a card and attach its payment method to `intent`.
    ///
    /// This blocks asynchronously for as long as the card holder takes to
    /// tap, insert or swipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the card is declined, the interaction is
    /// cancelled or the reader is lost.
    async fn collect_payment_method(&self, intent: &PaymentIntent) -> Result<PaymentIntent>;

    /// Capture a collected intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the capture.
    async fn confirm_payment_intent(&self, intent: &PaymentIntent) -> Result<PaymentIntent>;
}

/// Device location services.
///
/// The permission state is owned by the operating system; the workflow only
/// observes it and asks for it.
pub trait LocationServices: Send + Sync {
    /// Current permission state.
    async fn permission(&self) -> LocationPermission;

    /// Ask the operating system for permission and return the outcome.
    async fn request_permission(&self) -> LocationPermission;

    /// Open the app's page in the system settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings page cannot be opened.
    async fn open_settings(&self) -> Result<()>;

    /// Terminal location registered for the device's current position, if any.
    async fn resolve_location_id(&self) -> Option<LocationId>;
}

/// Operator-facing prompts.
pub trait PromptSurface: Send + Sync {
    /// Show a non-blocking notice.
    async fn notify(&self, prompt: Prompt);

    /// Show a blocking modal and wait for the operator to close it.
    async fn alert(&self, prompt: Prompt) -> PromptResponse;
}
