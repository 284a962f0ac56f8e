//! Mock payment terminal for testing and development.
//!
//! This module provides a simulated terminal SDK that can be scripted
//! programmatically: readers can be reported to an active discovery, any
//! stage can be told to fail once, and collection can be made to wait for a
//! simulated card tap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tapline_core::constants::PAYMENT_INTENT_ID_PREFIX;
use tapline_core::{
    Amount, LocationId, PaymentIntent, PaymentIntentId, Reader, ReaderConnectionState, ReaderId,
};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::discovery::{DiscoveryFeed, ReaderUpdates};
use crate::error::{Result, SdkError};
use crate::traits::PaymentTerminal;
use crate::types::{CreateIntentParams, DiscoveryConfig};

/// Capacity of the discovery channel handed out by the mock.
const DISCOVERY_CHANNEL_CAPACITY: usize = 16;

/// A call received by the mock terminal, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCall {
    Initialize,
    DiscoverReaders(DiscoveryConfig),
    ConnectReader {
        reader_id: ReaderId,
        location_id: LocationId,
    },
    DisconnectReader,
    CreatePaymentIntent {
        amount: Amount,
    },
    CollectPaymentMethod {
        intent_id: Option<PaymentIntentId>,
    },
    ConfirmPaymentIntent {
        intent_id: Option<PaymentIntentId>,
    },
}

#[derive(Debug, Default)]
struct TerminalState {
    initialized: bool,
    discovery: Option<DiscoveryFeed>,
    simulated_readers: Vec<Reader>,
    connected: Option<ReaderId>,
    unreachable: HashSet<ReaderId>,
    connect_failures: VecDeque<SdkError>,
    intent_failures: VecDeque<SdkError>,
    collect_failures: VecDeque<SdkError>,
    confirm_failures: VecDeque<SdkError>,
    disconnect_failures: VecDeque<SdkError>,
    require_card_tap: bool,
    intents: HashMap<PaymentIntentId, PaymentIntent>,
    calls: Vec<TerminalCall>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<TerminalState>,
    card_tap: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock payment terminal for testing and development.
///
/// # Examples
///
/// ```
/// use tapline_core::{Amount, Currency, DiscoveryMethod, LocationId, Reader, ReaderId};
/// use tapline_terminal::mock::MockTerminal;
/// use tapline_terminal::{CreateIntentParams, PaymentTerminal};
///
/// #[tokio::main]
/// async fn main() -> tapline_terminal::Result<()> {
///     let (terminal, _handle) = MockTerminal::new();
///     terminal.initialize().await?;
///
///     let reader = Reader::discovered(ReaderId::new("SIM-1").unwrap(), DiscoveryMethod::LocalMobile);
///     let location = LocationId::new("tml_123").unwrap();
///     terminal.connect_local_mobile_reader(&reader, &location).await?;
///
///     let params = CreateIntentParams::card_present(Amount::new(1000).unwrap(), Currency::Usd);
///     let intent = terminal.create_payment_intent(params).await?;
///     let intent = terminal.collect_payment_method(&intent).await?;
///     let intent = terminal.confirm_payment_intent(&intent).await?;
///     assert!(intent.is_confirmed());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTerminal {
    shared: Arc<Shared>,
}

impl MockTerminal {
    /// Create a new mock terminal.
    ///
    /// Returns a tuple of (MockTerminal, MockTerminalHandle) where the handle
    /// scripts outcomes and inspects the calls received.
    pub fn new() -> (Self, MockTerminalHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            MockTerminalHandle { shared },
        )
    }

    /// Create a mock terminal whose simulated discovery reports `readers`
    /// as soon as it starts.
    pub fn with_simulated_readers(readers: Vec<Reader>) -> (Self, MockTerminalHandle) {
        let (terminal, handle) = Self::new();
        handle.shared.lock().simulated_readers = readers;
        (terminal, handle)
    }
}

impl Default for MockTerminal {
    fn default() -> Self {
        Self::new().0
    }
}

fn new_intent_id() -> Result<PaymentIntentId> {
    let raw = format!("{}{}", PAYMENT_INTENT_ID_PREFIX, Uuid::new_v4().simple());
    PaymentIntentId::new(raw).map_err(|e| SdkError::other("internal", e.to_string()))
}

fn stored_intent<'a>(
    state: &'a mut TerminalState,
    intent: &PaymentIntent,
) -> Result<&'a mut PaymentIntent> {
    let id = intent
        .id
        .as_ref()
        .ok_or_else(|| SdkError::invalid_request("Payment intent has no id"))?;
    state
        .intents
        .get_mut(id)
        .ok_or_else(|| SdkError::invalid_request(format!("No such payment intent: {}", id)))
}

impl PaymentTerminal for MockTerminal {
    async fn initialize(&self) -> Result<()> {
        let mut state = self.shared.lock();
        state.calls.push(TerminalCall::Initialize);
        state.initialized = true;
        Ok(())
    }

    async fn discover_readers(&self, config: DiscoveryConfig) -> Result<ReaderUpdates> {
        let (feed, updates) = ReaderUpdates::channel(DISCOVERY_CHANNEL_CAPACITY);
        let simulated = {
            let mut state = self.shared.lock();
            state.calls.push(TerminalCall::DiscoverReaders(config));
            if !state.initialized {
                return Err(SdkError::not_initialized());
            }
            // A new discovery supersedes the previous one.
            state.discovery = Some(feed.clone());
            if config.simulated {
                state.simulated_readers.clone()
            } else {
                Vec::new()
            }
        };

        if !simulated.is_empty() {
            debug!(count = simulated.len(), "Reporting simulated readers");
            feed.report(simulated).await?;
        }

        Ok(updates)
    }

    async fn connect_local_mobile_reader(
        &self,
        reader: &Reader,
        location_id: &LocationId,
    ) -> Result<Reader> {
        let mut state = self.shared.lock();
        state.calls.push(TerminalCall::ConnectReader {
            reader_id: reader.id.clone(),
            location_id: location_id.clone(),
        });

        if !state.initialized {
            return Err(SdkError::not_initialized());
        }
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        if state.unreachable.contains(&reader.id) {
            return Err(SdkError::reader_unreachable(&reader.id));
        }
        if state.connected.is_some() {
            return Err(SdkError::already_connected(&reader.id));
        }

        let mut connected = reader.clone();
        connected.connection_state = ReaderConnectionState::Connected;
        connected.location = Some(location_id.clone());
        state.connected = Some(reader.id.clone());
        Ok(connected)
    }

    async fn disconnect_reader(&self) -> Result<()> {
        let mut state = self.shared.lock();
        state.calls.push(TerminalCall::DisconnectReader);
        if let Some(error) = state.disconnect_failures.pop_front() {
            return Err(error);
        }
        state
            .connected
            .take()
            .map(|_| ())
            .ok_or_else(SdkError::not_connected)
    }

    async fn create_payment_intent(&self, params: CreateIntentParams) -> Result<PaymentIntent> {
        let mut state = self.shared.lock();
        state.calls.push(TerminalCall::CreatePaymentIntent {
            amount: params.amount,
        });

        if let Some(error) = state.intent_failures.pop_front() {
            return Err(error);
        }
        if state.connected.is_none() {
            return Err(SdkError::not_connected());
        }

        let mut intent = PaymentIntent::card_present(params.amount, params.currency);
        intent.payment_method_types = params.payment_method_types;
        intent.offline_behavior = params.offline_behavior;
        let id = new_intent_id()?;
        intent
            .mark_pending(id.clone(), Utc::now())
            .map_err(|e| SdkError::other("internal", e.to_string()))?;

        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn collect_payment_method(&self, intent: &PaymentIntent) -> Result<PaymentIntent> {
        let require_tap = {
            let mut state = self.shared.lock();
            state.calls.push(TerminalCall::CollectPaymentMethod {
                intent_id: intent.id.clone(),
            });

            if state.connected.is_none() {
                return Err(SdkError::not_connected());
            }
            if let Some(error) = state.collect_failures.pop_front() {
                return Err(error);
            }
            if !stored_intent(&mut state, intent)?.is_pending() {
                return Err(SdkError::invalid_request(
                    "Payment intent is not awaiting a payment method",
                ));
            }
            state.require_card_tap
        };

        if require_tap {
            debug!("Waiting for card tap");
            self.shared.card_tap.notified().await;
        }

        let mut state = self.shared.lock();
        let stored = stored_intent(&mut state, intent)?;
        let payment_method_id = format!("pm_{}", Uuid::new_v4().simple());
        stored
            .mark_method_collected(payment_method_id)
            .map_err(|e| SdkError::invalid_request(e.to_string()))?;
        Ok(stored.clone())
    }

    async fn confirm_payment_intent(&self, intent: &PaymentIntent) -> Result<PaymentIntent> {
        let mut state = self.shared.lock();
        state.calls.push(TerminalCall::ConfirmPaymentIntent {
            intent_id: intent.id.clone(),
        });

        if let Some(error) = state.confirm_failures.pop_front() {
            return Err(error);
        }

        let stored = stored_intent(&mut state, intent)?;
        stored
            .mark_confirmed()
            .map_err(|e| SdkError::invalid_request(e.to_string()))?;
        Ok(stored.clone())
    }
}

/// Handle for controlling a mock terminal.
///
/// # Examples
///
/// ```
/// use tapline_terminal::SdkError;
/// use tapline_terminal::mock::MockTerminal;
///
/// let (_terminal, handle) = MockTerminal::new();
/// handle.fail_next_collect(SdkError::declined("Your card was declined."));
/// assert!(handle.calls().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MockTerminalHandle {
    shared: Arc<Shared>,
}

impl MockTerminalHandle {
    /// Report a reader set to the active discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if no discovery is active or it has been cancelled.
    pub async fn report_readers(&self, readers: Vec<Reader>) -> Result<()> {
        let feed = self
            .discovery_feed()
            .ok_or_else(|| SdkError::canceled("Reader discovery is not active"))?;
        feed.report(readers).await
    }

    /// The feed of the most recent discovery, if one was started.
    ///
    /// Holding on to a feed across a new discovery simulates stale updates.
    pub fn discovery_feed(&self) -> Option<DiscoveryFeed> {
        self.shared.lock().discovery.clone()
    }

    /// Readers reported immediately by simulated discoveries.
    pub fn set_simulated_readers(&self, readers: Vec<Reader>) {
        self.shared.lock().simulated_readers = readers;
    }

    /// Make connects to `reader_id` fail as unreachable.
    pub fn set_reader_unreachable(&self, reader_id: ReaderId, unreachable: bool) {
        let mut state = self.shared.lock();
        if unreachable {
            state.unreachable.insert(reader_id);
        } else {
            state.unreachable.remove(&reader_id);
        }
    }

    /// Fail the next connect with `error`.
    pub fn fail_next_connect(&self, error: SdkError) {
        self.shared.lock().connect_failures.push_back(error);
    }

    /// Fail the next intent creation with `error`.
    pub fn fail_next_intent(&self, error: SdkError) {
        self.shared.lock().intent_failures.push_back(error);
    }

    /// Fail the next collection with `error`.
    pub fn fail_next_collect(&self, error: SdkError) {
        self.shared.lock().collect_failures.push_back(error);
    }

    /// Fail the next confirmation with `error`.
    pub fn fail_next_confirm(&self, error: SdkError) {
        self.shared.lock().confirm_failures.push_back(error);
    }

    /// Fail the next disconnection with `error`. The session stays open.
    pub fn fail_next_disconnect(&self, error: SdkError) {
        self.shared.lock().disconnect_failures.push_back(error);
    }

    /// Make collection wait for [`tap_card`](Self::tap_card).
    pub fn require_card_tap(&self, required: bool) {
        self.shared.lock().require_card_tap = required;
    }

    /// Present a card to a waiting (or the next) collection.
    pub fn tap_card(&self) {
        self.shared.card_tap.notify_one();
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.shared.lock().initialized
    }

    /// Reader currently holding a session.
    pub fn connected_reader(&self) -> Option<ReaderId> {
        self.shared.lock().connected.clone()
    }

    /// Backend record of an intent.
    pub fn intent(&self, id: &PaymentIntentId) -> Option<PaymentIntent> {
        self.shared.lock().intents.get(id).cloned()
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<TerminalCall> {
        self.shared.lock().calls.clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&TerminalCall) -> bool) -> usize {
        self.shared.lock().calls.iter().filter(|c| predicate(c)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tapline_core::{Currency, DiscoveryMethod};

    fn reader(id: &str) -> Reader {
        Reader::discovered(ReaderId::new(id).unwrap(), DiscoveryMethod::LocalMobile)
    }

    fn location() -> LocationId {
        LocationId::new("tml_FrcFgksbiIZZ2V").unwrap()
    }

    async fn connected_terminal() -> (MockTerminal, MockTerminalHandle) {
        let (terminal, handle) = MockTerminal::new();
        terminal.initialize().await.unwrap();
        terminal
            .connect_local_mobile_reader(&reader("SIM-1"), &location())
            .await
            .unwrap();
        (terminal, handle)
    }

    fn params() -> CreateIntentParams {
        CreateIntentParams::card_present(Amount::new(1000).unwrap(), Currency::Usd)
    }

    #[tokio::test]
    async fn test_discovery_requires_initialize() {
        let (terminal, _handle) = MockTerminal::new();
        let config = DiscoveryConfig::new(DiscoveryMethod::LocalMobile, true);
        let result = terminal.discover_readers(config).await;
        assert_eq!(result.unwrap_err(), SdkError::not_initialized());
    }

    #[tokio::test]
    async fn test_simulated_discovery_reports_readers() {
        let (terminal, _handle) = MockTerminal::with_simulated_readers(vec![reader("SIM-1")]);
        terminal.initialize().await.unwrap();

        let config = DiscoveryConfig::new(DiscoveryMethod::LocalMobile, true);
        let mut updates = terminal.discover_readers(config).await.unwrap();
        let readers = updates.next().await.unwrap();
        assert_eq!(readers[0].id.as_str(), "SIM-1");
    }

    #[tokio::test]
    async fn test_report_readers_to_active_discovery() {
        let (terminal, handle) = MockTerminal::new();
        assert!(handle.report_readers(vec![reader("A")]).await.is_err());

        terminal.initialize().await.unwrap();
        let config = DiscoveryConfig::new(DiscoveryMethod::BluetoothScan, false);
        let mut updates = terminal.discover_readers(config).await.unwrap();

        handle.report_readers(vec![reader("A")]).await.unwrap();
        assert_eq!(updates.next().await.unwrap()[0].id.as_str(), "A");
    }

    #[tokio::test]
    async fn test_connect_sets_location() {
        let (terminal, handle) = MockTerminal::new();
        terminal.initialize().await.unwrap();

        let connected = terminal
            .connect_local_mobile_reader(&reader("SIM-1"), &location())
            .await
            .unwrap();
        assert!(connected.is_connected());
        assert_eq!(connected.location, Some(location()));
        assert_eq!(handle.connected_reader().unwrap().as_str(), "SIM-1");
    }

    #[tokio::test]
    async fn test_connect_twice_is_already_connected() {
        let (terminal, _handle) = connected_terminal().await;
        let result = terminal
            .connect_local_mobile_reader(&reader("SIM-2"), &location())
            .await;
        assert_eq!(
            result.unwrap_err().code,
            crate::SdkErrorCode::AlreadyConnected
        );
    }

    #[tokio::test]
    async fn test_unreachable_reader() {
        let (terminal, handle) = MockTerminal::new();
        terminal.initialize().await.unwrap();
        handle.set_reader_unreachable(ReaderId::new("SIM-1").unwrap(), true);

        let result = terminal
            .connect_local_mobile_reader(&reader("SIM-1"), &location())
            .await;
        assert_eq!(
            result.unwrap_err().code,
            crate::SdkErrorCode::ReaderUnreachable
        );
        assert!(handle.connected_reader().is_none());
    }

    #[tokio::test]
    async fn test_full_payment_cycle() {
        let (terminal, handle) = connected_terminal().await;

        let intent = terminal.create_payment_intent(params()).await.unwrap();
        assert!(intent.is_pending());
        let id = intent.id.clone().unwrap();
        assert!(id.as_str().starts_with("pi_"));

        let collected = terminal.collect_payment_method(&intent).await.unwrap();
        assert!(collected.is_method_collected());
        assert!(collected.payment_method_id.is_some());

        let confirmed = terminal.confirm_payment_intent(&collected).await.unwrap();
        assert!(confirmed.is_confirmed());
        assert!(handle.intent(&id).unwrap().is_confirmed());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let (terminal, handle) = connected_terminal().await;
        handle.fail_next_intent(SdkError::network("Offline"));

        assert!(terminal.create_payment_intent(params()).await.is_err());
        assert!(terminal.create_payment_intent(params()).await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_requires_collection() {
        let (terminal, _handle) = connected_terminal().await;
        let intent = terminal.create_payment_intent(params()).await.unwrap();

        let result = terminal.confirm_payment_intent(&intent).await;
        assert_eq!(
            result.unwrap_err().code,
            crate::SdkErrorCode::InvalidRequest
        );
    }

    #[tokio::test]
    async fn test_collect_waits_for_card_tap() {
        let (terminal, handle) = connected_terminal().await;
        let intent = terminal.create_payment_intent(params()).await.unwrap();
        handle.require_card_tap(true);

        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            terminal.collect_payment_method(&intent),
        )
        .await;
        assert!(pending.is_err(), "collection should wait for a card");

        handle.tap_card();
        let collected = terminal.collect_payment_method(&intent).await.unwrap();
        assert!(collected.is_method_collected());
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let (terminal, handle) = connected_terminal().await;
        terminal.disconnect_reader().await.unwrap();
        assert!(terminal.disconnect_reader().await.is_err());

        let calls = handle.calls();
        assert_eq!(calls[0], TerminalCall::Initialize);
        assert!(matches!(calls[1], TerminalCall::ConnectReader { .. }));
        assert_eq!(
            handle.count_calls(|c| matches!(c, TerminalCall::DisconnectReader)),
            2
        );
    }
}
