//! Payment collection orchestrator.
//!
//! [`PaymentWorkflow`] sequences the terminal stages, owns the current
//! reader and payment intent, and keeps the state machine, busy flags and
//! observed location permission consistent with what the terminal reports.
//!
//! # Concurrency
//!
//! All operations take `&self` so a UI can share one workflow between
//! event handlers. The workflow state sits behind a short-lived mutex that
//! is never held across an `.await`. A stage sets its busy flag and enters
//! its in-flight state atomically, and any operation started while a flag
//! is set fails with [`WorkflowError::OperationInProgress`].
//!
//! Dropping a stage future mid-flight (for example through
//! `tokio::time::timeout`) clears its flag and moves the workflow to
//! `Failed(stage, "operation was cancelled")`.
//!
//! # Examples
//!
//! ```
//! use tapline_core::{DiscoveryMethod, LocationId, Reader, ReaderId};
//! use tapline_terminal::mock::{MockLocation, MockPrompt, MockTerminal};
//! use tapline_workflow::{PaymentWorkflow, WorkflowConfig, WorkflowState};
//!
//! #[tokio::main]
//! async fn main() -> tapline_workflow::Result<()> {
//!     let reader = Reader::discovered(ReaderId::new("SIM-1").unwrap(), DiscoveryMethod::LocalMobile);
//!     let (terminal, _) = MockTerminal::with_simulated_readers(vec![reader]);
//!     let (location, _) = MockLocation::granted();
//!     let (prompt, _) = MockPrompt::new();
//!     let config = WorkflowConfig::simulated().location_id(LocationId::new("tml_123").unwrap());
//!
//!     let workflow = PaymentWorkflow::new(terminal, location, prompt, config);
//!     workflow.initialize().await?;
//!     workflow.start_discovery().await?;
//!     workflow.wait_for_reader().await?;
//!     workflow.connect_reader().await?;
//!     workflow.create_intent_from_input("10.00").await?;
//!     let intent = workflow.collect_payment().await?;
//!
//!     assert!(intent.is_confirmed());
//!     assert_eq!(workflow.state(), WorkflowState::Confirmed);
//!     Ok(())
//! }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tapline_core::{
    Amount, LocationId, LocationPermission, PaymentIntent, PaymentIntentId, Reader,
    ReaderConnectionState,
};
use tapline_terminal::{
    CreateIntentParams, DiscoverySubscription, LocationServices, PaymentTerminal, Prompt,
    PromptResponse, PromptSurface,
};
use tracing::{debug, error, info, warn};

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::flags::StageFlags;
use crate::messages::PromptMessages;
use crate::registry::{ReaderLease, ReaderRegistry};
use crate::state_machine::{Stage, StateMachine, StateTransition, WorkflowState};

/// Failure reason recorded when a stage future is dropped before settling.
pub const CANCELLED_REASON: &str = "operation was cancelled";

#[derive(Debug, Default)]
struct Inner {
    machine: StateMachine,
    flags: StageFlags,
    initialized: bool,
    discovery: Option<DiscoverySubscription>,
    /// Bumped whenever discovery is started, stopped or superseded.
    discovery_generation: u64,
    /// Reader being connected or connected, or the last one that failed to connect.
    reader: Option<Reader>,
    lease: Option<ReaderLease>,
    intent: Option<PaymentIntent>,
    location_permission: LocationPermission,
}

impl Inner {
    fn ensure_idle_flags(&self) -> Result<()> {
        match self.flags.active() {
            Some(stage) => Err(WorkflowError::OperationInProgress(stage)),
            None => Ok(()),
        }
    }

    fn precondition(&self, operation: &'static str, expected: &'static str) -> WorkflowError {
        WorkflowError::precondition(operation, expected, self.machine.current_state())
    }

    /// The reader a connect attempt would use.
    fn connect_candidate(&self) -> Option<Reader> {
        self.discovery
            .as_ref()
            .and_then(DiscoverySubscription::candidate)
            .or_else(|| self.reader.clone())
            .filter(Reader::is_discovered)
    }

    fn cancel_discovery(&mut self) {
        self.discovery_generation += 1;
        if let Some(subscription) = self.discovery.take() {
            subscription.cancel();
            debug!("Reader discovery stopped");
        }
    }

    fn transition(&mut self, state: WorkflowState) -> Result<()> {
        let transition = self.machine.transition_to(state)?;
        debug!(from = %transition.from, to = %transition.to, "Workflow transition");
        Ok(())
    }
}

/// Clears a stage's busy flag when the stage ends, however it ends.
struct StageGuard<'a> {
    inner: &'a Mutex<Inner>,
    stage: Stage,
    settled: bool,
}

impl StageGuard<'_> {
    /// Clear the flag inside an already held lock.
    fn settle(mut self, inner: &mut Inner) {
        inner.flags.set(self.stage, false);
        self.settled = true;
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut inner = lock(self.inner);
        inner.flags.set(self.stage, false);
        warn!(stage = %self.stage, "Stage cancelled before completion");

        if self.stage == Stage::Connect
            && let Some(reader) = inner.reader.as_mut()
            && reader.connection_state == ReaderConnectionState::Connecting
            && let Err(e) = reader.transition_to(ReaderConnectionState::Discovered)
        {
            warn!("Failed to restore reader after cancelled connect: {}", e);
        }

        if inner.machine.current_state().in_flight_stage() == Some(self.stage)
            && let Err(e) = inner.transition(WorkflowState::failed(self.stage, CANCELLED_REASON))
        {
            warn!("Failed to record cancelled stage: {}", e);
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reason recorded in `Failed` and shown to the operator.
fn failure_reason(error: &WorkflowError) -> String {
    error
        .sdk_error()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| error.to_string())
}

/// Check an intent returned by the terminal against the one that was sent.
fn validate_intent(
    sent_amount: Amount,
    sent_id: Option<&PaymentIntentId>,
    received: PaymentIntent,
    expected_status: fn(&PaymentIntent) -> bool,
) -> Result<PaymentIntent> {
    let Some(received_id) = received.id.as_ref() else {
        return Err(WorkflowError::UnexpectedResponse(
            "payment intent has no id".to_string(),
        ));
    };
    if let Some(sent_id) = sent_id
        && sent_id != received_id
    {
        return Err(WorkflowError::UnexpectedResponse(format!(
            "expected payment intent {}, got {}",
            sent_id, received_id
        )));
    }
    if received.amount != sent_amount {
        return Err(WorkflowError::UnexpectedResponse(format!(
            "expected amount {}, got {}",
            sent_amount, received.amount
        )));
    }
    if !expected_status(&received) {
        return Err(WorkflowError::UnexpectedResponse(format!(
            "payment intent {} is {}",
            received_id, received.status
        )));
    }
    Ok(received)
}

/// In-person payment collection workflow.
///
/// Generic over the terminal SDK, the location services and the prompt
/// surface so the same orchestration runs against mocks and platform
/// bindings.
pub struct PaymentWorkflow<T, L, P> {
    terminal: T,
    location: L,
    prompt: P,
    config: WorkflowConfig,
    registry: ReaderRegistry,
    inner: Mutex<Inner>,
}

impl<T, L, P> PaymentWorkflow<T, L, P>
where
    T: PaymentTerminal,
    L: LocationServices,
    P: PromptSurface,
{
    /// Create a workflow with its own reader registry.
    pub fn new(terminal: T, location: L, prompt: P, config: WorkflowConfig) -> Self {
        Self {
            terminal,
            location,
            prompt,
            config,
            registry: ReaderRegistry::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Share the reader connection with other workflows.
    pub fn with_registry(mut self, registry: ReaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Set the stage flag and enter its in-flight state.
    fn begin_stage(
        &self,
        inner: &mut Inner,
        stage: Stage,
        state: WorkflowState,
    ) -> Result<StageGuard<'_>> {
        inner.ensure_idle_flags()?;
        inner.transition(state)?;
        inner.flags.set(stage, true);
        Ok(StageGuard {
            inner: &self.inner,
            stage,
            settled: false,
        })
    }

    /// Record a stage failure and release its flag.
    fn fail_stage(
        &self,
        inner: &mut Inner,
        guard: StageGuard<'_>,
        error: &WorkflowError,
    ) -> String {
        let stage = guard.stage;
        let reason = failure_reason(error);
        error!(stage = %stage, "Stage failed: {}", error);

        if let Err(e) = inner.transition(WorkflowState::failed(stage, reason.clone())) {
            warn!(stage = %stage, "Failed to record stage failure: {}", e);
        }
        guard.settle(inner);
        reason
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Initialize the terminal SDK. Required once before discovery.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Initialization` with the SDK error.
    pub async fn initialize(&self) -> Result<()> {
        if self.lock().initialized {
            return Ok(());
        }

        info!("Initializing payment terminal");
        self.terminal.initialize().await.map_err(|e| {
            error!("Terminal initialization failed: {}", e);
            WorkflowError::Initialization(e)
        })?;

        self.lock().initialized = true;
        info!("Payment terminal initialized");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Make sure location permission is granted, asking for it if needed.
    ///
    /// An `Unknown` permission is requested first. A missing permission
    /// shows the location prompt; choosing its action opens the system
    /// settings.
    async fn ensure_location_permission(&self) -> Result<()> {
        let mut permission = self.location.permission().await;
        if permission == LocationPermission::Unknown {
            debug!("Requesting location permission");
            permission = self.location.request_permission().await;
        }
        self.lock().location_permission = permission;

        if permission.is_granted() {
            return Ok(());
        }

        warn!(permission = %permission, "Location permission not granted");
        let response = self.prompt.alert(PromptMessages::location_required()).await;
        if response == PromptResponse::ActionSelected {
            if let Err(e) = self.location.open_settings().await {
                warn!("Failed to open settings: {}", e);
            }
            // The operator may have granted access from the settings page.
            let permission = self.location.permission().await;
            self.lock().location_permission = permission;
            if permission.is_granted() {
                return Ok(());
            }
        }

        Err(WorkflowError::LocationPermissionDenied)
    }

    /// Start looking for readers, superseding any running discovery.
    ///
    /// Only the first reader of the latest reported set is retained; see
    /// [`current_reader`](Self::current_reader) and
    /// [`wait_for_reader`](Self::wait_for_reader).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another stage is in progress
    /// - The terminal is not initialized
    /// - A reader is already connected
    /// - Location permission is not granted (discovery does not start)
    /// - The terminal refuses to start discovery
    pub async fn start_discovery(&self) -> Result<()> {
        const OPERATION: &str = "start_discovery";
        const EXPECTED: &str = "no connected reader";

        {
            let inner = self.lock();
            inner.ensure_idle_flags()?;
            if !inner.initialized {
                return Err(WorkflowError::NotInitialized);
            }
            if inner.lease.is_some()
                || !inner
                    .machine
                    .current_state()
                    .can_transition_to(&WorkflowState::ReaderDiscovering)
            {
                return Err(inner.precondition(OPERATION, EXPECTED));
            }
        }

        self.ensure_location_permission().await?;

        let generation = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;
            if inner.lease.is_some() {
                return Err(inner.precondition(OPERATION, EXPECTED));
            }
            inner.cancel_discovery();
            inner.transition(WorkflowState::ReaderDiscovering)?;
            inner.discovery_generation
        };

        let discovery_config = self.config.discovery_config();
        info!(
            stage = %Stage::Discovery,
            method = %discovery_config.discovery_method,
            simulated = discovery_config.simulated,
            "Starting reader discovery"
        );
        let result = self.terminal.discover_readers(discovery_config).await;

        let reason = {
            let mut inner = self.lock();
            if inner.discovery_generation != generation {
                debug!("Discovery superseded before it started, dropping its updates");
                return Ok(());
            }

            match result {
                Ok(updates) => {
                    inner.discovery = Some(DiscoverySubscription::spawn(updates));
                    info!(stage = %Stage::Discovery, "Reader discovery running");
                    return Ok(());
                }
                Err(e) => {
                    error!(stage = %Stage::Discovery, "Reader discovery failed: {}", e);
                    if let Err(te) = inner.transition(WorkflowState::failed(
                        Stage::Discovery,
                        e.message.clone(),
                    )) {
                        warn!("Failed to record discovery failure: {}", te);
                    }
                    e
                }
            }
        };

        self.prompt
            .notify(PromptMessages::failure(
                PromptMessages::DISCOVERY_ERROR,
                &reason.message,
            ))
            .await;
        Err(WorkflowError::Discovery(reason))
    }

    /// Stop the running discovery, if any.
    ///
    /// The retained candidate is dropped with it. A workflow that was only
    /// discovering returns to `Idle`.
    pub fn stop_discovery(&self) {
        let mut inner = self.lock();
        inner.cancel_discovery();
        if inner.reader.as_ref().is_some_and(Reader::is_discovered) {
            inner.reader = None;
        }
        if *inner.machine.current_state() == WorkflowState::ReaderDiscovering
            && let Err(e) = inner.transition(WorkflowState::Idle)
        {
            warn!("Failed to return to idle after stopping discovery: {}", e);
        }
    }

    /// Wait up to the configured timeout for discovery to report a reader.
    pub async fn wait_for_reader(&self) -> Result<Reader> {
        self.wait_for_reader_timeout(self.config.reader_wait_timeout_duration())
            .await
    }

    /// Wait up to `timeout` for discovery to report a reader.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if discovery is not running and
    /// `NoReaderDiscovered` if it ends or times out without a candidate.
    pub async fn wait_for_reader_timeout(&self, timeout: Duration) -> Result<Reader> {
        let mut candidate = {
            let inner = self.lock();
            match inner.discovery.as_ref() {
                Some(subscription) => subscription.watch(),
                None => {
                    return Err(inner.precondition("wait_for_reader", "a running discovery"));
                }
            }
        };

        match tokio::time::timeout(timeout, candidate.wait_for(Option::is_some)).await {
            Ok(Ok(found)) => {
                let reader = (*found).clone();
                reader.ok_or(WorkflowError::NoReaderDiscovered)
            }
            Ok(Err(_)) => {
                debug!("Discovery ended without a reader");
                Err(WorkflowError::NoReaderDiscovered)
            }
            Err(_) => {
                warn!("No reader discovered after {}ms", timeout.as_millis());
                Err(WorkflowError::NoReaderDiscovered)
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    async fn resolve_location_id(&self) -> Result<LocationId> {
        if let Some(location_id) = self.config.location_id.clone() {
            return Ok(location_id);
        }
        let resolved = self.location.resolve_location_id().await;
        if resolved.is_none() {
            warn!("No terminal location configured and none could be resolved");
        }
        resolved.ok_or(WorkflowError::MissingLocation)
    }

    /// Check location permission and find the location to connect to.
    ///
    /// Connecting never prompts for permission; that happens at discovery.
    async fn connect_location(&self) -> Result<LocationId> {
        let permission = self.location.permission().await;
        self.lock().location_permission = permission;
        if !permission.is_granted() {
            warn!(permission = %permission, "Cannot connect reader without location permission");
            return Err(WorkflowError::LocationPermissionDenied);
        }
        self.resolve_location_id().await
    }

    /// Connect the discovered reader.
    ///
    /// On success discovery stops, the reader is `Connected` and a notice
    /// is shown. On failure the reader stays `Discovered`, the workflow
    /// moves to `Failed(connect)` with a notice, and the connection can be
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another stage is in progress
    /// - No reader has been discovered
    /// - Another workflow holds the reader connection
    /// - Location permission is missing or no location id is available
    /// - The terminal refuses the connection
    pub async fn connect_reader(&self) -> Result<Reader> {
        const OPERATION: &str = "connect_reader";
        const EXPECTED: &str = "a discovered reader";

        let (guard, lease, reader) = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;
            if inner.lease.is_some()
                || !inner
                    .machine
                    .current_state()
                    .can_transition_to(&WorkflowState::ReaderConnecting)
            {
                return Err(inner.precondition(OPERATION, EXPECTED));
            }
            let mut reader = inner
                .connect_candidate()
                .ok_or(WorkflowError::NoReaderDiscovered)?;
            reader.transition_to(ReaderConnectionState::Connecting)?;
            let lease = self.registry.acquire(reader.id.clone())?;
            // Nothing fallible may follow: the guard relocks on drop.
            let guard =
                self.begin_stage(&mut inner, Stage::Connect, WorkflowState::ReaderConnecting)?;
            inner.reader = Some(reader.clone());
            (guard, lease, reader)
        };

        let result = match self.connect_location().await {
            Ok(location_id) => {
                info!(
                    stage = %Stage::Connect,
                    reader_id = %reader.id,
                    location_id = %location_id,
                    "Connecting reader"
                );
                self.terminal
                    .connect_local_mobile_reader(&reader, &location_id)
                    .await
                    .map_err(WorkflowError::Connection)
                    .and_then(|connected| {
                        if connected.id != reader.id || !connected.is_connected() {
                            return Err(WorkflowError::UnexpectedResponse(format!(
                                "expected reader {} to be connected, got {} ({})",
                                reader.id, connected.id, connected.connection_state
                            )));
                        }
                        Ok((connected, location_id))
                    })
            }
            Err(e) => Err(e),
        };

        let mut inner = self.lock();
        let mut reader = reader;
        match result {
            Ok((connected, location_id)) => {
                reader.mark_connected(location_id)?;
                if reader.label.is_none() {
                    reader.label = connected.label;
                }
                inner.reader = Some(reader.clone());
                inner.lease = Some(lease);
                inner.cancel_discovery();
                inner.transition(WorkflowState::ReaderConnected)?;
                guard.settle(&mut inner);
                drop(inner);

                info!(stage = %Stage::Connect, reader_id = %reader.id, "Reader connected");
                self.prompt
                    .notify(Prompt::new(PromptMessages::READER_CONNECTED))
                    .await;
                Ok(reader)
            }
            Err(err) => {
                reader.transition_to(ReaderConnectionState::Discovered)?;
                inner.reader = Some(reader);
                let reason = self.fail_stage(&mut inner, guard, &err);
                drop(inner);
                drop(lease);

                self.prompt
                    .notify(PromptMessages::failure(PromptMessages::CONNECT_ERROR, &reason))
                    .await;
                Err(err)
            }
        }
    }

    /// End the reader session and return to `Idle`.
    ///
    /// Discovery is stopped and the current intent is dropped. Local state
    /// is torn down before the terminal is told, so the reader connection
    /// is released even when the terminal reports an error.
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` while a stage is running and
    /// `Disconnect` if the terminal reports a failure.
    pub async fn disconnect_reader(&self) -> Result<()> {
        let (lease, reader) = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;

            inner.cancel_discovery();
            inner.intent = None;
            if *inner.machine.current_state() != WorkflowState::Idle {
                inner.transition(WorkflowState::Idle)?;
            }

            let mut reader = inner.reader.take();
            if let Some(r) = reader.as_mut().filter(|r| r.is_connected()) {
                r.transition_to(ReaderConnectionState::Disconnected)?;
            }
            (inner.lease.take(), reader)
        };

        let Some(lease) = lease else {
            debug!("No reader connected, nothing to disconnect");
            return Ok(());
        };

        info!(reader_id = %lease.reader_id(), "Disconnecting reader");
        let result = self.terminal.disconnect_reader().await;
        drop(lease);

        match result {
            Ok(()) => {
                if let Some(reader) = reader {
                    info!(reader_id = %reader.id, "Reader disconnected");
                }
                Ok(())
            }
            Err(e) => {
                error!("Reader disconnection failed: {}", e);
                Err(WorkflowError::Disconnect(e))
            }
        }
    }

    // ------------------------------------------------------------------
    // Payment intent
    // ------------------------------------------------------------------

    /// Create a card-present intent for `amount` minor units.
    ///
    /// Replaces the current intent, whatever its status, on success.
    ///
    /// # Errors
    ///
    /// Returns `Domain` for non-positive or oversized amounts without
    /// calling the terminal, `Precondition` without a connected reader and
    /// `Intent` with the terminal's error verbatim.
    pub async fn create_intent(&self, amount: i64) -> Result<PaymentIntent> {
        let amount = Amount::new(amount)?;
        self.create_intent_for(amount).await
    }

    /// Create an intent from operator input in major units, e.g. `"10.00"`.
    ///
    /// # Errors
    ///
    /// Returns `Domain` for input that is not a positive amount.
    pub async fn create_intent_from_input(&self, input: &str) -> Result<PaymentIntent> {
        let amount = Amount::parse_major(input, self.config.currency)?;
        self.create_intent_for(amount).await
    }

    async fn create_intent_for(&self, amount: Amount) -> Result<PaymentIntent> {
        let guard = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;
            if inner.lease.is_none()
                || !inner
                    .machine
                    .current_state()
                    .can_transition_to(&WorkflowState::IntentCreating)
            {
                return Err(inner.precondition("create_intent", "a connected reader"));
            }
            self.begin_stage(&mut inner, Stage::CreateIntent, WorkflowState::IntentCreating)?
        };

        let params = CreateIntentParams::card_present(amount, self.config.currency);
        info!(
            stage = %Stage::CreateIntent,
            amount = amount.minor_units(),
            currency = %params.currency.code(),
            "Creating payment intent"
        );
        let currency = params.currency;
        let result = self
            .terminal
            .create_payment_intent(params)
            .await
            .map_err(WorkflowError::Intent)
            .and_then(|intent| validate_intent(amount, None, intent, PaymentIntent::is_pending))
            .and_then(|intent| {
                if intent.currency != currency {
                    return Err(WorkflowError::UnexpectedResponse(format!(
                        "expected currency {}, got {}",
                        currency.code(),
                        intent.currency.code()
                    )));
                }
                Ok(intent)
            });

        let mut inner = self.lock();
        match result {
            Ok(intent) => {
                inner.intent = Some(intent.clone());
                inner.transition(WorkflowState::IntentPending)?;
                guard.settle(&mut inner);
                drop(inner);

                info!(
                    stage = %Stage::CreateIntent,
                    intent_id = ?intent.id,
                    "Payment intent created"
                );
                self.prompt
                    .notify(Prompt::new(PromptMessages::INTENT_CREATED))
                    .await;
                Ok(intent)
            }
            Err(err) => {
                let reason = self.fail_stage(&mut inner, guard, &err);
                drop(inner);

                self.prompt
                    .notify(PromptMessages::failure(PromptMessages::INTENT_ERROR, &reason))
                    .await;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Collection and confirmation
    // ------------------------------------------------------------------

    /// Collect a payment method for the pending intent, then confirm it.
    ///
    /// Blocks for as long as the card holder takes. On success the
    /// confirmation runs automatically, exactly once, with the collected
    /// intent and the confirmed intent is returned. On failure a blocking
    /// modal shows the terminal's message and the intent stays `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the current intent is `Pending`,
    /// `Collect` with the terminal's error, or any error of
    /// [`confirm_payment`](Self::confirm_payment).
    pub async fn collect_payment(&self) -> Result<PaymentIntent> {
        const OPERATION: &str = "collect_payment";
        const EXPECTED: &str = "a pending payment intent";

        let (guard, intent) = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;
            let intent = match inner.intent.as_ref() {
                Some(intent) if intent.is_pending() => intent.clone(),
                _ => return Err(inner.precondition(OPERATION, EXPECTED)),
            };
            if !inner
                .machine
                .current_state()
                .can_transition_to(&WorkflowState::Collecting)
            {
                return Err(inner.precondition(OPERATION, EXPECTED));
            }
            let guard = self.begin_stage(&mut inner, Stage::Collect, WorkflowState::Collecting)?;
            (guard, intent)
        };

        info!(stage = %Stage::Collect, intent_id = ?intent.id, "Collecting payment method");
        let result = self
            .terminal
            .collect_payment_method(&intent)
            .await
            .map_err(WorkflowError::Collect)
            .and_then(|collected| {
                validate_intent(
                    intent.amount,
                    intent.id.as_ref(),
                    collected,
                    PaymentIntent::is_method_collected,
                )
            });

        let mut inner = self.lock();
        match result {
            Ok(collected) => {
                inner.intent = Some(collected.clone());
                inner.transition(WorkflowState::MethodCollected)?;
                guard.settle(&mut inner);
                // Hand over to confirmation without releasing the lock so
                // nothing can start in between.
                let confirm =
                    self.begin_stage(&mut inner, Stage::Confirm, WorkflowState::Confirming)?;
                drop(inner);

                info!(stage = %Stage::Collect, intent_id = ?collected.id, "Payment method collected");
                self.prompt
                    .notify(Prompt::new(PromptMessages::PAYMENT_COLLECTED))
                    .await;
                self.run_confirm(confirm, collected).await
            }
            Err(err) => {
                let reason = self.fail_stage(&mut inner, guard, &err);
                drop(inner);

                self.prompt
                    .alert(PromptMessages::failure(PromptMessages::COLLECT_ERROR, &reason))
                    .await;
                Err(err)
            }
        }
    }

    /// Confirm the collected intent.
    ///
    /// [`collect_payment`](Self::collect_payment) already does this; call
    /// it directly only to retry a failed confirmation.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the current intent is
    /// `MethodCollected`, or `Confirm` with the terminal's error.
    pub async fn confirm_payment(&self) -> Result<PaymentIntent> {
        const OPERATION: &str = "confirm_payment";
        const EXPECTED: &str = "a collected payment intent";

        let (guard, intent) = {
            let mut inner = self.lock();
            inner.ensure_idle_flags()?;
            let intent = match inner.intent.as_ref() {
                Some(intent) if intent.is_method_collected() => intent.clone(),
                _ => return Err(inner.precondition(OPERATION, EXPECTED)),
            };
            if !inner
                .machine
                .current_state()
                .can_transition_to(&WorkflowState::Confirming)
            {
                return Err(inner.precondition(OPERATION, EXPECTED));
            }
            let guard = self.begin_stage(&mut inner, Stage::Confirm, WorkflowState::Confirming)?;
            (guard, intent)
        };

        self.run_confirm(guard, intent).await
    }

    async fn run_confirm(
        &self,
        guard: StageGuard<'_>,
        intent: PaymentIntent,
    ) -> Result<PaymentIntent> {
        info!(stage = %Stage::Confirm, intent_id = ?intent.id, "Confirming payment");
        let result = self
            .terminal
            .confirm_payment_intent(&intent)
            .await
            .map_err(WorkflowError::Confirm)
            .and_then(|confirmed| {
                validate_intent(
                    intent.amount,
                    intent.id.as_ref(),
                    confirmed,
                    PaymentIntent::is_confirmed,
                )
            });

        let mut inner = self.lock();
        match result {
            Ok(confirmed) => {
                inner.intent = Some(confirmed.clone());
                inner.transition(WorkflowState::Confirmed)?;
                guard.settle(&mut inner);
                drop(inner);

                info!(
                    stage = %Stage::Confirm,
                    intent_id = ?confirmed.id,
                    amount = confirmed.amount.minor_units(),
                    "Payment confirmed"
                );
                self.prompt.notify(PromptMessages::payment_confirmed()).await;
                Ok(confirmed)
            }
            Err(err) => {
                let reason = self.fail_stage(&mut inner, guard, &err);
                drop(inner);

                self.prompt
                    .notify(PromptMessages::failure(PromptMessages::CONFIRM_ERROR, &reason))
                    .await;
                Err(err)
            }
        }
    }

    /// Drop the confirmed intent and return to `ReaderConnected`.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the workflow is `Confirmed`.
    pub fn clear_completed_charge(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_idle_flags()?;
        if *inner.machine.current_state() != WorkflowState::Confirmed {
            return Err(inner.precondition("clear_completed_charge", "a confirmed payment"));
        }
        inner.transition(WorkflowState::ReaderConnected)?;
        if let Some(intent) = inner.intent.take() {
            debug!(intent_id = ?intent.id, "Completed charge cleared");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Current workflow state.
    pub fn state(&self) -> WorkflowState {
        self.lock().machine.current_state().clone()
    }

    /// The connected reader, the reader being connected, or the discovery
    /// candidate, in that order.
    pub fn current_reader(&self) -> Option<Reader> {
        let inner = self.lock();
        inner
            .reader
            .clone()
            .filter(|r| !r.is_discovered())
            .or_else(|| inner.connect_candidate())
    }

    /// The intent being charged, if one has been created.
    pub fn current_intent(&self) -> Option<PaymentIntent> {
        self.lock().intent.clone()
    }

    /// Which stages are in flight right now.
    pub fn flags(&self) -> StageFlags {
        self.lock().flags
    }

    /// Location permission as last observed.
    pub fn location_permission(&self) -> LocationPermission {
        self.lock().location_permission
    }

    /// Whether the terminal has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Whether a discovery subscription is still forwarding readers.
    pub fn is_discovering(&self) -> bool {
        self.lock()
            .discovery
            .as_ref()
            .is_some_and(DiscoverySubscription::is_active)
    }

    /// Recent state transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.lock().machine.history().iter().cloned().collect()
    }

    /// Configuration the workflow was built with.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Registry that arbitrates the reader connection between workflows.
    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }
}
