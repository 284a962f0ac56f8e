//! Common test utilities for workflow integration tests.
//!
//! [`Harness`] wires a [`PaymentWorkflow`] to the mock terminal, location
//! services and prompt surface and keeps their control handles, so each
//! test can script the collaborators and then drive the workflow.
//!
//! The `*_to_*` helpers advance a fresh harness to a given state with the
//! happy path and panic if any step fails, keeping the tests focused on
//! the stage under test.

#![allow(dead_code)]

use std::time::Duration;

use tapline_core::{DiscoveryMethod, LocationId, PaymentIntent, Reader, ReaderId};
use tapline_terminal::mock::{
    MockLocation, MockLocationHandle, MockPrompt, MockPromptHandle, MockTerminal,
    MockTerminalHandle, TerminalCall,
};
use tapline_workflow::{PaymentWorkflow, ReaderRegistry, WorkflowConfig};

/// Simulated reader reported by discovery.
pub const READER_ID: &str = "SIM-READER-1";

/// Terminal location used by the configuration.
pub const LOCATION_ID: &str = "tml_FrcFgksbiIZZ2V";

/// Upper bound for anything the mocks do asynchronously.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(2);

pub type Workflow = PaymentWorkflow<MockTerminal, MockLocation, MockPrompt>;

pub fn reader(id: &str) -> Reader {
    Reader::discovered(ReaderId::new(id).unwrap(), DiscoveryMethod::LocalMobile).simulated()
}

pub fn location_id() -> LocationId {
    LocationId::new(LOCATION_ID).unwrap()
}

pub fn config() -> WorkflowConfig {
    WorkflowConfig::simulated()
        .location_id(location_id())
        .reader_wait_timeout(STEP_TIMEOUT)
}

/// A workflow and the handles of its mock collaborators.
pub struct Harness {
    pub workflow: Workflow,
    pub terminal: MockTerminalHandle,
    pub location: MockLocationHandle,
    pub prompt: MockPromptHandle,
}

impl Harness {
    /// Workflow with location granted and one simulated reader.
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: WorkflowConfig) -> Self {
        Self::build(config, ReaderRegistry::new(), MockLocation::granted())
    }

    /// Workflow whose location permission starts `Unknown`.
    pub fn without_permission() -> Self {
        Self::build(config(), ReaderRegistry::new(), MockLocation::new())
    }

    /// Workflow sharing `registry` with other workflows.
    pub fn with_registry(registry: ReaderRegistry) -> Self {
        Self::build(config(), registry, MockLocation::granted())
    }

    fn build(
        config: WorkflowConfig,
        registry: ReaderRegistry,
        (location, location_handle): (MockLocation, MockLocationHandle),
    ) -> Self {
        let (terminal, terminal_handle) =
            MockTerminal::with_simulated_readers(vec![reader(READER_ID)]);
        let (prompt, prompt_handle) = MockPrompt::new();

        Self {
            workflow: PaymentWorkflow::new(terminal, location, prompt, config)
                .with_registry(registry),
            terminal: terminal_handle,
            location: location_handle,
            prompt: prompt_handle,
        }
    }

    /// Initialize, start discovery and wait for the simulated reader.
    pub async fn to_discovered(self) -> Self {
        self.workflow.initialize().await.unwrap();
        self.workflow.start_discovery().await.unwrap();
        self.workflow.wait_for_reader().await.unwrap();
        self
    }

    pub async fn to_connected(self) -> Self {
        let harness = self.to_discovered().await;
        harness.workflow.connect_reader().await.unwrap();
        harness
    }

    /// Connected with a pending intent for `amount` minor units.
    pub async fn to_pending(self, amount: i64) -> Self {
        let harness = self.to_connected().await;
        harness.workflow.create_intent(amount).await.unwrap();
        harness
    }

    pub async fn to_confirmed(self, amount: i64) -> Self {
        let harness = self.to_pending(amount).await;
        harness.workflow.collect_payment().await.unwrap();
        harness
    }

    pub fn intent(&self) -> PaymentIntent {
        self.workflow
            .current_intent()
            .expect("workflow has no current intent")
    }

    /// Number of calls the terminal received matching `predicate`.
    pub fn calls(&self, predicate: impl Fn(&TerminalCall) -> bool) -> usize {
        self.terminal.count_calls(predicate)
    }
}

pub fn is_discover(call: &TerminalCall) -> bool {
    matches!(call, TerminalCall::DiscoverReaders(_))
}

pub fn is_connect(call: &TerminalCall) -> bool {
    matches!(call, TerminalCall::ConnectReader { .. })
}

pub fn is_create(call: &TerminalCall) -> bool {
    matches!(call, TerminalCall::CreatePaymentIntent { .. })
}

pub fn is_collect(call: &TerminalCall) -> bool {
    matches!(call, TerminalCall::CollectPaymentMethod { .. })
}

pub fn is_confirm(call: &TerminalCall) -> bool {
    matches!(call, TerminalCall::ConfirmPaymentIntent { .. })
}
