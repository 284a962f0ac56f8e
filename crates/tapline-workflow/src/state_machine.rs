//! Payment workflow state machine.
//!
//! This module tracks where a payment collection currently stands, from an
//! idle terminal through reader discovery and connection to a confirmed
//! charge, and refuses moves the workflow does not allow.
//!
//! # States
//!
//! - `Idle`: No discovery running, no reader connected
//! - `ReaderDiscovering`: Discovery running, candidate may or may not exist
//! - `ReaderConnecting`: Connect call outstanding
//! - `ReaderConnected`: Reader session open, no intent
//! - `IntentCreating`: Create-intent call outstanding
//! - `IntentPending`: Intent waiting for a card
//! - `Collecting`: Collect call outstanding (card holder interacting)
//! - `MethodCollected`: Payment method attached
//! - `Confirming`: Confirm call outstanding
//! - `Confirmed`: Charge captured
//! - `Failed`: A stage failed; waits for the operator
//!
//! # Valid Transitions
//!
//! ```text
//! Idle → ReaderDiscovering → ReaderConnecting → ReaderConnected
//!      → IntentCreating → IntentPending → Collecting → MethodCollected
//!      → Confirming → Confirmed
//!
//! <in-flight> → Failed(stage)
//! Failed → <retry of any stage> | Idle
//! IntentPending | Confirmed → IntentCreating
//! Confirmed → ReaderConnected
//! <any settled state> → Idle
//! ```
//!
//! `Failed` never recovers on its own; leaving it always takes an explicit
//! operation.
//!
//! # Examples
//!
//! ```
//! use tapline_workflow::{StateMachine, WorkflowState};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(WorkflowState::ReaderDiscovering).unwrap();
//! machine.transition_to(WorkflowState::ReaderConnecting).unwrap();
//! assert_eq!(machine.current_state(), &WorkflowState::ReaderConnecting);
//!
//! assert!(machine.transition_to(WorkflowState::Confirmed).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use tapline_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// One complete charge from discovery to confirmation takes 9 transitions,
/// so 100 entries covers roughly ten charges.
const MAX_HISTORY_SIZE: usize = 100;

/// Workflow stages that call the payment terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Connect,
    CreateIntent,
    Collect,
    Confirm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Discovery => "discovery",
            Stage::Connect => "connect",
            Stage::CreateIntent => "create_intent",
            Stage::Collect => "collect",
            Stage::Confirm => "confirm",
        };
        write!(f, "{}", s)
    }
}

/// Every position of the payment collection flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// No discovery running and no reader connected.
    Idle,

    /// Discovery is running.
    ReaderDiscovering,

    /// Connect call outstanding.
    ReaderConnecting,

    /// Reader session open, no live intent.
    ReaderConnected,

    /// Create-intent call outstanding.
    IntentCreating,

    /// Intent created and waiting for a card.
    IntentPending,

    /// Collect call outstanding.
    Collecting,

    /// Payment method attached to the intent.
    MethodCollected,

    /// Confirm call outstanding.
    Confirming,

    /// Charge captured.
    Confirmed,

    /// A stage failed. Never left without an explicit operation.
    Failed { stage: Stage, reason: String },
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            WorkflowState::Idle => "Idle",
            WorkflowState::ReaderDiscovering => "ReaderDiscovering",
            WorkflowState::ReaderConnecting => "ReaderConnecting",
            WorkflowState::ReaderConnected => "ReaderConnected",
            WorkflowState::IntentCreating => "IntentCreating",
            WorkflowState::IntentPending => "IntentPending",
            WorkflowState::Collecting => "Collecting",
            WorkflowState::MethodCollected => "MethodCollected",
            WorkflowState::Confirming => "Confirming",
            WorkflowState::Confirmed => "Confirmed",
            WorkflowState::Failed { stage, .. } => return write!(f, "Failed({})", stage),
        };
        write!(f, "{}", state_str)
    }
}

impl WorkflowState {
    /// Build a failed state.
    pub fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        WorkflowState::Failed {
            stage,
            reason: reason.into(),
        }
    }

    /// The stage whose terminal call is outstanding in this state, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_workflow::{Stage, WorkflowState};
    ///
    /// assert_eq!(WorkflowState::Collecting.in_flight_stage(), Some(Stage::Collect));
    /// assert_eq!(WorkflowState::IntentPending.in_flight_stage(), None);
    /// ```
    pub fn in_flight_stage(&self) -> Option<Stage> {
        match self {
            WorkflowState::ReaderConnecting => Some(Stage::Connect),
            WorkflowState::IntentCreating => Some(Stage::CreateIntent),
            WorkflowState::Collecting => Some(Stage::Collect),
            WorkflowState::Confirming => Some(Stage::Confirm),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WorkflowState::Failed { .. })
    }

    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_workflow::{Stage, WorkflowState};
    ///
    /// assert!(WorkflowState::Idle.can_transition_to(&WorkflowState::ReaderDiscovering));
    /// assert!(!WorkflowState::Idle.can_transition_to(&WorkflowState::Collecting));
    /// assert!(WorkflowState::Collecting.can_transition_to(&WorkflowState::failed(Stage::Collect, "declined")));
    /// assert!(!WorkflowState::Collecting.can_transition_to(&WorkflowState::failed(Stage::Confirm, "declined")));
    /// ```
    pub fn can_transition_to(&self, target: &WorkflowState) -> bool {
        use WorkflowState::*;

        if let Failed { stage, .. } = target {
            return match self {
                ReaderDiscovering => *stage == Stage::Discovery,
                other => other.in_flight_stage() == Some(*stage),
            };
        }

        matches!(
            (self, target),
            // Discovery, restartable
            (Idle | ReaderDiscovering, ReaderDiscovering)
            | (ReaderDiscovering, ReaderConnecting)
            // Connect
            | (ReaderConnecting, ReaderConnected)
            // Create intent, replacing any pending or consumed intent
            | (ReaderConnected | IntentPending | Confirmed, IntentCreating)
            | (IntentCreating, IntentPending)
            // Collect
            | (IntentPending, Collecting)
            | (Collecting, MethodCollected)
            // Confirm
            | (MethodCollected, Confirming)
            | (Confirming, Confirmed)
            // Clearing a completed charge keeps the reader
            | (Confirmed, ReaderConnected)
            // Explicit retry after a failure
            | (
                Failed { .. },
                ReaderDiscovering | ReaderConnecting | IntentCreating | Collecting | Confirming
            )
            // Stop discovery or disconnect from any settled state
            | (
                ReaderDiscovering
                    | ReaderConnected
                    | IntentPending
                    | MethodCollected
                    | Confirmed
                    | Failed { .. },
                Idle
            )
        )
    }
}

/// Represents a single state transition with timestamp.
///
/// The `timestamp` field is not serialized as `Instant` is process-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: WorkflowState,

    /// The state transitioned to.
    pub to: WorkflowState,

    /// When the transition occurred.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: WorkflowState, to: WorkflowState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// State machine for the payment collection flow.
///
/// Enforces the transition table and keeps a bounded history of the most
/// recent transitions.
///
/// # Thread Safety
///
/// This struct is not thread-safe. The workflow keeps it behind a mutex
/// together with the rest of its state.
#[derive(Debug)]
pub struct StateMachine {
    /// Current state of the workflow.
    current_state: WorkflowState,

    /// History of state transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: WorkflowState::Idle,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Create a builder for constructing a state machine with custom configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_workflow::{StateMachine, WorkflowState};
    ///
    /// let machine = StateMachine::builder()
    ///     .with_initial_state(WorkflowState::ReaderConnected)
    ///     .build();
    ///
    /// assert_eq!(machine.current_state(), &WorkflowState::ReaderConnected);
    /// ```
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    /// Get the current state of the machine.
    pub fn current_state(&self) -> &WorkflowState {
        &self.current_state
    }

    /// Recent state transitions, ordered from oldest to newest.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the requested transition
    /// is not valid for the current state. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: WorkflowState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state.clone(), new_state.clone());
        self.current_state = new_state;

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing `StateMachine` instances with custom configuration.
#[derive(Debug)]
pub struct StateMachineBuilder {
    initial_state: WorkflowState,
}

impl StateMachineBuilder {
    /// Set the initial state for the machine.
    pub fn with_initial_state(mut self, state: WorkflowState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn build(self) -> StateMachine {
        StateMachine {
            current_state: self.initial_state,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self {
            initial_state: WorkflowState::Idle,
        }
    }
}
