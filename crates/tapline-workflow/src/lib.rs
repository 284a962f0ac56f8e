//! In-person card payment collection workflow.
//!
//! Drives a payment terminal through reader discovery, reader connection,
//! payment intent creation, payment method collection and confirmation,
//! enforcing the order of stages with an explicit state machine.
//!
//! - [`PaymentWorkflow`]: the orchestrator
//! - [`StateMachine`] / [`WorkflowState`]: transition table and history
//! - [`StageFlags`]: per-stage busy flags
//! - [`ReaderRegistry`]: exclusive ownership of the reader connection
//! - [`WorkflowConfig`]: currency, discovery and location settings

pub mod config;
pub mod error;
pub mod flags;
pub mod messages;
pub mod registry;
pub mod state_machine;
pub mod workflow;

pub use config::WorkflowConfig;
pub use error::{Result, WorkflowError};
pub use flags::StageFlags;
pub use registry::{ReaderLease, ReaderRegistry};
pub use state_machine::{Stage, StateMachine, StateMachineBuilder, StateTransition, WorkflowState};
pub use workflow::{CANCELLED_REASON, PaymentWorkflow};
