//! Mock collaborator implementations for testing and development.
//!
//! This module provides simulated collaborators that can be controlled
//! programmatically without a vendor SDK, a phone or an operator.

pub mod location;
pub mod prompt;
pub mod terminal;

// Re-export commonly used types
pub use location::{MockLocation, MockLocationHandle};
pub use prompt::{MockPrompt, MockPromptHandle, PromptKind, ShownPrompt};
pub use terminal::{MockTerminal, MockTerminalHandle, TerminalCall};
