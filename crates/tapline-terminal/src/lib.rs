//! Collaborator abstraction layer for in-person payment collection.
//!
//! This crate provides trait-based abstractions for everything the payment
//! workflow talks to but does not implement: the payment terminal SDK, the
//! device location services and the operator prompt surface. The traits
//! allow easy substitution between mock implementations (for development and
//! testing) and platform bindings.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All calls are asynchronous using native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Thread-safe**: All traits require `Send + Sync` for use with Tokio.
//! - **Typed results**: Readers and payment intents come back as
//!   [`tapline_core`] types, and failures as a structured [`SdkError`].
//!
//! # Payment Terminal
//!
//! ```no_run
//! use tapline_core::{LocationId, Reader};
//! use tapline_terminal::{PaymentTerminal, Result};
//!
//! async fn connect<T: PaymentTerminal>(
//!     terminal: &T,
//!     reader: &Reader,
//!     location: &LocationId,
//! ) -> Result<Reader> {
//!     terminal.initialize().await?;
//!     terminal.connect_local_mobile_reader(reader, location).await
//! }
//! ```
//!
//! # Discovery
//!
//! [`discovery::DiscoverySubscription`] keeps only the first reader of the
//! latest set reported by the SDK and can be cancelled at any time.
//!
//! # Mock Implementations
//!
//! [`mock::MockTerminal`], [`mock::MockLocation`] and [`mock::MockPrompt`]
//! each come with a handle for scripting outcomes and inspecting calls.

pub mod discovery;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use discovery::{DiscoveryFeed, DiscoverySubscription, ReaderUpdates};
pub use error::{Result, SdkError, SdkErrorCode};
pub use traits::{LocationServices, PaymentTerminal, PromptSurface};
pub use types::{
    CreateIntentParams, DiscoveryConfig, Prompt, PromptAction, PromptActionKind, PromptResponse,
};
