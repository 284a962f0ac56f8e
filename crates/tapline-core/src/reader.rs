//! Card reader model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DiscoveryMethod, LocationId, ReaderId, Result, error::Error};

/// Connection lifecycle of a reader as seen by one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderConnectionState {
    /// Reported by discovery, no session yet.
    Discovered,

    /// Connect call outstanding.
    Connecting,

    /// Session established for a location.
    Connected,

    /// Session ended or lost.
    Disconnected,
}

impl fmt::Display for ReaderConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReaderConnectionState::Discovered => "Discovered",
            ReaderConnectionState::Connecting => "Connecting",
            ReaderConnectionState::Connected => "Connected",
            ReaderConnectionState::Disconnected => "Disconnected",
        };
        write!(f, "{}", s)
    }
}

impl ReaderConnectionState {
    /// Check if the reader may move to `target`.
    ///
    /// A failed connect attempt returns the reader to `Discovered` so the
    /// same reader can be retried.
    pub fn can_transition_to(&self, target: &ReaderConnectionState) -> bool {
        use ReaderConnectionState::*;
        matches!(
            (self, target),
            (Discovered, Connecting)
                | (Connecting, Connected | Discovered | Disconnected)
                | (Connected, Disconnected)
        )
    }
}

/// A card-acceptance device reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reader {
    pub id: ReaderId,

    /// Human readable label, if the SDK reports one.
    pub label: Option<String>,

    /// Discovery method that found the reader.
    pub discovery_method: DiscoveryMethod,

    /// Whether this is a simulated reader.
    pub simulated: bool,

    pub connection_state: ReaderConnectionState,

    /// Location the reader is registered to once connected.
    pub location: Option<LocationId>,
}

impl Reader {
    /// Create a freshly discovered reader.
    pub fn discovered(id: ReaderId, discovery_method: DiscoveryMethod) -> Self {
        Self {
            id,
            label: None,
            discovery_method,
            simulated: false,
            connection_state: ReaderConnectionState::Discovered,
            location: None,
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the reader as simulated.
    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// Move the reader to a new connection state.
    ///
    /// # Errors
    /// Returns `Error::InvalidReaderTransition` for moves the lifecycle does
    /// not allow.
    pub fn transition_to(&mut self, target: ReaderConnectionState) -> Result<()> {
        if !self.connection_state.can_transition_to(&target) {
            return Err(Error::InvalidReaderTransition {
                from: self.connection_state.to_string(),
                to: target.to_string(),
            });
        }
        self.connection_state = target;
        if target != ReaderConnectionState::Connected {
            self.location = None;
        }
        Ok(())
    }

    /// Mark the reader as connected at `location`.
    ///
    /// # Errors
    /// Returns `Error::InvalidReaderTransition` unless the reader is `Connecting`.
    pub fn mark_connected(&mut self, location: LocationId) -> Result<()> {
        self.transition_to(ReaderConnectionState::Connected)?;
        self.location = Some(location);
        Ok(())
    }

    pub fn is_discovered(&self) -> bool {
        self.connection_state == ReaderConnectionState::Discovered
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ReaderConnectionState::Connected
    }
}
