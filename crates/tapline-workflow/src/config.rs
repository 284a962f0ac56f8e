use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapline_core::{Currency, DiscoveryMethod, LocationId};
use tapline_terminal::DiscoveryConfig;

/// Default time to wait for discovery to report a reader.
pub const DEFAULT_READER_WAIT_TIMEOUT_SECS: u64 = 30;

/// Payment workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Currency charged by `create_intent`
    pub currency: Currency,

    /// Transport used to look for readers
    pub discovery_method: DiscoveryMethod,

    /// Discover simulated readers instead of real hardware
    pub simulated: bool,

    /// Terminal location to connect readers to. Resolved from the location
    /// services when absent.
    pub location_id: Option<LocationId>,

    /// How long `wait_for_reader` waits for a candidate, in seconds
    pub reader_wait_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            currency: Currency::Usd,
            discovery_method: DiscoveryMethod::LocalMobile,
            simulated: false,
            location_id: None,
            reader_wait_timeout_secs: DEFAULT_READER_WAIT_TIMEOUT_SECS,
        }
    }
}

impl WorkflowConfig {
    /// Create a configuration for simulated local-mobile readers
    pub fn simulated() -> Self {
        Self {
            simulated: true,
            ..Default::default()
        }
    }

    /// Set the charge currency
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Set the discovery method
    pub fn discovery_method(mut self, method: DiscoveryMethod) -> Self {
        self.discovery_method = method;
        self
    }

    /// Set whether discovery reports simulated readers
    pub fn with_simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    /// Set the terminal location
    pub fn location_id(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    /// Set the reader wait timeout
    pub fn reader_wait_timeout(mut self, timeout: Duration) -> Self {
        self.reader_wait_timeout_secs = timeout.as_secs();
        self
    }

    pub fn reader_wait_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.reader_wait_timeout_secs)
    }

    /// Discovery parameters handed to the terminal
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::new(self.discovery_method, self.simulated)
    }
}
