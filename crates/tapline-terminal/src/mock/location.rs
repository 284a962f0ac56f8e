//! Mock location services.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tapline_core::{LocationId, LocationPermission};

use crate::error::{Result, SdkError};
use crate::traits::LocationServices;

#[derive(Debug)]
struct LocationState {
    permission: LocationPermission,
    /// Outcome of the next permission request.
    on_request: LocationPermission,
    location_id: Option<LocationId>,
    settings_available: bool,
    settings_opened: usize,
    permission_requests: usize,
}

/// Mock location services for testing and development.
///
/// Starts with permission `Unknown`, grants it when requested and resolves
/// no location id.
///
/// # Examples
///
/// ```
/// use tapline_core::LocationPermission;
/// use tapline_terminal::LocationServices;
/// use tapline_terminal::mock::MockLocation;
///
/// #[tokio::main]
/// async fn main() {
///     let (location, handle) = MockLocation::new();
///     handle.set_permission(LocationPermission::Denied);
///     assert_eq!(location.permission().await, LocationPermission::Denied);
/// }
/// ```
#[derive(Debug)]
pub struct MockLocation {
    state: Arc<Mutex<LocationState>>,
}

fn lock(state: &Mutex<LocationState>) -> MutexGuard<'_, LocationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockLocation {
    /// Create new mock location services.
    pub fn new() -> (Self, MockLocationHandle) {
        let state = Arc::new(Mutex::new(LocationState {
            permission: LocationPermission::Unknown,
            on_request: LocationPermission::Granted,
            location_id: None,
            settings_available: true,
            settings_opened: 0,
            permission_requests: 0,
        }));

        (
            Self {
                state: state.clone(),
            },
            MockLocationHandle { state },
        )
    }

    /// Create mock location services with permission already granted.
    pub fn granted() -> (Self, MockLocationHandle) {
        let (location, handle) = Self::new();
        handle.set_permission(LocationPermission::Granted);
        (location, handle)
    }
}

impl Default for MockLocation {
    fn default() -> Self {
        Self::new().0
    }
}

impl LocationServices for MockLocation {
    async fn permission(&self) -> LocationPermission {
        lock(&self.state).permission
    }

    async fn request_permission(&self) -> LocationPermission {
        let mut state = lock(&self.state);
        state.permission_requests += 1;
        // The OS only asks once; later requests return the stored decision.
        if state.permission == LocationPermission::Unknown {
            state.permission = state.on_request;
        }
        state.permission
    }

    async fn open_settings(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.settings_available {
            return Err(SdkError::other(
                "settings_unavailable",
                "Unable to open the system settings",
            ));
        }
        state.settings_opened += 1;
        Ok(())
    }

    async fn resolve_location_id(&self) -> Option<LocationId> {
        lock(&self.state).location_id.clone()
    }
}

/// Handle for controlling mock location services.
#[derive(Debug, Clone)]
pub struct MockLocationHandle {
    state: Arc<Mutex<LocationState>>,
}

impl MockLocationHandle {
    /// Set the permission as if the user changed it in the settings.
    pub fn set_permission(&self, permission: LocationPermission) {
        lock(&self.state).permission = permission;
    }

    /// Outcome of the next permission request while permission is `Unknown`.
    pub fn answer_requests_with(&self, permission: LocationPermission) {
        lock(&self.state).on_request = permission;
    }

    /// Location id resolved from the device position.
    pub fn set_location_id(&self, location_id: Option<LocationId>) {
        lock(&self.state).location_id = location_id;
    }

    /// Make `open_settings` fail.
    pub fn set_settings_available(&self, available: bool) {
        lock(&self.state).settings_available = available;
    }

    /// Number of times the settings page was opened.
    pub fn settings_opened(&self) -> usize {
        lock(&self.state).settings_opened
    }

    /// Number of permission requests made.
    pub fn permission_requests(&self) -> usize {
        lock(&self.state).permission_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_grants_unknown_permission() {
        let (location, handle) = MockLocation::new();
        assert_eq!(location.permission().await, LocationPermission::Unknown);

        assert_eq!(
            location.request_permission().await,
            LocationPermission::Granted
        );
        assert_eq!(location.permission().await, LocationPermission::Granted);
        assert_eq!(handle.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_request_keeps_denied_decision() {
        let (location, handle) = MockLocation::new();
        handle.set_permission(LocationPermission::Denied);

        assert_eq!(
            location.request_permission().await,
            LocationPermission::Denied
        );
    }

    #[tokio::test]
    async fn test_open_settings() {
        let (location, handle) = MockLocation::new();
        location.open_settings().await.unwrap();
        assert_eq!(handle.settings_opened(), 1);

        handle.set_settings_available(false);
        assert!(location.open_settings().await.is_err());
        assert_eq!(handle.settings_opened(), 1);
    }

    #[tokio::test]
    async fn test_resolve_location_id() {
        let (location, handle) = MockLocation::granted();
        assert!(location.resolve_location_id().await.is_none());

        let id = LocationId::new("tml_123").unwrap();
        handle.set_location_id(Some(id.clone()));
        assert_eq!(location.resolve_location_id().await, Some(id));
    }
}
