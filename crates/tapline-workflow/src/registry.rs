//! Exclusive ownership of the physical reader connection.
//!
//! A phone has one NFC antenna, so only one workflow may hold a reader
//! session at a time. Workflows that share a [`ReaderRegistry`] acquire a
//! [`ReaderLease`] before connecting; the lease is released when dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tapline_core::ReaderId;
use tracing::debug;

use crate::error::{Result, WorkflowError};

/// Shared registry of the single live reader connection.
#[derive(Debug, Clone, Default)]
pub struct ReaderRegistry {
    held: Arc<Mutex<Option<ReaderId>>>,
}

fn lock(held: &Mutex<Option<ReaderId>>) -> MutexGuard<'_, Option<ReaderId>> {
    held.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the connection for `reader_id`.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::ReaderConnectionHeld` if any reader, including
    /// `reader_id` itself, is already held.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapline_core::ReaderId;
    /// use tapline_workflow::ReaderRegistry;
    ///
    /// let registry = ReaderRegistry::new();
    /// let lease = registry.acquire(ReaderId::new("SIM-1").unwrap()).unwrap();
    /// assert!(registry.acquire(ReaderId::new("SIM-2").unwrap()).is_err());
    ///
    /// drop(lease);
    /// assert!(registry.holder().is_none());
    /// ```
    pub fn acquire(&self, reader_id: ReaderId) -> Result<ReaderLease> {
        let mut held = lock(&self.held);
        if let Some(current) = held.as_ref() {
            return Err(WorkflowError::ReaderConnectionHeld {
                held: current.clone(),
            });
        }

        debug!(reader_id = %reader_id, "Reader connection acquired");
        *held = Some(reader_id.clone());
        Ok(ReaderLease {
            registry: self.clone(),
            reader_id,
        })
    }

    /// Reader currently holding the connection.
    pub fn holder(&self) -> Option<ReaderId> {
        lock(&self.held).clone()
    }
}

/// Exclusive claim on the reader connection.
#[derive(Debug)]
pub struct ReaderLease {
    registry: ReaderRegistry,
    reader_id: ReaderId,
}

impl ReaderLease {
    pub fn reader_id(&self) -> &ReaderId {
        &self.reader_id
    }
}

impl Drop for ReaderLease {
    fn drop(&mut self) {
        let mut held = lock(&self.registry.held);
        if held.as_ref() == Some(&self.reader_id) {
            debug!(reader_id = %self.reader_id, "Reader connection released");
            *held = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> ReaderId {
        ReaderId::new(value).unwrap()
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let registry = ReaderRegistry::new();
        let _lease = registry.acquire(id("SIM-1")).unwrap();

        let err = registry.acquire(id("SIM-2")).unwrap_err();
        assert_eq!(err, WorkflowError::ReaderConnectionHeld { held: id("SIM-1") });

        // Reconnecting the same reader also needs an explicit release.
        assert!(registry.acquire(id("SIM-1")).is_err());
    }

    #[test]
    fn test_drop_releases() {
        let registry = ReaderRegistry::new();
        let lease = registry.acquire(id("SIM-1")).unwrap();
        assert_eq!(lease.reader_id(), &id("SIM-1"));
        assert_eq!(registry.holder(), Some(id("SIM-1")));

        drop(lease);
        assert!(registry.holder().is_none());
        assert!(registry.acquire(id("SIM-2")).is_ok());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let registry = ReaderRegistry::new();
        let other = registry.clone();

        let _lease = registry.acquire(id("SIM-1")).unwrap();
        assert_eq!(other.holder(), Some(id("SIM-1")));
        assert!(other.acquire(id("SIM-1")).is_err());
    }
}
