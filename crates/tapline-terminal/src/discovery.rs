//! Reader discovery subscription.
//!
//! This module turns the unbounded stream of reader sets produced by
//! [`PaymentTerminal::discover_readers`](crate::PaymentTerminal::discover_readers)
//! into a single retained candidate: the first still-discovered reader of
//! the most recently reported set.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Vec<Reader>  ┌────────────────┐  Option<Reader>
//! │ SDK discovery│──────────────►│ forwarding task│───────────────► watch
//! │ (mpsc)       │               │ (cancellable)  │                 (last write wins)
//! └──────────────┘               └────────────────┘
//! ```
//!
//! Each subscription owns its own watch channel, so once a subscription is
//! cancelled or replaced nothing it receives can reach the new candidate.
//!
//! # Examples
//!
//! ```
//! use tapline_core::{DiscoveryMethod, Reader, ReaderId};
//! use tapline_terminal::discovery::{DiscoverySubscription, ReaderUpdates};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (feed, updates) = ReaderUpdates::channel(8);
//!     let subscription = DiscoverySubscription::spawn(updates);
//!
//!     let reader = Reader::discovered(ReaderId::new("SIM-1").unwrap(), DiscoveryMethod::LocalMobile);
//!     feed.report(vec![reader]).await.unwrap();
//!
//!     let candidate = subscription.watch().wait_for(|c| c.is_some()).await.unwrap().clone();
//!     assert_eq!(candidate.unwrap().id.as_str(), "SIM-1");
//! }
//! ```

use tapline_core::Reader;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Result, SdkError};

/// Stream of reader sets reported by an active discovery.
#[derive(Debug)]
pub struct ReaderUpdates {
    rx: mpsc::Receiver<Vec<Reader>>,
}

impl ReaderUpdates {
    /// Create a feed/stream pair.
    ///
    /// Terminal implementations keep the [`DiscoveryFeed`] and hand the
    /// [`ReaderUpdates`] to the caller.
    pub fn channel(capacity: usize) -> (DiscoveryFeed, ReaderUpdates) {
        let (tx, rx) = mpsc::channel(capacity);
        (DiscoveryFeed { tx }, ReaderUpdates { rx })
    }

    /// Wait for the next reader set.
    ///
    /// Returns `None` once the SDK stops discovery.
    pub async fn next(&mut self) -> Option<Vec<Reader>> {
        self.rx.recv().await
    }
}

/// Sending side of a discovery, held by the terminal implementation.
#[derive(Debug, Clone)]
pub struct DiscoveryFeed {
    tx: mpsc::Sender<Vec<Reader>>,
}

impl DiscoveryFeed {
    /// Report the current set of readers.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber has gone away.
    pub async fn report(&self, readers: Vec<Reader>) -> Result<()> {
        self.tx
            .send(readers)
            .await
            .map_err(|_| SdkError::canceled("Reader discovery is no longer active"))
    }

    /// Check whether the subscriber has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Active discovery retaining the latest first candidate.
///
/// Dropping the subscription cancels the forwarding task, which drops the
/// [`ReaderUpdates`] and lets the SDK stop its radio.
#[derive(Debug)]
pub struct DiscoverySubscription {
    candidate: watch::Receiver<Option<Reader>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DiscoverySubscription {
    /// Start forwarding `updates` into a fresh candidate slot.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(updates: ReaderUpdates) -> Self {
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward_updates(updates, tx, cancel.clone()));

        Self {
            candidate: rx,
            cancel,
            task,
        }
    }

    /// The first reader of the latest reported set, if any.
    pub fn candidate(&self) -> Option<Reader> {
        self.candidate.borrow().clone()
    }

    /// A receiver for awaiting candidate changes.
    pub fn watch(&self) -> watch::Receiver<Option<Reader>> {
        self.candidate.clone()
    }

    /// Stop listening. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether updates are still being forwarded.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for DiscoverySubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn forward_updates(
    mut updates: ReaderUpdates,
    candidate: watch::Sender<Option<Reader>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Reader discovery cancelled");
                break;
            }
            update = updates.next() => match update {
                Some(readers) => {
                    trace!(count = readers.len(), "Discovery reported readers");
                    let first = readers.into_iter().find(|reader| {
                        let usable = reader.is_discovered();
                        if !usable {
                            debug!(
                                reader_id = %reader.id,
                                state = %reader.connection_state,
                                "Skipping reader that is not available to connect"
                            );
                        }
                        usable
                    });
                    candidate.send_replace(first);
                }
                None => {
                    debug!("Reader discovery ended by terminal");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tapline_core::{DiscoveryMethod, ReaderConnectionState, ReaderId};

    fn reader(id: &str) -> Reader {
        Reader::discovered(ReaderId::new(id).unwrap(), DiscoveryMethod::LocalMobile)
    }

    async fn wait_for_id(subscription: &DiscoverySubscription, id: &str) {
        let mut rx = subscription.watch();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|c| c.as_ref().is_some_and(|r| r.id.as_str() == id)),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_last_reported_set_wins() {
        let (feed, updates) = ReaderUpdates::channel(8);
        let subscription = DiscoverySubscription::spawn(updates);
        assert!(subscription.candidate().is_none());

        feed.report(vec![reader("A"), reader("B")]).await.unwrap();
        wait_for_id(&subscription, "A").await;

        feed.report(vec![reader("C")]).await.unwrap();
        wait_for_id(&subscription, "C").await;
        assert_eq!(subscription.candidate().unwrap().id.as_str(), "C");
    }

    #[tokio::test]
    async fn test_readers_not_discovered_are_skipped() {
        let (feed, updates) = ReaderUpdates::channel(8);
        let subscription = DiscoverySubscription::spawn(updates);

        let mut busy = reader("A");
        busy.connection_state = ReaderConnectionState::Connected;
        feed.report(vec![busy.clone(), reader("B")]).await.unwrap();
        wait_for_id(&subscription, "B").await;

        feed.report(vec![busy]).await.unwrap();
        let mut rx = subscription.watch();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|c| c.is_none()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_set_clears_candidate() {
        let (feed, updates) = ReaderUpdates::channel(8);
        let subscription = DiscoverySubscription::spawn(updates);

        feed.report(vec![reader("A")]).await.unwrap();
        wait_for_id(&subscription, "A").await;

        feed.report(vec![]).await.unwrap();
        let mut rx = subscription.watch();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|c| c.is_none()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_forwarding() {
        let (feed, updates) = ReaderUpdates::channel(8);
        let subscription = DiscoverySubscription::spawn(updates);

        feed.report(vec![reader("A")]).await.unwrap();
        wait_for_id(&subscription, "A").await;

        subscription.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !feed.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(!subscription.is_active());
        assert!(feed.report(vec![reader("B")]).await.is_err());
        assert_eq!(subscription.candidate().unwrap().id.as_str(), "A");
    }

    #[tokio::test]
    async fn test_drop_closes_feed() {
        let (feed, updates) = ReaderUpdates::channel(8);
        let subscription = DiscoverySubscription::spawn(updates);
        drop(subscription);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !feed.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
