// ── Snapshot subscriptions ──
//
// Subscription handle for consuming registry snapshots as they are
// published.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::RegistrySnapshot;

/// A subscription to published registry snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Arc<RegistrySnapshot>,
    receiver: watch::Receiver<Arc<RegistrySnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<RegistrySnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &Arc<RegistrySnapshot> {
        &self.current
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<RegistrySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication. `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<Arc<RegistrySnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current snapshot.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<RegistrySnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<RegistrySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
