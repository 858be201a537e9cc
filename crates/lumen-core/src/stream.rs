// ── Reactive resource streams ──
//
// Subscription type for consuming per-type changes from the store.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{Resource, ResourceType};

type Snapshot = Arc<Vec<Arc<Resource>>>;

/// A subscription to every resource of one type.
///
/// Gives point-in-time snapshot access plus change notification via
/// `changed()` or by converting into a `Stream`.
pub struct ResourceStream {
    rtype: ResourceType,
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl ResourceStream {
    pub(crate) fn new(rtype: ResourceType, receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self {
            rtype,
            current,
            receiver,
        }
    }

    pub fn rtype(&self) -> ResourceType {
        self.rtype
    }

    /// The snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// The latest snapshot.
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> ResourceWatchStream {
        ResourceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a fresh snapshot per mutation.
pub struct ResourceWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for ResourceWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::model::ResourceType;
    use crate::store::ResourceStore;
    use futures_util::StreamExt;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn changed_returns_new_snapshot() {
        let store = ResourceStore::new();
        let mut stream = store.subscribe_type(ResourceType::Zone).unwrap();

        store
            .set_resource(&json!({ "id": Uuid::new_v4(), "type": "zone" }))
            .unwrap();

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_yields_initial_snapshot() {
        let store = ResourceStore::new();
        let stream = store.subscribe_type(ResourceType::Zone).unwrap();
        let mut s = stream.into_stream();
        let first = s.next().await.unwrap();
        assert!(first.is_empty());
    }
}
