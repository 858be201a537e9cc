// ── Per-entity serialized write queue ──
//
// One lane per key. Jobs in a lane run strictly one after another in
// submission order; different lanes run independently. A job that has
// been enqueued always runs to completion, even after the owner stops
// enqueueing.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::trace;

type Job = BoxFuture<'static, ()>;

/// Serializes asynchronous jobs per key.
pub struct WriteQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    lanes: Arc<DashMap<K, mpsc::UnboundedSender<Job>>>,
}

impl<K> Clone for WriteQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            lanes: Arc::clone(&self.lanes),
        }
    }
}

impl<K> Default for WriteQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> WriteQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self {
            lanes: Arc::new(DashMap::new()),
        }
    }

    /// Append `job` behind whatever is queued or in flight for `key`.
    pub fn enqueue<F>(&self, key: K, job: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut job: Job = Box::pin(job);
        loop {
            let sender = self
                .lanes
                .entry(key.clone())
                .or_insert_with(|| spawn_lane(key.clone()))
                .clone();
            match sender.send(job) {
                Ok(()) => return,
                // The lane worker is gone (runtime shutdown); start a new one.
                Err(mpsc::error::SendError(returned)) => {
                    self.lanes.remove(&key);
                    job = returned;
                }
            }
        }
    }

    /// Number of keys that have a lane.
    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }
}

fn spawn_lane<K>(key: K) -> mpsc::UnboundedSender<Job>
where
    K: Send + std::fmt::Debug + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            job.await;
        }
        trace!(?key, "write lane closed");
    });
    tx
}
