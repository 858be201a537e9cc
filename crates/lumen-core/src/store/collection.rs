// ── Per-type reactive resource collection ──
//
// Concurrent storage keyed by resource id, with push-based snapshot
// notification via a `watch` channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::model::Resource;

/// All live resources of one type.
///
/// Every visible mutation bumps the version counter and rebuilds the
/// snapshot that subscribers receive. Flipping the internal `exists`
/// mark does not: it is bookkeeping, not a change.
pub(crate) struct ResourceCollection {
    by_id: DashMap<Uuid, Arc<Resource>>,

    /// Version counter, bumped on every visible mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<Resource>>>>,
}

impl ResourceCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, resource: Resource) -> bool {
        let is_new = self
            .by_id
            .insert(resource.id(), Arc::new(resource))
            .is_none();
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Remove by id. Returns the removed resource if it existed.
    pub(crate) fn remove(&self, id: &Uuid) -> Option<Arc<Resource>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub(crate) fn get(&self, id: &Uuid) -> Option<Arc<Resource>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Set every `exists` flag to `false` without notifying subscribers.
    pub(crate) fn mark_all(&self) {
        for mut entry in self.by_id.iter_mut() {
            if entry.exists() {
                let mut r = (**entry).clone();
                r.set_exists(false);
                *entry = Arc::new(r);
            }
        }
    }

    /// Set one `exists` flag without notifying subscribers.
    pub(crate) fn set_mark(&self, id: &Uuid, exists: bool) -> bool {
        let Some(mut entry) = self.by_id.get_mut(id) else {
            return false;
        };
        if entry.exists() != exists {
            let mut r = (**entry).clone();
            r.set_exists(exists);
            *entry = Arc::new(r);
        }
        true
    }

    /// Ids whose `exists` flag is `false`.
    pub(crate) fn unmarked(&self) -> Vec<Uuid> {
        self.by_id
            .iter()
            .filter(|r| !r.value().exists())
            .map(|r| *r.key())
            .collect()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<Resource>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Resource>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Resource>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|r| r.id());
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ResourceKey, ResourceType};
    use serde_json::Map;

    fn light(id: Uuid) -> Resource {
        Resource::new(ResourceKey::new(ResourceType::Light, id), Map::new())
    }

    #[test]
    fn upsert_reports_new_ids() {
        let col = ResourceCollection::new();
        let id = Uuid::new_v4();
        assert!(col.upsert(light(id)));
        assert!(!col.upsert(light(id)));
        assert_eq!(col.len(), 1);
        assert_eq!(col.version(), 2);
    }

    #[test]
    fn remove_updates_snapshot() {
        let col = ResourceCollection::new();
        let id = Uuid::new_v4();
        col.upsert(light(id));
        assert_eq!(col.snapshot().len(), 1);

        assert!(col.remove(&id).is_some());
        assert!(col.get(&id).is_none());
        assert!(col.snapshot().is_empty());
        assert!(col.remove(&id).is_none());
    }

    #[test]
    fn marking_is_silent() {
        let col = ResourceCollection::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        col.upsert(light(a));
        col.upsert(light(b));
        let version = col.version();

        col.mark_all();
        assert!(col.set_mark(&a, true));
        assert_eq!(col.unmarked(), vec![b]);
        assert_eq!(col.version(), version);
    }
}
