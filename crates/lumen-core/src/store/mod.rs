// ── Resource store ──
//
// The registry's identity map: one collection per resource type, one
// instance per (type, id). Snapshot refreshes and event-stream batches
// both funnel into the same synchronous upsert/sweep path, serialized by
// `apply_lock` so neither can interleave with the other.

mod collection;
mod refresh;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use self::collection::ResourceCollection;
use crate::error::CoreError;
use crate::event::RegistryEvent;
use crate::model::resource::split_payload;
use crate::model::{Resource, ResourceKey, ResourceType};
use crate::stream::ResourceStream;

pub use refresh::SnapshotStats;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Result of one `set_resource` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Created(ResourceKey),
    Updated(ResourceKey, Vec<String>),
    /// Identical re-delivery; no event was emitted.
    Unchanged(ResourceKey),
}

impl Upsert {
    pub fn key(&self) -> ResourceKey {
        match self {
            Self::Created(k) | Self::Updated(k, _) | Self::Unchanged(k) => *k,
        }
    }
}

/// In-memory mirror of the bridge's resource graph.
pub struct ResourceStore {
    collections: HashMap<ResourceType, ResourceCollection>,
    events: broadcast::Sender<RegistryEvent>,
    apply_lock: Mutex<()>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            collections: ResourceType::iter()
                .map(|t| (t, ResourceCollection::new()))
                .collect(),
            events,
            apply_lock: Mutex::new(()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.collection(key.rtype)?.get(&key.id)
    }

    /// Snapshot of every resource of one type, ordered by id.
    pub fn by_type(&self, rtype: ResourceType) -> Arc<Vec<Arc<Resource>>> {
        self.collection(rtype)
            .map(ResourceCollection::snapshot)
            .unwrap_or_default()
    }

    /// Every resource, grouped by type in declaration order.
    pub fn all(&self) -> Vec<Arc<Resource>> {
        ResourceType::iter()
            .flat_map(|t| self.by_type(t).iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(ResourceCollection::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-type change counter; bumps on every visible mutation.
    pub fn version(&self, rtype: ResourceType) -> u64 {
        self.collection(rtype).map_or(0, ResourceCollection::version)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_type(&self, rtype: ResourceType) -> Option<ResourceStream> {
        self.collection(rtype)
            .map(|c| ResourceStream::new(rtype, c.subscribe()))
    }

    pub(crate) fn emit(&self, event: RegistryEvent) {
        trace!(?event, "registry event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Idempotent upsert of one full or partial payload.
    ///
    /// Unseen identities are built through the closed type factory and
    /// announced as `Created`; known ones are deep-merged and announced as
    /// `Updated` only when some field actually changed.
    pub fn set_resource(&self, payload: &Value) -> Result<Upsert, CoreError> {
        let _guard = self.lock();
        self.upsert_locked(payload)
    }

    /// Remove one resource and announce it. Used for explicit deletes.
    pub fn remove(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        let _guard = self.lock();
        self.remove_locked(key)
    }

    /// Apply one decoded event-stream container.
    ///
    /// `add`/`update` upsert; `delete` marks the referenced resources and
    /// sweeps exactly that set. Stream events are trusted: no refetch.
    pub fn apply_event(&self, container: &lumen_api::EventContainer) {
        use lumen_api::EventKind;

        let _guard = self.lock();
        match container.kind {
            EventKind::Add | EventKind::Update => {
                for payload in &container.data {
                    self.upsert_logged(payload);
                }
            }
            EventKind::Delete => {
                let mut marked = Vec::new();
                for payload in &container.data {
                    match split_payload(payload) {
                        Ok((key, _)) => {
                            if self
                                .collection(key.rtype)
                                .is_some_and(|c| c.set_mark(&key.id, false))
                            {
                                marked.push(key);
                            }
                        }
                        Err(e) => debug!(error = %e, "Ignoring delete for unreadable payload"),
                    }
                }
                for key in marked {
                    self.remove_locked(&key);
                }
            }
            EventKind::Error => {
                debug!(data = ?container.data, "Bridge reported an event-stream error entry");
            }
            EventKind::Unknown => {
                trace!("Ignoring event of unknown kind");
            }
        }
    }

    // ── Locked internals ─────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.apply_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn collection(&self, rtype: ResourceType) -> Option<&ResourceCollection> {
        self.collections.get(&rtype)
    }

    fn upsert_logged(&self, payload: &Value) -> Option<Upsert> {
        match self.upsert_locked(payload) {
            Ok(u) => Some(u),
            Err(CoreError::UnsupportedResourceType(t)) => {
                debug!(rtype = %t, "Skipping resource of unknown type");
                None
            }
            Err(e) => {
                debug!(error = %e, "Skipping unreadable resource payload");
                None
            }
        }
    }

    fn upsert_locked(&self, payload: &Value) -> Result<Upsert, CoreError> {
        let (key, fields) = split_payload(payload)?;
        let collection = self
            .collection(key.rtype)
            .ok_or_else(|| CoreError::UnsupportedResourceType(key.rtype.to_string()))?;

        let Some(existing) = collection.get(&key.id) else {
            collection.upsert(Resource::new(key, fields));
            self.emit(RegistryEvent::Created { key });
            return Ok(Upsert::Created(key));
        };

        let mut updated = (*existing).clone();
        let changed = updated.apply(&fields);
        if changed.is_empty() {
            collection.set_mark(&key.id, true);
            return Ok(Upsert::Unchanged(key));
        }

        updated.set_exists(true);
        collection.upsert(updated);
        self.emit(RegistryEvent::Updated {
            key,
            fields: changed.clone(),
        });
        Ok(Upsert::Updated(key, changed))
    }

    fn remove_locked(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        let removed = self.collection(key.rtype)?.remove(&key.id)?;
        self.emit(RegistryEvent::Deleted { key: *key });
        Some(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn drain(rx: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[test]
    fn identical_payload_twice_emits_once() {
        let store = ResourceStore::new();
        let mut rx = store.subscribe();
        let payload = json!({ "id": Uuid::new_v4(), "type": "light", "on": { "on": true } });

        let first = store.set_resource(&payload).unwrap();
        let second = store.set_resource(&payload).unwrap();

        assert!(matches!(first, Upsert::Created(_)));
        assert!(matches!(second, Upsert::Unchanged(_)));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RegistryEvent::Created { .. }));
    }

    #[test]
    fn changed_field_emits_update_with_field_names() {
        let store = ResourceStore::new();
        let id = Uuid::new_v4();
        store
            .set_resource(&json!({ "id": id, "type": "light", "on": { "on": true } }))
            .unwrap();
        let mut rx = store.subscribe();

        store
            .set_resource(&json!({ "id": id, "type": "light", "on": { "on": false } }))
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![RegistryEvent::Updated {
                key: ResourceKey::new(ResourceType::Light, id),
                fields: vec!["on".into()],
            }]
        );
    }

    #[test]
    fn delete_event_removes_referenced_resource() {
        let store = ResourceStore::new();
        let id = Uuid::new_v4();
        store
            .set_resource(&json!({ "id": id, "type": "motion" }))
            .unwrap();
        let mut rx = store.subscribe();

        let container: lumen_api::EventContainer = serde_json::from_value(json!({
            "type": "delete",
            "data": [{ "id": id, "type": "motion" }]
        }))
        .unwrap();
        store.apply_event(&container);

        let key = ResourceKey::new(ResourceType::Motion, id);
        assert!(store.get(&key).is_none());
        assert_eq!(drain(&mut rx), vec![RegistryEvent::Deleted { key }]);
    }

    #[test]
    fn unknown_types_are_skipped_by_events() {
        let store = ResourceStore::new();
        let container: lumen_api::EventContainer = serde_json::from_value(json!({
            "type": "add",
            "data": [
                { "id": Uuid::new_v4(), "type": "hologram" },
                { "id": Uuid::new_v4(), "type": "light" }
            ]
        }))
        .unwrap();
        store.apply_event(&container);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn type_stream_sees_updates() {
        let store = ResourceStore::new();
        let stream = store.subscribe_type(ResourceType::Scene).unwrap();
        assert!(stream.current().is_empty());

        store
            .set_resource(&json!({ "id": Uuid::new_v4(), "type": "scene" }))
            .unwrap();
        assert_eq!(stream.latest().len(), 1);
        assert_eq!(store.version(ResourceType::Scene), 1);
    }
}
