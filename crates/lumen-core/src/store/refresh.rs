// ── Full refresh application logic ──
//
// Mark-and-sweep reconciliation of a REST snapshot against the store.
// Every in-scope resource is marked absent, each snapshot item is upserted
// (which marks it present again), and whatever is still absent afterwards
// is removed. Incremental events can leave orphans behind; this is the
// pass that clears them.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ResourceStore, Upsert};
use crate::model::ResourceType;

/// Counts from one snapshot application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Payloads of unknown type or without a readable identity.
    pub skipped: usize,
}

impl ResourceStore {
    /// Reconcile the store against a snapshot.
    ///
    /// `scope` limits marking and sweeping to the listed types, for
    /// refetches of a single type; `None` reconciles everything.
    pub fn apply_snapshot(&self, items: &[Value], scope: Option<&[ResourceType]>) -> SnapshotStats {
        let _guard = self.lock();
        let in_scope = |t: ResourceType| scope.is_none_or(|s| s.contains(&t));

        for (rtype, collection) in &self.collections {
            if in_scope(*rtype) {
                collection.mark_all();
            }
        }

        let mut stats = SnapshotStats::default();
        for item in items {
            match self.upsert_logged(item) {
                Some(Upsert::Created(_)) => stats.created += 1,
                Some(Upsert::Updated(..)) => stats.updated += 1,
                Some(Upsert::Unchanged(_)) => stats.unchanged += 1,
                None => stats.skipped += 1,
            }
        }

        let mut doomed = Vec::new();
        for (rtype, collection) in &self.collections {
            if in_scope(*rtype) {
                doomed.extend(
                    collection
                        .unmarked()
                        .into_iter()
                        .map(|id| crate::model::ResourceKey::new(*rtype, id)),
                );
            }
        }
        for key in doomed {
            if self.remove_locked(&key).is_some() {
                stats.deleted += 1;
            }
        }

        debug!(?stats, scoped = scope.is_some(), "Snapshot applied");
        stats
    }
}
