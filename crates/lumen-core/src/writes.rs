// ── Per-resource write throttle ──
//
// Each written resource gets a slot that buffers pending fields. A write
// goes out immediately when the slot is idle and outside the throttle
// window; otherwise the fields are merged into the buffer and a single
// delayed flush sends them once the window (or the in-flight write) ends.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::model::ResourceKey;
use crate::model::resource::deep_merge;

/// What happened to a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Sent to the bridge and acknowledged.
    Sent,
    /// Buffered; a later flush will send it.
    Deferred,
    /// The target lacks a required capability; nothing was sent.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SlotState {
    #[default]
    Clean,
    Dirty,
    InFlight,
}

#[derive(Debug, Default)]
pub(crate) struct WriteSlot {
    state: SlotState,
    pending: Map<String, Value>,
    last_success: Option<Instant>,
    flush_scheduled: bool,
}

/// Next step for a slot.
#[derive(Debug, PartialEq)]
pub(crate) enum Decision {
    /// Send this body now; the slot is in flight until `finish`.
    Send(Map<String, Value>),
    /// Flush after this delay. Returned once per pending batch.
    Schedule(Duration),
    /// Nothing to do right now.
    Wait,
}

pub(crate) struct WriteThrottle {
    window: Duration,
    slots: Mutex<HashMap<ResourceKey, WriteSlot>>,
}

impl WriteThrottle {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ResourceKey, WriteSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge `patch` into the slot's buffer and decide what to do.
    pub(crate) fn submit(&self, key: ResourceKey, patch: &Map<String, Value>) -> Decision {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_default();
        for (field, value) in patch {
            deep_merge(slot.pending.entry(field.clone()).or_insert(Value::Null), value);
        }
        if slot.state == SlotState::Clean {
            slot.state = SlotState::Dirty;
        }
        self.decide(slot)
    }

    /// A scheduled flush fired.
    pub(crate) fn flush(&self, key: ResourceKey) -> Decision {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&key) else {
            return Decision::Wait;
        };
        slot.flush_scheduled = false;
        self.decide(slot)
    }

    /// The in-flight write for `key` completed.
    pub(crate) fn finish(&self, key: ResourceKey, success: bool) -> Decision {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&key) else {
            return Decision::Wait;
        };
        if success {
            slot.last_success = Some(Instant::now());
        }
        slot.state = if slot.pending.is_empty() {
            SlotState::Clean
        } else {
            SlotState::Dirty
        };
        match self.decide(slot) {
            // Never chain a send straight off a completion; go through a flush.
            Decision::Send(body) => {
                slot.pending = body;
                slot.state = SlotState::Dirty;
                if slot.flush_scheduled {
                    Decision::Wait
                } else {
                    slot.flush_scheduled = true;
                    Decision::Schedule(Duration::ZERO)
                }
            }
            other => other,
        }
    }

    /// Forget a resource, e.g. after it was deleted.
    pub(crate) fn forget(&self, key: &ResourceKey) {
        self.slots().remove(key);
    }

    #[cfg(test)]
    fn state(&self, key: &ResourceKey) -> Option<SlotState> {
        self.slots().get(key).map(|s| s.state)
    }

    fn decide(&self, slot: &mut WriteSlot) -> Decision {
        if slot.pending.is_empty() || slot.state == SlotState::InFlight {
            return Decision::Wait;
        }

        if let Some(last) = slot.last_success {
            let elapsed = last.elapsed();
            if elapsed < self.window {
                if slot.flush_scheduled {
                    return Decision::Wait;
                }
                slot.flush_scheduled = true;
                return Decision::Schedule(self.window - elapsed);
            }
        }

        slot.state = SlotState::InFlight;
        Decision::Send(std::mem::take(&mut slot.pending))
    }
}
