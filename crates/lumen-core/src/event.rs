// ── Registry change notifications ──

use serde::Serialize;

use crate::error::ErrorReport;
use crate::model::{Capability, ResourceKey};

/// Everything the registry tells its subscribers.
///
/// Delivered through a `broadcast` channel; slow subscribers observe
/// `RecvError::Lagged` rather than blocking the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    Created {
        key: ResourceKey,
    },
    /// At least one top-level field changed value.
    Updated {
        key: ResourceKey,
        fields: Vec<String>,
    },
    Deleted {
        key: ResourceKey,
    },
    /// A setter asked for something this resource cannot do; nothing was sent.
    UnsupportedCapability {
        key: ResourceKey,
        capability: Capability,
    },
    Error {
        errors: Vec<ErrorReport>,
    },
    StreamConnected,
    StreamDisconnected {
        reason: String,
    },
}

impl RegistryEvent {
    /// The resource this event is about, if any.
    pub fn key(&self) -> Option<&ResourceKey> {
        match self {
            Self::Created { key }
            | Self::Updated { key, .. }
            | Self::Deleted { key }
            | Self::UnsupportedCapability { key, .. } => Some(key),
            Self::Error { .. } | Self::StreamConnected | Self::StreamDisconnected { .. } => None,
        }
    }
}
