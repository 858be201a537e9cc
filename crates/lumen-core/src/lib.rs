//! Domain layer between `lumen-api` and the `lumen` CLI.
//!
//! - **[`Bridge`]**: facade over one bridge. [`connect()`](Bridge::connect)
//!   loads the full resource snapshot, then follows the push event stream;
//!   a reconnect triggers another full reconciliation. Mutations are
//!   validated before any request is made, and updates pass through a
//!   per-resource write throttle.
//!
//! - **[`ResourceStore`]**: identity map of every mirrored resource, one
//!   `DashMap`-backed collection per [`ResourceType`]. Snapshots are applied
//!   by mark-and-sweep; identical re-deliveries emit nothing.
//!
//! - **[`RegistryEvent`]**: typed change notifications on a broadcast
//!   channel, plus per-type [`ResourceStream`] snapshots.
//!
//! - **[`entertainment`]**: the streaming frame codec, light streams, and
//!   [`EntertainmentSession`], which drives them at a fixed frame rate.
//!
//! - **[`animation`]**: timing and sequence animations with keyframe,
//!   palette and procedural modifiers.

pub mod animation;
pub mod bridge;
pub mod config;
pub mod entertainment;
pub mod error;
pub mod event;
pub mod model;
pub mod store;
pub mod stream;
pub mod validate;
pub mod writes;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, ConnectionState};
pub use config::{BridgeConfig, ReconnectPolicy, TlsVerification};
pub use entertainment::{EntertainmentSession, FrameCallback, LightStream, StreamTarget};
pub use error::{CoreError, ErrorKind, ErrorReport};
pub use event::RegistryEvent;
pub use store::{ResourceStore, SnapshotStats, Upsert};
pub use stream::ResourceStream;
pub use writes::WriteOutcome;

pub use model::{
    Capability, Channel, ConfigurationType, DeviceClass, EntertainmentConfiguration, Gamut,
    LightCommand, Resource, ResourceKey, ResourceKind, ResourceType, Rgb, Xy,
};
