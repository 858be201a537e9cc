// ── Domain model ──
//
// Resource identity and kinds, device classification, light commands,
// the entertainment configuration view, and colour helpers.

pub mod color;
pub mod device;
pub mod entertainment;
pub mod light;
pub mod resource;
pub mod resource_type;

pub use color::{Gamut, Rgb, Xy};
pub use device::{Capability, DeviceClass};
pub use entertainment::{
    Channel, ChannelMember, ConfigurationType, EntertainmentConfiguration, Position, StreamProxy,
    StreamStatus,
};
pub use light::LightCommand;
pub use resource::{Resource, ResourceCore, ResourceKind};
pub use resource_type::{ResourceKey, ResourceType};
