// ── Entertainment configuration view ──
//
// Typed read-only view over an `entertainment_configuration` resource.
// Channels and members hold identifiers only; anything they point at is
// resolved through the store on demand.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

use super::resource::Resource;
use super::resource_type::{ResourceKey, ResourceType};
use crate::store::ResourceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationType {
    Screen,
    Monitor,
    Music,
    #[serde(rename = "3dspace")]
    #[strum(serialize = "3dspace")]
    Space3d,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One `{service, index}` member of a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMember {
    pub service: ResourceKey,
    pub index: u32,
}

/// An addressable render target. `channel_id` is the wire address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub channel_id: u8,
    pub position: Position,
    pub members: Vec<ChannelMember>,
}

impl Channel {
    /// Member entertainment service -> owning device -> that device's
    /// light services.
    pub fn light_services(&self, store: &ResourceStore) -> Vec<ResourceKey> {
        let mut lights = Vec::new();
        for member in &self.members {
            let Some(service) = store.get(&member.service) else {
                continue;
            };
            let Some(owner) = service.owner() else {
                continue;
            };
            let Some(device) = store.get(&owner) else {
                continue;
            };
            for key in device.services() {
                if key.rtype == ResourceType::Light && !lights.contains(&key) {
                    lights.push(key);
                }
            }
        }
        lights
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamProxy {
    pub mode: String,
    pub node: Option<ResourceKey>,
}

/// Typed view of an `entertainment_configuration`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntertainmentConfiguration {
    pub id: Uuid,
    pub name: String,
    pub configuration_type: Option<ConfigurationType>,
    pub status: StreamStatus,
    pub stream_proxy: Option<StreamProxy>,
    /// Ordered by channel id.
    pub channels: Vec<Channel>,
}

impl EntertainmentConfiguration {
    pub fn from_resource(resource: &Resource) -> Option<Self> {
        if resource.rtype() != ResourceType::EntertainmentConfiguration {
            return None;
        }

        let configuration_type = resource
            .field("configuration_type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        let status = match resource.field("status").and_then(Value::as_str) {
            Some("active") => StreamStatus::Active,
            _ => StreamStatus::Inactive,
        };

        let stream_proxy = resource.field("stream_proxy").map(|p| StreamProxy {
            mode: p.get("mode").and_then(Value::as_str).unwrap_or("auto").to_owned(),
            node: p
                .get("node")
                .and_then(|n| serde_json::from_value::<lumen_api::ResourceRef>(n.clone()).ok())
                .and_then(|r| ResourceKey::from_ref(&r)),
        });

        let mut channels: Vec<Channel> = resource
            .field("channels")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_channel).collect())
            .unwrap_or_default();
        channels.sort_by_key(|c| c.channel_id);

        Some(Self {
            id: resource.id(),
            name: resource.name().unwrap_or_default().to_owned(),
            configuration_type,
            status,
            stream_proxy,
            channels,
        })
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(ResourceType::EntertainmentConfiguration, self.id)
    }

    pub fn channel_ids(&self) -> Vec<u8> {
        self.channels.iter().map(|c| c.channel_id).collect()
    }
}

/// Channels with an id outside `0..=255` cannot be addressed on the wire
/// and are dropped.
fn parse_channel(v: &Value) -> Option<Channel> {
    let raw_id = v.get("channel_id")?.as_i64()?;
    let Ok(channel_id) = u8::try_from(raw_id) else {
        tracing::debug!(channel_id = raw_id, "Skipping unaddressable channel");
        return None;
    };
    let position = v
        .get("position")
        .and_then(|p| serde_json::from_value(p.clone()).ok())
        .unwrap_or_default();
    let members = v
        .get("members")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|m| {
                    let r: lumen_api::ResourceRef =
                        serde_json::from_value(m.get("service")?.clone()).ok()?;
                    Some(ChannelMember {
                        service: ResourceKey::from_ref(&r)?,
                        index: m
                            .get("index")
                            .and_then(Value::as_u64)
                            .and_then(|i| u32::try_from(i).ok())
                            .unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Channel {
        channel_id,
        position,
        members,
    })
}
