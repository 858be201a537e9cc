// ── Resource type tags and identity ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// The closed set of CLIP v2 resource types.
///
/// Fixed by the bridge API version; payloads whose `type` string is not
/// listed here are skipped by the registry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Device,
    Bridge,
    BridgeHome,
    Room,
    Zone,
    Light,
    GroupedLight,
    Button,
    RelativeRotary,
    Motion,
    CameraMotion,
    Temperature,
    LightLevel,
    Contact,
    Tamper,
    DevicePower,
    DeviceSoftwareUpdate,
    ZigbeeConnectivity,
    ZgpConnectivity,
    ZigbeeDeviceDiscovery,
    WifiConnectivity,
    Entertainment,
    EntertainmentConfiguration,
    Scene,
    SmartScene,
    BehaviorScript,
    BehaviorInstance,
    GeofenceClient,
    Geolocation,
    Homekit,
    Matter,
    MatterFabric,
    Speaker,
    GroupedMotion,
    GroupedLightLevel,
    MotionAreaCandidate,
    ConvenienceAreaMotion,
    SecurityAreaMotion,
    PublicImage,
    AuthV1,
}

impl ResourceType {
    /// Parse a wire `type` string.
    pub fn from_wire(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Types a client may `POST`.
    pub fn is_creatable(self) -> bool {
        matches!(
            self,
            Self::Room
                | Self::Zone
                | Self::Scene
                | Self::SmartScene
                | Self::EntertainmentConfiguration
                | Self::BehaviorInstance
                | Self::GeofenceClient
        )
    }

    /// Types whose payload carries light state (`on`, `dimming`, ...).
    pub fn is_light_like(self) -> bool {
        matches!(self, Self::Light | Self::GroupedLight)
    }
}

/// Registry identity: one live instance per `(type, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub rtype: ResourceType,
    pub id: Uuid,
}

impl ResourceKey {
    pub fn new(rtype: ResourceType, id: Uuid) -> Self {
        Self { rtype, id }
    }

    /// Map a wire reference onto a key; `None` for unknown types.
    pub fn from_ref(r: &lumen_api::ResourceRef) -> Option<Self> {
        ResourceType::from_wire(&r.rtype).map(|rtype| Self { rtype, id: r.rid })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rtype, self.id)
    }
}
