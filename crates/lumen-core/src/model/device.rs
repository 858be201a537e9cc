// ── Device classification and light capabilities ──

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::ResourceType;

/// Secondary classification of the `device` supertype, decided by the
/// services the device exposes. Earlier variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Bridge,
    Light,
    MotionSensor,
    ContactSensor,
    Switch,
    EnvironmentSensor,
    Generic,
}

impl DeviceClass {
    /// Classify from the service types a device references.
    pub fn classify<I>(services: I) -> Self
    where
        I: IntoIterator<Item = ResourceType>,
    {
        let present: BTreeSet<ResourceType> = services.into_iter().collect();
        let has = |t: ResourceType| present.contains(&t);

        if has(ResourceType::Bridge) {
            Self::Bridge
        } else if has(ResourceType::Light) {
            Self::Light
        } else if has(ResourceType::Motion) || has(ResourceType::CameraMotion) {
            Self::MotionSensor
        } else if has(ResourceType::Contact) {
            Self::ContactSensor
        } else if has(ResourceType::Button) || has(ResourceType::RelativeRotary) {
            Self::Switch
        } else if has(ResourceType::Temperature) || has(ResourceType::LightLevel) {
            Self::EnvironmentSensor
        } else {
            Self::Generic
        }
    }
}

/// A light feature a payload may or may not carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OnOff,
    Dimming,
    Color,
    ColorTemperature,
    Gradient,
    Effects,
}

impl Capability {
    /// The payload field that advertises this capability.
    pub fn field(self) -> &'static str {
        match self {
            Self::OnOff => "on",
            Self::Dimming => "dimming",
            Self::Color => "color",
            Self::ColorTemperature => "color_temperature",
            Self::Gradient => "gradient",
            Self::Effects => "effects",
        }
    }

    const ALL: [Capability; 6] = [
        Self::OnOff,
        Self::Dimming,
        Self::Color,
        Self::ColorTemperature,
        Self::Gradient,
        Self::Effects,
    ];
}

/// Capabilities advertised by a light or grouped_light payload.
pub fn capabilities_of(fields: &Map<String, Value>) -> BTreeSet<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|c| fields.get(c.field()).is_some_and(|v| !v.is_null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bridge_service_wins_classification() {
        let class = DeviceClass::classify([ResourceType::Light, ResourceType::Bridge]);
        assert_eq!(class, DeviceClass::Bridge);
    }

    #[test]
    fn sensor_bundle_is_motion_sensor() {
        let class = DeviceClass::classify([
            ResourceType::Temperature,
            ResourceType::LightLevel,
            ResourceType::Motion,
            ResourceType::DevicePower,
        ]);
        assert_eq!(class, DeviceClass::MotionSensor);
    }

    #[test]
    fn dial_switch_and_fallback() {
        assert_eq!(
            DeviceClass::classify([ResourceType::RelativeRotary]),
            DeviceClass::Switch
        );
        assert_eq!(
            DeviceClass::classify([ResourceType::ZigbeeConnectivity]),
            DeviceClass::Generic
        );
    }

    #[test]
    fn capabilities_follow_present_fields() {
        let fields = json!({
            "on": { "on": true },
            "dimming": { "brightness": 50.0 },
            "color_temperature": { "mirek": null },
        });
        let caps = capabilities_of(fields.as_object().unwrap_or(&Map::new()));
        assert!(caps.contains(&Capability::OnOff));
        assert!(caps.contains(&Capability::Dimming));
        assert!(caps.contains(&Capability::ColorTemperature));
        assert!(!caps.contains(&Capability::Color));
    }
}
