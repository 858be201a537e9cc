// ── Resource entity ──
//
// A resource is a small typed core (`id`, `type`, `exists`), a kind
// decided once per payload by a closed factory, and the raw field map.
// Updates deep-merge into the field map and report which top-level
// fields actually changed.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::color::{Gamut, mirek_to_kelvin};
use super::device::{Capability, DeviceClass, capabilities_of};
use super::resource_type::{ResourceKey, ResourceType};
use crate::error::CoreError;

/// Identity plus the existence flag used by mark-and-sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceCore {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub rtype: ResourceType,
    pub exists: bool,
}

/// What a resource is, beyond its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    Device { class: DeviceClass },
    Light { capabilities: BTreeSet<Capability> },
    GroupedLight { capabilities: BTreeSet<Capability> },
    EntertainmentConfiguration,
    Group,
    Sensor,
    Service,
}

impl ResourceKind {
    /// Closed type -> kind factory. `device` gets a second pass over its
    /// service references.
    pub fn classify(rtype: ResourceType, fields: &Map<String, Value>) -> Self {
        match rtype {
            ResourceType::Device => Self::Device {
                class: DeviceClass::classify(
                    refs_in(fields.get("services")).into_iter().map(|k| k.rtype),
                ),
            },
            ResourceType::Light => Self::Light {
                capabilities: capabilities_of(fields),
            },
            ResourceType::GroupedLight => Self::GroupedLight {
                capabilities: capabilities_of(fields),
            },
            ResourceType::EntertainmentConfiguration => Self::EntertainmentConfiguration,
            ResourceType::Room | ResourceType::Zone | ResourceType::BridgeHome => Self::Group,
            ResourceType::Button
            | ResourceType::RelativeRotary
            | ResourceType::Motion
            | ResourceType::CameraMotion
            | ResourceType::Temperature
            | ResourceType::LightLevel
            | ResourceType::Contact
            | ResourceType::Tamper
            | ResourceType::GroupedMotion
            | ResourceType::GroupedLightLevel
            | ResourceType::ConvenienceAreaMotion
            | ResourceType::SecurityAreaMotion => Self::Sensor,
            ResourceType::Bridge
            | ResourceType::DevicePower
            | ResourceType::DeviceSoftwareUpdate
            | ResourceType::ZigbeeConnectivity
            | ResourceType::ZgpConnectivity
            | ResourceType::ZigbeeDeviceDiscovery
            | ResourceType::WifiConnectivity
            | ResourceType::Entertainment
            | ResourceType::Scene
            | ResourceType::SmartScene
            | ResourceType::BehaviorScript
            | ResourceType::BehaviorInstance
            | ResourceType::GeofenceClient
            | ResourceType::Geolocation
            | ResourceType::Homekit
            | ResourceType::Matter
            | ResourceType::MatterFabric
            | ResourceType::Speaker
            | ResourceType::MotionAreaCandidate
            | ResourceType::PublicImage
            | ResourceType::AuthV1 => Self::Service,
        }
    }
}

/// A mirrored bridge resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(flatten)]
    core: ResourceCore,
    #[serde(flatten)]
    kind: ResourceKind,
    fields: Map<String, Value>,
}

impl Resource {
    /// Build from a full or partial payload carrying `id` and `type`.
    pub fn from_payload(payload: &Value) -> Result<Self, CoreError> {
        let (key, fields) = split_payload(payload)?;
        Ok(Self::new(key, fields))
    }

    pub fn new(key: ResourceKey, fields: Map<String, Value>) -> Self {
        let kind = ResourceKind::classify(key.rtype, &fields);
        Self {
            core: ResourceCore {
                id: key.id,
                rtype: key.rtype,
                exists: true,
            },
            kind,
            fields,
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn rtype(&self) -> ResourceType {
        self.core.rtype
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.core.rtype, self.core.id)
    }

    pub fn core(&self) -> &ResourceCore {
        &self.core
    }

    pub fn exists(&self) -> bool {
        self.core.exists
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.core.exists = exists;
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    // ── Fields ───────────────────────────────────────────────────────

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// `metadata.name`, when the type has one.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("metadata")?.get("name")?.as_str()
    }

    /// The owning resource (`owner` reference).
    pub fn owner(&self) -> Option<ResourceKey> {
        ref_in(self.fields.get("owner")?)
    }

    /// Keys listed under `services`.
    pub fn services(&self) -> Vec<ResourceKey> {
        refs_in(self.fields.get("services"))
    }

    /// Keys listed under `children`.
    pub fn children(&self) -> Vec<ResourceKey> {
        refs_in(self.fields.get("children"))
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        match &self.kind {
            ResourceKind::Light { capabilities } | ResourceKind::GroupedLight { capabilities } => {
                capabilities.clone()
            }
            _ => BTreeSet::new(),
        }
    }

    /// Reachable colour triangle: explicit `color.gamut` points, else the
    /// `color.gamut_type` letter.
    pub fn gamut(&self) -> Option<Gamut> {
        let color = self.fields.get("color")?;
        color
            .get("gamut")
            .and_then(|g| serde_json::from_value(g.clone()).ok())
            .or_else(|| color.get("gamut_type")?.as_str().and_then(Gamut::from_type))
    }

    /// Current `color_temperature.mirek`, in kelvin.
    pub fn color_temperature_kelvin(&self) -> Option<u32> {
        let mirek = self.fields.get("color_temperature")?.get("mirek")?.as_u64()?;
        u16::try_from(mirek).ok().map(mirek_to_kelvin)
    }

    /// Full JSON form (`id` and `type` included).
    pub fn to_json(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("id".into(), Value::String(self.core.id.to_string()));
        obj.insert("type".into(), Value::String(self.core.rtype.to_string()));
        Value::Object(obj)
    }

    // ── Diff ─────────────────────────────────────────────────────────

    /// Deep-merge `patch` into the field map.
    ///
    /// Returns the top-level fields whose value differs afterwards; an
    /// empty list means the patch was a no-op re-delivery.
    pub fn apply(&mut self, patch: &Map<String, Value>) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, incoming) in patch {
            if name == "id" || name == "type" {
                continue;
            }
            let slot = self.fields.entry(name.clone()).or_insert(Value::Null);
            let before = slot.clone();
            deep_merge(slot, incoming);
            if *slot != before {
                changed.push(name.clone());
            }
        }
        if !changed.is_empty() {
            self.kind = ResourceKind::classify(self.core.rtype, &self.fields);
        }
        changed
    }
}

/// Recursively merge `patch` into `target`. Objects merge key by key;
/// every other value (arrays included) replaces.
pub(crate) fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                deep_merge(dst.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

/// Pull `(type, id)` and the remaining fields out of a payload.
pub(crate) fn split_payload(payload: &Value) -> Result<(ResourceKey, Map<String, Value>), CoreError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| CoreError::validation("resource payload is not an object"))?;
    let rtype_str = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation("resource payload has no type"))?;
    let rtype = ResourceType::from_wire(rtype_str)
        .ok_or_else(|| CoreError::UnsupportedResourceType(rtype_str.to_owned()))?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| CoreError::validation("resource payload has no valid id"))?;

    let fields = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "type")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok((ResourceKey::new(rtype, id), fields))
}

fn ref_in(v: &Value) -> Option<ResourceKey> {
    let r: lumen_api::ResourceRef = serde_json::from_value(v.clone()).ok()?;
    ResourceKey::from_ref(&r)
}

pub(crate) fn refs_in(v: Option<&Value>) -> Vec<ResourceKey> {
    v.and_then(Value::as_array)
        .map(|items| items.iter().filter_map(ref_in).collect())
        .unwrap_or_default()
}
