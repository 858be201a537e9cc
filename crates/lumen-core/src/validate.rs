// ── Payload validation ──
//
// Structural checks run before any mutation leaves the process. These
// mirror the bridge's own constraints for the fields callers commonly
// get wrong; anything not checked here is left to the bridge.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::entertainment::ConfigurationType;
use crate::model::color::{MIREK_MAX, MIREK_MIN};
use crate::model::ResourceType;

const NAME_MAX_CHARS: usize = 32;

/// Validate a `POST` body for `rtype`.
pub fn validate_create(rtype: ResourceType, payload: &Value) -> Result<(), CoreError> {
    if !rtype.is_creatable() {
        return Err(CoreError::validation(format!("{rtype} resources cannot be created")));
    }
    let obj = as_object(payload)?;
    check_type_tag(rtype, obj)?;
    check_common(obj)?;

    if rtype == ResourceType::EntertainmentConfiguration {
        check_entertainment_create(obj)?;
    }
    Ok(())
}

/// Validate a `PUT` body for `rtype`.
pub fn validate_update(rtype: ResourceType, payload: &Value) -> Result<(), CoreError> {
    let obj = as_object(payload)?;
    if obj.is_empty() {
        return Err(CoreError::validation("update body is empty"));
    }
    check_type_tag(rtype, obj)?;
    check_common(obj)?;

    if let Some(action) = obj.get("action") {
        if rtype != ResourceType::EntertainmentConfiguration {
            return Err(CoreError::validation(format!("{rtype} has no action field")));
        }
        match action.as_str() {
            Some("start" | "stop") => {}
            _ => return Err(CoreError::validation("action must be \"start\" or \"stop\"")),
        }
    }
    Ok(())
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, CoreError> {
    payload
        .as_object()
        .ok_or_else(|| CoreError::validation("payload must be a JSON object"))
}

fn check_type_tag(rtype: ResourceType, obj: &Map<String, Value>) -> Result<(), CoreError> {
    match obj.get("type").map(Value::as_str) {
        None => Ok(()),
        Some(Some(t)) if t == rtype.as_ref() => Ok(()),
        Some(_) => Err(CoreError::validation(format!("type must be \"{rtype}\""))),
    }
}

fn check_common(obj: &Map<String, Value>) -> Result<(), CoreError> {
    if let Some(on) = obj.get("on") {
        if !on.get("on").is_some_and(Value::is_boolean) {
            return Err(CoreError::validation("on.on must be a boolean"));
        }
    }

    if let Some(dimming) = obj.get("dimming") {
        let bri = dimming
            .get("brightness")
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::validation("dimming.brightness must be a number"))?;
        if !(0.0..=100.0).contains(&bri) {
            return Err(CoreError::validation("dimming.brightness must be within 0..=100"));
        }
    }

    if let Some(color) = obj.get("color") {
        let xy = color
            .get("xy")
            .ok_or_else(|| CoreError::validation("color.xy is required"))?;
        for axis in ["x", "y"] {
            let v = xy
                .get(axis)
                .and_then(Value::as_f64)
                .ok_or_else(|| CoreError::validation(format!("color.xy.{axis} must be a number")))?;
            if !(0.0..=1.0).contains(&v) {
                return Err(CoreError::validation(format!("color.xy.{axis} must be within 0..=1")));
            }
        }
    }

    if let Some(ct) = obj.get("color_temperature") {
        match ct.get("mirek") {
            Some(Value::Null) | None => {}
            Some(m) => {
                let mirek = m
                    .as_u64()
                    .ok_or_else(|| CoreError::validation("color_temperature.mirek must be an integer"))?;
                if !(u64::from(MIREK_MIN)..=u64::from(MIREK_MAX)).contains(&mirek) {
                    return Err(CoreError::validation(format!(
                        "color_temperature.mirek must be within {MIREK_MIN}..={MIREK_MAX}"
                    )));
                }
            }
        }
    }

    if let Some(metadata) = obj.get("metadata") {
        if let Some(name) = metadata.get("name") {
            let name = name
                .as_str()
                .ok_or_else(|| CoreError::validation("metadata.name must be a string"))?;
            let len = name.chars().count();
            if len == 0 || len > NAME_MAX_CHARS {
                return Err(CoreError::validation(format!(
                    "metadata.name must be 1..={NAME_MAX_CHARS} characters"
                )));
            }
        }
    }
    Ok(())
}

fn check_entertainment_create(obj: &Map<String, Value>) -> Result<(), CoreError> {
    if obj
        .get("metadata")
        .and_then(|m| m.get("name"))
        .is_none()
    {
        return Err(CoreError::validation("metadata.name is required"));
    }

    let kind = obj
        .get("configuration_type")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation("configuration_type is required"))?;
    if kind.parse::<ConfigurationType>().is_err() {
        return Err(CoreError::validation(format!("unknown configuration_type {kind:?}")));
    }

    let has_locations = obj
        .get("locations")
        .and_then(|l| l.get("service_locations"))
        .is_some_and(Value::is_array);
    if !has_locations {
        return Err(CoreError::validation("locations.service_locations is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ent_body() -> Value {
        json!({
            "type": "entertainment_configuration",
            "metadata": { "name": "Desk" },
            "configuration_type": "screen",
            "locations": { "service_locations": [] }
        })
    }

    #[test]
    fn entertainment_create_accepts_complete_body() {
        assert!(validate_create(ResourceType::EntertainmentConfiguration, &ent_body()).is_ok());
    }

    #[test]
    fn entertainment_create_requires_locations() {
        let mut body = ent_body();
        body.as_object_mut().map(|o| o.remove("locations"));
        let err = validate_create(ResourceType::EntertainmentConfiguration, &body);
        assert!(matches!(err, Err(CoreError::ValidationFailed { .. })));
    }

    #[test]
    fn lights_cannot_be_created() {
        assert!(validate_create(ResourceType::Light, &json!({})).is_err());
    }

    #[test]
    fn brightness_and_xy_ranges() {
        assert!(validate_update(ResourceType::Light, &json!({ "dimming": { "brightness": 100 } })).is_ok());
        assert!(validate_update(ResourceType::Light, &json!({ "dimming": { "brightness": 101 } })).is_err());
        assert!(validate_update(ResourceType::Light, &json!({ "color": { "xy": { "x": 1.2, "y": 0.3 } } })).is_err());
        assert!(validate_update(ResourceType::Light, &json!({ "color_temperature": { "mirek": 100 } })).is_err());
        assert!(validate_update(ResourceType::Light, &json!({ "color_temperature": { "mirek": null } })).is_ok());
    }

    #[test]
    fn action_only_on_entertainment_configuration() {
        let start = json!({ "action": "start" });
        assert!(validate_update(ResourceType::EntertainmentConfiguration, &start).is_ok());
        assert!(validate_update(ResourceType::Light, &start).is_err());
        assert!(validate_update(
            ResourceType::EntertainmentConfiguration,
            &json!({ "action": "pause" })
        )
        .is_err());
    }

    #[test]
    fn mismatched_type_tag_and_empty_body_fail() {
        assert!(validate_update(ResourceType::Light, &json!({ "type": "room", "on": { "on": true } })).is_err());
        assert!(validate_update(ResourceType::Light, &json!({})).is_err());
        assert!(validate_update(ResourceType::Light, &json!([1, 2])).is_err());
    }
}
