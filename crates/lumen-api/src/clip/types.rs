// Wire types shared by every CLIP v2 endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response envelope returned by every CLIP v2 call:
/// `{ "errors": [{ "description": ... }], "data": [...] }`.
#[derive(Debug, Deserialize)]
pub struct ClipEnvelope<T> {
    #[serde(default)]
    pub errors: Vec<ClipErrorItem>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// One bridge-reported error.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipErrorItem {
    pub description: String,
}

/// Wire-level reference to another resource: `{ "rid": ..., "rtype": ... }`.
///
/// Mutation responses return these, and resources use them to point at
/// their owner and services. `rtype` stays a string here; `lumen-core`
/// maps it onto its closed type set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub rid: Uuid,
    pub rtype: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_missing_fields() {
        let env: ClipEnvelope<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(env.errors.is_empty());
        assert!(env.data.is_empty());
    }

    #[test]
    fn resource_ref_round_trips_wire_shape() {
        let json = r#"{"rid":"11111111-1111-1111-1111-111111111111","rtype":"light"}"#;
        let r: ResourceRef = serde_json::from_str(json).unwrap();
        assert_eq!(r.rtype, "light");
        assert_eq!(serde_json::to_string(&r).unwrap(), json);
    }
}
