// ── Light state commands ──

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use super::color::{Gamut, Xy, kelvin_to_mirek};
use super::device::Capability;

/// A partial light state change. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightCommand {
    pub on: Option<bool>,
    /// Percentage, 0..=100.
    pub brightness: Option<f64>,
    pub xy: Option<Xy>,
    pub mirek: Option<u16>,
    pub gradient: Option<Vec<Xy>>,
    pub effect: Option<String>,
}

impl LightCommand {
    pub fn on(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Self::default()
        }
    }

    pub fn with_brightness(mut self, brightness: f64) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn with_xy(mut self, xy: Xy) -> Self {
        self.xy = Some(xy);
        self
    }

    pub fn with_mirek(mut self, mirek: u16) -> Self {
        self.mirek = Some(mirek);
        self
    }

    /// Colour temperature in kelvin, converted to the nearest accepted
    /// mirek.
    pub fn with_kelvin(self, kelvin: u32) -> Self {
        self.with_mirek(kelvin_to_mirek(kelvin))
    }

    /// Pull every xy in the command into `gamut`.
    pub fn clamped_to(mut self, gamut: &Gamut) -> Self {
        self.xy = self.xy.map(|xy| gamut.clamp(xy));
        if let Some(points) = &mut self.gradient {
            for p in points.iter_mut() {
                *p = gamut.clamp(*p);
            }
        }
        self
    }

    /// Capabilities the target must have for this command to apply.
    pub fn required_capabilities(&self) -> BTreeSet<Capability> {
        let mut caps = BTreeSet::new();
        if self.on.is_some() {
            caps.insert(Capability::OnOff);
        }
        if self.brightness.is_some() {
            caps.insert(Capability::Dimming);
        }
        if self.xy.is_some() {
            caps.insert(Capability::Color);
        }
        if self.mirek.is_some() {
            caps.insert(Capability::ColorTemperature);
        }
        if self.gradient.is_some() {
            caps.insert(Capability::Gradient);
        }
        if self.effect.is_some() {
            caps.insert(Capability::Effects);
        }
        caps
    }

    /// The CLIP v2 `PUT` body.
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        if let Some(on) = self.on {
            body.insert("on".into(), json!({ "on": on }));
        }
        if let Some(bri) = self.brightness {
            body.insert("dimming".into(), json!({ "brightness": bri }));
        }
        if let Some(xy) = self.xy {
            body.insert("color".into(), json!({ "xy": { "x": xy.x, "y": xy.y } }));
        }
        if let Some(mirek) = self.mirek {
            body.insert("color_temperature".into(), json!({ "mirek": mirek }));
        }
        if let Some(points) = &self.gradient {
            let points: Vec<Value> = points
                .iter()
                .map(|p| json!({ "color": { "xy": { "x": p.x, "y": p.y } } }))
                .collect();
            body.insert("gradient".into(), json!({ "points": points }));
        }
        if let Some(effect) = &self.effect {
            body.insert("effects".into(), json!({ "effect": effect }));
        }
        Value::Object(body)
    }
}
