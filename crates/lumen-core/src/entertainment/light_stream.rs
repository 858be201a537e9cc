// ── Light streams ──
//
// The per-tick render target for one channel or one custom light. A
// session owns these and recreates them whenever its topology changes;
// nothing survives a rebuild, including animation state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use super::frame::ChannelColor;
use crate::animation::{Animation, AnimationId, AnimationState};
use crate::model::color::rgb_to_xy;
use crate::model::{Gamut, ResourceKey, Rgb, Xy};

/// What a stream renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamTarget {
    /// A protocol channel, written into every datagram.
    Channel(u8),
    /// A light outside the configuration, written over REST.
    Custom(ResourceKey),
}

#[derive(Debug, Clone)]
pub struct LightStream {
    target: StreamTarget,
    light: Option<ResourceKey>,
    /// Output xy is clamped into this triangle.
    gamut: Option<Gamut>,
    pub xy: Xy,
    /// Percentage, 0..=100.
    pub brightness: f64,
    animation: Option<Arc<dyn Animation>>,
    animation_state: HashMap<AnimationId, AnimationState>,
}

impl LightStream {
    /// `light` is the light service behind the channel, when known.
    pub fn channel(channel_id: u8, light: Option<ResourceKey>) -> Self {
        Self::with_target(StreamTarget::Channel(channel_id), light)
    }

    pub fn custom(light: ResourceKey) -> Self {
        Self::with_target(StreamTarget::Custom(light), Some(light))
    }

    fn with_target(target: StreamTarget, light: Option<ResourceKey>) -> Self {
        Self {
            target,
            light,
            gamut: None,
            xy: Xy::WHITE,
            brightness: 0.0,
            animation: None,
            animation_state: HashMap::new(),
        }
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub fn channel_id(&self) -> Option<u8> {
        match self.target {
            StreamTarget::Channel(id) => Some(id),
            StreamTarget::Custom(_) => None,
        }
    }

    pub fn with_gamut(mut self, gamut: Option<Gamut>) -> Self {
        self.gamut = gamut;
        self
    }

    pub fn light(&self) -> Option<ResourceKey> {
        self.light
    }

    pub fn gamut(&self) -> Option<Gamut> {
        self.gamut
    }

    pub fn set_color(&mut self, xy: Xy, brightness: f64) {
        self.xy = xy;
        self.brightness = brightness.clamp(0.0, 100.0);
    }

    /// Set colour and brightness from sRGB, using the light's gamut (or
    /// gamut C when unknown).
    pub fn set_rgb(&mut self, rgb: Rgb) {
        let (xy, brightness) = rgb_to_xy(rgb, &self.gamut.unwrap_or(Gamut::C));
        self.set_color(xy, brightness);
    }

    /// The colour actually sent: `xy` pulled into the gamut.
    pub fn output_xy(&self) -> Xy {
        self.gamut.map_or(self.xy, |g| g.clamp(self.xy))
    }

    pub fn set_animation(&mut self, animation: Arc<dyn Animation>) {
        self.animation = Some(animation);
    }

    pub fn clear_animation(&mut self) {
        self.animation = None;
    }

    pub fn animation(&self) -> Option<&Arc<dyn Animation>> {
        self.animation.as_ref()
    }

    pub fn animation_state(&self, id: AnimationId) -> Option<&AnimationState> {
        self.animation_state.get(&id)
    }

    /// Number of animations that have memoized anything on this light.
    pub fn animation_state_len(&self) -> usize {
        self.animation_state.len()
    }

    pub(crate) fn state_mut(&mut self, id: AnimationId) -> &mut AnimationState {
        self.animation_state.entry(id).or_default()
    }

    /// Advance the attached animation, if any, to `frame`.
    pub fn start_sequence(&mut self, frame: u64, fps: u32) {
        if let Some(animation) = self.animation.clone() {
            animation.render(self, frame, fps);
        }
    }

    pub(crate) fn channel_color(&self) -> Option<ChannelColor> {
        self.channel_id().map(|channel_id| ChannelColor {
            channel_id,
            xy: self.output_xy(),
            brightness: self.brightness,
        })
    }

    /// REST body for a custom light's current state.
    pub(crate) fn custom_write(&self) -> Option<(ResourceKey, Value)> {
        let StreamTarget::Custom(key) = self.target else {
            return None;
        };
        let xy = self.output_xy();
        let body = json!({
            "on": { "on": self.brightness > 0.0 },
            "dimming": { "brightness": self.brightness },
            "color": { "xy": { "x": xy.x, "y": xy.y } },
        });
        Some((key, body))
    }
}
