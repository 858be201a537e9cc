// ── Timing animation ──
//
// A duration plus an optional loop count, driving one brightness and/or
// one colour modifier. Random spans are rolled once per light and cached.

use std::time::Duration;

use rand::Rng;
use rand::distr::uniform::SampleUniform;
use serde::{Deserialize, Serialize};

use super::modifier::{BrightnessModifier, ColorModifier};
use super::{Animation, AnimationId, Resolved};
use crate::entertainment::LightStream;

/// A fixed value or an inclusive random range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Span<T> {
    Fixed(T),
    Random { min: T, max: T },
}

impl<T> Span<T>
where
    T: SampleUniform + PartialOrd + Copy,
{
    pub fn roll(&self) -> T {
        match *self {
            Self::Fixed(v) => v,
            Self::Random { min, max } if min < max => rand::rng().random_range(min..=max),
            Self::Random { min, .. } => min,
        }
    }
}

#[derive(Debug)]
pub struct Timing {
    id: AnimationId,
    duration_ms: Span<u64>,
    loops: Option<Span<u32>>,
    brightness: Option<BrightnessModifier>,
    color: Option<ColorModifier>,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Timing {
    pub fn new(duration: Duration) -> Self {
        Self {
            id: AnimationId::next(),
            duration_ms: Span::Fixed(millis(duration)),
            loops: None,
            brightness: None,
            color: None,
        }
    }

    pub fn random_duration(min: Duration, max: Duration) -> Self {
        Self {
            duration_ms: Span::Random {
                min: millis(min),
                max: millis(max),
            },
            ..Self::new(min)
        }
    }

    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = Some(Span::Fixed(loops.max(1)));
        self
    }

    pub fn with_random_loops(mut self, min: u32, max: u32) -> Self {
        self.loops = Some(Span::Random {
            min: min.max(1),
            max: max.max(1),
        });
        self
    }

    pub fn with_brightness(mut self, modifier: BrightnessModifier) -> Self {
        self.brightness = Some(modifier);
        self
    }

    pub fn with_color(mut self, modifier: ColorModifier) -> Self {
        self.color = Some(modifier);
        self
    }

    /// Roll (first call) or recall the frame counts for `light`.
    pub fn resolve(&self, light: &mut LightStream, fps: u32) -> Resolved {
        let state = light.state_mut(self.id);
        if let Some(r) = state.resolved {
            return r;
        }

        let ms = self.duration_ms.roll();
        let frames_per_loop = ms
            .saturating_mul(u64::from(fps))
            .saturating_add(500)
            / 1000;
        let resolved = Resolved {
            frames_per_loop: frames_per_loop.max(1),
            loops: self.loops.as_ref().map(Span::roll),
        };
        state.resolved = Some(resolved);
        resolved
    }

    /// Frames in one run of this timing on `light`.
    pub fn frames(&self, light: &mut LightStream, fps: u32) -> u64 {
        self.resolve(light, fps).total_frames()
    }

    /// Paint local `frame` of a run lasting `total_frames`.
    pub fn start(&self, light: &mut LightStream, frame: u64, total_frames: u64, fps: u32) {
        let resolved = self.resolve(light, fps);
        let frame = frame.min(total_frames.saturating_sub(1));
        let loop_frame = frame % resolved.frames_per_loop;

        if let Some(bri) = self
            .brightness
            .as_ref()
            .and_then(|m| m.value(loop_frame, resolved.frames_per_loop))
        {
            light.brightness = bri.clamp(0.0, 100.0);
        }
        if let Some(xy) = self
            .color
            .as_ref()
            .and_then(|m| m.value(loop_frame, resolved.frames_per_loop))
        {
            light.xy = xy;
        }
    }
}

impl Animation for Timing {
    fn id(&self) -> AnimationId {
        self.id
    }

    /// On its own, a timing loops forever without a loop count and holds
    /// its final frame once a finite run completes.
    fn render(&self, light: &mut LightStream, frame: u64, fps: u32) {
        let resolved = self.resolve(light, fps);
        let offset = *light.state_mut(self.id).frame_offset.get_or_insert(frame);
        let local = frame.saturating_sub(offset);
        let total = resolved.total_frames();

        let local = match resolved.loops {
            None => local % resolved.frames_per_loop,
            Some(_) => local.min(total.saturating_sub(1)),
        };
        self.start(light, local, total, fps);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::animation::Easing;

    fn ramp() -> BrightnessModifier {
        BrightnessModifier::brightness(vec![0.0, 100.0], Easing::Linear)
    }

    #[test]
    fn frame_count_follows_duration_and_fps() {
        let mut light = LightStream::channel(0, None);
        let t = Timing::new(Duration::from_millis(500)).with_loops(3);
        assert_eq!(t.frames(&mut light, 50), 75);
    }

    #[test]
    fn random_duration_is_rolled_once_per_light() {
        let mut light = LightStream::channel(0, None);
        let t = Timing::random_duration(Duration::from_millis(100), Duration::from_secs(10));
        let first = t.frames(&mut light, 50);
        for _ in 0..20 {
            assert_eq!(t.frames(&mut light, 50), first);
        }
        assert!((5..=500).contains(&first));
    }

    #[test]
    fn standalone_run_holds_last_frame() {
        let mut light = LightStream::channel(0, None);
        // 11 frames at 10 fps: 0 → 100 over one loop.
        let t = Timing::new(Duration::from_millis(1100))
            .with_loops(1)
            .with_brightness(ramp());
        t.render(&mut light, 100, 10);
        assert!(light.brightness.abs() < 1e-9);
        t.render(&mut light, 110, 10);
        assert!((light.brightness - 100.0).abs() < 1e-9);
        t.render(&mut light, 500, 10);
        assert!((light.brightness - 100.0).abs() < 1e-9);
    }

    #[test]
    fn endless_run_wraps_each_loop() {
        let mut light = LightStream::channel(0, None);
        let t = Timing::new(Duration::from_millis(1100)).with_brightness(ramp());
        t.render(&mut light, 0, 10);
        t.render(&mut light, 11, 10);
        assert!(light.brightness.abs() < 1e-9);
        t.render(&mut light, 16, 10);
        assert!((light.brightness - 50.0).abs() < 1e-9);
    }
}
