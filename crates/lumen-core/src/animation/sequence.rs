// ── Sequence animation ──
//
// Plays timing animations back to back, then starts over.

use super::timing::Timing;
use super::{Animation, AnimationId};
use crate::entertainment::LightStream;

#[derive(Debug)]
pub struct Sequence {
    id: AnimationId,
    children: Vec<Timing>,
}

impl Sequence {
    pub fn new(children: Vec<Timing>) -> Self {
        Self {
            id: AnimationId::next(),
            children,
        }
    }

    pub fn children(&self) -> &[Timing] {
        &self.children
    }
}

impl Animation for Sequence {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn render(&self, light: &mut LightStream, frame: u64, fps: u32) {
        if self.children.is_empty() {
            return;
        }

        // Start frame of each child, plus the cycle length.
        let mut starts = Vec::with_capacity(self.children.len());
        let mut totals = Vec::with_capacity(self.children.len());
        let mut cycle = 0u64;
        for child in &self.children {
            let frames = child.frames(light, fps);
            starts.push(cycle);
            totals.push(frames);
            cycle = cycle.saturating_add(frames);
        }

        let state = light.state_mut(self.id);
        let offset = *state.frame_offset.get_or_insert(frame);
        let mut local = frame.saturating_sub(offset);
        if local >= cycle {
            state.frame_offset = Some(frame);
            local = 0;
        }

        // Last child whose start is at or before `local`.
        let index = starts.partition_point(|&s| s <= local).saturating_sub(1);
        self.children[index].start(light, local - starts[index], totals[index], fps);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::animation::{BrightnessModifier, Easing};
    use std::time::Duration;

    fn constant(ms: u64, brightness: f64) -> Timing {
        Timing::new(Duration::from_millis(ms))
            .with_loops(1)
            .with_brightness(BrightnessModifier::brightness(vec![brightness], Easing::Linear))
    }

    #[test]
    fn selects_child_by_frame_and_loops_the_cycle() {
        // 10 and 20 frames at 10 fps.
        let seq = Sequence::new(vec![constant(1000, 10.0), constant(2000, 20.0)]);
        let mut light = LightStream::channel(0, None);

        seq.render(&mut light, 0, 10);
        assert!((light.brightness - 10.0).abs() < 1e-9);

        seq.render(&mut light, 15, 10);
        assert!((light.brightness - 20.0).abs() < 1e-9);

        seq.render(&mut light, 29, 10);
        assert!((light.brightness - 20.0).abs() < 1e-9);

        seq.render(&mut light, 30, 10);
        assert!((light.brightness - 10.0).abs() < 1e-9);
        let state = light.animation_state(seq.id()).unwrap();
        assert_eq!(state.frame_offset, Some(30));
    }

    #[test]
    fn rebased_frame_reaches_the_child() {
        let ramp = Timing::new(Duration::from_millis(2000))
            .with_loops(1)
            .with_brightness(BrightnessModifier::brightness(vec![0.0, 95.0], Easing::Linear));
        let seq = Sequence::new(vec![constant(1000, 50.0), ramp]);
        let mut light = LightStream::channel(0, None);

        seq.render(&mut light, 0, 10);
        // Global 20 is local frame 10 of the 20-frame ramp: 10/19 of the way.
        seq.render(&mut light, 20, 10);
        assert!((light.brightness - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_sequence_leaves_light_alone() {
        let seq = Sequence::new(Vec::new());
        let mut light = LightStream::channel(0, None);
        light.brightness = 33.0;
        seq.render(&mut light, 5, 50);
        assert!((light.brightness - 33.0).abs() < 1e-9);
    }
}
