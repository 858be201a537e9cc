// ── Animation composition ──
//
// Animations drive a `LightStream`'s colour and brightness from the
// session's frame counter. Anything rolled or derived per light (frame
// counts, loop counts, start offsets) lives in that light's state map,
// keyed by `AnimationId`, so a topology rebuild starts from scratch.

pub mod easing;
pub mod modifier;
pub mod sequence;
pub mod timing;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entertainment::LightStream;

pub use easing::Easing;
pub use modifier::{BrightnessModifier, ColorModifier, Lerp, Modifier};
pub use sequence::Sequence;
pub use timing::{Span, Timing};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one animation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(u64);

impl AnimationId {
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim-{}", self.0)
    }
}

/// Frame counts rolled once per (light, animation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub frames_per_loop: u64,
    /// `None` loops forever when run on its own.
    pub loops: Option<u32>,
}

impl Resolved {
    /// Frames in one complete run. An endless timing counts one loop.
    pub fn total_frames(&self) -> u64 {
        self.frames_per_loop
            .saturating_mul(u64::from(self.loops.unwrap_or(1)))
    }
}

/// Per-light memo for one animation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationState {
    pub resolved: Option<Resolved>,
    /// Global frame that maps to local frame 0.
    pub frame_offset: Option<u64>,
}

/// Something that can paint a light for a given global frame.
pub trait Animation: Send + Sync + fmt::Debug {
    fn id(&self) -> AnimationId;

    fn render(&self, light: &mut LightStream, frame: u64, fps: u32);
}

/// `frame / total` as a float in `0..=1`.
#[allow(clippy::as_conversions, clippy::cast_precision_loss)]
pub(crate) fn fraction(frame: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (frame as f64 / total as f64).clamp(0.0, 1.0)
}
