// ── Value modifiers ──
//
// Pure functions of (frame, total frames) producing a brightness or an xy
// colour. Keyframe and palette modifiers interpolate between their
// values; flicker, lightning and wave are procedural.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::easing::Easing;
use super::fraction;
use crate::model::Xy;

/// Values a modifier can produce.
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Xy {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a.lerp(b, t)
    }
}

/// Normalised lightning envelope, sampled by elapsed fraction.
const LIGHTNING_CURVE: [f64; 16] = [
    0.0, 1.0, 0.15, 0.0, 0.0, 0.85, 0.3, 1.0, 0.45, 0.1, 0.0, 0.0, 0.6, 0.2, 0.05, 0.0,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modifier<T> {
    /// Interpolates first value to last over the loop.
    Keyframes { values: Vec<T>, easing: Easing },
    /// Like keyframes, but wraps from the last value back to the first.
    Palette { values: Vec<T>, easing: Easing },
    /// Uniform random jitter between `low` and `high`, every frame.
    Flicker { low: T, high: T },
    /// A fixed strike envelope between `low` and `high`.
    Lightning { low: T, high: T },
    /// One sine period per loop.
    Wave { low: T, high: T },
}

pub type BrightnessModifier = Modifier<f64>;
pub type ColorModifier = Modifier<Xy>;

impl BrightnessModifier {
    pub fn brightness(values: Vec<f64>, easing: Easing) -> Self {
        Self::Keyframes { values, easing }
    }

    pub fn brightness_palette(values: Vec<f64>, easing: Easing) -> Self {
        Self::Palette { values, easing }
    }
}

impl ColorModifier {
    pub fn color(values: Vec<Xy>, easing: Easing) -> Self {
        Self::Keyframes { values, easing }
    }

    pub fn color_palette(values: Vec<Xy>, easing: Easing) -> Self {
        Self::Palette { values, easing }
    }
}

impl<T: Lerp> Modifier<T> {
    pub fn flicker(low: T, high: T) -> Self {
        Self::Flicker { low, high }
    }

    pub fn lightning(low: T, high: T) -> Self {
        Self::Lightning { low, high }
    }

    pub fn wave(low: T, high: T) -> Self {
        Self::Wave { low, high }
    }

    /// Value at `frame` of a loop lasting `total` frames. `None` when the
    /// modifier has no values to work with.
    pub fn value(&self, frame: u64, total: u64) -> Option<T> {
        match self {
            Self::Keyframes { values, easing } => {
                // The last frame lands exactly on the last keyframe.
                let t = fraction(frame, total.saturating_sub(1).max(1));
                interpolate(values, t, *easing, false)
            }
            Self::Palette { values, easing } => {
                interpolate(values, fraction(frame, total.max(1)), *easing, true)
            }
            Self::Flicker { low, high } => {
                let t: f64 = rand::rng().random();
                Some(T::lerp(*low, *high, t))
            }
            Self::Lightning { low, high } => {
                let t = sample_curve(&LIGHTNING_CURVE, fraction(frame, total.max(1)));
                Some(T::lerp(*low, *high, t))
            }
            Self::Wave { low, high } => {
                let phase = fraction(frame, total.max(1)) * TAU;
                Some(T::lerp(*low, *high, 0.5 - 0.5 * phase.cos()))
            }
        }
    }
}

/// Bracket `t` between two neighbouring values and ease between them.
fn interpolate<T: Lerp>(values: &[T], t: f64, easing: Easing, wrap: bool) -> Option<T> {
    let (first, rest) = values.split_first()?;
    if rest.is_empty() {
        return Some(*first);
    }

    let n = values.len();
    let segments = if wrap { n } else { n - 1 };
    let pos = t.clamp(0.0, 1.0) * f64::from(u32::try_from(segments).unwrap_or(u32::MAX));
    let (index, local) = split_position(pos, segments);

    let a = values[index];
    let b = values[(index + 1) % n];
    Some(T::lerp(a, b, easing.apply(local)))
}

/// Integer segment index and the fraction inside it.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn split_position(pos: f64, segments: usize) -> (usize, f64) {
    let floor = pos.floor();
    let index = floor as usize;
    // At t == 1 the floor overshoots into a segment that doesn't exist.
    if index >= segments {
        (segments - 1, 1.0)
    } else {
        (index, pos - floor)
    }
}

fn sample_curve(curve: &[f64], t: f64) -> f64 {
    let segments = curve.len() - 1;
    let pos = t.clamp(0.0, 1.0) * f64::from(u32::try_from(segments).unwrap_or(u32::MAX));
    let (index, local) = split_position(pos, segments);
    f64::lerp(curve[index], curve[index + 1], local)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn two_keyframes_interpolate_linearly() {
        let m = BrightnessModifier::brightness(vec![0.0, 100.0], Easing::Linear);
        assert!(close(m.value(0, 11).unwrap(), 0.0));
        assert!(close(m.value(5, 11).unwrap(), 50.0));
        assert!(close(m.value(10, 11).unwrap(), 100.0));
    }

    #[test]
    fn three_keyframes_bracket_the_right_pair() {
        let m = BrightnessModifier::brightness(vec![0.0, 100.0, 20.0], Easing::Linear);
        // total 5 → t = frame / 4; frame 3 is halfway down the second segment.
        assert!(close(m.value(2, 5).unwrap(), 100.0));
        assert!(close(m.value(3, 5).unwrap(), 60.0));
    }

    #[test]
    fn easing_reshapes_the_fraction() {
        let linear = BrightnessModifier::brightness(vec![0.0, 100.0], Easing::Linear);
        let eased = BrightnessModifier::brightness(vec![0.0, 100.0], Easing::EaseIn);
        assert!(eased.value(3, 11).unwrap() < linear.value(3, 11).unwrap());
    }

    #[test]
    fn palette_wraps_back_to_first_value() {
        let red = Xy::new(0.7, 0.3);
        let blue = Xy::new(0.15, 0.06);
        let m = ColorModifier::color_palette(vec![red, blue], Easing::Linear);
        assert_eq!(m.value(0, 4).unwrap(), red);
        assert_eq!(m.value(2, 4).unwrap(), blue);
        // Three quarters of the way round: halfway from blue back to red.
        let back = m.value(3, 4).unwrap();
        assert!(close(back.x, 0.425));
    }

    #[test]
    fn single_value_is_constant_and_empty_is_none() {
        let m = BrightnessModifier::brightness_palette(vec![42.0], Easing::Ease);
        assert!(close(m.value(7, 9).unwrap(), 42.0));
        assert!(BrightnessModifier::brightness(vec![], Easing::Linear).value(0, 10).is_none());
    }

    #[test]
    fn procedural_modifiers_stay_in_range() {
        let flicker = BrightnessModifier::flicker(20.0, 80.0);
        let lightning = BrightnessModifier::lightning(0.0, 100.0);
        let wave = BrightnessModifier::wave(10.0, 30.0);
        for frame in 0..50 {
            let f = flicker.value(frame, 50).unwrap();
            assert!((20.0..=80.0).contains(&f));
            let l = lightning.value(frame, 50).unwrap();
            assert!((0.0..=100.0).contains(&l));
            let w = wave.value(frame, 50).unwrap();
            assert!((10.0 - 1e-9..=30.0 + 1e-9).contains(&w));
        }
        assert!(close(wave.value(0, 50).unwrap(), 10.0));
        assert!(close(wave.value(25, 50).unwrap(), 30.0));
        assert!(close(lightning.value(0, 50).unwrap(), 0.0));
    }
}
