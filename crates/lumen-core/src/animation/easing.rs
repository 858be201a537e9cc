// ── Easing curves ──
//
// CSS-style timing functions. Named presets are fixed cubic Béziers; a
// custom curve carries its two inner control points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// `cubic-bezier(x1, y1, x2, y2)`; endpoints are fixed at (0,0) and (1,1).
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    /// Control points `(x1, y1, x2, y2)`.
    pub fn control_points(self) -> (f64, f64, f64, f64) {
        match self {
            Self::Linear => (0.0, 0.0, 1.0, 1.0),
            Self::Ease => (0.25, 0.1, 0.25, 1.0),
            Self::EaseIn => (0.42, 0.0, 1.0, 1.0),
            Self::EaseOut => (0.0, 0.0, 0.58, 1.0),
            Self::EaseInOut => (0.42, 0.0, 0.58, 1.0),
            Self::CubicBezier(x1, y1, x2, y2) => (x1, y1, x2, y2),
        }
    }

    /// Remap an interpolation fraction. Input is clamped to `0..=1`.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if self == Self::Linear {
            return t;
        }
        let (x1, y1, x2, y2) = self.control_points();
        bezier_y_for_x(t, x1.clamp(0.0, 1.0), y1, x2.clamp(0.0, 1.0), y2)
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Ease => f.write_str("ease"),
            Self::EaseIn => f.write_str("ease-in"),
            Self::EaseOut => f.write_str("ease-out"),
            Self::EaseInOut => f.write_str("ease-in-out"),
            Self::CubicBezier(a, b, c, d) => write!(f, "cubic-bezier({a}, {b}, {c}, {d})"),
        }
    }
}

impl FromStr for Easing {
    type Err = String;

    /// Accepts `linear`, `ease`, `ease-in`, `ease-out`, `ease-in-out`
    /// (underscores also work) or `cubic-bezier(x1, y1, x2, y2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.replace('_', "-").as_str() {
            "linear" => return Ok(Self::Linear),
            "ease" => return Ok(Self::Ease),
            "ease-in" => return Ok(Self::EaseIn),
            "ease-out" => return Ok(Self::EaseOut),
            "ease-in-out" => return Ok(Self::EaseInOut),
            _ => {}
        }

        let args = s
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| format!("unknown easing {s:?}"))?;
        let points: Vec<f64> = args
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("bad cubic-bezier point: {e}"))?;
        match points.as_slice() {
            [x1, y1, x2, y2] => Ok(Self::CubicBezier(*x1, *y1, *x2, *y2)),
            _ => Err("cubic-bezier takes four points".into()),
        }
    }
}

fn curve(a1: f64, a2: f64, t: f64) -> f64 {
    let omt = 1.0 - t;
    3.0 * omt * omt * t * a1 + 3.0 * omt * t * t * a2 + t * t * t
}

fn curve_slope(a1: f64, a2: f64, t: f64) -> f64 {
    let omt = 1.0 - t;
    3.0 * omt * omt * a1 + 6.0 * omt * t * (a2 - a1) + 3.0 * t * t * (1.0 - a2)
}

/// Solve `bx(u) = x` for the curve parameter, then return `by(u)`.
fn bezier_y_for_x(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    const EPSILON: f64 = 1e-7;

    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton first; it converges in a handful of steps for sane curves.
    let mut u = x;
    for _ in 0..8 {
        let err = curve(x1, x2, u) - x;
        if err.abs() < EPSILON {
            return curve(y1, y2, u);
        }
        let slope = curve_slope(x1, x2, u);
        if slope.abs() < EPSILON {
            break;
        }
        u = (u - err / slope).clamp(0.0, 1.0);
    }

    // Flat spots: fall back to bisection, bx is monotonic on [0, 1].
    let (mut lo, mut hi) = (0.0, 1.0);
    u = x;
    for _ in 0..32 {
        let bx = curve(x1, x2, u);
        if (bx - x).abs() < EPSILON {
            break;
        }
        if bx < x {
            lo = u;
        } else {
            hi = u;
        }
        u = 0.5 * (lo + hi);
    }
    curve(y1, y2, u)
}
