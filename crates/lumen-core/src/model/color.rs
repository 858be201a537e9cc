// ── Colour helpers ──
//
// Pure conversions between RGB, CIE xy and colour temperature, plus
// clamping into a device gamut triangle.

use serde::{Deserialize, Serialize};

/// CIE 1931 chromaticity coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

impl Xy {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// D65 white point.
    pub const WHITE: Xy = Xy::new(0.3127, 0.3290);

    pub fn lerp(self, other: Xy, t: f64) -> Xy {
        Xy::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    fn distance(self, other: Xy) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// 8-bit sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Reachable colour triangle of a light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gamut {
    pub red: Xy,
    pub green: Xy,
    pub blue: Xy,
}

impl Gamut {
    pub const A: Gamut = Gamut {
        red: Xy::new(0.704, 0.296),
        green: Xy::new(0.2151, 0.7106),
        blue: Xy::new(0.138, 0.08),
    };
    pub const B: Gamut = Gamut {
        red: Xy::new(0.675, 0.322),
        green: Xy::new(0.409, 0.518),
        blue: Xy::new(0.167, 0.04),
    };
    pub const C: Gamut = Gamut {
        red: Xy::new(0.6915, 0.3083),
        green: Xy::new(0.17, 0.7),
        blue: Xy::new(0.1532, 0.0475),
    };

    /// Look up a gamut by the `gamut_type` letter lights report.
    pub fn from_type(t: &str) -> Option<Self> {
        match t {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            _ => None,
        }
    }

    /// Inside or on an edge, within rounding error.
    pub fn contains(&self, p: Xy) -> bool {
        const EPS: f64 = 1e-9;
        let d = [
            cross(p, self.red, self.green),
            cross(p, self.green, self.blue),
            cross(p, self.blue, self.red),
        ];
        let has_neg = d.iter().any(|&v| v < -EPS);
        let has_pos = d.iter().any(|&v| v > EPS);
        !(has_neg && has_pos)
    }

    /// Nearest reachable point: `p` itself when inside, otherwise the
    /// closest point on the triangle's edges.
    pub fn clamp(&self, p: Xy) -> Xy {
        if self.contains(p) {
            return p;
        }
        [
            closest_on_segment(p, self.red, self.green),
            closest_on_segment(p, self.green, self.blue),
            closest_on_segment(p, self.blue, self.red),
        ]
        .into_iter()
        .min_by(|a, b| p.distance(*a).total_cmp(&p.distance(*b)))
        .unwrap_or(p)
    }
}

fn cross(p: Xy, a: Xy, b: Xy) -> f64 {
    (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y)
}

fn closest_on_segment(p: Xy, a: Xy, b: Xy) -> Xy {
    let ab = Xy::new(b.x - a.x, b.y - a.y);
    let len2 = ab.x * ab.x + ab.y * ab.y;
    if len2 == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len2).clamp(0.0, 1.0);
    a.lerp(b, t)
}

fn gamma_expand(c: u8) -> f64 {
    let v = f64::from(c) / 255.0;
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

/// Convert sRGB to xy (clamped into `gamut`) and a brightness in 0..=100.
pub fn rgb_to_xy(rgb: Rgb, gamut: &Gamut) -> (Xy, f64) {
    let r = gamma_expand(rgb.r);
    let g = gamma_expand(rgb.g);
    let b = gamma_expand(rgb.b);

    let x = r * 0.4124 + g * 0.3576 + b * 0.1805;
    let y = r * 0.2126 + g * 0.7152 + b * 0.0722;
    let z = r * 0.0193 + g * 0.1192 + b * 0.9505;

    let sum = x + y + z;
    if sum <= f64::EPSILON {
        return (Xy::WHITE, 0.0);
    }
    let point = gamut.clamp(Xy::new(x / sum, y / sum));
    (point, (y * 100.0).clamp(0.0, 100.0))
}

/// Lowest and highest mirek the bridge accepts.
pub const MIREK_MIN: u16 = 153;
pub const MIREK_MAX: u16 = 500;

pub fn kelvin_to_mirek(kelvin: u32) -> u16 {
    if kelvin == 0 {
        return MIREK_MAX;
    }
    let mirek = (1_000_000 / kelvin).clamp(u32::from(MIREK_MIN), u32::from(MIREK_MAX));
    u16::try_from(mirek).unwrap_or(MIREK_MAX)
}

pub fn mirek_to_kelvin(mirek: u16) -> u32 {
    1_000_000 / u32::from(mirek.max(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::from_hex("#ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::from_hex("00ff00"), Some(Rgb::new(0, 255, 0)));
        assert_eq!(Rgb::from_hex("#fff"), None);
    }

    #[test]
    fn white_maps_near_d65() {
        let (xy, bri) = rgb_to_xy(Rgb::new(255, 255, 255), &Gamut::C);
        assert!((xy.x - 0.3127).abs() < 0.01, "{xy:?}");
        assert!((xy.y - 0.329).abs() < 0.01, "{xy:?}");
        assert!((bri - 100.0).abs() < 0.5);
    }

    #[test]
    fn black_is_dark_white_point() {
        let (xy, bri) = rgb_to_xy(Rgb::new(0, 0, 0), &Gamut::B);
        assert_eq!(xy, Xy::WHITE);
        assert_eq!(bri, 0.0);
    }

    #[test]
    fn out_of_gamut_point_is_clamped_onto_edge() {
        let outside = Xy::new(0.0, 0.0);
        assert!(!Gamut::B.contains(outside));

        let clamped = Gamut::B.clamp(outside);
        assert!(clamped.distance(outside) <= outside.distance(Gamut::B.blue) + 1e-12);
        assert!(clamped.distance(outside) > 0.0);

        let inside = Xy::new(0.4, 0.35);
        assert!(Gamut::B.contains(inside));
        assert_eq!(Gamut::B.clamp(inside), inside);
    }

    #[test]
    fn mirek_kelvin_conversions() {
        assert_eq!(kelvin_to_mirek(2000), 500);
        assert_eq!(kelvin_to_mirek(6500), 153);
        assert_eq!(kelvin_to_mirek(4000), 250);
        assert_eq!(mirek_to_kelvin(250), 4000);
    }
}
