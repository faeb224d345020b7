//! HSV colour conversion and colour envelopes.
//!
//! Values follow the 8-bit convention used by most camera tuning tools:
//! hue in `0..180` (degrees / 2), saturation and value in `0..=255`. Tuned
//! thresholds can be copied from such tools without rescaling.

use serde::{Deserialize, Serialize};

use crate::RgbImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Convert an RGB triple to 8-bit HSV.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> Hsv {
    let [r, g, b] = rgb.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let h_deg = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
    let h = ((h_deg / 2.0).round() as u32 % 180) as u8;

    Hsv {
        h,
        s: s.round().clamp(0.0, 255.0) as u8,
        v: v as u8,
    }
}

/// Inclusive HSV box `lower <= (h, s, v) <= upper`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        let c = [hsv.h, hsv.s, hsv.v];
        (0..3).all(|k| self.lower[k] <= c[k] && c[k] <= self.upper[k])
    }
}

/// Union of HSV boxes. Two boxes are needed for hues that wrap around red.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorEnvelope {
    pub ranges: Vec<HsvRange>,
}

impl ColorEnvelope {
    pub fn single(range: HsvRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        self.ranges.iter().any(|r| r.contains(hsv))
    }

    #[inline]
    pub fn contains_rgb(&self, rgb: [u8; 3]) -> bool {
        self.contains(rgb_to_hsv(rgb))
    }

    /// Number of pixels of `img` that fall inside the envelope.
    pub fn count_in(&self, img: &RgbImage) -> usize {
        img.pixels().filter(|&px| self.contains_rgb(px)).count()
    }
}
