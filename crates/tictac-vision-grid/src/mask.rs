//! Binary masks and 3×3 morphology.
//!
//! All operators treat out-of-image neighbours as absent: dilation does not
//! grow from the border and erosion does not eat into it.

use tictac_vision_core::{ColorEnvelope, Quad, RgbImageView};
use nalgebra::Point2;

/// Axis-aligned window into a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Centred window keeping `x_ratio` of the width and `y_ratio` of the height.
pub fn centre_window(width: usize, height: usize, x_ratio: f32, y_ratio: f32) -> Window {
    let keep = |len: usize, ratio: f32| -> usize {
        let r = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 1.0 };
        ((len as f32 * r).round() as usize).min(len)
    };
    let w = keep(width, x_ratio);
    let h = keep(height, y_ratio);
    Window {
        x: (width - w) / 2,
        y: (height - h) / 2,
        width: w,
        height: h,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Pixels of `window` whose colour falls inside `envelope`.
    pub fn in_range(frame: &RgbImageView<'_>, window: Window, envelope: &ColorEnvelope) -> Self {
        let mut mask = Self::new(window.width, window.height);
        for y in 0..window.height {
            for x in 0..window.width {
                if let Some(px) = frame.pixel(window.x + x, window.y + y) {
                    mask.data[y * window.width + x] = envelope.contains_rgb(px);
                }
            }
        }
        mask
    }

    /// Pixels whose centre lies inside `quad`.
    pub fn from_quad(width: usize, height: usize, quad: &Quad) -> Self {
        let mut mask = Self::new(width, height);
        let (x0, y0, x1, y1) = quad.bounds();
        let xs = x0.floor().max(0.0) as usize;
        let ys = y0.floor().max(0.0) as usize;
        let xe = (x1.ceil().max(0.0) as usize).min(width);
        let ye = (y1.ceil().max(0.0) as usize).min(height);
        for y in ys..ye {
            for x in xs..xe {
                if quad.contains(Point2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                    mask.data[y * width + x] = true;
                }
            }
        }
        mask
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x]
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn invert(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| !v).collect(),
        }
    }

    /// Pixel-wise AND. Masks must share dimensions; extra pixels read as unset.
    pub fn and(&self, other: &BinaryMask) -> Self {
        let mut out = Self::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.data[y * self.width + x] = self.get(x, y) && other.get(x, y);
            }
        }
        out
    }

    /// Count of set pixels among the in-bounds 3×3 neighbourhood, and the
    /// number of in-bounds neighbours.
    fn neighbourhood(&self, x: usize, y: usize) -> (usize, usize) {
        let mut set = 0;
        let mut total = 0;
        for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                total += 1;
                if self.data[ny * self.width + nx] {
                    set += 1;
                }
            }
        }
        (set, total)
    }

    fn map3(&self, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut out = Self::new(self.width, self.height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                let (set, total) = self.neighbourhood(x, y);
                out.data[y * self.width + x] = f(set, total);
            }
        }
        out
    }

    pub fn dilate3(&self) -> Self {
        self.map3(|set, _| set > 0)
    }

    pub fn erode3(&self) -> Self {
        self.map3(|set, total| set == total)
    }

    /// Erode with a `(2r + 1)²` square, `r` passes of the 3×3 kernel.
    pub fn erode_by(&self, radius: usize) -> Self {
        let mut out = self.clone();
        for _ in 0..radius {
            out = out.erode3();
        }
        out
    }

    pub fn open3(&self) -> Self {
        self.erode3().dilate3()
    }

    pub fn close3(&self) -> Self {
        self.dilate3().erode3()
    }

    /// Majority vote over the in-bounds 3×3 neighbourhood.
    pub fn median3(&self) -> Self {
        self.map3(|set, total| 2 * set > total)
    }
}
