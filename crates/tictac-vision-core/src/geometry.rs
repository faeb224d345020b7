use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four-corner polygon in image coordinates, ordered TL, TR, BR, BL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned rectangle `[x0, x1] × [y0, y1]`.
    pub fn from_rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new([
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ])
    }

    /// Shoelace area (always non-negative).
    pub fn area(&self) -> f32 {
        let mut acc = 0.0f32;
        for k in 0..4 {
            let p = self.corners[k];
            let q = self.corners[(k + 1) % 4];
            acc += p.x * q.y - q.x * p.y;
        }
        0.5 * acc.abs()
    }

    /// Mean of the four vertices.
    pub fn vertex_mean(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Scale the quad about its vertex mean so that each side loses `frac`
    /// of its length at both ends (`frac = 0.2` keeps the central 60 %).
    pub fn inset(&self, frac: f32) -> Quad {
        let scale = (1.0 - 2.0 * frac).clamp(0.0, 1.0);
        let c = self.vertex_mean();
        Quad::new(self.corners.map(|p| c + (p - c) * scale))
    }

    /// Move every corner towards the vertex mean by `px` pixels.
    pub fn shrink_by(&self, px: f32) -> Quad {
        let c = self.vertex_mean();
        Quad::new(self.corners.map(|p| {
            let d = p - c;
            let len = d.norm();
            if len <= px || len <= f32::EPSILON {
                c
            } else {
                c + d * ((len - px) / len)
            }
        }))
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Quad {
        Quad::new(self.corners.map(|p| Point2::new(p.x + dx, p.y + dy)))
    }

    /// `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Point-in-polygon for convex quads of either winding. Points on the
    /// boundary count as inside.
    pub fn contains(&self, p: Point2<f32>) -> bool {
        let mut sign = 0i8;
        for k in 0..4 {
            let a = self.corners[k];
            let b = self.corners[(k + 1) % 4];
            let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            let s = if cross > 0.0 {
                1
            } else if cross < 0.0 {
                -1
            } else {
                0
            };
            if s == 0 {
                continue;
            }
            if sign == 0 {
                sign = s;
            } else if s != sign {
                return false;
            }
        }
        true
    }
}

/// One calibrated cell region in full-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRegion {
    pub quad: Quad,
    /// Pixel centroid of the region.
    pub center: Point2<f32>,
    /// Region area in pixels.
    pub area: f32,
}

impl CellRegion {
    /// Region whose centre is the vertex mean and whose area is the quad area.
    pub fn from_quad(quad: Quad) -> Self {
        Self {
            quad,
            center: quad.vertex_mean(),
            area: quad.area(),
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            quad: self.quad.translate(dx, dy),
            center: Point2::new(self.center.x + dx, self.center.y + dy),
            area: self.area,
        }
    }
}
