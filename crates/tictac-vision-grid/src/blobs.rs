//! 8-connected components of a binary mask.

use nalgebra::Point2;
use tictac_vision_core::{CellRegion, Quad};

use crate::mask::BinaryMask;

/// One connected component.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    /// Number of pixels.
    pub pixel_count: usize,
    /// Pixel centroid (pixel centres at `x + 0.5`).
    pub centroid: Point2<f32>,
    /// Quad spanned by the four extreme pixels, ordered TL, TR, BR, BL.
    pub quad: Quad,
}

impl Blob {
    /// Region descriptor: extreme-point quad, pixel centroid, pixel area.
    pub fn region(&self) -> CellRegion {
        CellRegion {
            quad: self.quad,
            center: self.centroid,
            area: self.pixel_count as f32,
        }
    }
}

#[derive(Default)]
struct Extremes {
    count: usize,
    sum_x: f64,
    sum_y: f64,
    // (score, x, y); TL minimises x+y, TR maximises x-y, BR maximises x+y,
    // BL minimises x-y.
    tl: Option<(i64, usize, usize)>,
    tr: Option<(i64, usize, usize)>,
    br: Option<(i64, usize, usize)>,
    bl: Option<(i64, usize, usize)>,
}

impl Extremes {
    fn push(&mut self, x: usize, y: usize) {
        self.count += 1;
        self.sum_x += x as f64 + 0.5;
        self.sum_y += y as f64 + 0.5;
        let (xi, yi) = (x as i64, y as i64);
        keep(&mut self.tl, -(xi + yi), x, y);
        keep(&mut self.tr, xi - yi, x, y);
        keep(&mut self.br, xi + yi, x, y);
        keep(&mut self.bl, yi - xi, x, y);
    }

    fn finish(self) -> Option<Blob> {
        let (_, tlx, tly) = self.tl?;
        let (_, trx, try_) = self.tr?;
        let (_, brx, bry) = self.br?;
        let (_, blx, bly) = self.bl?;
        // Use the outer pixel corner at each extreme so a solid rectangle's
        // quad covers all of its pixels.
        let quad = Quad::new([
            Point2::new(tlx as f32, tly as f32),
            Point2::new(trx as f32 + 1.0, try_ as f32),
            Point2::new(brx as f32 + 1.0, bry as f32 + 1.0),
            Point2::new(blx as f32, bly as f32 + 1.0),
        ]);
        let n = self.count as f64;
        Some(Blob {
            pixel_count: self.count,
            centroid: Point2::new((self.sum_x / n) as f32, (self.sum_y / n) as f32),
            quad,
        })
    }
}

/// Strictly-greater update keeps the first pixel in raster order on ties.
fn keep(slot: &mut Option<(i64, usize, usize)>, score: i64, x: usize, y: usize) {
    match slot {
        Some((best, _, _)) if *best >= score => {}
        _ => *slot = Some((score, x, y)),
    }
}

/// Label the set pixels of `mask` into 8-connected blobs, in raster order of
/// each blob's first pixel.
pub fn find_blobs(mask: &BinaryMask) -> Vec<Blob> {
    let (w, h) = (mask.width, mask.height);
    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();
    let mut blobs = Vec::new();

    for start in 0..w * h {
        if !mask.data[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut ext = Extremes::default();

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            ext.push(x, y);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if mask.data[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if let Some(blob) = ext.finish() {
            blobs.push(blob);
        }
    }
    blobs
}
