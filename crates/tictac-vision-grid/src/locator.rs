use log::debug;
use tictac_vision_core::{CellRegion, ColorEnvelope, RgbImageView, CELL_COUNT};

use crate::blobs::{find_blobs, Blob};
use crate::mask::{centre_window, BinaryMask, Window};
use crate::{CalibrationError, GridLocatorParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Finds the nine cell regions of an empty board.
///
/// Stateless: the same frame always yields the same regions.
#[derive(Clone, Debug, Default)]
pub struct GridLocator {
    params: GridLocatorParams,
}

impl GridLocator {
    pub fn new(params: GridLocatorParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &GridLocatorParams {
        &self.params
    }

    /// Nine regions in row-major order, or `None` when this frame does not
    /// show a usable board.
    pub fn locate(&self, frame: &RgbImageView<'_>) -> Option<[CellRegion; CELL_COUNT]> {
        match self.try_locate(frame) {
            Ok(regions) => Some(regions),
            Err(err) => {
                debug!("calibration attempt failed: {err}");
                None
            }
        }
    }

    /// Like [`GridLocator::locate`], reporting why the attempt failed.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, frame),
            fields(width = frame.width, height = frame.height)
        )
    )]
    pub fn try_locate(
        &self,
        frame: &RgbImageView<'_>,
    ) -> Result<[CellRegion; CELL_COUNT], CalibrationError> {
        let p = &self.params;
        let window = centre_window(frame.width, frame.height, p.crop.x_ratio, p.crop.y_ratio);
        if window.area() == 0 {
            return Err(CalibrationError::EmptyCrop);
        }

        let lines = line_mask(frame, window, &p.line_envelope);
        let boundary = find_boundary(&lines, window, p)?;
        let boundary_area = boundary.quad.area();

        let interior = BinaryMask::from_quad(window.width, window.height, &boundary.quad)
            .erode_by(p.boundary_erosion_px)
            .and(&lines.invert());

        let min_area = p.min_cell_area_frac * boundary_area;
        let max_area = p.max_cell_area_frac * boundary_area;
        let cells: Vec<CellRegion> = find_blobs(&interior)
            .iter()
            .map(Blob::region)
            .filter(|r| r.area >= min_area && r.area <= max_area)
            .collect();
        debug!(
            "boundary area {:.0}px, {} cell candidates in [{:.0}, {:.0}]",
            boundary_area,
            cells.len(),
            min_area,
            max_area
        );

        if cells.len() != CELL_COUNT {
            return Err(CalibrationError::CellCount { found: cells.len() });
        }

        let (dx, dy) = (window.x as f32, window.y as f32);
        let ordered: Vec<CellRegion> = order_row_major(cells)
            .iter()
            .map(|r| r.translate(dx, dy))
            .collect();
        <[CellRegion; CELL_COUNT]>::try_from(ordered)
            .map_err(|v| CalibrationError::CellCount { found: v.len() })
    }
}

/// Grid-line mask of `window`: colour threshold followed by
/// dilate, close, open and a 3×3 median.
pub fn line_mask(frame: &RgbImageView<'_>, window: Window, envelope: &ColorEnvelope) -> BinaryMask {
    BinaryMask::in_range(frame, window, envelope)
        .dilate3()
        .close3()
        .open3()
        .median3()
}

fn find_boundary(
    lines: &BinaryMask,
    window: Window,
    p: &GridLocatorParams,
) -> Result<Blob, CalibrationError> {
    let largest = find_blobs(lines)
        .into_iter()
        .max_by(|a, b| a.quad.area().total_cmp(&b.quad.area()))
        .ok_or(CalibrationError::BoundaryNotFound)?;
    let frac = largest.quad.area() / window.area() as f32;
    if frac < p.min_boundary_area_frac {
        debug!(
            "largest line blob covers {:.3} of the crop (< {:.3})",
            frac, p.min_boundary_area_frac
        );
        return Err(CalibrationError::BoundaryNotFound);
    }
    Ok(largest)
}

/// Sort regions by centroid `y`, split into rows of three and sort each row
/// by centroid `x`. The result does not depend on the input order.
pub fn order_row_major(mut regions: Vec<CellRegion>) -> Vec<CellRegion> {
    regions.sort_by(|a, b| {
        a.center
            .y
            .total_cmp(&b.center.y)
            .then(a.center.x.total_cmp(&b.center.x))
    });
    for row in regions.chunks_mut(3) {
        row.sort_by(|a, b| {
            a.center
                .x
                .total_cmp(&b.center.x)
                .then(a.center.y.total_cmp(&b.center.y))
        });
    }
    regions
}
