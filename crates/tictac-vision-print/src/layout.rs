use serde::{Deserialize, Serialize};

/// Pixel geometry and colours of a 3×3 board.
///
/// The grid is `3 * cell_px + 4 * line_px` pixels wide: four lines per axis,
/// the outer two forming the board boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub cell_px: usize,
    pub line_px: usize,
    pub line_color: [u8; 3],
    pub cell_color: [u8; 3],
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            cell_px: 80,
            line_px: 6,
            line_color: [20, 20, 20],
            cell_color: [200, 40, 40],
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BoardLayoutError {
    #[error("cell_px must be > 0")]
    InvalidCellSize,
    #[error("line_px must be > 0")]
    InvalidLineWidth,
    #[error("board of {needed}px does not fit a {width}x{height} canvas at ({x}, {y})")]
    DoesNotFit {
        needed: usize,
        width: usize,
        height: usize,
        x: usize,
        y: usize,
    },
}

impl BoardLayout {
    pub fn validate(&self) -> Result<(), BoardLayoutError> {
        if self.cell_px == 0 {
            return Err(BoardLayoutError::InvalidCellSize);
        }
        if self.line_px == 0 {
            return Err(BoardLayoutError::InvalidLineWidth);
        }
        Ok(())
    }

    /// Side length of the whole grid, boundary lines included.
    #[inline]
    pub fn grid_px(&self) -> usize {
        3 * self.cell_px + 4 * self.line_px
    }

    /// Interior rectangle of cell `index` (row-major) relative to the grid
    /// origin, as `(x0, y0, x1, y1)` with exclusive upper bounds.
    pub fn cell_rect(&self, index: usize) -> (usize, usize, usize, usize) {
        let (row, col) = (index / 3, index % 3);
        let pitch = self.cell_px + self.line_px;
        let x0 = self.line_px + col * pitch;
        let y0 = self.line_px + row * pitch;
        (x0, y0, x0 + self.cell_px, y0 + self.cell_px)
    }
}

/// A filled disc drawn into a cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: [u8; 3],
    /// Disc radius as a fraction of the cell side.
    pub radius_frac: f32,
}

impl MarkerStyle {
    pub const fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            radius_frac: 0.38,
        }
    }

    /// Light marker (kind A in the default configuration).
    pub const WHITE: MarkerStyle = MarkerStyle::new([245, 245, 245]);
    /// Dark marker (kind B in the default configuration).
    pub const BLACK: MarkerStyle = MarkerStyle::new([25, 25, 25]);
}

/// Printable page: physical size and print resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub width_mm: f32,
    pub height_mm: f32,
    pub dpi: f32,
    pub cell_mm: f32,
    pub line_mm: f32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            dpi: 300.0,
            cell_mm: 30.0,
            line_mm: 2.0,
        }
    }
}

impl PageSpec {
    #[inline]
    pub fn px_per_mm(&self) -> f32 {
        self.dpi / 25.4
    }

    pub fn page_px(&self) -> (usize, usize) {
        let s = self.px_per_mm();
        (
            (self.width_mm * s) as usize,
            (self.height_mm * s) as usize,
        )
    }

    /// Board layout in printer pixels: black lines on white paper.
    pub fn layout(&self) -> BoardLayout {
        let s = self.px_per_mm();
        BoardLayout {
            cell_px: ((self.cell_mm * s) as usize).max(1),
            line_px: ((self.line_mm * s) as usize).max(1),
            line_color: [0, 0, 0],
            cell_color: [255, 255, 255],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_rects_are_row_major() {
        let layout = BoardLayout::default();
        assert_eq!(layout.grid_px(), 264);
        assert_eq!(layout.cell_rect(0), (6, 6, 86, 86));
        assert_eq!(layout.cell_rect(4), (92, 92, 172, 172));
        assert_eq!(layout.cell_rect(8), (178, 178, 258, 258));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut layout = BoardLayout::default();
        layout.cell_px = 0;
        assert_eq!(layout.validate(), Err(BoardLayoutError::InvalidCellSize));
        layout.cell_px = 10;
        layout.line_px = 0;
        assert_eq!(layout.validate(), Err(BoardLayoutError::InvalidLineWidth));
    }

    #[test]
    fn a4_page_at_300_dpi() {
        let page = PageSpec::default();
        assert_eq!(page.page_px(), (2480, 3507));
        let layout = page.layout();
        assert_eq!(layout.cell_px, 354);
        assert_eq!(layout.line_px, 23);
    }
}
