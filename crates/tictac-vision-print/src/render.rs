use tictac_vision_core::{RgbImage, CELL_COUNT};

use crate::layout::{BoardLayout, BoardLayoutError, MarkerStyle, PageSpec};

/// Synthetic overhead frame: a board on a plain background, optional markers
/// and optional per-pixel noise.
#[derive(Clone, Debug)]
pub struct SyntheticFrame {
    pub width: usize,
    pub height: usize,
    pub background: [u8; 3],
    pub layout: BoardLayout,
    /// Top-left pixel of the grid (outer boundary line included).
    pub origin: (usize, usize),
    pub markers: [Option<MarkerStyle>; CELL_COUNT],
    /// `(amplitude, seed)`: each channel gets a uniform offset in `[-a, a]`.
    pub noise: Option<(u8, u32)>,
}

impl SyntheticFrame {
    /// Empty board centred on a light-grey canvas.
    pub fn new(width: usize, height: usize) -> Self {
        let layout = BoardLayout::default();
        Self {
            width,
            height,
            background: [235, 235, 235],
            layout,
            origin: centred_origin(width, height, &layout),
            markers: [None; CELL_COUNT],
            noise: None,
        }
    }

    /// Replace the layout and re-centre the board.
    pub fn with_layout(mut self, layout: BoardLayout) -> Self {
        self.layout = layout;
        self.origin = centred_origin(self.width, self.height, &layout);
        self
    }

    pub fn with_origin(mut self, x: usize, y: usize) -> Self {
        self.origin = (x, y);
        self
    }

    /// Shift the board by a signed pixel offset (camera jitter).
    pub fn shifted(mut self, dx: isize, dy: isize) -> Self {
        self.origin = (
            self.origin.0.saturating_add_signed(dx),
            self.origin.1.saturating_add_signed(dy),
        );
        self
    }

    pub fn with_marker(mut self, cell: usize, style: MarkerStyle) -> Self {
        if let Some(slot) = self.markers.get_mut(cell) {
            *slot = Some(style);
        }
        self
    }

    pub fn without_marker(mut self, cell: usize) -> Self {
        if let Some(slot) = self.markers.get_mut(cell) {
            *slot = None;
        }
        self
    }

    pub fn with_noise(mut self, amplitude: u8, seed: u32) -> Self {
        self.noise = Some((amplitude, seed));
        self
    }

    /// Interior rectangle of `cell` in frame coordinates, `(x0, y0, x1, y1)`
    /// with exclusive upper bounds.
    pub fn cell_rect(&self, cell: usize) -> (usize, usize, usize, usize) {
        let (x0, y0, x1, y1) = self.layout.cell_rect(cell);
        let (ox, oy) = self.origin;
        (x0 + ox, y0 + oy, x1 + ox, y1 + oy)
    }

    pub fn render(&self) -> Result<RgbImage, BoardLayoutError> {
        self.layout.validate()?;
        let grid = self.layout.grid_px();
        let (ox, oy) = self.origin;
        if ox + grid > self.width || oy + grid > self.height {
            return Err(BoardLayoutError::DoesNotFit {
                needed: grid,
                width: self.width,
                height: self.height,
                x: ox,
                y: oy,
            });
        }

        let mut img = RgbImage::filled(self.width, self.height, self.background);
        fill_rect(&mut img, (ox, oy, ox + grid, oy + grid), self.layout.line_color);
        for cell in 0..CELL_COUNT {
            let rect = self.cell_rect(cell);
            fill_rect(&mut img, rect, self.layout.cell_color);
            if let Some(marker) = self.markers[cell] {
                fill_disc(&mut img, rect, marker);
            }
        }

        if let Some((amplitude, seed)) = self.noise {
            add_noise(&mut img, amplitude, seed);
        }
        Ok(img)
    }
}

/// Render a printable page with a centred board (black lines on white).
pub fn render_page(page: &PageSpec) -> Result<RgbImage, BoardLayoutError> {
    let (width, height) = page.page_px();
    let layout = page.layout();
    SyntheticFrame {
        width,
        height,
        background: [255, 255, 255],
        layout,
        origin: centred_origin(width, height, &layout),
        markers: [None; CELL_COUNT],
        noise: None,
    }
    .render()
}

fn centred_origin(width: usize, height: usize, layout: &BoardLayout) -> (usize, usize) {
    let grid = layout.grid_px();
    (
        width.saturating_sub(grid) / 2,
        height.saturating_sub(grid) / 2,
    )
}

fn fill_rect(img: &mut RgbImage, (x0, y0, x1, y1): (usize, usize, usize, usize), rgb: [u8; 3]) {
    for y in y0..y1.min(img.height) {
        for x in x0..x1.min(img.width) {
            img.put_pixel(x, y, rgb);
        }
    }
}

fn fill_disc(
    img: &mut RgbImage,
    (x0, y0, x1, y1): (usize, usize, usize, usize),
    marker: MarkerStyle,
) {
    let cx = (x0 + x1) as f32 / 2.0;
    let cy = (y0 + y1) as f32 / 2.0;
    let r = marker.radius_frac * (x1 - x0) as f32;
    let r2 = r * r;
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x, y, marker.color);
            }
        }
    }
}

fn add_noise(img: &mut RgbImage, amplitude: u8, seed: u32) {
    if amplitude == 0 {
        return;
    }
    let span = 2 * amplitude as u32 + 1;
    let mut state = seed.max(1);
    for v in img.data.iter_mut() {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let offset = (state % span) as i32 - amplitude as i32;
        *v = (*v as i32 + offset).clamp(0, 255) as u8;
    }
}
