use serde::{Deserialize, Serialize};
use tictac_vision_core::{ColorEnvelope, HsvRange};

/// Centre crop applied before any other processing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropParams {
    /// Fraction of the frame width kept, centred.
    pub x_ratio: f32,
    /// Fraction of the frame height kept, centred.
    pub y_ratio: f32,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            x_ratio: 0.5,
            y_ratio: 1.0,
        }
    }
}

/// Configuration for [`crate::GridLocator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLocatorParams {
    pub crop: CropParams,
    /// HSV envelope of the printed grid lines.
    pub line_envelope: ColorEnvelope,
    /// Minimum area of the outer boundary as a fraction of the crop area.
    pub min_boundary_area_frac: f32,
    /// Inward erosion of the boundary quad before cells are extracted.
    pub boundary_erosion_px: usize,
    /// Accepted cell area range, as fractions of the boundary area.
    pub min_cell_area_frac: f32,
    pub max_cell_area_frac: f32,
}

impl Default for GridLocatorParams {
    fn default() -> Self {
        Self {
            crop: CropParams::default(),
            line_envelope: ColorEnvelope::single(HsvRange::new([0, 0, 0], [179, 255, 189])),
            min_boundary_area_frac: 0.05,
            boundary_erosion_px: 7,
            min_cell_area_frac: 0.02,
            max_cell_area_frac: 0.9,
        }
    }
}
