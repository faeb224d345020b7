use crate::{core, grid};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid RGB image buffer length (expected {expected} bytes, got {got})")]
    InvalidRgbBuffer { expected: usize, got: usize },

    #[error("invalid RGB image dimensions (width={width}, height={height})")]
    InvalidRgbDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    Calibration(#[from] grid::CalibrationError),
}

/// Convert an `image::RgbImage` into the lightweight core view type.
pub fn rgb_view(img: &::image::RgbImage) -> core::RgbImageView<'_> {
    core::RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Copy an `image::RgbImage` into an owned core image.
pub fn from_image(img: &::image::RgbImage) -> core::RgbImage {
    core::RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Copy a core image into an `image::RgbImage`, e.g. for saving.
pub fn to_image(img: &core::RgbImage) -> Result<::image::RgbImage, DetectError> {
    let width = u32::try_from(img.width).unwrap_or(u32::MAX);
    let height = u32::try_from(img.height).unwrap_or(u32::MAX);
    rgb_image_from_slice(width, height, &img.data)
}

/// Build an `image::RgbImage` from a raw interleaved RGB buffer.
pub fn rgb_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::RgbImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidRgbDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h).and_then(|n| n.checked_mul(3)) else {
        return Err(DetectError::InvalidRgbDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidRgbBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::RgbImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidRgbDimensions { width, height })
}

/// Decode any format the `image` crate understands into a core RGB image.
pub fn load_rgb(path: impl AsRef<std::path::Path>) -> Result<core::RgbImage, DetectError> {
    let img = ::image::open(path.as_ref())?.to_rgb8();
    Ok(from_image(&img))
}

/// Encode a core RGB image; the format follows the file extension.
pub fn save_rgb(
    img: &core::RgbImage,
    path: impl AsRef<std::path::Path>,
) -> Result<(), DetectError> {
    to_image(img)?.save(path.as_ref())?;
    Ok(())
}

/// Run grid calibration end-to-end on an `image::RgbImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, params),
        fields(width = img.width(), height = img.height())
    )
)]
pub fn locate_cells(
    img: &::image::RgbImage,
    params: &grid::GridLocatorParams,
) -> Result<[core::CellRegion; core::CELL_COUNT], DetectError> {
    let locator = grid::GridLocator::new(params.clone());
    Ok(locator.try_locate(&rgb_view(img))?)
}

/// Same as [`locate_cells`] from a raw interleaved RGB buffer.
pub fn locate_cells_from_rgb_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    params: &grid::GridLocatorParams,
) -> Result<[core::CellRegion; core::CELL_COUNT], DetectError> {
    let img = rgb_image_from_slice(width, height, pixels)?;
    locate_cells(&img, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::SyntheticFrame;

    #[test]
    fn buffer_length_is_validated() {
        let err = rgb_image_from_slice(4, 2, &[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidRgbBuffer {
                expected: 24,
                got: 10
            }
        ));
    }

    #[test]
    fn conversions_keep_pixels() {
        let frame = SyntheticFrame::new(320, 240).render().expect("render");
        let img = to_image(&frame).expect("to image");
        assert_eq!((img.width(), img.height()), (320, 240));
        let view = rgb_view(&img);
        assert_eq!(view.pixel(5, 7), frame.pixel(5, 7));
        assert_eq!(from_image(&img), frame);
    }

    #[test]
    fn locates_a_synthetic_board() {
        let frame = SyntheticFrame::new(640, 480).render().expect("render");
        let regions = locate_cells_from_rgb_u8(
            640,
            480,
            &frame.data,
            &grid::GridLocatorParams::default(),
        )
        .expect("calibrated");
        let (x0, y0, x1, y1) = SyntheticFrame::new(640, 480).cell_rect(4);
        assert!((regions[4].center.x - (x0 + x1) as f32 / 2.0).abs() < 2.0);
        assert!((regions[4].center.y - (y0 + y1) as f32 / 2.0).abs() < 2.0);
    }

    #[test]
    fn calibration_errors_are_wrapped() {
        let frame = core::RgbImage::filled(64, 48, [230, 230, 230]);
        let img = to_image(&frame).expect("to image");
        let err = locate_cells(&img, &grid::GridLocatorParams::default()).unwrap_err();
        assert!(matches!(
            err,
            DetectError::Calibration(grid::CalibrationError::BoundaryNotFound)
        ));
    }
}
