//! Pixel sizing of a picture placed in a cell
//!
//! Column widths and row heights are stored in the package in character and
//! point units. Neither maps 1:1 onto screen pixels, so the multipliers below
//! are chosen to give legible pictures in default-sized cells, and clamped so
//! that corrupt dimension metadata cannot produce degenerate sizes.

/// Column width used when a column carries no width metadata
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;

/// Row height used when a row carries no height metadata
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// Pixels per column width unit
pub const COLUMN_WIDTH_MULTIPLIER: f64 = 12.0;

/// Pixels per row height unit
pub const ROW_HEIGHT_MULTIPLIER: f64 = 6.0;

/// Native drawing length units (EMU) per pixel: 914400 per inch at 96 DPI
pub const EMU_PER_PIXEL: i64 = 9525;

const MIN_CELL_WIDTH: u32 = 100;
const MAX_CELL_WIDTH: u32 = 800;
const MIN_CELL_HEIGHT: u32 = 80;
const MAX_CELL_HEIGHT: u32 = 600;

// Pictures may overflow their cell by 20% on each axis.
const CELL_OVERFLOW: f64 = 1.2;
const MIN_SCALE: f64 = 0.08;
const MIN_IMAGE_WIDTH: u32 = 60;
const MIN_IMAGE_HEIGHT: u32 = 45;
const FALLBACK_IMAGE: ScaledImage = ScaledImage {
    width: 120,
    height: 90,
};

/// Pixel size of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    pub width: u32,
    pub height: u32,
}

/// Pixel size of a picture after fitting it to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledImage {
    pub width: u32,
    pub height: u32,
}

/// Compute the pixel size of a cell from its column width and row height.
///
/// Non-positive or non-finite dimensions are treated as missing and replaced
/// by [`DEFAULT_COLUMN_WIDTH`] / [`DEFAULT_ROW_HEIGHT`].
///
/// ```
/// use dispimg_core::cell_geometry;
///
/// let cell = cell_geometry(10.0, 20.0);
/// assert_eq!((cell.width, cell.height), (120, 120));
/// ```
pub fn cell_geometry(column_width: f64, row_height: f64) -> CellGeometry {
    let column_width = or_default(column_width, DEFAULT_COLUMN_WIDTH);
    let row_height = or_default(row_height, DEFAULT_ROW_HEIGHT);

    CellGeometry {
        width: to_pixels(
            column_width * COLUMN_WIDTH_MULTIPLIER,
            MIN_CELL_WIDTH,
            MAX_CELL_WIDTH,
        ),
        height: to_pixels(
            row_height * ROW_HEIGHT_MULTIPLIER,
            MIN_CELL_HEIGHT,
            MAX_CELL_HEIGHT,
        ),
    }
}

/// Fit a picture of natural size `image_width` x `image_height` to a cell,
/// preserving its aspect ratio.
///
/// The picture is allowed to grow to 120% of the cell, is never shrunk below
/// 8% of its natural size, and is never smaller than 60x45 pixels. A zero
/// dimension yields a fixed 120x90 placeholder size.
pub fn scale_image(cell: CellGeometry, image_width: u32, image_height: u32) -> ScaledImage {
    if image_width == 0 || image_height == 0 {
        return FALLBACK_IMAGE;
    }

    let natural_width = image_width as f64;
    let natural_height = image_height as f64;
    let ratio = natural_width / natural_height;

    let target_width = cell.width as f64 * CELL_OVERFLOW;
    let target_height = cell.height as f64 * CELL_OVERFLOW;

    let scale = (target_width / natural_width)
        .min(target_height / natural_height)
        .max(MIN_SCALE);

    let mut width = round_px(natural_width * scale).max(MIN_IMAGE_WIDTH);
    let mut height = round_px(natural_height * scale).max(MIN_IMAGE_HEIGHT);

    let actual_ratio = width as f64 / height as f64;
    if (actual_ratio - ratio).abs() / ratio > 0.01 {
        // Re-derive the minor dimension; the floors still apply afterwards.
        if ratio > 1.0 {
            height = round_px(width as f64 / ratio).max(MIN_IMAGE_HEIGHT);
        } else {
            width = round_px(height as f64 * ratio).max(MIN_IMAGE_WIDTH);
        }
    }

    ScaledImage { width, height }
}

/// Convert pixels to EMU
pub fn pixels_to_emu(pixels: u32) -> i64 {
    pixels as i64 * EMU_PER_PIXEL
}

fn or_default(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn to_pixels(value: f64, min: u32, max: u32) -> u32 {
    round_px(value).clamp(min, max)
}

fn round_px(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(u32::MAX as f64) as u32
}
