//! # dispimg-core
//!
//! Core types shared by the dispimg-fix crates:
//! - [`CellAddress`] - A1-style cell addressing
//! - [`cell_geometry`] and [`scale_image`] - pixel sizing of a picture placed in a cell
//! - [`Anchor`] - one-cell placement of a drawing object
//!
//! ## Example
//!
//! ```rust
//! use dispimg_core::{cell_geometry, scale_image};
//!
//! let cell = cell_geometry(10.0, 20.0);
//! assert_eq!((cell.width, cell.height), (120, 120));
//!
//! let image = scale_image(cell, 200, 100);
//! assert_eq!((image.width, image.height), (144, 72));
//! ```

pub mod address;
pub mod anchor;
pub mod error;
pub mod geometry;

pub use address::CellAddress;
pub use anchor::{Anchor, EmuSize};
pub use error::{Error, Result};
pub use geometry::{
    cell_geometry, pixels_to_emu, scale_image, CellGeometry, ScaledImage, DEFAULT_COLUMN_WIDTH,
    DEFAULT_ROW_HEIGHT, EMU_PER_PIXEL,
};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;
