//! One-cell anchors for drawing objects

use crate::address::CellAddress;
use crate::geometry::{pixels_to_emu, ScaledImage};

/// Extent of a drawing object in EMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuSize {
    pub cx: i64,
    pub cy: i64,
}

impl From<ScaledImage> for EmuSize {
    fn from(image: ScaledImage) -> Self {
        Self {
            cx: pixels_to_emu(image.width),
            cy: pixels_to_emu(image.height),
        }
    }
}

/// Placement of a drawing object whose top-left corner is pinned to a cell.
///
/// The object keeps its own extent regardless of the size of the cell
/// (`<xdr:oneCellAnchor>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Cell holding the top-left corner (0-based row/column)
    pub from: CellAddress,
    /// Offset from the left edge of the cell, in EMU
    pub col_offset: i64,
    /// Offset from the top edge of the cell, in EMU
    pub row_offset: i64,
    /// Size of the object
    pub ext: EmuSize,
}

impl Anchor {
    /// Anchor a picture to the top-left corner of `cell` with no offset
    pub fn one_cell(cell: CellAddress, image: ScaledImage) -> Self {
        Self {
            from: cell,
            col_offset: 0,
            row_offset: 0,
            ext: image.into(),
        }
    }
}
