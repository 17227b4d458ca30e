//! # dispimg-fix
//!
//! Repairs workbooks saved by WPS Office whose pictures live "in" cells.
//!
//! Such workbooks store each picture as a `=_xlfn.DISPIMG("ID_...",1)` formula
//! plus an entry in a private `xl/cellimages.xml` registry. Other spreadsheet
//! applications show the formula (or `#NAME?`) instead of the picture. The
//! repair replaces every such cell with a native picture anchored at the cell,
//! sized to the cell and keeping the image's aspect ratio, and writes the
//! result to a new file.
//!
//! ## Commands
//!
//! - [`scan`]: list `DISPIMG` cells per worksheet
//! - [`build_image_index`]: picture identifier to image target map
//! - [`preview`]: what a repair would do, without writing anything
//! - [`repair`] / [`repair_with_options`]: write `<name>_fixed.xlsx`
//!
//! All commands are blocking; run them on a worker thread and pass a channel
//! in [`RepairOptions::progress`] to receive [`ProgressEvent`]s.
//!
//! ## Example
//!
//! ```no_run
//! use dispimg_fix::prelude::*;
//!
//! match repair("photos.xlsx", None)? {
//!     RepairOutcome::Repaired(report) => {
//!         println!("{} of {} pictures repaired", report.repaired(), report.processed());
//!         println!("written to {}", report.output.display());
//!     }
//!     RepairOutcome::NothingToRepair => println!("no DISPIMG formulas found"),
//! }
//! # Ok::<(), dispimg_fix::RepairError>(())
//! ```

mod error;
mod inspect;
pub mod prelude;
pub mod progress;
mod repair;

pub use error::{RepairError, Result};
pub use inspect::{build_image_index, preview, scan, PreviewEntry};
pub use progress::ProgressEvent;
pub use repair::{
    default_output_path, repair, repair_with_options, RepairOptions, RepairOutcome, RepairReport,
};

// Re-export the underlying types
pub use dispimg_core::{
    cell_geometry, scale_image, CellAddress, CellGeometry, ScaledImage, DEFAULT_COLUMN_WIDTH,
    DEFAULT_ROW_HEIGHT, EMU_PER_PIXEL,
};
pub use dispimg_xlsx::{
    CellOutcome, CellReport, DispimgCell, ImageIndex, SheetScan, WorkbookScan, XlsxError,
};
