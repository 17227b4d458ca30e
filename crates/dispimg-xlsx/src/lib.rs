//! # dispimg-xlsx
//!
//! Reading and rewriting of XLSX packages whose pictures are stored as
//! `DISPIMG` formulas backed by a `cellimages.xml` registry.
//!
//! The package is loaded into memory as a whole ([`Package`]). Worksheets are
//! scanned for `DISPIMG` cells ([`scan_package`]), the registry is joined with
//! its relationships once ([`ImageIndex`]), and [`PackageRewriter`] replaces
//! every resolvable cell with a one-cell-anchored picture in the sheet's
//! drawing part. Parts that are not involved are written back unchanged.
//!
//! ## Example
//!
//! ```no_run
//! use dispimg_xlsx::{scan_package, ImageIndex, Package, PackageRewriter};
//!
//! let mut package = Package::open("input.xlsx")?;
//! let mut scan = scan_package(&package)?;
//! if !scan.is_empty() {
//!     let index = ImageIndex::from_package(&package)?;
//!     PackageRewriter::new(&mut package, &index).rewrite(&mut scan, |_, _, _| {})?;
//!     package.save("input_fixed.xlsx")?;
//! }
//! # Ok::<(), dispimg_xlsx::XlsxError>(())
//! ```

pub mod cell_images;
pub mod content_types;
pub mod drawing;
mod error;
pub mod package;
pub mod path;
pub mod relationships;
pub mod rewriter;
pub mod scanner;
pub mod workbook;
pub mod worksheet;
mod xml;

pub use cell_images::{ImageIndex, ImageRegistryEntry, CELL_IMAGES_PART};
pub use drawing::DrawingPart;
pub use error::{XlsxError, XlsxResult};
pub use package::Package;
pub use rewriter::{image_dimensions, CellOutcome, CellReport, PackageRewriter, RewriteSummary};
pub use scanner::{extract_image_id, scan_package, DispimgCell, SheetLayout, SheetScan, WorkbookScan};
pub use workbook::SheetPart;
