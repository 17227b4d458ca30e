//! Package Rewriter: turns `DISPIMG` cells into anchored pictures
//!
//! Each cell goes through one state transition:
//!
//! 1. resolve the identifier in the [`ImageIndex`] (miss: `SkippedNoMapping`)
//! 2. fetch the image bytes from the package (miss: `SkippedNoImageData`)
//! 3. read the natural pixel size of the image
//! 4. size the picture from the cell geometry
//! 5. clear the cell's formula
//! 6. anchor the picture at the cell
//! 7. add the picture to the sheet's drawing (`Repaired`)
//!
//! A failure in steps 3 to 7 restores the original formula (`Reverted`).
//! Skips never touch the cell.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;

use dispimg_core::{cell_geometry, scale_image, Anchor, CellAddress};

use crate::cell_images::ImageIndex;
use crate::content_types::{ContentTypes, CONTENT_TYPES_PART};
use crate::drawing::{image_content_type, DrawingPart, DRAWING_CONTENT_TYPE};
use crate::error::XlsxResult;
use crate::package::Package;
use crate::path::{extension, rels_for_part, relative_target, resolve_target};
use crate::relationships::{Relationships, REL_TYPE_DRAWING};
use crate::scanner::{DispimgCell, SheetLayout, SheetScan, WorkbookScan};
use crate::worksheet::{rewrite_worksheet, WorksheetEdit};

/// Terminal state of a `DISPIMG` cell after a rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    /// The formula was replaced by a picture
    Repaired,
    /// The identifier is not in the image index
    SkippedNoMapping,
    /// The mapped image part is not in the package
    SkippedNoImageData,
    /// Placing the picture failed and the formula was restored
    Reverted { reason: String },
}

impl CellOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, CellOutcome::Repaired)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            CellOutcome::SkippedNoMapping | CellOutcome::SkippedNoImageData
        )
    }
}

impl fmt::Display for CellOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellOutcome::Repaired => write!(f, "repaired"),
            CellOutcome::SkippedNoMapping => write!(f, "skipped: no image mapping"),
            CellOutcome::SkippedNoImageData => write!(f, "skipped: image data missing"),
            CellOutcome::Reverted { reason } => write!(f, "reverted: {}", reason),
        }
    }
}

/// Result for one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellReport {
    pub sheet: String,
    pub address: CellAddress,
    pub image_id: String,
    pub outcome: CellOutcome,
}

impl CellReport {
    /// A1-style coordinate of the cell
    pub fn coordinate(&self) -> String {
        self.address.to_a1_string()
    }
}

/// Per-cell results of a rewrite, in workbook order
#[derive(Debug, Clone, Default)]
pub struct RewriteSummary {
    pub cells: Vec<CellReport>,
    /// Drawing parts created by the rewrite
    pub drawings_created: Vec<String>,
}

impl RewriteSummary {
    pub fn processed(&self) -> usize {
        self.cells.len()
    }

    pub fn repaired(&self) -> usize {
        self.cells.iter().filter(|c| c.outcome.is_repaired()).count()
    }

    pub fn skipped(&self) -> usize {
        self.cells.iter().filter(|c| c.outcome.is_skipped()).count()
    }

    pub fn reverted(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Reverted { .. }))
            .count()
    }
}

/// Rewrites a loaded package in place.
///
/// ```no_run
/// use dispimg_xlsx::{scan_package, ImageIndex, Package, PackageRewriter};
///
/// let mut package = Package::open("book.xlsx")?;
/// let mut scan = scan_package(&package)?;
/// let index = ImageIndex::from_package(&package)?;
///
/// let summary = PackageRewriter::new(&mut package, &index).rewrite(&mut scan, |_, _, _| {})?;
/// println!("{} of {} cells repaired", summary.repaired(), summary.processed());
/// package.save("book_fixed.xlsx")?;
/// # Ok::<(), dispimg_xlsx::XlsxError>(())
/// ```
pub struct PackageRewriter<'a> {
    package: &'a mut Package,
    index: &'a ImageIndex,
    strip_extension_lists: bool,
}

impl<'a> PackageRewriter<'a> {
    pub fn new(package: &'a mut Package, index: &'a ImageIndex) -> Self {
        Self {
            package,
            index,
            strip_extension_lists: true,
        }
    }

    /// Whether worksheet `<extLst>` elements are removed (default: true)
    pub fn strip_extension_lists(mut self, strip: bool) -> Self {
        self.strip_extension_lists = strip;
        self
    }

    /// Repair every cell in `scan`.
    ///
    /// `on_cell` is called after each cell with the number of cells done, the
    /// total and the cell's report. Per-cell failures end up in the summary;
    /// an `Err` means the package itself could not be updated.
    pub fn rewrite<F>(mut self, scan: &mut WorkbookScan, mut on_cell: F) -> XlsxResult<RewriteSummary>
    where
        F: FnMut(usize, usize, &CellReport),
    {
        let total = scan.cell_count();
        let mut done = 0;
        let mut summary = RewriteSummary::default();
        let mut content_types =
            ContentTypes::parse(self.package.required_part(CONTENT_TYPES_PART)?)?;

        let mut touched = HashSet::new();
        for sheet_scan in scan.sheets.iter_mut() {
            touched.insert(sheet_scan.sheet.path.clone());
            let first = summary.cells.len();

            let mut sheet = SheetRewrite::new(self.package, &sheet_scan.sheet.path)?;
            for cell in sheet_scan.cells.iter_mut() {
                let outcome =
                    sheet.repair_cell(self.package, self.index, &sheet_scan.layout, cell, &mut content_types);
                let report = CellReport {
                    sheet: sheet_scan.sheet.name.clone(),
                    address: cell.address,
                    image_id: cell.image_id.clone(),
                    outcome,
                };
                done += 1;
                on_cell(done, total, &report);
                summary.cells.push(report);
            }

            match sheet.commit(self.package, sheet_scan, &mut content_types, self.strip_extension_lists) {
                Ok(Some(created)) => summary.drawings_created.push(created),
                Ok(None) => {}
                Err(e) => {
                    log::warn!(
                        "Sheet '{}': could not attach drawing, restoring formulas: {}",
                        sheet_scan.sheet.name,
                        e
                    );
                    for (cell, report) in sheet_scan
                        .cells
                        .iter_mut()
                        .zip(summary.cells[first..].iter_mut())
                    {
                        if cell.is_cleared() {
                            cell.restore_formula(cell.original_formula().to_string());
                            report.outcome = CellOutcome::Reverted {
                                reason: e.to_string(),
                            };
                        }
                    }
                }
            }
        }

        if self.strip_extension_lists {
            self.strip_remaining_sheets(&touched)?;
        }

        if content_types.is_modified() {
            self.package
                .set_part(CONTENT_TYPES_PART, content_types.to_xml()?);
        }

        log::info!(
            "Repaired {} of {} DISPIMG cells ({} skipped, {} reverted)",
            summary.repaired(),
            summary.processed(),
            summary.skipped(),
            summary.reverted()
        );
        Ok(summary)
    }

    /// Drop `<extLst>` from worksheets that had nothing to repair
    fn strip_remaining_sheets(&mut self, touched: &HashSet<String>) -> XlsxResult<()> {
        let cleared = HashSet::new();
        let edit = WorksheetEdit {
            cleared: &cleared,
            drawing_rel_id: None,
            strip_extension_lists: true,
        };

        for sheet in self.package.worksheets()? {
            if touched.contains(&sheet.path) {
                continue;
            }
            let rewritten = match self.package.part(&sheet.path) {
                Some(xml) => rewrite_worksheet(xml, &edit),
                None => continue,
            };
            match rewritten {
                Ok(Some(xml)) => self.package.set_part(sheet.path, xml),
                Ok(None) => {}
                Err(e) => log::warn!("Sheet '{}' left unchanged: {}", sheet.name, e),
            }
        }
        Ok(())
    }
}

/// Drawing state of the worksheet currently being repaired
struct SheetRewrite {
    sheet_path: String,
    rels: Relationships,
    existing_drawing: Option<String>,
    drawing: Option<DrawingPart>,
}

impl SheetRewrite {
    fn new(package: &Package, sheet_path: &str) -> XlsxResult<Self> {
        let rels = match package.part(&rels_for_part(sheet_path)) {
            Some(xml) => Relationships::parse(xml)?,
            None => Relationships::default(),
        };

        let existing_drawing = rels
            .iter()
            .filter(|r| r.rel_type == REL_TYPE_DRAWING && !r.is_external())
            .map(|r| resolve_target(sheet_path, &r.target))
            .find(|path| package.contains(path));

        Ok(Self {
            sheet_path: sheet_path.to_string(),
            rels,
            existing_drawing,
            drawing: None,
        })
    }

    fn repair_cell(
        &mut self,
        package: &Package,
        index: &ImageIndex,
        layout: &SheetLayout,
        cell: &mut DispimgCell,
        content_types: &mut ContentTypes,
    ) -> CellOutcome {
        let Some(image_part) = index.image_part(&cell.image_id) else {
            log::warn!(
                "{}!{}: no image mapping for '{}'",
                cell.sheet,
                cell.coordinate(),
                cell.image_id
            );
            return CellOutcome::SkippedNoMapping;
        };
        let Some(bytes) = package.part(&image_part) else {
            log::warn!(
                "{}!{}: image part {} not found",
                cell.sheet,
                cell.coordinate(),
                image_part
            );
            return CellOutcome::SkippedNoImageData;
        };

        match self.place_picture(package, layout, cell, bytes, &image_part) {
            Ok(()) => {
                if let Some(ext) = extension(&image_part) {
                    if let Some(content_type) = image_content_type(&ext) {
                        content_types.ensure_default(&ext, content_type);
                    }
                }
                CellOutcome::Repaired
            }
            Err(e) => {
                if cell.is_cleared() {
                    cell.restore_formula(cell.original_formula().to_string());
                }
                log::warn!(
                    "{}!{}: restored formula after failure: {}",
                    cell.sheet,
                    cell.coordinate(),
                    e
                );
                CellOutcome::Reverted {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn place_picture(
        &mut self,
        package: &Package,
        layout: &SheetLayout,
        cell: &mut DispimgCell,
        bytes: &[u8],
        image_part: &str,
    ) -> XlsxResult<()> {
        let (width, height) = image_dimensions(bytes)?;

        let geometry = cell_geometry(layout.column_width(cell.column()), layout.row_height(cell.row()));
        let scaled = scale_image(geometry, width, height);
        log::debug!(
            "{}!{}: image {}x{} in cell {}x{} -> {}x{}",
            cell.sheet,
            cell.coordinate(),
            width,
            height,
            geometry.width,
            geometry.height,
            scaled.width,
            scaled.height
        );

        cell.clear_formula();
        let anchor = Anchor::one_cell(cell.address, scaled);

        let drawing = match self.drawing.take() {
            Some(drawing) => drawing,
            None => match &self.existing_drawing {
                Some(path) => DrawingPart::open(package, path)?,
                None => DrawingPart::create(next_drawing_path(package)),
            },
        };
        self.drawing
            .insert(drawing)
            .add_picture(&anchor, image_part, &cell.image_id)?;
        Ok(())
    }

    /// Write the drawing, its relationship and the updated worksheet.
    ///
    /// Nothing is written unless the worksheet rewrite succeeds. Returns the
    /// name of a newly created drawing part.
    fn commit(
        self,
        package: &mut Package,
        sheet_scan: &SheetScan,
        content_types: &mut ContentTypes,
        strip_extension_lists: bool,
    ) -> XlsxResult<Option<String>> {
        let cleared: HashSet<CellAddress> = sheet_scan
            .cells
            .iter()
            .filter(|c| c.is_cleared())
            .map(|c| c.address)
            .collect();

        let drawing = self.drawing.filter(|d| d.added() > 0);
        let mut rels = self.rels;
        let new_drawing_rel = match &drawing {
            Some(d) if d.is_new() => {
                let stale = rels.remove_type(REL_TYPE_DRAWING);
                if stale > 0 {
                    log::warn!(
                        "{}: dropping {} unusable drawing relationship(s)",
                        self.sheet_path,
                        stale
                    );
                }
                Some(rels.add(REL_TYPE_DRAWING, &relative_target(&self.sheet_path, d.path())))
            }
            _ => None,
        };

        let edit = WorksheetEdit {
            cleared: &cleared,
            drawing_rel_id: new_drawing_rel.as_deref(),
            strip_extension_lists,
        };
        let sheet_xml = rewrite_worksheet(package.required_part(&self.sheet_path)?, &edit)?;

        let mut created = None;
        if let Some(drawing) = drawing {
            drawing.write_into(package)?;
            if drawing.is_new() {
                package.set_part(rels_for_part(&self.sheet_path), rels.to_xml().into_bytes());
                content_types.ensure_override(drawing.path(), DRAWING_CONTENT_TYPE);
                created = Some(drawing.path().to_string());
            }
        }
        if let Some(xml) = sheet_xml {
            package.set_part(self.sheet_path, xml);
        }

        Ok(created)
    }
}

/// Natural pixel size of an encoded image
pub fn image_dimensions(bytes: &[u8]) -> XlsxResult<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// First unused `xl/drawings/drawingN.xml`
fn next_drawing_path(package: &Package) -> String {
    (1..)
        .map(|n| format!("xl/drawings/drawing{}.xml", n))
        .find(|path| !package.contains(path))
        .unwrap_or_default()
}
