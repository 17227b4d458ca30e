//! Formula Scanner: finds cells displaying a picture through `DISPIMG`
//!
//! The third-party suite stores an in-cell picture as a formula such as
//! `_xlfn.DISPIMG("ID_8F3C...",1)`. Other readers only see the formula, so
//! every such cell is collected here together with the column widths and row
//! heights needed to size the replacement drawing.

use std::collections::HashMap;

use dispimg_core::{CellAddress, DEFAULT_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;
use crate::workbook::SheetPart;
use crate::xml::{attr_value, CellCursor};

/// Name of the picture-display function
pub const DISPIMG_FUNCTION: &str = "DISPIMG";

/// Extract the picture identifier from a `DISPIMG` formula.
///
/// The formula may carry a leading `=` and the `_xlfn.` future-function
/// prefix. The identifier is the text between the first and second double
/// quote after the function name.
///
/// ```
/// use dispimg_xlsx::scanner::extract_image_id;
///
/// assert_eq!(
///     extract_image_id(r#"=_xlfn.DISPIMG("ID_42",1)"#).as_deref(),
///     Some("ID_42")
/// );
/// assert_eq!(extract_image_id("=SUM(A1:A3)"), None);
/// ```
pub fn extract_image_id(formula: &str) -> Option<String> {
    let formula = formula.trim_start();
    let formula = formula.strip_prefix('=').unwrap_or(formula).trim_start();

    let upper = formula.to_ascii_uppercase();
    let call = format!("{}(", DISPIMG_FUNCTION);
    let args_start = if upper.starts_with(&call) {
        call.len()
    } else if upper.starts_with("_XLFN.") && upper[6..].starts_with(&call) {
        6 + call.len()
    } else {
        return None;
    };

    let args = &formula[args_start..];
    let open = args.find('"')?;
    let rest = &args[open + 1..];
    let close = rest.find('"')?;
    Some(rest[..close].to_string())
}

/// A cell whose formula displays a registry picture.
///
/// The cell owns its live formula value: the rewriter clears it when the
/// picture is placed and restores it if placement fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispimgCell {
    /// Worksheet name
    pub sheet: String,
    /// Cell position
    pub address: CellAddress,
    /// Picture identifier from the formula
    pub image_id: String,
    original_formula: String,
    formula: Option<String>,
}

impl DispimgCell {
    pub fn new(
        sheet: impl Into<String>,
        address: CellAddress,
        image_id: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        let formula = formula.into();
        Self {
            sheet: sheet.into(),
            address,
            image_id: image_id.into(),
            original_formula: formula.clone(),
            formula: Some(formula),
        }
    }

    /// 1-based row number
    pub fn row(&self) -> u32 {
        self.address.row_number()
    }

    /// 1-based column number
    pub fn column(&self) -> u32 {
        self.address.column_number()
    }

    /// A1-style coordinate
    pub fn coordinate(&self) -> String {
        self.address.to_a1_string()
    }

    /// Current formula value, `None` once cleared
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    /// Formula text as found in the worksheet
    pub fn original_formula(&self) -> &str {
        &self.original_formula
    }

    /// Whether the formula has been removed
    pub fn is_cleared(&self) -> bool {
        self.formula.is_none()
    }

    pub(crate) fn clear_formula(&mut self) -> Option<String> {
        self.formula.take()
    }

    pub(crate) fn restore_formula(&mut self, formula: String) {
        self.formula = Some(formula);
    }
}

/// Column widths and row heights of a worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// (first column, last column, width), 1-based inclusive
    columns: Vec<(u32, u32, f64)>,
    /// row number (1-based) -> height in points
    rows: HashMap<u32, f64>,
}

impl SheetLayout {
    /// Width of a 1-based column, or [`DEFAULT_COLUMN_WIDTH`]
    pub fn column_width(&self, column: u32) -> f64 {
        self.columns
            .iter()
            .find(|(min, max, _)| (*min..=*max).contains(&column))
            .map(|(_, _, width)| *width)
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Height of a 1-based row, or [`DEFAULT_ROW_HEIGHT`]
    pub fn row_height(&self, row: u32) -> f64 {
        self.rows
            .get(&row)
            .copied()
            .filter(|h| *h > 0.0)
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    pub fn set_column_width(&mut self, min: u32, max: u32, width: f64) {
        self.columns.push((min, max, width));
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.rows.insert(row, height);
    }
}

/// Scan result for one worksheet
#[derive(Debug, Clone)]
pub struct SheetScan {
    pub sheet: SheetPart,
    pub layout: SheetLayout,
    pub cells: Vec<DispimgCell>,
}

/// Scan result for a whole workbook; only sheets with `DISPIMG` cells are kept.
#[derive(Debug, Clone, Default)]
pub struct WorkbookScan {
    pub sheets: Vec<SheetScan>,
}

impl WorkbookScan {
    /// Whether nothing needs repairing
    pub fn is_empty(&self) -> bool {
        self.sheets.iter().all(|s| s.cells.is_empty())
    }

    /// Total number of `DISPIMG` cells
    pub fn cell_count(&self) -> usize {
        self.sheets.iter().map(|s| s.cells.len()).sum()
    }

    /// Scan result for a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&SheetScan> {
        self.sheets.iter().find(|s| s.sheet.name == name)
    }

    /// All cells in workbook order
    pub fn cells(&self) -> impl Iterator<Item = &DispimgCell> {
        self.sheets.iter().flat_map(|s| s.cells.iter())
    }
}

/// Scan every worksheet of the package.
///
/// A worksheet that fails to parse is logged and skipped; the remaining
/// worksheets are still scanned.
pub fn scan_package(package: &Package) -> XlsxResult<WorkbookScan> {
    let mut scan = WorkbookScan::default();

    for sheet in package.worksheets()? {
        let xml = package.required_part(&sheet.path)?;
        match scan_worksheet(&sheet.name, xml) {
            Ok((layout, cells)) => {
                if !cells.is_empty() {
                    log::info!("Sheet '{}': found {} DISPIMG formulas", sheet.name, cells.len());
                    scan.sheets.push(SheetScan {
                        sheet,
                        layout,
                        cells,
                    });
                }
            }
            Err(e) => {
                log::warn!("Skipping sheet '{}': {}", sheet.name, e);
            }
        }
    }

    Ok(scan)
}

/// Scan one worksheet's XML for `DISPIMG` cells and its layout.
pub fn scan_worksheet(sheet_name: &str, xml: &[u8]) -> XlsxResult<(SheetLayout, Vec<DispimgCell>)> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(false);

    let mut buf = Vec::new();
    let mut layout = SheetLayout::default();
    let mut cells = Vec::new();

    let mut cursor = CellCursor::default();
    let mut current_cell: Option<CellAddress> = None;
    let mut current_formula: Option<String> = None;
    let mut in_formula = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"col" =>
            {
                let min = attr_value(&e, b"min").and_then(|s| s.parse::<u32>().ok());
                let max = attr_value(&e, b"max").and_then(|s| s.parse::<u32>().ok());
                let width = attr_value(&e, b"width").and_then(|s| s.parse::<f64>().ok());
                if let (Some(min), Some(width)) = (min, width) {
                    layout.set_column_width(min, max.unwrap_or(min), width);
                }
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"row" =>
            {
                let row = cursor.enter_row(attr_value(&e, b"r").and_then(|s| s.parse().ok()));
                if let Some(h) = attr_value(&e, b"ht").and_then(|s| s.parse::<f64>().ok()) {
                    layout.set_row_height(row, h);
                }
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"c" => {
                current_cell = Some(cursor.enter_cell(attr_value(&e, b"r").as_deref())?);
                current_formula = None;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                cursor.enter_cell(attr_value(&e, b"r").as_deref())?;
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"f" && current_cell.is_some() => {
                in_formula = true;
                current_formula = Some(String::new());
            }
            Ok(Event::Text(e)) if in_formula => {
                let text = e.unescape()?;
                if let Some(formula) = current_formula.as_mut() {
                    formula.push_str(&text);
                }
            }
            Ok(Event::CData(e)) if in_formula => {
                if let Some(formula) = current_formula.as_mut() {
                    formula.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"f" => in_formula = false,
                b"c" => {
                    if let (Some(address), Some(formula)) = (current_cell.take(), current_formula.take()) {
                        if let Some(image_id) = extract_image_id(&formula) {
                            cells.push(DispimgCell::new(sheet_name, address, image_id, formula));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok((layout, cells))
}
