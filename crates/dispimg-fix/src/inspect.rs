//! Read-only commands: scanning, the image index and previews

use std::fmt;
use std::path::Path;

use dispimg_xlsx::{scan_package, ImageIndex, Package, WorkbookScan, XlsxError};

use crate::error::{RepairError, Result};

pub(crate) fn open_package(path: &Path) -> Result<Package> {
    Package::open(path).map_err(|source| RepairError::PackageUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn scan_opened(path: &Path, package: &Package) -> Result<WorkbookScan> {
    scan_package(package).map_err(|source| RepairError::PackageUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the image index, treating an empty registry like a missing one
pub(crate) fn index_opened(path: &Path, package: &Package) -> Result<ImageIndex> {
    match ImageIndex::from_package(package) {
        Ok(index) if index.is_empty() => Err(RepairError::NoImageMapping(path.to_path_buf())),
        Ok(index) => Ok(index),
        Err(XlsxError::NoImageMapping) => Err(RepairError::NoImageMapping(path.to_path_buf())),
        Err(source) => Err(RepairError::PackageUnreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Find every `DISPIMG` cell, grouped by worksheet.
///
/// An empty result means there is nothing to repair.
pub fn scan<P: AsRef<Path>>(path: P) -> Result<WorkbookScan> {
    let path = path.as_ref();
    let package = open_package(path)?;
    scan_opened(path, &package)
}

/// Picture identifier to image target map of a workbook
pub fn build_image_index<P: AsRef<Path>>(path: P) -> Result<ImageIndex> {
    let path = path.as_ref();
    let package = open_package(path)?;
    index_opened(path, &package)
}

/// One `DISPIMG` cell and where its picture would come from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PreviewEntry {
    pub sheet: String,
    pub coordinate: String,
    pub image_id: String,
    /// Image part the picture resolves to, `None` if the mapping is missing
    pub image_part: Option<String>,
}

impl fmt::Display for PreviewEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image_part {
            Some(part) => write!(f, "{}!{}: {} -> {}", self.sheet, self.coordinate, self.image_id, part),
            None => write!(
                f,
                "{}!{}: {} (mapping missing)",
                self.sheet, self.coordinate, self.image_id
            ),
        }
    }
}

/// List what a repair would do without writing anything.
///
/// A workbook without an image registry still previews; every entry then
/// shows a missing mapping.
pub fn preview<P: AsRef<Path>>(path: P) -> Result<Vec<PreviewEntry>> {
    let path = path.as_ref();
    let package = open_package(path)?;
    let scan = scan_opened(path, &package)?;
    if scan.is_empty() {
        return Ok(Vec::new());
    }

    let index = match index_opened(path, &package) {
        Ok(index) => Some(index),
        Err(RepairError::NoImageMapping(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(scan
        .cells()
        .map(|cell| PreviewEntry {
            sheet: cell.sheet.clone(),
            coordinate: cell.coordinate(),
            image_id: cell.image_id.clone(),
            image_part: index.as_ref().and_then(|i| i.image_part(&cell.image_id)),
        })
        .collect())
}
