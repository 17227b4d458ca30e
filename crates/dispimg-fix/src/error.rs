//! Run-level failures

use std::path::PathBuf;

use dispimg_xlsx::XlsxError;
use thiserror::Error;

/// Result type for repair runs
pub type Result<T> = std::result::Result<T, RepairError>;

/// Failures that stop a run.
///
/// Problems with individual cells are not errors; they are reported per cell
/// in the [`RepairReport`](crate::RepairReport).
#[derive(Debug, Error)]
pub enum RepairError {
    /// The container could not be opened or is not a workbook
    #[error("cannot read '{}': {source}", .path.display())]
    PackageUnreadable {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    /// The cell image registry or its relationships are missing or empty
    #[error("no image mapping available in '{}'", .0.display())]
    NoImageMapping(PathBuf),

    /// The output would overwrite the input
    #[error("output path '{}' is the input file", .0.display())]
    OutputIsInput(PathBuf),

    /// Updating the package parts failed
    #[error("cannot rewrite '{}': {source}", .path.display())]
    Rewrite {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    /// Writing the output file failed; no output was left behind
    #[error("cannot write '{}': {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
}

impl RepairError {
    /// Whether the input could not be used at all (nothing was written)
    pub fn is_package_unreadable(&self) -> bool {
        matches!(
            self,
            RepairError::PackageUnreadable { .. } | RepairError::NoImageMapping(_)
        )
    }
}
