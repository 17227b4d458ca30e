//! The repair command

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use dispimg_xlsx::{CellReport, PackageRewriter};

use crate::error::{RepairError, Result};
use crate::inspect::{index_opened, open_package, scan_opened};
use crate::progress::{milestones, Progress, ProgressEvent};

/// Options for a repair run
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Output file (default: `<input stem>_fixed.xlsx` next to the input)
    pub output: Option<PathBuf>,
    /// Remove worksheet `<extLst>` elements (default: true)
    pub strip_extension_lists: bool,
    /// Channel receiving progress events
    pub progress: Option<Sender<ProgressEvent>>,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            output: None,
            strip_extension_lists: true,
            progress: None,
        }
    }
}

/// Statistics and per-cell results of a repair that produced an output file
#[derive(Debug, Clone)]
pub struct RepairReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub cells: Vec<CellReport>,
    /// Drawing parts added to the package
    pub drawings_created: Vec<String>,
}

impl RepairReport {
    /// Number of `DISPIMG` cells processed
    pub fn processed(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells turned into pictures
    pub fn repaired(&self) -> usize {
        self.cells.iter().filter(|c| c.outcome.is_repaired()).count()
    }

    /// Cells left with their formula
    pub fn unrepaired(&self) -> impl Iterator<Item = &CellReport> {
        self.cells.iter().filter(|c| !c.outcome.is_repaired())
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    /// An output file was written
    Repaired(RepairReport),
    /// The workbook has no `DISPIMG` cells; nothing was written
    NothingToRepair,
}

impl RepairOutcome {
    /// Output file, if one was written
    pub fn output(&self) -> Option<&Path> {
        match self {
            RepairOutcome::Repaired(report) => Some(&report.output),
            RepairOutcome::NothingToRepair => None,
        }
    }

    pub fn report(&self) -> Option<&RepairReport> {
        match self {
            RepairOutcome::Repaired(report) => Some(report),
            RepairOutcome::NothingToRepair => None,
        }
    }
}

/// `<input stem>_fixed.xlsx` in the input's directory
///
/// ```
/// use dispimg_fix::default_output_path;
/// use std::path::Path;
///
/// assert_eq!(
///     default_output_path("data/report.xlsx"),
///     Path::new("data/report_fixed.xlsx")
/// );
/// ```
pub fn default_output_path<P: AsRef<Path>>(input: P) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_fixed.xlsx", stem))
}

/// Repair a workbook with default options, writing to `output` or the default
/// output path
pub fn repair<P: AsRef<Path>>(path: P, output: Option<&Path>) -> Result<RepairOutcome> {
    repair_with_options(
        path,
        &RepairOptions {
            output: output.map(Path::to_path_buf),
            ..Default::default()
        },
    )
}

/// Repair a workbook.
///
/// The input file is never modified. No output is written when the workbook
/// has no `DISPIMG` cells or when any run-level error occurs.
pub fn repair_with_options<P: AsRef<Path>>(path: P, options: &RepairOptions) -> Result<RepairOutcome> {
    let input = path.as_ref();
    let progress = Progress::new(options.progress.clone());

    progress.report(milestones::LOADING, "Loading workbook");
    let mut package = open_package(input)?;

    progress.report(milestones::SCANNING, "Scanning for DISPIMG formulas");
    let mut scan = scan_opened(input, &package)?;
    if scan.is_empty() {
        log::info!("No DISPIMG formulas in '{}'", input.display());
        progress.report(milestones::DONE, "Nothing to repair");
        return Ok(RepairOutcome::NothingToRepair);
    }
    log::info!(
        "Found {} DISPIMG formulas in {} sheets",
        scan.cell_count(),
        scan.sheets.len()
    );

    progress.report(milestones::RESOLVING, "Resolving image mapping");
    let index = index_opened(input, &package)?;

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    if same_file(input, &output) {
        return Err(RepairError::OutputIsInput(output));
    }

    let summary = PackageRewriter::new(&mut package, &index)
        .strip_extension_lists(options.strip_extension_lists)
        .rewrite(&mut scan, |done, total, report| {
            progress.report(
                Progress::cell_percent(done, total),
                format!("{}!{}: {}", report.sheet, report.coordinate(), report.outcome),
            );
        })
        .map_err(|source| RepairError::Rewrite {
            path: input.to_path_buf(),
            source,
        })?;

    progress.report(milestones::SAVING, "Saving workbook");
    package
        .save(&output)
        .map_err(|source| RepairError::Serialization {
            path: output.clone(),
            source,
        })?;
    log::info!(
        "Wrote '{}' ({} of {} pictures repaired)",
        output.display(),
        summary.repaired(),
        summary.processed()
    );
    progress.report(milestones::DONE, "Repair complete");

    Ok(RepairOutcome::Repaired(RepairReport {
        input: input.to_path_buf(),
        output,
        cells: summary.cells,
        drawings_created: summary.drawings_created,
    }))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
