//! Prelude module - common imports for dispimg-fix users
//!
//! ```rust
//! use dispimg_fix::prelude::*;
//! ```

pub use crate::{
    build_image_index,
    default_output_path,
    preview,
    repair,
    repair_with_options,
    scan,
    CellAddress,
    CellOutcome,
    CellReport,
    DispimgCell,
    ImageIndex,
    PreviewEntry,
    ProgressEvent,
    RepairError,
    RepairOptions,
    RepairOutcome,
    RepairReport,
    WorkbookScan,
};
