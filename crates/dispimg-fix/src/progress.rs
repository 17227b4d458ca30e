//! Progress events for callers running a repair on another thread

use std::sync::mpsc::Sender;

/// Percentages reported at each milestone of a run
pub mod milestones {
    pub const LOADING: u8 = 5;
    pub const SCANNING: u8 = 10;
    pub const RESOLVING: u8 = 20;
    /// Cells are reported between `RESOLVING` and `CELLS_DONE`
    pub const CELLS_DONE: u8 = 90;
    pub const SAVING: u8 = 95;
    pub const DONE: u8 = 100;
}

/// A progress update: completion percentage and a status line
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProgressEvent {
    pub percent: u8,
    pub status: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, status: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            status: status.into(),
        }
    }
}

/// Sends events if a channel was supplied. A receiver that went away is
/// ignored.
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
    sender: Option<Sender<ProgressEvent>>,
}

impl Progress {
    pub(crate) fn new(sender: Option<Sender<ProgressEvent>>) -> Self {
        Self { sender }
    }

    pub(crate) fn report(&self, percent: u8, status: impl Into<String>) {
        if let Some(sender) = &self.sender {
            if sender.send(ProgressEvent::new(percent, status)).is_err() {
                log::debug!("Progress receiver dropped");
            }
        }
    }

    /// Percentage after `done` of `total` cells
    pub(crate) fn cell_percent(done: usize, total: usize) -> u8 {
        use milestones::{CELLS_DONE, RESOLVING};

        if total == 0 {
            return CELLS_DONE;
        }
        let span = (CELLS_DONE - RESOLVING) as usize;
        RESOLVING + (span * done.min(total) / total) as u8
    }
}
