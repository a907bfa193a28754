use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::models::BatchSummary;
use crate::plane::PlaneLabel;

/// Something a batch run reports while it works.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    PatientStarted {
        tag: String,
        path: PathBuf,
    },
    FileDone {
        file: PathBuf,
        plane: PlaneLabel,
        series: String,
        destination: PathBuf,
    },
    FileFailed {
        file: PathBuf,
        error: String,
    },
    Finished(BatchSummary),
}

impl ProgressEvent {
    /// One log-pane line for this event.
    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::Started { total } => format!("Found {} files to process.", total),
            ProgressEvent::PatientStarted { tag, path } => {
                format!("Processing {}: {}", tag, path.display())
            }
            ProgressEvent::FileDone {
                file,
                plane,
                series,
                ..
            } => format!(
                "[{}] {}/{} -> saved to {}/{}",
                plane,
                series,
                file_label(file),
                plane,
                series
            ),
            ProgressEvent::FileFailed { file, error } => {
                format!("Error processing '{}': {}", file.display(), error)
            }
            ProgressEvent::Finished(summary) => format!(
                "Done: {} of {} files processed, {} failed, {} masked.",
                summary.processed, summary.total_files, summary.failed, summary.masked
            ),
        }
    }

    /// Whether this event advances the per-file progress counter.
    pub fn completes_file(&self) -> bool {
        matches!(
            self,
            ProgressEvent::FileDone { .. } | ProgressEvent::FileFailed { .. }
        )
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Receives progress events from a batch run. Must be shareable across rayon workers.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_event(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::FileFailed { .. } => warn!("{}", event.describe()),
            _ => info!("{}", event.describe()),
        }
    }
}
