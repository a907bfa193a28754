//
// models.rs
// Dicom-Deface
//
// Defines serializable data structures for slice summaries, batch reports, and web job snapshots.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plane::{ImageOrientation, PlaneLabel};

/// Fields shown by `info` and `classify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceMetadata {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_sex: Option<String>,
    pub series_description: Option<String>,
    pub instance_number: Option<u32>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub orientation: Option<ImageOrientation>,
    pub has_pixel_data: bool,
    pub plane: PlaneLabel,
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub patients: usize,
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    pub masked: usize,
    /// Files written per plane folder name.
    pub planes: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of a web job: progress bar, current operation and log pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: u64,
    pub state: JobState,
    pub total: usize,
    pub processed: usize,
    pub percent: f32,
    pub current: String,
    pub log: Vec<String>,
    pub summary: Option<BatchSummary>,
    pub error: Option<String>,
}
