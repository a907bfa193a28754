use anyhow::{bail, Context, Result};
use chrono::Utc;
use dicom::dictionary_std::tags;
use dicom::object::OpenFileOptions;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::anonymize::{anonymize, patient_tag};
use crate::layout::OutputLayout;
use crate::metadata::{series_name, NO_DESCRIPTION};
use crate::models::BatchSummary;
use crate::plane::{PlaneLabel, DEFAULT_THRESHOLD};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::slice::{maybe_mask, RawSlice};

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_parallel() -> bool {
    true
}

/// Where to read from, where to write to, and how to classify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl BatchConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            threshold: DEFAULT_THRESHOLD,
            parallel: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input.is_dir() {
            bail!("Input {:?} does not exist or is not a directory", self.input);
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            bail!("Threshold must be in (0, 1], got {}", self.threshold);
        }
        Ok(())
    }
}

/// Files of one directory that share a series folder in the output.
#[derive(Debug, Clone)]
pub struct SeriesGroup {
    pub dir: PathBuf,
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// Where a single slice ended up.
#[derive(Debug, Clone)]
pub struct SliceOutcome {
    pub plane: PlaneLabel,
    pub masked: bool,
    pub destination: PathBuf,
}

/// Immediate subdirectories of `input`, sorted by name; `input` itself when there are none.
pub fn discover_patients(input: &Path) -> Result<Vec<PathBuf>> {
    let mut patients: Vec<PathBuf> = fs::read_dir(input)
        .with_context(|| format!("Failed to list {:?}", input))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    patients.sort();

    if patients.is_empty() {
        patients.push(input.to_path_buf());
    }
    Ok(patients)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

/// Reads the Series Description of `path` without loading its pixel data.
fn series_name_of(path: &Path) -> String {
    OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map(|obj| series_name(&obj))
        .unwrap_or_else(|_| NO_DESCRIPTION.to_string())
}

/// Groups every visible file below `patient_dir` by its parent directory.
/// The series name of a group comes from its first file.
pub fn series_groups(patient_dir: &Path) -> Vec<SeriesGroup> {
    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(patient_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if is_hidden(&path) {
            continue;
        }
        let dir = path.parent().unwrap_or(patient_dir).to_path_buf();
        by_dir.entry(dir).or_default().push(path);
    }

    by_dir
        .into_iter()
        .map(|(dir, files)| {
            let name = series_name_of(&files[0]);
            SeriesGroup { dir, name, files }
        })
        .collect()
}

/// read → anonymize → classify → mask if sagittal → write.
pub fn process_slice(
    path: &Path,
    patient: &str,
    series: &str,
    layout: &OutputLayout,
    threshold: f64,
) -> Result<SliceOutcome> {
    let raw = RawSlice::open(path)?;
    let anonymized = anonymize(raw, patient);
    let plane = anonymized.classify(threshold);
    let processed = maybe_mask(anonymized, plane)?;

    let destination = layout.prepare(patient, plane, series, path)?;
    processed.write_to(&destination)?;

    Ok(SliceOutcome {
        plane,
        masked: processed.was_masked(),
        destination,
    })
}

/// Runs the whole batch. Per-file failures are reported to `sink` and counted,
/// never propagated; only a bad configuration or an unreadable input root fails the run.
pub fn run(config: &BatchConfig, sink: &dyn ProgressSink) -> Result<BatchSummary> {
    config.validate()?;
    let started_at = Utc::now();
    let layout = OutputLayout::new(&config.output)?;

    let patients: Vec<(String, PathBuf, Vec<SeriesGroup>)> = discover_patients(&config.input)?
        .into_iter()
        .enumerate()
        .map(|(idx, dir)| {
            let groups = series_groups(&dir);
            (patient_tag(idx + 1), dir, groups)
        })
        .collect();

    let total_files: usize = patients
        .iter()
        .flat_map(|(_, _, groups)| groups.iter())
        .map(|g| g.files.len())
        .sum();
    sink.on_event(ProgressEvent::Started { total: total_files });

    let mut processed = 0;
    let mut failed = 0;
    let mut masked = 0;
    let mut planes: BTreeMap<String, usize> = BTreeMap::new();

    for (tag, dir, groups) in &patients {
        fs::create_dir_all(layout.patient_dir(tag))
            .with_context(|| format!("Failed to create folder for {}", tag))?;
        sink.on_event(ProgressEvent::PatientStarted {
            tag: tag.clone(),
            path: dir.clone(),
        });

        for group in groups {
            debug!(dir = ?group.dir, series = %group.name, files = group.files.len(), "series");

            let handle = |path: &PathBuf| {
                let result = process_slice(path, tag, &group.name, &layout, config.threshold);
                match &result {
                    Ok(outcome) => sink.on_event(ProgressEvent::FileDone {
                        file: path.clone(),
                        plane: outcome.plane,
                        series: group.name.clone(),
                        destination: outcome.destination.clone(),
                    }),
                    Err(e) => sink.on_event(ProgressEvent::FileFailed {
                        file: path.clone(),
                        error: format!("{:#}", e),
                    }),
                }
                result
            };

            let outcomes: Vec<Result<SliceOutcome>> = if config.parallel {
                group.files.par_iter().map(handle).collect()
            } else {
                group.files.iter().map(handle).collect()
            };

            for outcome in outcomes {
                match outcome {
                    Ok(o) => {
                        processed += 1;
                        if o.masked {
                            masked += 1;
                        }
                        *planes.entry(o.plane.as_str().to_string()).or_default() += 1;
                    }
                    Err(_) => failed += 1,
                }
            }
        }
    }

    let summary = BatchSummary {
        input: config.input.clone(),
        output: config.output.clone(),
        patients: patients.len(),
        total_files,
        processed,
        failed,
        masked,
        planes,
        started_at,
        finished_at: Utc::now(),
    };
    sink.on_event(ProgressEvent::Finished(summary.clone()));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn root_is_the_only_patient_without_subfolders() {
        let dir = tempdir().expect("tmpdir");
        fs::write(dir.path().join("a.dcm"), b"x").expect("write");
        let patients = discover_patients(dir.path()).expect("patients");
        assert_eq!(patients, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn patients_are_sorted_subfolders() {
        let dir = tempdir().expect("tmpdir");
        for name in ["zeta", "alpha", "mid"] {
            fs::create_dir(dir.path().join(name)).expect("mkdir");
        }
        fs::write(dir.path().join("loose.dcm"), b"x").expect("write");

        let patients = discover_patients(dir.path()).expect("patients");
        let names: Vec<_> = patients
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn groups_skip_hidden_files_and_fall_back_on_unreadable_series() {
        let dir = tempdir().expect("tmpdir");
        let series = dir.path().join("s1");
        fs::create_dir(&series).expect("mkdir");
        fs::write(series.join(".DS_Store"), b"junk").expect("write");
        fs::write(series.join("b"), b"not dicom").expect("write");
        fs::write(series.join("a"), b"not dicom").expect("write");
        fs::create_dir(dir.path().join("empty")).expect("mkdir");

        let groups = series_groups(dir.path());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, NO_DESCRIPTION);
        let names: Vec<_> = groups[0]
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn config_rejects_bad_threshold_and_missing_input() {
        let dir = tempdir().expect("tmpdir");
        let mut config = BatchConfig::new(dir.path(), dir.path().join("out"));
        assert!(config.validate().is_ok());

        config.threshold = 1.5;
        assert!(config.validate().is_err());

        let missing = BatchConfig::new(dir.path().join("nope"), dir.path().join("out"));
        assert!(missing.validate().is_err());
    }

    #[test]
    fn config_defaults_apply_when_deserializing() {
        let config: BatchConfig =
            serde_json::from_str(r#"{"input": "/in", "output": "/out"}"#).expect("parse");
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert!(config.parallel);
    }
}
