//
// layout.rs
// Dicom-Deface
//
// Output tree for processed slices: <root>/<patient>/<plane>/<series>/<file>, with path-segment sanitization.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};

use crate::metadata::NO_DESCRIPTION;
use crate::plane::PlaneLabel;

#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
    // Destinations handed out so far; shared by clones across rayon workers.
    claimed: Arc<Mutex<HashSet<PathBuf>>>,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        // Create the output root eagerly so per-file writes only need their own folders.
        fs::create_dir_all(&root).context("Failed to create output directory")?;
        Ok(Self {
            root,
            claimed: Arc::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patient_dir(&self, patient_tag: &str) -> PathBuf {
        self.root.join(sanitize_segment(patient_tag))
    }

    /// Destination of one slice, named after the last component of `source`.
    ///
    /// Patient and series are sanitized into single segments so a hostile
    /// Series Description cannot escape the root. The file name is kept as is.
    pub fn destination(
        &self,
        patient_tag: &str,
        plane: PlaneLabel,
        series: &str,
        source: &Path,
    ) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .with_context(|| format!("{:?} has no file name", source))?;
        Ok(self
            .patient_dir(patient_tag)
            .join(plane.as_str())
            .join(sanitize_segment(series))
            .join(file_name))
    }

    /// Same as [`destination`](Self::destination), creating the parent folders.
    ///
    /// A destination is handed out once per layout; a second slice mapping to
    /// the same path is an error instead of a silent overwrite.
    pub fn prepare(
        &self,
        patient_tag: &str,
        plane: PlaneLabel,
        series: &str,
        source: &Path,
    ) -> Result<PathBuf> {
        let path = self.destination(patient_tag, plane, series, source)?;
        {
            let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
            if !claimed.insert(path.clone()) {
                bail!("{:?} was already written by another slice in this run", path);
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        Ok(path)
    }
}

/// Keep only ASCII word characters and a few safe separators; never a leading dot.
pub fn sanitize_segment(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        cleaned.to_string()
    }
}
