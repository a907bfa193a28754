//
// slice.rs
// Dicom-Deface
//
// Per-file pipeline values: a raw slice is anonymized, classified, optionally masked, then written.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use tracing::debug;

use crate::dicom_access::ElementAccess;
use crate::mask::generate_mask;
use crate::metadata::read_orientation;
use crate::pixels::SlicePixels;
use crate::plane::{classify_orientation, ImageOrientation, PlaneLabel};

/// A slice exactly as it was read from disk.
pub struct RawSlice {
    pub(crate) source: PathBuf,
    pub(crate) object: DefaultDicomObject,
}

impl RawSlice {
    pub fn open(path: &Path) -> Result<Self> {
        let object = open_file(path)
            .with_context(|| format!("Failed to open DICOM file {:?}", path))?;
        Ok(Self::from_object(path, object))
    }

    pub fn from_object(path: impl Into<PathBuf>, object: DefaultDicomObject) -> Self {
        Self {
            source: path.into(),
            object,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn object(&self) -> &DefaultDicomObject {
        &self.object
    }
}

/// A slice whose identifying fields have been replaced. Built by [`crate::anonymize::anonymize`].
pub struct AnonymizedSlice {
    pub(crate) source: PathBuf,
    pub(crate) patient_tag: String,
    pub(crate) object: DefaultDicomObject,
}

impl AnonymizedSlice {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn patient_tag(&self) -> &str {
        &self.patient_tag
    }

    pub fn object(&self) -> &DefaultDicomObject {
        &self.object
    }

    pub fn orientation(&self) -> Option<ImageOrientation> {
        read_orientation(&self.object)
    }

    pub fn has_pixel_data(&self) -> bool {
        self.object.has_element(tags::PIXEL_DATA)
    }

    /// Plane of this slice; slices without Pixel Data are never classified.
    pub fn classify(&self, threshold: f64) -> PlaneLabel {
        if !self.has_pixel_data() {
            return PlaneLabel::NoPixelData;
        }
        classify_orientation(self.orientation().as_ref(), threshold)
    }
}

/// Final form of a slice, ready to be written.
pub struct ProcessedSlice {
    plane: PlaneLabel,
    masked: bool,
    object: DefaultDicomObject,
}

impl ProcessedSlice {
    pub fn plane(&self) -> PlaneLabel {
        self.plane
    }

    pub fn was_masked(&self) -> bool {
        self.masked
    }

    pub fn object(&self) -> &DefaultDicomObject {
        &self.object
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        self.object
            .write_to_file(path)
            .with_context(|| format!("Failed to write {:?}", path))
    }
}

/// Applies the facial redaction when `plane` is sagittal and passes every other slice through.
pub fn maybe_mask(slice: AnonymizedSlice, plane: PlaneLabel) -> Result<ProcessedSlice> {
    if !plane.is_sagittal() {
        return Ok(ProcessedSlice {
            plane,
            masked: false,
            object: slice.object,
        });
    }

    let pixels = SlicePixels::from_object(&slice.object)
        .with_context(|| format!("Failed to read pixels of {:?}", slice.source))?;
    let (rows, cols) = pixels.dim();
    let masked = pixels.masked(&generate_mask(rows, cols))?;
    debug!(source = ?slice.source, rows, cols, "applied sagittal mask");

    let object = masked.write_into(slice.object)?;
    Ok(ProcessedSlice {
        plane,
        masked: true,
        object,
    })
}

