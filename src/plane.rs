//
// plane.rs
// Dicom-Deface
//
// Classifies a slice into an anatomical plane from the normal of its row/column orientation vectors.
//
// Thales Matheus Mendonça Santos - October 2026

use std::fmt;

use serde::{Deserialize, Serialize};

/// Threshold a normal component must exceed to name a dominant axis.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

pub type Vec3 = [f64; 3];

/// Row and column direction cosines from Image Orientation (Patient).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageOrientation {
    pub row: Vec3,
    pub col: Vec3,
}

impl ImageOrientation {
    pub fn new(row: Vec3, col: Vec3) -> Self {
        Self { row, col }
    }

    /// Builds an orientation from the six values of (0020,0037).
    /// Anything other than exactly six values is rejected.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        match values {
            [rx, ry, rz, cx, cy, cz] => Some(Self::new([*rx, *ry, *rz], [*cx, *cy, *cz])),
            _ => None,
        }
    }

    /// Unnormalized slice normal (`row × col`).
    pub fn normal(&self) -> Vec3 {
        cross(self.row, self.col)
    }
}

/// Why a slice could not be assigned a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unclassifiable {
    MissingOrientation,
    DegenerateOrientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneLabel {
    Sagittal,
    Coronal,
    Axial,
    Oblique,
    Unknown(Unclassifiable),
    NoPixelData,
}

impl PlaneLabel {
    /// Directory name used in the output tree. Both unknown reasons share one folder.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaneLabel::Sagittal => "sagittal",
            PlaneLabel::Coronal => "coronal",
            PlaneLabel::Axial => "axial",
            PlaneLabel::Oblique => "oblique",
            PlaneLabel::Unknown(_) => "unknown",
            PlaneLabel::NoPixelData => "no_pixel_data",
        }
    }

    pub fn is_sagittal(&self) -> bool {
        matches!(self, PlaneLabel::Sagittal)
    }
}

impl fmt::Display for PlaneLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(v: Vec3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Classify a slice from its row and column direction vectors.
///
/// The normal is `row × col`; an axis wins only when its absolute normalized
/// component is above `threshold` and strictly greater than the other two, so
/// ties always end up `Oblique`.
pub fn classify_plane(row: Vec3, col: Vec3, threshold: f64) -> PlaneLabel {
    let normal = cross(row, col);
    let length = norm(normal);
    if length == 0.0 {
        return PlaneLabel::Unknown(Unclassifiable::DegenerateOrientation);
    }

    let [ax, ay, az] = normal.map(|c| (c / length).abs());

    if ax > threshold && ax > ay && ax > az {
        PlaneLabel::Sagittal
    } else if ay > threshold && ay > ax && ay > az {
        PlaneLabel::Coronal
    } else if az > threshold && az > ax && az > ay {
        PlaneLabel::Axial
    } else {
        PlaneLabel::Oblique
    }
}

/// Like [`classify_plane`], but short-circuits to `Unknown` when the slice has no orientation.
pub fn classify_orientation(orientation: Option<&ImageOrientation>, threshold: f64) -> PlaneLabel {
    match orientation {
        Some(o) => classify_plane(o.row, o.col, threshold),
        None => PlaneLabel::Unknown(Unclassifiable::MissingOrientation),
    }
}
