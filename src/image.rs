//
// image.rs
// Dicom-Deface
//
// Exports grayscale PNG previews of slices in a folder so sagittal classification and masking can be eyeballed.
//
// Thales Matheus Mendonça Santos - October 2026

use anyhow::{bail, Context, Result};
use dicom::dictionary_std::tags;
use dicom::object::open_file;
use image::{GrayImage, Luma};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dicom_access::ElementAccess;
use crate::mask::generate_mask;
use crate::metadata::read_orientation;
use crate::pixels::SlicePixels;
use crate::plane::{classify_orientation, PlaneLabel, DEFAULT_THRESHOLD};

/// Options controlling which slices get a preview and how.
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub threshold: f64,
    /// Export every slice with pixel data, not only sagittal ones.
    pub all: bool,
    /// Render sagittal slices with the redaction mask applied.
    pub masked: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            all: false,
            masked: false,
        }
    }
}

fn stretch<T: Copy + Into<f64>>(values: &Array2<T>) -> GrayImage {
    let (rows, cols) = values.dim();
    let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        let v = v.into();
        (lo.min(v), hi.max(v))
    });
    let range = max - min;

    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v: f64 = values[(y as usize, x as usize)].into();
        let scaled = if range > 0.0 {
            (v - min) / range * 255.0
        } else {
            0.0
        };
        Luma([scaled.round() as u8])
    })
}

/// Min/max-stretched 8-bit rendering of a slice.
pub fn to_gray_image(pixels: &SlicePixels) -> GrayImage {
    match pixels {
        SlicePixels::Gray8(a) => stretch(a),
        SlicePixels::Gray16(a) => stretch(a),
    }
}

/// Writes one PNG per selected slice of `dir` (files in name order) into `output`.
/// Returns the written paths; fails when nothing qualified.
pub fn export_previews(dir: &Path, output: &Path, options: &PreviewOptions) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {:?}", dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    // (file, plane, instance number, pixels)
    let mut selected = Vec::new();
    for path in files {
        let obj = match open_file(&path) {
            Ok(obj) => obj,
            Err(e) => {
                debug!(file = ?path, error = %e, "skipping unreadable file");
                continue;
            }
        };
        if !obj.has_element(tags::PIXEL_DATA) {
            continue;
        }

        let plane = classify_orientation(read_orientation(&obj).as_ref(), options.threshold);
        if !options.all && plane != PlaneLabel::Sagittal {
            continue;
        }

        let pixels = match SlicePixels::from_object(&obj) {
            Ok(p) => p,
            Err(e) => {
                debug!(file = ?path, error = %e, "skipping undecodable pixels");
                continue;
            }
        };
        let instance = obj.element_u32(tags::INSTANCE_NUMBER);
        selected.push((path, plane, instance, pixels));
    }

    if selected.is_empty() {
        if options.all {
            bail!("No readable DICOM slices with pixel data in {:?}", dir);
        }
        bail!("No sagittal slices found in {:?}", dir);
    }

    fs::create_dir_all(output).context("Failed to create preview directory")?;

    let total = selected.len();
    let mut written = Vec::with_capacity(total);
    for (idx, (path, plane, instance, pixels)) in selected.into_iter().enumerate() {
        let idx = idx + 1;
        let pixels = if options.masked && plane.is_sagittal() {
            let (rows, cols) = pixels.dim();
            pixels.masked(&generate_mask(rows, cols))?
        } else {
            pixels
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "slice".to_string());
        let name = format!(
            "{:03}_{}_inst{}_{}.png",
            idx,
            stem,
            instance.unwrap_or(idx as u32),
            plane
        );
        let target = output.join(name);

        to_gray_image(&pixels)
            .save(&target)
            .with_context(|| format!("Failed to save image to {:?}", target))?;
        info!("{}/{} {:?} -> {:?}", idx, total, path.file_name().unwrap_or_default(), target);
        written.push(target);
    }

    Ok(written)
}
