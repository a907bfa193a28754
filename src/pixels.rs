//
// pixels.rs
// Dicom-Deface
//
// Pulls a single-frame grayscale pixel matrix out of a DICOM object and writes a replacement payload back.
//
// Thales Matheus Mendonça Santos - October 2026

use std::borrow::Cow;

use anyhow::{Context, Result};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{DefaultDicomObject, FileDicomObject, FileMetaTableBuilder};
use dicom::transfer_syntax::entries::{EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN};
use dicom_pixeldata::PixelDecoder;
use ndarray::Array2;
use thiserror::Error;

use crate::mask::{apply_mask, MaskError, MaskMatrix};

#[derive(Debug, Error)]
pub enum PixelError {
    #[error("failed to decode pixel data: {0}")]
    Decode(String),
    #[error("multi-frame images are not supported ({0} frames)")]
    MultiFrame(u32),
    #[error("only single-sample (grayscale) images are supported, got {0} samples per pixel")]
    MultiSample(u16),
    #[error("unsupported bits allocated: {0}")]
    UnsupportedBitsAllocated(u16),
    #[error("pixel payload holds {actual} bytes, expected at least {expected}")]
    Truncated { expected: usize, actual: usize },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Pixel samples of one slice, kept at their allocated width.
#[derive(Debug, Clone, PartialEq)]
pub enum SlicePixels {
    Gray8(Array2<u8>),
    Gray16(Array2<u16>),
}

impl SlicePixels {
    /// Decodes the pixel data of `obj` into a `rows x columns` matrix.
    pub fn from_object(obj: &DefaultDicomObject) -> Result<Self, PixelError> {
        let decoded = obj
            .decode_pixel_data()
            .map_err(|e| PixelError::Decode(e.to_string()))?;

        if decoded.number_of_frames() > 1 {
            return Err(PixelError::MultiFrame(decoded.number_of_frames()));
        }
        if decoded.samples_per_pixel() != 1 {
            return Err(PixelError::MultiSample(decoded.samples_per_pixel()));
        }

        let rows = decoded.rows() as usize;
        let cols = decoded.columns() as usize;
        Self::from_le_bytes(rows, cols, decoded.bits_allocated(), decoded.data())
    }

    /// Interprets a little-endian, row-major sample buffer. Trailing padding is ignored.
    pub fn from_le_bytes(
        rows: usize,
        cols: usize,
        bits_allocated: u16,
        data: &[u8],
    ) -> Result<Self, PixelError> {
        let samples = rows * cols;
        match bits_allocated {
            8 => {
                check_len(samples, data)?;
                let values = data[..samples].to_vec();
                Ok(SlicePixels::Gray8(Array2::from_shape_vec((rows, cols), values)?))
            }
            16 => {
                check_len(samples * 2, data)?;
                let values = data[..samples * 2]
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(SlicePixels::Gray16(Array2::from_shape_vec((rows, cols), values)?))
            }
            other => Err(PixelError::UnsupportedBitsAllocated(other)),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        match self {
            SlicePixels::Gray8(a) => a.dim(),
            SlicePixels::Gray16(a) => a.dim(),
        }
    }

    pub fn masked(&self, mask: &MaskMatrix) -> Result<Self, MaskError> {
        Ok(match self {
            SlicePixels::Gray8(a) => SlicePixels::Gray8(apply_mask(a, mask)?),
            SlicePixels::Gray16(a) => SlicePixels::Gray16(apply_mask(a, mask)?),
        })
    }

    /// Row-major little-endian payload at the original sample width.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            SlicePixels::Gray8(a) => a.iter().copied().collect(),
            SlicePixels::Gray16(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn vr(&self) -> VR {
        match self {
            SlicePixels::Gray8(_) => VR::OB,
            SlicePixels::Gray16(_) => VR::OW,
        }
    }

    /// Replaces the Pixel Data of `obj` with these samples.
    ///
    /// Native little-endian files keep their file meta. Anything else (big endian,
    /// encapsulated) is re-stamped as Explicit VR Little Endian, since the new
    /// payload is always native.
    pub fn write_into(&self, obj: DefaultDicomObject) -> Result<DefaultDicomObject> {
        let payload = DataElement::new(
            tags::PIXEL_DATA,
            self.vr(),
            PrimitiveValue::from(self.to_le_bytes()),
        );

        if is_native_little_endian(obj.meta().transfer_syntax()) {
            let mut obj = obj;
            obj.put(payload);
            return Ok(obj);
        }

        let mut dataset = obj.into_inner();
        dataset.put(payload);

        let sop_class_uid = dataset
            .element(tags::SOP_CLASS_UID)
            .ok()
            .and_then(|e| e.to_str().ok())
            .unwrap_or(Cow::Borrowed("1.2.840.10008.5.1.4.1.1.7"))
            .into_owned();
        let sop_instance_uid = dataset
            .element(tags::SOP_INSTANCE_UID)
            .ok()
            .and_then(|e| e.to_str().ok())
            .unwrap_or(Cow::Borrowed("1.2.3.4.5"))
            .into_owned();

        let file_meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .media_storage_sop_class_uid(sop_class_uid.as_str())
            .media_storage_sop_instance_uid(sop_instance_uid.as_str())
            .build()
            .context("Failed to rebuild file meta")?;

        let mut file_obj =
            FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, file_meta);
        for elem in dataset {
            file_obj.put(elem);
        }
        Ok(file_obj)
    }
}

fn check_len(expected: usize, data: &[u8]) -> Result<(), PixelError> {
    if data.len() < expected {
        return Err(PixelError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn is_native_little_endian(ts: &str) -> bool {
    let ts = ts.trim_end_matches(&['\0', ' '][..]);
    ts == EXPLICIT_VR_LITTLE_ENDIAN.uid() || ts == IMPLICIT_VR_LITTLE_ENDIAN.uid()
}
