use dicom::core::value::PrimitiveValue;
use dicom::core::{DataElement, Tag, VR};
use dicom::dictionary_std::tags;
use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::info;

use crate::slice::{AnonymizedSlice, RawSlice};

/// Other Patient IDs (0010,1000)
const OTHER_PATIENT_IDS: Tag = Tag(0x0010, 0x1000);

/// Synthetic tag for the `index`-th patient of a batch (1-based).
pub fn patient_tag(index: usize) -> String {
    format!("Patient_{:04}", index)
}

/// Replaces the five identifying fields and hands back a new slice value.
///
/// Name and ID both become `patient_tag`, birth date and sex are blanked, and
/// Other Patient IDs is dropped.
pub fn anonymize(raw: RawSlice, patient_tag: &str) -> AnonymizedSlice {
    let RawSlice { source, mut object } = raw;

    let replacements = [
        (tags::PATIENT_NAME, VR::PN, patient_tag),
        (tags::PATIENT_ID, VR::LO, patient_tag),
        (tags::PATIENT_BIRTH_DATE, VR::DA, ""),
        (tags::PATIENT_SEX, VR::CS, ""),
    ];

    for (tag, vr, val) in replacements {
        object.put(DataElement::new(tag, vr, PrimitiveValue::from(val)));
    }

    object.remove_element(OTHER_PATIENT_IDS);

    AnonymizedSlice {
        source,
        patient_tag: patient_tag.to_string(),
        object,
    }
}

pub fn process_file(input: &Path, output: Option<PathBuf>, patient_tag: &str) -> Result<PathBuf> {
    let raw = RawSlice::open(input)?;
    let slice = anonymize(raw, patient_tag);

    // Default to <stem>_anon.dcm next to the input
    let output_path = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "slice".to_string());
        input.with_file_name(format!("{}_anon.dcm", stem))
    });

    slice.object().write_to_file(&output_path)?;
    info!(output = ?output_path, "anonymized file saved");

    Ok(output_path)
}
