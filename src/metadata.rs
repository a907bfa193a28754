use std::path::Path;

use anyhow::{Context, Result};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};

use crate::dicom_access::ElementAccess;
use crate::models::SliceMetadata;
use crate::plane::{classify_orientation, ImageOrientation, PlaneLabel};

/// Folder name used when a series has no readable description.
pub const NO_DESCRIPTION: &str = "NoDescription";

fn text_for_tag<T: ElementAccess>(obj: &T, tag: Tag) -> Option<String> {
    obj.element_str(tag).filter(|s| !s.is_empty())
}

/// Image Orientation (Patient), when present with exactly six values.
pub fn read_orientation<T: ElementAccess>(obj: &T) -> Option<ImageOrientation> {
    obj.element_f64s(tags::IMAGE_ORIENTATION_PATIENT)
        .and_then(|values| ImageOrientation::from_values(&values))
}

/// Series Description with spaces turned into underscores, or `NoDescription`.
pub fn series_name<T: ElementAccess>(obj: &T) -> String {
    text_for_tag(obj, tags::SERIES_DESCRIPTION)
        .map(|s| s.replace(' ', "_"))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string())
}

pub fn extract_slice_metadata<T: ElementAccess>(obj: &T, threshold: f64) -> SliceMetadata {
    let orientation = read_orientation(obj);
    let has_pixel_data = obj.has_element(tags::PIXEL_DATA);
    let plane = if has_pixel_data {
        classify_orientation(orientation.as_ref(), threshold)
    } else {
        PlaneLabel::NoPixelData
    };

    SliceMetadata {
        patient_name: text_for_tag(obj, tags::PATIENT_NAME),
        patient_id: text_for_tag(obj, tags::PATIENT_ID),
        patient_birth_date: text_for_tag(obj, tags::PATIENT_BIRTH_DATE),
        patient_sex: text_for_tag(obj, tags::PATIENT_SEX),
        series_description: text_for_tag(obj, tags::SERIES_DESCRIPTION),
        instance_number: obj.element_u32(tags::INSTANCE_NUMBER),
        rows: obj.element_u32(tags::ROWS),
        columns: obj.element_u32(tags::COLUMNS),
        orientation,
        has_pixel_data,
        plane,
    }
}

pub fn read_slice_metadata(path: &Path, threshold: f64) -> Result<SliceMetadata> {
    let obj: DefaultDicomObject = open_file(path).context("Failed to open DICOM file")?;
    Ok(extract_slice_metadata(&obj, threshold))
}

pub fn print_info(path: &Path, threshold: f64) -> Result<()> {
    let info = read_slice_metadata(path, threshold)?;

    println!("{}", "=".repeat(80));
    println!("DICOM Slice: {:?}", path.file_name().unwrap_or(path.as_os_str()));
    println!("{}", "=".repeat(80));

    println!("PATIENT");
    println!("  Name:       {}", info.patient_name.as_deref().unwrap_or("N/A"));
    println!("  ID:         {}", info.patient_id.as_deref().unwrap_or("N/A"));
    println!("  Birth Date: {}", info.patient_birth_date.as_deref().unwrap_or("N/A"));
    println!("  Sex:        {}", info.patient_sex.as_deref().unwrap_or("N/A"));

    println!("\nSERIES");
    println!(
        "  Description: {}",
        info.series_description.as_deref().unwrap_or("N/A")
    );
    match info.instance_number {
        Some(n) => println!("  Instance:    {}", n),
        None => println!("  Instance:    N/A"),
    }

    println!("\nIMAGE");
    match (info.rows, info.columns) {
        (Some(r), Some(c)) => println!("  Size:        {} x {}", r, c),
        _ => println!("  Size:        N/A"),
    }
    println!(
        "  Pixel Data:  {}",
        if info.has_pixel_data { "present" } else { "absent" }
    );
    match info.orientation {
        Some(o) => println!("  Orientation: row {:?} col {:?}", o.row, o.col),
        None => println!("  Orientation: N/A"),
    }
    println!("  Plane:       {}", info.plane);

    Ok(())
}
