use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull typed values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_f64s(&self, tag: Tag) -> Option<Vec<f64>>;
    fn element_u32(&self, tag: Tag) -> Option<u32>;
    fn has_element(&self, tag: Tag) -> bool;
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches(&['\0', ' '][..]).to_string())
    }

    fn element_f64s(&self, tag: Tag) -> Option<Vec<f64>> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
    }

    fn element_u32(&self, tag: Tag) -> Option<u32> {
        self.element(tag).ok().and_then(|e| e.to_int::<u32>().ok())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        (**self).element_str(tag)
    }

    fn element_f64s(&self, tag: Tag) -> Option<Vec<f64>> {
        (**self).element_f64s(tag)
    }

    fn element_u32(&self, tag: Tag) -> Option<u32> {
        (**self).element_u32(tag)
    }

    fn has_element(&self, tag: Tag) -> bool {
        (**self).has_element(tag)
    }
}
