//! Extraction of the clinically relevant metadata of a DICOM object
//! into a plain attribute-name to text mapping.
//!
//! Attributes which are absent from the data set are omitted from the
//! result. Partial metadata is acceptable and expected, in particular
//! for anonymized data sets.

use crate::mem::InMemDicomObject;
use crate::FileDicomObject;
use dcmstack_core::dictionary::tags;
use dcmstack_core::Tag;
use std::collections::BTreeMap;

/// The fixed set of attributes reported by [`extract_metadata`],
/// in tag order.
const METADATA_TAGS: &[(Tag, &str)] = &[
    (tags::STUDY_DATE, "StudyDate"),
    (tags::STUDY_TIME, "StudyTime"),
    (tags::MODALITY, "Modality"),
    (tags::MANUFACTURER, "Manufacturer"),
    (tags::STUDY_DESCRIPTION, "StudyDescription"),
    (tags::PATIENT_NAME, "PatientName"),
    (tags::PATIENT_ID, "PatientID"),
    (tags::PATIENT_SEX, "PatientSex"),
    (tags::PATIENT_AGE, "PatientAge"),
    (tags::SLICE_THICKNESS, "SliceThickness"),
    (tags::CONVOLUTION_KERNEL, "ConvolutionKernel"),
    (tags::SERIES_NUMBER, "SeriesNumber"),
    (tags::INSTANCE_NUMBER, "InstanceNumber"),
    (tags::IMAGES_IN_ACQUISITION, "ImagesInAcquisition"),
    (tags::SLICE_LOCATION, "SliceLocation"),
    (tags::ROWS, "Rows"),
    (tags::COLUMNS, "Columns"),
    (tags::PIXEL_SPACING, "PixelSpacing"),
];

/// Look up the fixed set of clinically relevant attributes in the
/// object's data set and return them as a name to text mapping.
/// Missing attributes are omitted, not an error.
pub fn extract_metadata(obj: &FileDicomObject) -> BTreeMap<&'static str, String> {
    extract_metadata_from(obj.dataset())
}

/// Same as [`extract_metadata`], over a bare data set.
pub fn extract_metadata_from(obj: &InMemDicomObject) -> BTreeMap<&'static str, String> {
    let mut out = BTreeMap::new();
    for &(tag, name) in METADATA_TAGS {
        if let Some(elem) = obj.element_opt(tag) {
            let text = elem.to_str();
            if !text.is_empty() {
                out.insert(name, text.into_owned());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::extract_metadata_from;
    use crate::mem::{InMemDicomObject, InMemElement};
    use dcmstack_core::dictionary::tags;
    use dcmstack_core::smallvec::smallvec;
    use dcmstack_core::value::PrimitiveValue;
    use dcmstack_core::VR;

    #[test]
    fn missing_attributes_are_omitted() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(
            tags::MODALITY,
            VR::CS,
            PrimitiveValue::Strs(smallvec!["CT".to_string()]).into(),
        ));
        obj.put(InMemElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::U16(smallvec![512]).into(),
        ));

        let meta = extract_metadata_from(&obj);
        assert_eq!(meta.get("Modality").map(String::as_str), Some("CT"));
        assert_eq!(meta.get("Rows").map(String::as_str), Some("512"));
        assert!(!meta.contains_key("PatientName"));
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn multi_valued_attributes_join_with_backslash() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(
            tags::PIXEL_SPACING,
            VR::DS,
            PrimitiveValue::F64(smallvec![0.5, 0.5]).into(),
        ));
        let meta = extract_metadata_from(&obj);
        assert_eq!(meta.get("PixelSpacing").map(String::as_str), Some("0.5\\0.5"));
    }
}
