//! Utility module for fetching key attributes from a DICOM object.

use dcmstack_core::dictionary::tags;
use dcmstack_object::mem::InMemDicomObject;
use snafu::{Backtrace, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum GetAttributeError {
    /// A required attribute is missing from the data set.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingRequiredField {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// The attribute exists, but its value does not convert
    /// to the expected type.
    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertValue {
        name: &'static str,
        source: dcmstack_core::value::ConvertValueError,
    },

    /// The attribute exists, but under an incompatible value variant.
    #[snafu(display("Could not get attribute `{}`", name))]
    CastValue {
        name: &'static str,
        source: dcmstack_core::value::CastValueError,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

fn required_u16(obj: &InMemDicomObject, tag: dcmstack_core::Tag, name: &'static str) -> Result<u16> {
    match obj.element_opt(tag) {
        Some(elem) => elem.uint16().context(CastValueSnafu { name }),
        None => MissingRequiredFieldSnafu { name }.fail(),
    }
}

/// Get the Rows attribute from the DICOM object.
pub fn rows(obj: &InMemDicomObject) -> Result<u16> {
    required_u16(obj, tags::ROWS, "Rows")
}

/// Get the Columns attribute from the DICOM object.
pub fn cols(obj: &InMemDicomObject) -> Result<u16> {
    required_u16(obj, tags::COLUMNS, "Columns")
}

/// Get the BitsAllocated attribute from the DICOM object.
pub fn bits_allocated(obj: &InMemDicomObject) -> Result<u16> {
    required_u16(obj, tags::BITS_ALLOCATED, "BitsAllocated")
}

/// Get the PixelRepresentation attribute from the DICOM object,
/// assuming unsigned samples when absent.
pub fn pixel_representation(obj: &InMemDicomObject) -> Result<u16> {
    match obj.element_opt(tags::PIXEL_REPRESENTATION) {
        Some(elem) => elem.uint16().context(CastValueSnafu {
            name: "PixelRepresentation",
        }),
        None => Ok(0),
    }
}

/// Get the SamplesPerPixel attribute from the DICOM object,
/// assuming a single sample per pixel when absent.
pub fn samples_per_pixel(obj: &InMemDicomObject) -> Result<u16> {
    match obj.element_opt(tags::SAMPLES_PER_PIXEL) {
        Some(elem) => elem.uint16().context(CastValueSnafu {
            name: "SamplesPerPixel",
        }),
        None => Ok(1),
    }
}

/// Get the PlanarConfiguration attribute from the DICOM object,
/// assuming interleaved samples when absent.
pub fn planar_configuration(obj: &InMemDicomObject) -> Result<u16> {
    match obj.element_opt(tags::PLANAR_CONFIGURATION) {
        Some(elem) => elem.uint16().context(CastValueSnafu {
            name: "PlanarConfiguration",
        }),
        None => Ok(0),
    }
}

/// Get the PhotometricInterpretation attribute from the DICOM object,
/// with surrounding whitespace trimmed.
pub fn photometric_interpretation(obj: &InMemDicomObject) -> Result<String> {
    match obj.element_opt(tags::PHOTOMETRIC_INTERPRETATION) {
        Some(elem) => Ok(elem
            .string()
            .context(CastValueSnafu {
                name: "PhotometricInterpretation",
            })?
            .trim()
            .to_string()),
        None => MissingRequiredFieldSnafu {
            name: "PhotometricInterpretation",
        }
        .fail(),
    }
}

/// Get the NumberOfFrames attribute from the DICOM object,
/// assuming a single frame when absent.
pub fn number_of_frames(obj: &InMemDicomObject) -> Result<i32> {
    match obj.element_opt(tags::NUMBER_OF_FRAMES) {
        Some(elem) => elem.to_int32().context(ConvertValueSnafu {
            name: "NumberOfFrames",
        }),
        None => Ok(1),
    }
}

/// Get the RescaleSlope attribute from the DICOM object,
/// falling back to the identity slope of 1 when absent.
pub fn rescale_slope(obj: &InMemDicomObject) -> f64 {
    obj.element_opt(tags::RESCALE_SLOPE)
        .and_then(|elem| elem.to_float64().ok())
        .unwrap_or(1.0)
}

/// Get the RescaleIntercept attribute from the DICOM object,
/// falling back to 0 when absent.
pub fn rescale_intercept(obj: &InMemDicomObject) -> f64 {
    obj.element_opt(tags::RESCALE_INTERCEPT)
        .and_then(|elem| elem.to_float64().ok())
        .unwrap_or(0.0)
}

/// Get the first WindowCenter attribute value, if present.
pub fn window_center(obj: &InMemDicomObject) -> Option<f64> {
    obj.element_opt(tags::WINDOW_CENTER)
        .and_then(|elem| elem.to_float64().ok())
}

/// Get the first WindowWidth attribute value, if present.
pub fn window_width(obj: &InMemDicomObject) -> Option<f64> {
    obj.element_opt(tags::WINDOW_WIDTH)
        .and_then(|elem| elem.to_float64().ok())
}

/// Get the PixelSpacing attribute as a (row spacing, column spacing)
/// pair in millimeters, if present and well formed.
pub fn pixel_spacing(obj: &InMemDicomObject) -> Option<(f64, f64)> {
    let values = obj
        .element_opt(tags::PIXEL_SPACING)
        .and_then(|elem| elem.to_multi_float64().ok())?;
    if values.len() < 2 {
        return None;
    }
    Some((values[0], values[1]))
}

/// Get the SliceLocation attribute, if present.
/// Falls back to the third component of ImagePositionPatient.
pub fn slice_location(obj: &InMemDicomObject) -> Option<f64> {
    if let Some(loc) = obj
        .element_opt(tags::SLICE_LOCATION)
        .and_then(|elem| elem.to_float64().ok())
    {
        return Some(loc);
    }
    obj.element_opt(tags::IMAGE_POSITION_PATIENT)
        .and_then(|elem| elem.to_multi_float64().ok())
        .and_then(|values| values.get(2).copied())
}

/// Get the InstanceNumber attribute, if present.
pub fn instance_number(obj: &InMemDicomObject) -> Option<i32> {
    obj.element_opt(tags::INSTANCE_NUMBER)
        .and_then(|elem| elem.to_int32().ok())
}
