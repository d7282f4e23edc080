//! Data dictionary abstraction and the built-in standard dictionary.
//!
//! A data dictionary translates attribute tags and/or aliases into a
//! dictionary entry carrying the attribute's name and value representation.
//! The built-in [`StandardDataDictionary`] covers the attributes that the
//! rest of the workspace consumes: patient and study identification,
//! acquisition geometry, and the image pixel module. It is deployed as a
//! lazily initialized singleton behind a unit type, so that constructed
//! components can receive the dictionary as an injected dependency without
//! paying for repeated set-up.

use crate::header::{Tag, VR};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// An entry in a data dictionary: one known attribute,
/// with its tag, alias and value representation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DictionaryEntryRef<'a> {
    /// The attribute tag.
    pub tag: Tag,
    /// The alias of the attribute, with no spaces, usually in UpperCamelCase.
    pub alias: &'a str,
    /// The typical value representation of the attribute.
    pub vr: VR,
}

/// A data dictionary, which translates an attribute tag or alias
/// into a dictionary entry.
pub trait DataDictionary {
    /// Fetch an entry by its usual alias (e.g. "PatientName").
    /// Aliases are case sensitive.
    fn by_name(&self, name: &str) -> Option<&DictionaryEntryRef<'static>>;

    /// Fetch an entry by its tag.
    fn by_tag(&self, tag: Tag) -> Option<&DictionaryEntryRef<'static>>;

    /// Retrieve the value representation expected for elements
    /// with the given tag, falling back to `UN` when the tag
    /// is not part of the dictionary.
    fn vr_of(&self, tag: Tag) -> VR {
        self.by_tag(tag).map(|e| e.vr).unwrap_or(VR::UN)
    }
}

/// Attribute tag constants, for use in place of magic numbers.
pub mod tags {
    use crate::header::Tag;

    /// File Meta Information Group Length
    pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
    /// File Meta Information Version
    pub const FILE_META_INFORMATION_VERSION: Tag = Tag(0x0002, 0x0001);
    /// Media Storage SOP Class UID
    pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
    /// Media Storage SOP Instance UID
    pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
    /// Transfer Syntax UID
    pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
    /// Implementation Class UID
    pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
    /// Implementation Version Name
    pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);

    /// Study Date
    pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
    /// Study Time
    pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
    /// Modality
    pub const MODALITY: Tag = Tag(0x0008, 0x0060);
    /// Manufacturer
    pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
    /// Study Description
    pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
    /// Patient's Name
    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
    /// Patient ID
    pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
    /// Patient's Sex
    pub const PATIENT_SEX: Tag = Tag(0x0010, 0x0040);
    /// Patient's Age
    pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);
    /// Slice Thickness
    pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
    /// Convolution Kernel
    pub const CONVOLUTION_KERNEL: Tag = Tag(0x0018, 0x1210);
    /// Series Number
    pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
    /// Instance Number
    pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
    /// Image Position (Patient)
    pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
    /// Images in Acquisition
    pub const IMAGES_IN_ACQUISITION: Tag = Tag(0x0020, 0x1002);
    /// Slice Location
    pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);
    /// Samples per Pixel
    pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
    /// Photometric Interpretation
    pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
    /// Planar Configuration
    pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
    /// Number of Frames
    pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
    /// Rows
    pub const ROWS: Tag = Tag(0x0028, 0x0010);
    /// Columns
    pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
    /// Pixel Spacing
    pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
    /// Bits Allocated
    pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
    /// Bits Stored
    pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
    /// High Bit
    pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
    /// Pixel Representation
    pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
    /// Window Center
    pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
    /// Window Width
    pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
    /// Rescale Intercept
    pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
    /// Rescale Slope
    pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
    /// Pixel Data
    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
}

/// The known attribute entries, tag ascending.
#[rustfmt::skip]
const ENTRIES: &[DictionaryEntryRef<'static>] = &[
    DictionaryEntryRef { tag: tags::FILE_META_INFORMATION_GROUP_LENGTH, alias: "FileMetaInformationGroupLength", vr: VR::UL },
    DictionaryEntryRef { tag: tags::FILE_META_INFORMATION_VERSION, alias: "FileMetaInformationVersion", vr: VR::OB },
    DictionaryEntryRef { tag: tags::MEDIA_STORAGE_SOP_CLASS_UID, alias: "MediaStorageSOPClassUID", vr: VR::UI },
    DictionaryEntryRef { tag: tags::MEDIA_STORAGE_SOP_INSTANCE_UID, alias: "MediaStorageSOPInstanceUID", vr: VR::UI },
    DictionaryEntryRef { tag: tags::TRANSFER_SYNTAX_UID, alias: "TransferSyntaxUID", vr: VR::UI },
    DictionaryEntryRef { tag: tags::IMPLEMENTATION_CLASS_UID, alias: "ImplementationClassUID", vr: VR::UI },
    DictionaryEntryRef { tag: tags::IMPLEMENTATION_VERSION_NAME, alias: "ImplementationVersionName", vr: VR::SH },
    DictionaryEntryRef { tag: tags::STUDY_DATE, alias: "StudyDate", vr: VR::DA },
    DictionaryEntryRef { tag: tags::STUDY_TIME, alias: "StudyTime", vr: VR::TM },
    DictionaryEntryRef { tag: tags::MODALITY, alias: "Modality", vr: VR::CS },
    DictionaryEntryRef { tag: tags::MANUFACTURER, alias: "Manufacturer", vr: VR::LO },
    DictionaryEntryRef { tag: tags::STUDY_DESCRIPTION, alias: "StudyDescription", vr: VR::LO },
    DictionaryEntryRef { tag: tags::PATIENT_NAME, alias: "PatientName", vr: VR::PN },
    DictionaryEntryRef { tag: tags::PATIENT_ID, alias: "PatientID", vr: VR::LO },
    DictionaryEntryRef { tag: tags::PATIENT_SEX, alias: "PatientSex", vr: VR::CS },
    DictionaryEntryRef { tag: tags::PATIENT_AGE, alias: "PatientAge", vr: VR::AS },
    DictionaryEntryRef { tag: tags::SLICE_THICKNESS, alias: "SliceThickness", vr: VR::DS },
    DictionaryEntryRef { tag: tags::CONVOLUTION_KERNEL, alias: "ConvolutionKernel", vr: VR::SH },
    DictionaryEntryRef { tag: tags::SERIES_NUMBER, alias: "SeriesNumber", vr: VR::IS },
    DictionaryEntryRef { tag: tags::INSTANCE_NUMBER, alias: "InstanceNumber", vr: VR::IS },
    DictionaryEntryRef { tag: tags::IMAGE_POSITION_PATIENT, alias: "ImagePositionPatient", vr: VR::DS },
    DictionaryEntryRef { tag: tags::IMAGES_IN_ACQUISITION, alias: "ImagesInAcquisition", vr: VR::IS },
    DictionaryEntryRef { tag: tags::SLICE_LOCATION, alias: "SliceLocation", vr: VR::DS },
    DictionaryEntryRef { tag: tags::SAMPLES_PER_PIXEL, alias: "SamplesPerPixel", vr: VR::US },
    DictionaryEntryRef { tag: tags::PHOTOMETRIC_INTERPRETATION, alias: "PhotometricInterpretation", vr: VR::CS },
    DictionaryEntryRef { tag: tags::PLANAR_CONFIGURATION, alias: "PlanarConfiguration", vr: VR::US },
    DictionaryEntryRef { tag: tags::NUMBER_OF_FRAMES, alias: "NumberOfFrames", vr: VR::IS },
    DictionaryEntryRef { tag: tags::ROWS, alias: "Rows", vr: VR::US },
    DictionaryEntryRef { tag: tags::COLUMNS, alias: "Columns", vr: VR::US },
    DictionaryEntryRef { tag: tags::PIXEL_SPACING, alias: "PixelSpacing", vr: VR::DS },
    DictionaryEntryRef { tag: tags::BITS_ALLOCATED, alias: "BitsAllocated", vr: VR::US },
    DictionaryEntryRef { tag: tags::BITS_STORED, alias: "BitsStored", vr: VR::US },
    DictionaryEntryRef { tag: tags::HIGH_BIT, alias: "HighBit", vr: VR::US },
    DictionaryEntryRef { tag: tags::PIXEL_REPRESENTATION, alias: "PixelRepresentation", vr: VR::US },
    DictionaryEntryRef { tag: tags::WINDOW_CENTER, alias: "WindowCenter", vr: VR::DS },
    DictionaryEntryRef { tag: tags::WINDOW_WIDTH, alias: "WindowWidth", vr: VR::DS },
    DictionaryEntryRef { tag: tags::RESCALE_INTERCEPT, alias: "RescaleIntercept", vr: VR::DS },
    DictionaryEntryRef { tag: tags::RESCALE_SLOPE, alias: "RescaleSlope", vr: VR::DS },
    DictionaryEntryRef { tag: tags::PIXEL_DATA, alias: "PixelData", vr: VR::OW },
];

static REGISTRY: Lazy<StandardDictionaryRegistry> = Lazy::new(init_dictionary);

/// Retrieve a singleton instance of the standard dictionary registry.
///
/// One does not generally have to call this: the unit type
/// [`StandardDataDictionary`] already provides a lazily loaded singleton
/// implementing the necessary traits.
#[inline]
pub fn registry() -> &'static StandardDictionaryRegistry {
    &REGISTRY
}

/// The data struct actually containing the standard dictionary mappings.
///
/// This structure is made opaque via the unit type
/// [`StandardDataDictionary`].
#[derive(Debug)]
pub struct StandardDictionaryRegistry {
    /// mapping: name → entry
    by_name: HashMap<&'static str, &'static DictionaryEntryRef<'static>>,
    /// mapping: tag → entry
    by_tag: HashMap<Tag, &'static DictionaryEntryRef<'static>>,
}

impl StandardDictionaryRegistry {
    fn new() -> Self {
        StandardDictionaryRegistry {
            by_name: HashMap::with_capacity(ENTRIES.len()),
            by_tag: HashMap::with_capacity(ENTRIES.len()),
        }
    }

    fn index(&mut self, entry: &'static DictionaryEntryRef<'static>) -> &mut Self {
        self.by_name.insert(entry.alias, entry);
        self.by_tag.insert(entry.tag, entry);
        self
    }
}

fn init_dictionary() -> StandardDictionaryRegistry {
    let mut d = StandardDictionaryRegistry::new();
    for entry in ENTRIES {
        d.index(entry);
    }
    d
}

/// A unit type for the standard data dictionary,
/// backed by a lazily constructed singleton registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StandardDataDictionary;

impl DataDictionary for StandardDataDictionary {
    fn by_name(&self, name: &str) -> Option<&DictionaryEntryRef<'static>> {
        registry().by_name.get(name).copied()
    }

    fn by_tag(&self, tag: Tag) -> Option<&DictionaryEntryRef<'static>> {
        registry().by_tag.get(&tag).copied()
    }
}

impl fmt::Display for StandardDataDictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("standard data dictionary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_tag_and_name_agree() {
        let dict = StandardDataDictionary;
        let by_tag = dict.by_tag(Tag(0x0010, 0x0010)).expect("PatientName by tag");
        let by_name = dict.by_name("PatientName").expect("PatientName by alias");
        assert_eq!(by_tag, by_name);
        assert_eq!(by_tag.vr, VR::PN);
    }

    #[test]
    fn vr_of_unknown_tag_is_un() {
        assert_eq!(StandardDataDictionary.vr_of(Tag(0x0099, 0x0001)), VR::UN);
        assert_eq!(StandardDataDictionary.vr_of(tags::ROWS), VR::US);
    }
}
