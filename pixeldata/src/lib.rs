#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! This crate lays out the raw pixel data of a DICOM object into a
//! typed sample buffer, and turns sample buffers into displayable
//! 8-bit images through the modality rescale and window transformations.
//!
//! Only native (non-encapsulated) pixel data is in scope. Compressed
//! pixel data is identified and reported as unsupported rather than
//! misread.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dcmstack_object::open_file;
//! use dcmstack_pixeldata::PixelDecoder;
//!
//! let obj = open_file("scan-0001.dcm")?;
//! let pixel = obj.decode_pixel_data()?;
//! println!("{}x{}, {} bits", pixel.columns, pixel.rows, pixel.bits_allocated);
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod encode;
pub mod transform;

use byteorder::{ByteOrder, LittleEndian};
use dcmstack_core::dictionary::tags;
use dcmstack_object::mem::InMemDicomObject;
use dcmstack_object::FileDicomObject;
use snafu::{Backtrace, ResultExt, Snafu};
use std::str::FromStr;

pub use crate::attribute::GetAttributeError;
pub use crate::encode::{encode_bmp, encode_png};
pub use crate::transform::{to_display, Rescale, WindowLevel};

/// An error which may occur when decoding pixel data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The data set has no pixel data element.
    #[snafu(display("Missing pixel data element"))]
    MissingPixelData { backtrace: Backtrace },

    /// The pixel data is encapsulated (compressed),
    /// which is outside the supported encoding set.
    #[snafu(display("Unsupported encoding: encapsulated pixel data"))]
    UnsupportedEncoding { backtrace: Backtrace },

    /// A descriptive attribute required for the pixel data layout
    /// could not be fetched.
    #[snafu(display("Could not retrieve pixel data description: {}", source))]
    RetrieveAttribute {
        #[snafu(backtrace)]
        source: GetAttributeError,
    },

    /// The BitsAllocated attribute holds an unsupported value.
    #[snafu(display("Unsupported BitsAllocated {}, must be 8 or 16", bits))]
    UnsupportedBitsAllocated { bits: u16, backtrace: Backtrace },

    /// The SamplesPerPixel attribute holds an unsupported value.
    #[snafu(display("Unsupported SamplesPerPixel {}", spp))]
    UnsupportedSamplesPerPixel { spp: u16, backtrace: Backtrace },

    /// The PhotometricInterpretation attribute holds an
    /// unsupported value.
    #[snafu(display("Unsupported PhotometricInterpretation `{}`", pi))]
    UnsupportedPhotometricInterpretation { pi: String, backtrace: Backtrace },

    /// Multi-frame pixel data is not supported.
    #[snafu(display("Unsupported multi-frame pixel data ({} frames)", frames))]
    UnsupportedMultiFrame { frames: i32, backtrace: Backtrace },

    /// Color pixel data split in planes is not supported.
    #[snafu(display("Unsupported planar configuration {}", value))]
    UnsupportedPlanarConfiguration { value: u16, backtrace: Backtrace },

    /// The pixel data value does not hold the amount of bytes
    /// implied by the descriptive attributes.
    #[snafu(display(
        "Invalid pixel data length {}: {}x{} with {} samples of {} bits requires {} bytes",
        got,
        columns,
        rows,
        samples_per_pixel,
        bits_allocated,
        expected
    ))]
    InvalidPixelDataLength {
        got: usize,
        expected: usize,
        columns: u16,
        rows: u16,
        samples_per_pixel: u16,
        bits_allocated: u16,
        backtrace: Backtrace,
    },

    /// The pixel data element holds an unexpected value variant.
    #[snafu(display("Invalid pixel data value: {}", source))]
    InvalidPixelDataValue {
        source: dcmstack_core::value::CastValueError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The photometric interpretation of decoded pixel samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotometricInterpretation {
    /// Grayscale, minimum sample value is intended to be white.
    Monochrome1,
    /// Grayscale, minimum sample value is intended to be black.
    Monochrome2,
    /// Interleaved red, green and blue samples.
    Rgb,
}

/// Unrecognized photometric interpretation name.
#[derive(Debug, Copy, Clone, PartialEq, Snafu)]
pub struct FromPhotometricInterpretationError {
    _private: (),
}

impl FromStr for PhotometricInterpretation {
    type Err = FromPhotometricInterpretationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MONOCHROME1" => Ok(PhotometricInterpretation::Monochrome1),
            "MONOCHROME2" => Ok(PhotometricInterpretation::Monochrome2),
            "RGB" => Ok(PhotometricInterpretation::Rgb),
            _ => Err(FromPhotometricInterpretationError { _private: () }),
        }
    }
}

/// The decoded sample data of a pixel buffer, in its native type.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    /// 8 bits per sample, always unsigned
    U8(Vec<u8>),
    /// 16 bits per sample, unsigned
    U16(Vec<u16>),
    /// 16 bits per sample, two's complement
    I16(Vec<i16>),
}

impl SampleData {
    /// The number of individual samples.
    pub fn len(&self) -> usize {
        match self {
            SampleData::U8(v) => v.len(),
            SampleData::U16(v) => v.len(),
            SampleData::I16(v) => v.len(),
        }
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the sample at the given index as a 64-bit float.
    pub fn get_f64(&self, index: usize) -> f64 {
        match self {
            SampleData::U8(v) => f64::from(v[index]),
            SampleData::U16(v) => f64::from(v[index]),
            SampleData::I16(v) => f64::from(v[index]),
        }
    }
}

/// The raw decoded pixel data of a DICOM object,
/// before any intensity transformation.
///
/// Invariant: `data.len() == columns * rows * samples_per_pixel`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// image width in pixels
    pub columns: u16,
    /// image height in pixels
    pub rows: u16,
    /// samples per pixel (1 for grayscale, 3 for RGB)
    pub samples_per_pixel: u16,
    /// bits allocated per sample (8 or 16)
    pub bits_allocated: u16,
    /// whether the samples are in two's complement
    pub signed: bool,
    /// the photometric interpretation of the samples
    pub photometric_interpretation: PhotometricInterpretation,
    /// the sample values, row-major, samples interleaved
    pub data: SampleData,
}

impl PixelBuffer {
    /// The total number of samples in the buffer.
    pub fn sample_count(&self) -> usize {
        self.data.len()
    }
}

/// Trait for objects which can decode their pixel data
/// into a [`PixelBuffer`].
pub trait PixelDecoder {
    /// Decode the object's pixel data element into a typed buffer
    /// of raw (untransformed) samples.
    fn decode_pixel_data(&self) -> Result<PixelBuffer>;
}

impl PixelDecoder for FileDicomObject {
    fn decode_pixel_data(&self) -> Result<PixelBuffer> {
        self.dataset().decode_pixel_data()
    }
}

impl PixelDecoder for InMemDicomObject {
    fn decode_pixel_data(&self) -> Result<PixelBuffer> {
        let pixel_element = match self.element_opt(tags::PIXEL_DATA) {
            Some(elem) => elem,
            None => return MissingPixelDataSnafu.fail(),
        };
        if pixel_element.header().len.is_undefined() {
            // encapsulated pixel data, out of the supported encoding set
            return UnsupportedEncodingSnafu.fail();
        }

        let rows = attribute::rows(self).context(RetrieveAttributeSnafu)?;
        let columns = attribute::cols(self).context(RetrieveAttributeSnafu)?;
        let bits_allocated =
            attribute::bits_allocated(self).context(RetrieveAttributeSnafu)?;
        let samples_per_pixel =
            attribute::samples_per_pixel(self).context(RetrieveAttributeSnafu)?;
        let pixel_representation =
            attribute::pixel_representation(self).context(RetrieveAttributeSnafu)?;
        let pi_text =
            attribute::photometric_interpretation(self).context(RetrieveAttributeSnafu)?;
        let frames = attribute::number_of_frames(self).context(RetrieveAttributeSnafu)?;

        if frames > 1 {
            return UnsupportedMultiFrameSnafu { frames }.fail();
        }

        let photometric_interpretation = match pi_text.parse::<PhotometricInterpretation>() {
            Ok(pi) => pi,
            Err(_) => {
                return UnsupportedPhotometricInterpretationSnafu { pi: pi_text }.fail();
            }
        };

        match (samples_per_pixel, photometric_interpretation) {
            (1, PhotometricInterpretation::Monochrome1)
            | (1, PhotometricInterpretation::Monochrome2)
            | (3, PhotometricInterpretation::Rgb) => {}
            (spp, _) => return UnsupportedSamplesPerPixelSnafu { spp }.fail(),
        }
        if photometric_interpretation == PhotometricInterpretation::Rgb {
            let planar =
                attribute::planar_configuration(self).context(RetrieveAttributeSnafu)?;
            if planar != 0 {
                return UnsupportedPlanarConfigurationSnafu { value: planar }.fail();
            }
        }

        let bytes = pixel_element
            .uint8_slice()
            .context(InvalidPixelDataValueSnafu)?;

        let n_samples =
            usize::from(rows) * usize::from(columns) * usize::from(samples_per_pixel);
        let bytes_per_sample = match bits_allocated {
            8 => 1,
            16 => 2,
            bits => return UnsupportedBitsAllocatedSnafu { bits }.fail(),
        };
        let expected = n_samples * bytes_per_sample;
        // tolerate the single padding byte appended to odd-length values
        if bytes.len() != expected && bytes.len() != expected + 1 {
            return InvalidPixelDataLengthSnafu {
                got: bytes.len(),
                expected,
                columns,
                rows,
                samples_per_pixel,
                bits_allocated,
            }
            .fail();
        }
        let bytes = &bytes[..expected];

        let signed = pixel_representation == 1;
        let data = match (bits_allocated, signed) {
            (8, _) => SampleData::U8(bytes.to_vec()),
            (16, false) => {
                let mut dest = vec![0u16; n_samples];
                LittleEndian::read_u16_into(bytes, &mut dest);
                SampleData::U16(dest)
            }
            (16, true) => {
                let mut dest = vec![0i16; n_samples];
                LittleEndian::read_i16_into(bytes, &mut dest);
                SampleData::I16(dest)
            }
            // bits_allocated was validated above
            _ => unreachable!(),
        };

        Ok(PixelBuffer {
            columns,
            rows,
            samples_per_pixel,
            bits_allocated,
            signed,
            photometric_interpretation,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmstack_core::smallvec::smallvec;
    use dcmstack_core::value::PrimitiveValue;
    use dcmstack_core::VR;
    use dcmstack_object::mem::{InMemDicomObject, InMemElement};

    fn us_element(tag: dcmstack_core::Tag, value: u16) -> InMemElement {
        InMemElement::new(tag, VR::US, PrimitiveValue::U16(smallvec![value]).into())
    }

    fn cs_element(tag: dcmstack_core::Tag, value: &str) -> InMemElement {
        InMemElement::new(
            tag,
            VR::CS,
            PrimitiveValue::Strs(smallvec![value.to_string()]).into(),
        )
    }

    fn synthetic_object(
        rows: u16,
        columns: u16,
        bits: u16,
        pi: &str,
        pixel_bytes: Vec<u8>,
    ) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(us_element(tags::ROWS, rows));
        obj.put(us_element(tags::COLUMNS, columns));
        obj.put(us_element(tags::BITS_ALLOCATED, bits));
        obj.put(us_element(tags::SAMPLES_PER_PIXEL, if pi == "RGB" { 3 } else { 1 }));
        obj.put(us_element(tags::PIXEL_REPRESENTATION, 0));
        obj.put(cs_element(tags::PHOTOMETRIC_INTERPRETATION, pi));
        obj.put(InMemElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U8(pixel_bytes.into_iter().collect()).into(),
        ));
        obj
    }

    #[test]
    fn decodes_8bit_monochrome_samples() {
        let obj = synthetic_object(2, 2, 8, "MONOCHROME2", vec![0, 64, 128, 255]);
        let buffer = obj.decode_pixel_data().unwrap();
        assert_eq!(buffer.columns, 2);
        assert_eq!(buffer.rows, 2);
        assert_eq!(buffer.samples_per_pixel, 1);
        assert!(!buffer.signed);
        assert_eq!(buffer.data, SampleData::U8(vec![0, 64, 128, 255]));
    }

    #[test]
    fn decodes_16bit_samples_little_endian() {
        let obj = synthetic_object(1, 2, 16, "MONOCHROME2", vec![0x00, 0x01, 0xFF, 0x03]);
        let buffer = obj.decode_pixel_data().unwrap();
        assert_eq!(buffer.data, SampleData::U16(vec![0x0100, 0x03FF]));
    }

    #[test]
    fn missing_pixel_data_is_reported() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(us_element(tags::ROWS, 2));
        assert!(matches!(
            obj.decode_pixel_data(),
            Err(Error::MissingPixelData { .. })
        ));
    }

    #[test]
    fn short_pixel_data_is_reported() {
        let obj = synthetic_object(2, 2, 8, "MONOCHROME2", vec![0, 64]);
        assert!(matches!(
            obj.decode_pixel_data(),
            Err(Error::InvalidPixelDataLength { .. })
        ));
    }

    #[test]
    fn sample_data_len_and_access() {
        let data = SampleData::I16(vec![-1024, 0, 3071]);
        assert_eq!(data.len(), 3);
        assert_eq!(data.get_f64(0), -1024.0);
        assert_eq!(data.get_f64(2), 3071.0);
    }

    #[test]
    fn photometric_interpretation_parses() {
        assert_eq!(
            "MONOCHROME1".parse::<PhotometricInterpretation>(),
            Ok(PhotometricInterpretation::Monochrome1)
        );
        assert_eq!(
            "MONOCHROME2".parse::<PhotometricInterpretation>(),
            Ok(PhotometricInterpretation::Monochrome2)
        );
        assert_eq!(
            "RGB".parse::<PhotometricInterpretation>(),
            Ok(PhotometricInterpretation::Rgb)
        );
        assert!("YBR_FULL".parse::<PhotometricInterpretation>().is_err());
    }

    #[test]
    fn synthetic_object_helper_builds_consistent_data() {
        let obj = synthetic_object(2, 2, 8, "MONOCHROME2", vec![0, 64, 128, 255]);
        let elem = obj.element(tags::PIXEL_DATA).unwrap();
        assert_eq!(elem.uint8_slice().unwrap().len(), 4);
    }
}
