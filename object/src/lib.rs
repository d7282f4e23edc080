#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! This crate contains a high-level abstraction for reading DICOM
//! objects from files and byte streams.
//!
//! Opening a file validates the 128-byte preamble and the `DICM` magic
//! code, reads the file meta group, resolves the transfer syntax and
//! builds the whole data set in memory, preserving element encounter
//! order. At this level, a DICOM object is a data set of fully decoded
//! elements: pixel data is kept as a raw value for the pixel data
//! crate to lay out.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), dcmstack_object::Error> {
//! use dcmstack_object::open_file;
//!
//! let obj = open_file("scan-0001.dcm")?;
//! let patient_name = obj.element_by_name("PatientName")?.to_str();
//! # Ok(())
//! # }
//! ```

pub mod mem;
pub mod meta;
pub mod metadata;

use dcmstack_core::dictionary::StandardDataDictionary;
use dcmstack_core::header::HasLength;
use dcmstack_core::Tag;
use dcmstack_encoding::TransferSyntax;
use dcmstack_parser::StatefulDecoder;
use snafu::{Backtrace, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub use crate::mem::{InMemDicomObject, InMemElement};
pub use crate::meta::FileMetaTable;
pub use crate::metadata::extract_metadata;

/// The length of the DICOM file preamble, in bytes.
pub const PREAMBLE_LENGTH: usize = 128;

/// An error which may occur when opening or reading a DICOM object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not open the file at the given path.
    #[snafu(display("Could not open file '{}': {}", filename.display(), source))]
    OpenFile {
        filename: std::path::PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The 128-byte preamble could not be read.
    #[snafu(display("Could not read file preamble: {}", source))]
    ReadPreambleBytes {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The file meta group could not be parsed.
    #[snafu(display("Could not parse meta group data set: {}", source))]
    ParseMetaDataSet {
        #[snafu(backtrace)]
        source: meta::Error,
    },

    /// The transfer syntax of the data set is outside the supported set.
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    /// A data element could not be read from the data set.
    #[snafu(display("Could not read data set: {}", source))]
    ReadElement {
        #[snafu(backtrace)]
        source: dcmstack_parser::Error,
    },

    /// A delimiter element was found outside of its sequence context.
    #[snafu(display("Unexpected delimiter {} at position {}", tag, position))]
    UnexpectedDelimiter {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },

    /// The accumulated size of a defined-length sequence or item does not
    /// line up with its declared length.
    #[snafu(display("Sequence length does not match content at position {}", position))]
    InvalidSequenceLength { position: u64, backtrace: Backtrace },

    /// Too many levels of nested sequences.
    #[snafu(display("Sequence nesting of element {} too deep ({} levels)", tag, depth))]
    DepthExceeded {
        tag: Tag,
        depth: u32,
        backtrace: Backtrace,
    },

    /// No data element was found with the given tag.
    #[snafu(display("No such data element with tag {}", tag))]
    NoSuchDataElementTag { tag: Tag, backtrace: Backtrace },

    /// The attribute name is not known to the object's dictionary.
    #[snafu(display("Unknown attribute named `{}`", name))]
    NoSuchAttributeName { name: String, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A DICOM object as read from a file:
/// the file meta table plus the main data set.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDicomObject {
    meta: FileMetaTable,
    obj: InMemDicomObject,
}

impl FileDicomObject {
    /// Retrieve the processed meta information table.
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    /// Retrieve the transfer syntax of the main data set.
    ///
    /// The returned value is always in the supported set;
    /// opening fails otherwise.
    pub fn transfer_syntax(&self) -> TransferSyntax {
        // checked on construction
        TransferSyntax::from_uid(self.meta.transfer_syntax_uid())
            .unwrap_or(TransferSyntax::ExplicitVRLittleEndian)
    }

    /// Retrieve the main data set.
    pub fn dataset(&self) -> &InMemDicomObject {
        &self.obj
    }

    /// Move the main data set out of the file object.
    pub fn into_dataset(self) -> InMemDicomObject {
        self.obj
    }

    /// Retrieve the element with the given tag,
    /// at its first occurrence in the data set.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement> {
        self.obj.element(tag)
    }

    /// Retrieve the element with the given tag, if it is present.
    pub fn element_opt(&self, tag: Tag) -> Option<&InMemElement> {
        self.obj.element_opt(tag)
    }

    /// Retrieve the element with the given attribute alias.
    pub fn element_by_name(&self, name: &str) -> Result<&InMemElement> {
        self.obj.element_by_name(name)
    }

    /// Create a DICOM object by reading from a file.
    ///
    /// This function assumes the standard file encoding structure:
    /// 128-byte preamble, file meta group, and the rest of the data set.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { filename: path })?;
        let mut reader = BufReader::new(file);

        let mut preamble = [0u8; PREAMBLE_LENGTH];
        reader
            .read_exact(&mut preamble)
            .context(ReadPreambleBytesSnafu)?;

        Self::from_reader(reader)
    }

    /// Create a DICOM object by reading from a byte source.
    ///
    /// This function assumes the standard file encoding structure
    /// without the preamble: file meta group,
    /// followed by the rest of the data set.
    pub fn from_reader<S>(src: S) -> Result<Self>
    where
        S: Read,
    {
        let mut src = src;
        let meta = FileMetaTable::from_reader(&mut src).context(ParseMetaDataSetSnafu)?;

        let ts = match TransferSyntax::from_uid(meta.transfer_syntax_uid()) {
            Some(ts) => ts,
            None => {
                return UnsupportedTransferSyntaxSnafu {
                    uid: meta.transfer_syntax_uid().to_string(),
                }
                .fail();
            }
        };
        tracing::debug!("data set transfer syntax: {}", ts);

        let mut decoder = StatefulDecoder::new(src, ts, StandardDataDictionary);
        let obj =
            InMemDicomObject::build_root_object(&mut decoder, StandardDataDictionary)?;

        Ok(FileDicomObject { meta, obj })
    }
}

impl HasLength for FileDicomObject {
    fn length(&self) -> dcmstack_core::Length {
        self.obj.length()
    }
}

/// Create a DICOM object by reading from a file.
///
/// See [`FileDicomObject::open_file`].
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<FileDicomObject> {
    FileDicomObject::open_file(path)
}

#[cfg(test)]
mod tests {
    use super::{open_file, Error, PREAMBLE_LENGTH};
    use dcmstack_core::dictionary::tags;

    // file meta group declaring Explicit VR Little Endian,
    // followed by a data set with a single Rows element
    #[rustfmt::skip]
    const FILE_TAIL: &[u8] = &[
        b'D', b'I', b'C', b'M',
        // (0002,0000) File Meta Information Group Length
        0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00,
        0x1C, 0x00, 0x00, 0x00, // 28
        // (0002,0010) Transfer Syntax UID
        0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x14, 0x00,
        b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8', b'.',
        b'1', b'.', b'2', b'.', b'1', 0x00,
        // (0028,0010) Rows
        0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00,
        0x10, 0x00, // 16
    ];

    fn write_file(dir: &tempfile::TempDir, tail: &[u8]) -> std::path::PathBuf {
        let mut bytes = vec![0u8; PREAMBLE_LENGTH];
        bytes.extend_from_slice(tail);
        let path = dir.path().join("scan.dcm");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn open_file_reads_preamble_meta_and_data_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, FILE_TAIL);

        let obj = open_file(&path).unwrap();
        assert_eq!(obj.meta().transfer_syntax_uid(), "1.2.840.10008.1.2.1");
        assert_eq!(obj.element(tags::ROWS).unwrap().uint16().unwrap(), 16);
        assert!(obj.element_opt(tags::COLUMNS).is_none());
    }

    #[test]
    fn unsupported_transfer_syntax_is_reported() {
        // same structure, but declaring Explicit VR Big Endian:
        // magic (4) + group length element (12) + TS element (8 + 20)
        let mut tail = FILE_TAIL.to_vec();
        let uid_end = 4 + 12 + 8 + 20;
        tail[uid_end - 2] = b'2'; // ...1.2.2
        tail[uid_end - 1] = 0x00;

        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, &tail);
        assert!(matches!(
            open_file(&path),
            Err(Error::UnsupportedTransferSyntax { .. })
        ));
    }

    #[test]
    fn short_preamble_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.dcm");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        assert!(matches!(
            open_file(&path),
            Err(Error::ReadPreambleBytes { .. })
        ));
    }
}
