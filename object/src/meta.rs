//! Module containing the data structures and reader of the DICOM file
//! meta information group.
//!
//! The file meta group is always encoded in Explicit VR Little Endian,
//! preceded by the `DICM` magic code. The group carries the transfer
//! syntax UID of the main data set, which is where the decision of
//! whether the rest of the file can be decoded at all is made.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmstack_core::dictionary::tags;
use dcmstack_core::header::{HasLength, Header, Length};
use dcmstack_encoding::decode::{Decode, ExplicitVRLittleEndianDecoder};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::Read;

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

/// An error which may occur when reading the file meta group.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The magic code `DICM` could not be read from the source.
    #[snafu(display("Could not start reading DICOM data: {}", source))]
    ReadMagicCode {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// A data element value could not be fetched from the source.
    #[snafu(display("Could not read data value: {}", source))]
    ReadValueData {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The magic code check failed: this is not DICOM data.
    #[snafu(display("Invalid DICOM file (magic code check failed)"))]
    NotDicom { backtrace: Backtrace },

    /// The next data element of the meta group could not be decoded.
    #[snafu(display("Could not decode data element: {}", source))]
    DecodeElement {
        source: dcmstack_encoding::decode::Error,
        backtrace: Backtrace,
    },

    /// A data element carried a tag which is not admitted
    /// at its position in the meta group.
    #[snafu(display("Unexpected data element tagged {}", tag))]
    UnexpectedTag {
        tag: dcmstack_core::Tag,
        backtrace: Backtrace,
    },

    /// A meta group data element carried a length other than
    /// the one its definition requires.
    #[snafu(display("Unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: dcmstack_core::Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// Meta group data elements must carry a defined length.
    #[snafu(display("Undefined value length for data element tagged {}", tag))]
    UndefinedValueLength {
        tag: dcmstack_core::Tag,
        backtrace: Backtrace,
    },

    /// A required file meta data element is missing.
    #[snafu(display("Missing data element `{}`", alias))]
    MissingElement {
        alias: &'static str,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// DICOM File Meta Information Table.
///
/// This data type contains the parts of the file meta information table
/// which are relevant for decoding the main data set.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: Option<[u8; 2]>,
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: Option<String>,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
}

impl FileMetaTable {
    /// Read the file meta group from the given source.
    ///
    /// The source is expected to be positioned right after the 128-byte
    /// preamble, at the `DICM` magic code.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        FileMetaTable::read_from(reader)
    }

    /// Retrieve the transfer syntax UID with trailing padding removed.
    pub fn transfer_syntax_uid(&self) -> &str {
        self.transfer_syntax
            .trim_end_matches(|c| c == '\0' || c == ' ')
    }

    fn read_from<S: Read>(mut file: S) -> Result<Self> {
        let mut buff: [u8; 4] = [0; 4];
        {
            // check magic code
            file.read_exact(&mut buff).context(ReadMagicCodeSnafu)?;
            ensure!(buff == DICM_MAGIC_CODE, NotDicomSnafu);
        }

        let decoder = ExplicitVRLittleEndianDecoder::default();

        // the group length is mandatory and must come first
        let group_length: u32 = {
            let (elem, _bytes_read) =
                decoder.decode_header(&mut file).context(DecodeElementSnafu)?;
            ensure!(
                elem.tag() == tags::FILE_META_INFORMATION_GROUP_LENGTH,
                UnexpectedTagSnafu { tag: elem.tag() }
            );
            ensure!(
                elem.length() == Length(4),
                UnexpectedDataValueLengthSnafu {
                    tag: elem.tag(),
                    length: elem.length()
                }
            );
            let mut buff: [u8; 4] = [0; 4];
            file.read_exact(&mut buff).context(ReadValueDataSnafu)?;
            LittleEndian::read_u32(&buff)
        };

        let mut group_length_remaining = group_length;

        let mut information_version = None;
        let mut media_storage_sop_class_uid = None;
        let mut media_storage_sop_instance_uid = None;
        let mut transfer_syntax = None;
        let mut implementation_class_uid = None;
        let mut implementation_version_name = None;

        while group_length_remaining > 0 {
            let (elem, header_len) =
                decoder.decode_header(&mut file).context(DecodeElementSnafu)?;
            let elem_len = match elem.length().get() {
                None => {
                    return UndefinedValueLengthSnafu { tag: elem.tag() }.fail();
                }
                Some(len) => len,
            };

            let mut value = vec![0u8; elem_len as usize];
            file.read_exact(&mut value).context(ReadValueDataSnafu)?;
            group_length_remaining =
                group_length_remaining.saturating_sub(header_len as u32 + elem_len);

            match elem.tag() {
                tags::FILE_META_INFORMATION_VERSION => {
                    ensure!(
                        value.len() == 2,
                        UnexpectedDataValueLengthSnafu {
                            tag: elem.tag(),
                            length: elem.length()
                        }
                    );
                    information_version = Some([value[0], value[1]]);
                }
                tags::MEDIA_STORAGE_SOP_CLASS_UID => {
                    media_storage_sop_class_uid = Some(decode_str(&value));
                }
                tags::MEDIA_STORAGE_SOP_INSTANCE_UID => {
                    media_storage_sop_instance_uid = Some(decode_str(&value));
                }
                tags::TRANSFER_SYNTAX_UID => {
                    transfer_syntax = Some(decode_str(&value));
                }
                tags::IMPLEMENTATION_CLASS_UID => {
                    implementation_class_uid = Some(decode_str(&value));
                }
                tags::IMPLEMENTATION_VERSION_NAME => {
                    implementation_version_name = Some(decode_str(&value));
                }
                // other meta group attributes are not relevant here
                _ => {}
            }
        }

        let transfer_syntax = transfer_syntax.ok_or_else(|| {
            MissingElementSnafu {
                alias: "TransferSyntaxUID",
            }
            .build()
        })?;

        Ok(FileMetaTable {
            information_group_length: group_length,
            information_version,
            media_storage_sop_class_uid,
            media_storage_sop_instance_uid,
            transfer_syntax,
            implementation_class_uid,
            implementation_version_name,
        })
    }
}

fn decode_str(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::FileMetaTable;

    // a valid file meta group declaring Explicit VR Little Endian
    #[rustfmt::skip]
    const RAW: &[u8] = &[
        b'D', b'I', b'C', b'M',
        // (0002,0000) File Meta Information Group Length, UL, 4 bytes
        0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00,
        0x3E, 0x00, 0x00, 0x00, // 62
        // (0002,0002) Media Storage SOP Class UID, UI, 26 bytes
        0x02, 0x00, 0x02, 0x00, b'U', b'I', 0x1a, 0x00,
        b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8', b'.',
        b'5', b'.', b'1', b'.', b'4', b'.', b'1', b'.', b'1', b'.', b'7', 0x00,
        // (0002,0010) Transfer Syntax UID, UI, 20 bytes
        0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x14, 0x00,
        b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8', b'.',
        b'1', b'.', b'2', b'.', b'1', 0x00,
    ];

    #[test]
    fn reads_the_meta_group() {
        let table = FileMetaTable::from_reader(RAW).unwrap();
        assert_eq!(table.information_group_length, 62);
        assert_eq!(
            table.media_storage_sop_class_uid.as_deref(),
            Some("1.2.840.10008.5.1.4.1.1.7\0")
        );
        assert_eq!(table.transfer_syntax_uid(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn missing_magic_code_is_not_dicom() {
        let data = [0u8; 4];
        assert!(matches!(
            FileMetaTable::from_reader(&data[..]),
            Err(super::Error::NotDicom { .. })
        ));
    }

    #[test]
    fn missing_transfer_syntax_is_reported() {
        #[rustfmt::skip]
        const NO_TS: &[u8] = &[
            b'D', b'I', b'C', b'M',
            0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00,
            0x00, 0x00, 0x00, 0x00, // group length 0
        ];
        assert!(matches!(
            FileMetaTable::from_reader(NO_TS),
            Err(super::Error::MissingElement { .. })
        ));
    }
}
