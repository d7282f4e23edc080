//! This module contains the implementation for an in-memory DICOM object.
//!
//! Unlike a map keyed by tag, the object preserves the order in which the
//! elements were encountered in the stream, since tag uniqueness is not
//! guaranteed by the format. A side index over the first occurrence of
//! each tag provides constant-time attribute access.

use dcmstack_core::dictionary::{DataDictionary, StandardDataDictionary};
use dcmstack_core::header::{DataElement, DataElementHeader, HasLength, Header, Length};
use dcmstack_core::value::{PrimitiveValue, Value};
use dcmstack_core::{Tag, VR};
use dcmstack_parser::StatefulDecoder;
use snafu::ResultExt;
use std::collections::HashMap;
use std::io::Read;

use crate::{
    DepthExceededSnafu, InvalidSequenceLengthSnafu, NoSuchAttributeNameSnafu,
    NoSuchDataElementTagSnafu, ReadElementSnafu, Result, UnexpectedDelimiterSnafu,
};

/// A full in-memory DICOM data element.
pub type InMemElement<D = StandardDataDictionary> = DataElement<InMemDicomObject<D>>;

/// Maximum admitted nesting depth of sequence items.
const MAX_SEQUENCE_DEPTH: u32 = 64;

/// Where an object under construction ends.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjectEnd {
    /// the end of the byte stream
    Eof,
    /// a known stream position
    Position(u64),
    /// an item delimitation element
    ItemDelimiter,
}

/// A DICOM object that is fully contained in memory,
/// with element encounter order preserved.
#[derive(Debug, Clone)]
pub struct InMemDicomObject<D = StandardDataDictionary> {
    /// the elements, in encounter order
    entries: Vec<InMemElement<D>>,
    /// side index: tag → position of its first occurrence in `entries`
    index: HashMap<Tag, usize>,
    /// the data dictionary, used for attribute name look-up
    dict: D,
    /// the length of the object in bytes,
    /// if it was part of an item with a specified length
    len: Length,
}

impl<D> PartialEq for InMemDicomObject<D> {
    // This implementation ignores the data dictionary.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<D> HasLength for InMemDicomObject<D> {
    fn length(&self) -> Length {
        self.len
    }
}

impl InMemDicomObject<StandardDataDictionary> {
    /// Create a new empty DICOM object
    /// with the standard data dictionary.
    pub fn new_empty() -> Self {
        InMemDicomObject {
            entries: Vec::new(),
            index: HashMap::new(),
            dict: StandardDataDictionary,
            len: Length::UNDEFINED,
        }
    }

    /// Construct a DICOM object from a non-fallible source
    /// of structured elements.
    pub fn from_element_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = InMemElement<StandardDataDictionary>>,
    {
        let mut obj = Self::new_empty();
        for elem in iter {
            obj.put(elem);
        }
        obj
    }
}

impl<D> InMemDicomObject<D>
where
    D: DataDictionary + Clone,
{
    /// Create a new empty DICOM object with the given dictionary.
    pub fn new_empty_with_dict(dict: D) -> Self {
        InMemDicomObject {
            entries: Vec::new(),
            index: HashMap::new(),
            dict,
            len: Length::UNDEFINED,
        }
    }

    /// Insert a data element into the object,
    /// appending it to the element sequence.
    /// The tag index only records the first occurrence of each tag.
    pub fn put(&mut self, elem: InMemElement<D>) {
        let tag = elem.header().tag;
        let pos = self.entries.len();
        self.entries.push(elem);
        self.index.entry(tag).or_insert(pos);
    }

    /// Retrieve the element with the given tag,
    /// at its first occurrence in the object.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement<D>> {
        match self.element_opt(tag) {
            Some(elem) => Ok(elem),
            None => NoSuchDataElementTagSnafu { tag }.fail(),
        }
    }

    /// Retrieve the element with the given tag, if it is present.
    pub fn element_opt(&self, tag: Tag) -> Option<&InMemElement<D>> {
        self.index.get(&tag).map(|&i| &self.entries[i])
    }

    /// Retrieve the element with the given attribute alias
    /// (e.g. `"PatientName"`), if the dictionary knows the attribute
    /// and the object contains it.
    pub fn element_by_name(&self, name: &str) -> Result<&InMemElement<D>> {
        let tag = match self.dict.by_name(name) {
            Some(entry) => entry.tag,
            None => {
                return NoSuchAttributeNameSnafu {
                    name: name.to_string(),
                }
                .fail();
            }
        };
        self.element(tag)
    }

    /// Check whether the object has an element with the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.index.contains_key(&tag)
    }

    /// Retrieve the full element sequence, in encounter order.
    pub fn elements(&self) -> &[InMemElement<D>] {
        &self.entries
    }

    /// Obtain the number of elements in this object.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the object holds no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build an object by consuming a stateful decoder until the end of
    /// the byte stream.
    pub(crate) fn build_root_object<S>(
        decoder: &mut StatefulDecoder<S, D>,
        dict: D,
    ) -> Result<Self>
    where
        S: Read,
    {
        Self::build_object(decoder, dict, ObjectEnd::Eof, 0)
    }

    fn build_object<S>(
        decoder: &mut StatefulDecoder<S, D>,
        dict: D,
        end: ObjectEnd,
        depth: u32,
    ) -> Result<Self>
    where
        S: Read,
    {
        let mut obj = Self::new_empty_with_dict(dict.clone());
        if let ObjectEnd::Position(_) = end {
            obj.len = Length(0); // adjusted below
        }
        let start = decoder.position();

        loop {
            if let ObjectEnd::Position(end_pos) = end {
                if decoder.position() >= end_pos {
                    if decoder.position() > end_pos {
                        return InvalidSequenceLengthSnafu {
                            position: decoder.position(),
                        }
                        .fail();
                    }
                    break;
                }
            }

            let header = match decoder.decode_header() {
                Ok(header) => header,
                Err(e) if end == ObjectEnd::Eof && is_eof_at_boundary(&e) => break,
                Err(e) => return Err(e).context(ReadElementSnafu),
            };

            if header.is_item_delimiter() {
                if end == ObjectEnd::ItemDelimiter {
                    break;
                }
                return UnexpectedDelimiterSnafu {
                    tag: header.tag(),
                    position: decoder.position(),
                }
                .fail();
            }
            if header.is_sequence_delimiter() {
                return UnexpectedDelimiterSnafu {
                    tag: header.tag(),
                    position: decoder.position(),
                }
                .fail();
            }

            let elem = if header.vr() == VR::SQ {
                let items = Self::build_sequence(decoder, dict.clone(), &header, depth + 1)?;
                InMemElement::from_parts(
                    header,
                    Value::Sequence {
                        items,
                        size: header.len,
                    },
                )
            } else if header.is_encapsulated_pixeldata() {
                // encapsulated (compressed) pixel data fragments.
                // The fragments are structurally traversed but not kept,
                // since compressed pixel data is out of the decoding scope;
                // the undefined length in the header marks the element.
                Self::skip_fragment_sequence(decoder)?;
                InMemElement::from_parts(header, PrimitiveValue::Empty.into())
            } else if header.length().is_undefined() {
                // an undefined length with no announced VR:
                // a data set sequence under implicit VR
                let items = Self::build_sequence(decoder, dict.clone(), &header, depth + 1)?;
                InMemElement::from_parts(
                    header,
                    Value::Sequence {
                        items,
                        size: header.len,
                    },
                )
            } else {
                let value = decoder.read_value(&header).context(ReadElementSnafu)?;
                InMemElement::from_parts(header, value.into())
            };
            obj.put(elem);
        }

        if let ObjectEnd::Position(_) = end {
            obj.len = Length((decoder.position() - start) as u32);
        }
        Ok(obj)
    }

    fn build_sequence<S>(
        decoder: &mut StatefulDecoder<S, D>,
        dict: D,
        header: &DataElementHeader,
        depth: u32,
    ) -> Result<Vec<Self>>
    where
        S: Read,
    {
        use dcmstack_core::header::SequenceItemHeader;

        if depth > MAX_SEQUENCE_DEPTH {
            return DepthExceededSnafu {
                tag: header.tag(),
                depth,
            }
            .fail();
        }

        let mut items = Vec::new();
        let seq_end = header.length().get().map(|l| decoder.position() + u64::from(l));

        loop {
            if let Some(end_pos) = seq_end {
                if decoder.position() >= end_pos {
                    if decoder.position() > end_pos {
                        return InvalidSequenceLengthSnafu {
                            position: decoder.position(),
                        }
                        .fail();
                    }
                    break;
                }
            }

            let item_header = decoder.decode_item_header().context(ReadElementSnafu)?;
            match item_header {
                SequenceItemHeader::Item { len } => {
                    let item_end = match len.get() {
                        Some(l) => ObjectEnd::Position(decoder.position() + u64::from(l)),
                        None => ObjectEnd::ItemDelimiter,
                    };
                    let item = Self::build_object(decoder, dict.clone(), item_end, depth)?;
                    items.push(item);
                }
                SequenceItemHeader::SequenceDelimiter if seq_end.is_none() => break,
                delimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: delimiter.tag(),
                        position: decoder.position(),
                    }
                    .fail();
                }
            }
        }
        Ok(items)
    }

    fn skip_fragment_sequence<S>(decoder: &mut StatefulDecoder<S, D>) -> Result<()>
    where
        S: Read,
    {
        use dcmstack_core::header::SequenceItemHeader;

        loop {
            let item_header = decoder.decode_item_header().context(ReadElementSnafu)?;
            match item_header {
                SequenceItemHeader::Item { len } => {
                    let len = match len.get() {
                        Some(len) => len,
                        None => {
                            return InvalidSequenceLengthSnafu {
                                position: decoder.position(),
                            }
                            .fail();
                        }
                    };
                    decoder
                        .skip_bytes(Tag(0xFFFE, 0xE000), len)
                        .context(ReadElementSnafu)?;
                }
                SequenceItemHeader::SequenceDelimiter => break,
                SequenceItemHeader::ItemDelimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: Tag(0xFFFE, 0xE00D),
                        position: decoder.position(),
                    }
                    .fail();
                }
            }
        }
        Ok(())
    }
}

impl<'a, D> IntoIterator for &'a InMemDicomObject<D> {
    type Item = &'a InMemElement<D>;
    type IntoIter = std::slice::Iter<'a, InMemElement<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Check whether the given error marks a clean end of the byte stream
/// at an element boundary, which is the expected way for a top-level
/// data set to end.
fn is_eof_at_boundary(e: &dcmstack_parser::Error) -> bool {
    use dcmstack_encoding::decode::Error as DecodeError;
    use dcmstack_parser::Error as ParserError;

    match e {
        ParserError::DecodeElementHeader {
            source: DecodeError::ReadTag { source, .. },
            ..
        } => source.kind() == std::io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmstack_core::dictionary::tags;
    use dcmstack_core::value::PrimitiveValue;
    use dcmstack_core::VR;
    use dcmstack_core::smallvec::smallvec;
    use dcmstack_encoding::TransferSyntax;
    use std::io::Cursor;

    // (0008,0060) Modality CS "CT", then a sequence with one item
    // holding (0028,0010) Rows, then (0028,0011) Columns at top level
    #[rustfmt::skip]
    const RAW_WITH_SEQUENCE: &[u8] = &[
        0x08, 0x00, 0x60, 0x00, // (0008,0060)
            b'C', b'S', 0x02, 0x00,
            b'C', b'T',
        0x08, 0x00, 0x40, 0x11, // (0008,1140) sequence (not in dictionary)
            b'S', b'Q', 0x00, 0x00, // reserved
            0xFF, 0xFF, 0xFF, 0xFF, // undefined length
            // item, undefined length
            0xFE, 0xFF, 0x00, 0xE0,
            0xFF, 0xFF, 0xFF, 0xFF,
                0x28, 0x00, 0x10, 0x00, // (0028,0010) Rows
                    b'U', b'S', 0x02, 0x00,
                    0x20, 0x00, // 32
            // item delimiter
            0xFE, 0xFF, 0x0D, 0xE0,
            0x00, 0x00, 0x00, 0x00,
            // sequence delimiter
            0xFE, 0xFF, 0xDD, 0xE0,
            0x00, 0x00, 0x00, 0x00,
        0x28, 0x00, 0x11, 0x00, // (0028,0011) Columns
            b'U', b'S', 0x02, 0x00,
            0x40, 0x00, // 64
    ];

    fn read_object(raw: &[u8]) -> InMemDicomObject {
        let mut decoder = StatefulDecoder::new(
            Cursor::new(raw),
            TransferSyntax::ExplicitVRLittleEndian,
            StandardDataDictionary,
        );
        InMemDicomObject::build_root_object(&mut decoder, StandardDataDictionary).unwrap()
    }

    #[test]
    fn builds_objects_with_nested_sequences() {
        let obj = read_object(RAW_WITH_SEQUENCE);
        assert_eq!(obj.len(), 3);

        assert_eq!(obj.element(tags::MODALITY).unwrap().string().unwrap(), "CT");

        let seq = obj.element(Tag(0x0008, 0x1140)).unwrap();
        let items = seq.value().items().expect("a sequence value");
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].element(tags::ROWS).unwrap().uint16().unwrap(),
            32
        );

        assert_eq!(obj.element(tags::COLUMNS).unwrap().uint16().unwrap(), 64);
    }

    #[test]
    fn element_order_is_preserved() {
        let obj = read_object(RAW_WITH_SEQUENCE);
        let order: Vec<Tag> = obj.into_iter().map(|e| e.header().tag).collect();
        assert_eq!(
            order,
            vec![tags::MODALITY, Tag(0x0008, 0x1140), tags::COLUMNS]
        );
    }

    #[test]
    fn unterminated_sequence_is_an_error() {
        // sequence with undefined length and no delimiter before EOF
        #[rustfmt::skip]
        const RAW: &[u8] = &[
            0x08, 0x00, 0x40, 0x11,
                b'S', b'Q', 0x00, 0x00,
                0xFF, 0xFF, 0xFF, 0xFF,
                0xFE, 0xFF, 0x00, 0xE0,
                0xFF, 0xFF, 0xFF, 0xFF,
                    0x28, 0x00, 0x10, 0x00,
                        b'U', b'S', 0x02, 0x00,
                        0x20, 0x00,
        ];
        let mut decoder = StatefulDecoder::new(
            Cursor::new(RAW),
            TransferSyntax::ExplicitVRLittleEndian,
            StandardDataDictionary,
        );
        let e = InMemDicomObject::build_root_object(&mut decoder, StandardDataDictionary);
        assert!(e.is_err());
    }

    #[test]
    fn synthetic_objects_by_hand() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::U16(smallvec![128]).into(),
        ));
        assert!(obj.contains(tags::ROWS));
        assert!(obj.element_opt(tags::COLUMNS).is_none());
        assert_eq!(
            obj.element_by_name("Rows").unwrap().uint16().unwrap(),
            128
        );
    }
}
