//! Implicit VR Little Endian decoder implementation.

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    BadSequenceHeaderSnafu, Decode, ReadItemHeaderSnafu, ReadLengthSnafu, ReadTagSnafu, Result,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmstack_core::dictionary::{DataDictionary, StandardDataDictionary};
use dcmstack_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmstack_core::{Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Implicit VR Little Endian transfer syntax.
///
/// Since the data set does not carry value representations, a data
/// dictionary is consulted to resolve the VR of each attribute.
/// Unknown attributes decode with the `UN` representation,
/// which keeps their value as raw bytes.
#[derive(Debug, Clone)]
pub struct ImplicitVRLittleEndianDecoder<D = StandardDataDictionary> {
    basic: LittleEndianBasicDecoder,
    dict: D,
}

impl Default for ImplicitVRLittleEndianDecoder<StandardDataDictionary> {
    fn default() -> Self {
        ImplicitVRLittleEndianDecoder::new(StandardDataDictionary)
    }
}

impl<D> ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    /// Create a new decoder with the given data dictionary.
    pub fn new(dict: D) -> Self {
        ImplicitVRLittleEndianDecoder {
            basic: LittleEndianBasicDecoder,
            dict,
        }
    }

    fn resolve_vr(&self, tag: Tag) -> VR {
        if tag.element() == 0x0000 {
            // group length elements are always UL
            return VR::UL;
        }
        self.dict.vr_of(tag)
    }
}

impl<D> Decode for ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        let tag = self.basic.decode_tag(&mut source).context(ReadTagSnafu)?;
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadLengthSnafu)?;
        let len = LittleEndian::read_u32(&buf);

        let vr = if tag.group() == 0xFFFE {
            // item and delimiter headers have no meaningful VR
            VR::UN
        } else {
            self.resolve_vr(tag)
        };

        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, mut source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        self.basic.decode_tag(&mut source).context(ReadTagSnafu)
    }
}
