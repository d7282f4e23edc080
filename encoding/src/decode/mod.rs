//! This module provides the mechanism to decode DICOM data element
//! headers from a byte source, one per supported transfer syntax.

pub mod basic;
pub mod explicit_le;
pub mod implicit_le;

use dcmstack_core::dictionary::DataDictionary;
use dcmstack_core::header::{DataElementHeader, SequenceItemHeader, SequenceItemHeaderError, Tag};
use snafu::{Backtrace, Snafu};
use std::io::Read;

pub use explicit_le::ExplicitVRLittleEndianDecoder;
pub use implicit_le::ImplicitVRLittleEndianDecoder;

use crate::transfer_syntax::TransferSyntax;

/// Errors raised when decoding element headers from a byte source.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not read the tag of a data element header.
    #[snafu(display("Could not read tag: {}", source))]
    ReadTag {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Could not read the value representation of a data element header.
    #[snafu(display("Could not read VR: {}", source))]
    ReadVr {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Could not read the reserved field after the value representation.
    #[snafu(display("Could not read reserved field: {}", source))]
    ReadReserved {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Could not read the length field of a data element header.
    #[snafu(display("Could not read value length: {}", source))]
    ReadLength {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Could not read an item header.
    #[snafu(display("Could not read item header: {}", source))]
    ReadItemHeader {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The sequence item header was not one of the admitted delimiters.
    #[snafu(display("Bad sequence item header: {}", source))]
    BadSequenceHeader {
        source: SequenceItemHeaderError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Type trait for decoding data element headers from a byte source.
/// The byte order and VR handling are fixed by the implementation.
pub trait Decode {
    /// Fetch and decode the next data element header from the given source.
    /// The value is not decoded, under the assumption that the caller
    /// will fetch or skip it according to the returned header.
    /// Also returns the number of bytes read from the source.
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next sequence item head from the given source.
    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read;

    /// Decode a single attribute tag from the given source.
    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read;
}

/// A data element header decoder for the main body of a data set,
/// dispatching on the detected transfer syntax.
#[derive(Debug, Clone)]
pub enum BodyDecoder<D> {
    /// headers carry an explicit VR field
    Explicit(ExplicitVRLittleEndianDecoder),
    /// the VR is resolved from the data dictionary
    Implicit(ImplicitVRLittleEndianDecoder<D>),
}

impl<D> BodyDecoder<D>
where
    D: DataDictionary,
{
    /// Create a body decoder for the given transfer syntax,
    /// consulting the given dictionary where the syntax requires it.
    pub fn new(ts: TransferSyntax, dict: D) -> Self {
        match ts {
            TransferSyntax::ExplicitVRLittleEndian => {
                BodyDecoder::Explicit(ExplicitVRLittleEndianDecoder::default())
            }
            TransferSyntax::ImplicitVRLittleEndian => {
                BodyDecoder::Implicit(ImplicitVRLittleEndianDecoder::new(dict))
            }
        }
    }
}

impl<D> Decode for BodyDecoder<D>
where
    D: DataDictionary,
{
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        match self {
            BodyDecoder::Explicit(d) => d.decode_header(source),
            BodyDecoder::Implicit(d) => d.decode_header(source),
        }
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        match self {
            BodyDecoder::Explicit(d) => d.decode_item_header(source),
            BodyDecoder::Implicit(d) => d.decode_item_header(source),
        }
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        match self {
            BodyDecoder::Explicit(d) => d.decode_tag(source),
            BodyDecoder::Implicit(d) => d.decode_tag(source),
        }
    }
}
