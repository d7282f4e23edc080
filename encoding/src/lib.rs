#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! DICOM decoding primitives.
//!
//! This crate determines the transfer syntax of a data set and decodes
//! data element headers accordingly. Only the uncompressed little endian
//! transfer syntaxes are in scope; everything else is identified and
//! reported, never silently misread.

pub mod decode;
pub mod transfer_syntax;

pub use decode::{
    BodyDecoder, Decode, ExplicitVRLittleEndianDecoder, ImplicitVRLittleEndianDecoder,
};
pub use transfer_syntax::TransferSyntax;
