#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! This crate works on top of dcmstack-encoding to provide a stateful
//! decoder of DICOM data sets: element headers and values are fetched
//! sequentially from a byte source, with the decoder keeping track of
//! the current position so that higher layers can honor defined-length
//! sequences and items.
//!
//! The decoder does not interpret the data set's structure beyond one
//! element at a time; assembling elements into an in-memory object
//! (including sequence recursion) is the concern of higher layers.

pub mod stateful;

pub use stateful::{Error, Result, StatefulDecoder};
