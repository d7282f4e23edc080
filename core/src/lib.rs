#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Core library of dcmstack, holding the concepts and data structures
//! shared by the rest of the workspace.
//!
//! The current structure of this crate is as follows:
//!
//! - [`header`] comprises the data types for DICOM element headers,
//!   including tags, value representations and lengths.
//! - [`value`] holds the definitions for values in data elements,
//!   with awareness of multiplicity and nested sequences.
//! - [`dictionary`] describes the data dictionary abstraction,
//!   which translates attribute names and/or tags to a dictionary entry,
//!   and provides the built-in standard dictionary.
//!
//! [`dictionary`]: ./dictionary/index.html
//! [`header`]: ./header/index.html
//! [`value`]: ./value/index.html

pub mod dictionary;
pub mod header;
pub mod value;

pub use dictionary::DataDictionary;
pub use header::{DataElement, DataElementHeader, Length, Tag, VR};
pub use value::{PrimitiveValue, Value};

// re-export crates that are part of the public API
pub use smallvec;
