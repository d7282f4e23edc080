#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! This crate is the facade of the dcmstack workspace: DICOM decoding,
//! 2D image conversion and 3D surface reconstruction behind a single
//! pipeline type, with derived artifacts written through a cache.
//!
//! The separate crates of the workspace remain available through the
//! re-exported module names, for programs which need lower-level
//! control:
//!
//! - [`core`](dcmstack_core) for tags, elements and dictionaries
//! - [`encoding`](dcmstack_encoding) for transfer syntax decoding
//! - [`parser`](dcmstack_parser) for stateful data set reading
//! - [`object`](dcmstack_object) for in-memory DICOM objects
//! - [`pixeldata`](dcmstack_pixeldata) for pixel decoding and images
//! - [`volume`](dcmstack_volume) for volumes and isosurfaces
//!
//! # Examples
//!
//! Convert a file to PNG, then reconstruct a surface from its series
//! directory:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dcmstack::{DicomPipeline, ImageFormat};
//!
//! let mut pipeline = DicomPipeline::with_cache_dir("/tmp/dcmstack-cache")?;
//! let png = pipeline.convert_to_image("series/scan-0001.dcm", "scan-0001", ImageFormat::Png)?;
//! println!("image at {}", png.display());
//!
//! let obj = pipeline.reconstruct_surface("series", "bone", 300.0)?;
//! println!("surface at {}", obj.display());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod pipeline;

pub use crate::cache::{ArtifactStore, CacheKey, DiskCache};
pub use crate::pipeline::{DicomPipeline, Error, ImageFormat, Result, SeriesPolicy};

// lower-level crates, re-exported for direct use
pub use dcmstack_core as core;
pub use dcmstack_encoding as encoding;
pub use dcmstack_object as object;
pub use dcmstack_parser as parser;
pub use dcmstack_pixeldata as pixeldata;
pub use dcmstack_volume as volume;
