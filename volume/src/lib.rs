#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Volume reconstruction and isosurface extraction for dcmstack.
//!
//! This crate stacks a sorted series of per-slice pixel buffers into a
//! single 3D scalar grid with defined voxel spacing, extracts a
//! triangulated isosurface from the grid at a caller-supplied intensity
//! threshold (marching cubes), and serializes the results: the grid to
//! a simple volumetric raster format and the mesh to Wavefront OBJ.
//!
//! The grid holds rescaled (modality) values, so that thresholds can be
//! given in real units such as Hounsfield units for CT series.

pub mod assemble;
pub mod grid;
pub mod marching;
pub mod mesh;
pub mod obj;
pub mod raster;

pub use assemble::{assemble, SliceGeometry};
pub use grid::VolumeGrid;
pub use marching::extract_isosurface;
pub use mesh::Mesh;
pub use obj::export_obj;
pub use raster::{read_raster, write_raster};

use snafu::{Backtrace, Snafu};

/// An error which may occur when assembling or processing a volume.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Fewer than two slices were supplied.
    #[snafu(display("Cannot assemble a volume from {} slice(s)", got))]
    EmptySeries { got: usize, backtrace: Backtrace },

    /// A slice does not share the geometry of the rest of the series.
    #[snafu(display("Inconsistent slice geometry at slice {}: {}", index, reason))]
    InconsistentGeometry {
        index: usize,
        reason: String,
        backtrace: Backtrace,
    },

    /// The grid has a zero dimension.
    #[snafu(display("Cannot extract a surface from an empty volume"))]
    EmptyVolume { backtrace: Backtrace },

    /// The volume raster could not be written.
    #[snafu(display("Could not write volume raster: {}", source))]
    WriteRaster {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The volume raster could not be read.
    #[snafu(display("Could not read volume raster: {}", source))]
    ReadRaster {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The volume raster data is not in the expected format.
    #[snafu(display("Invalid volume raster: {}", reason))]
    InvalidRaster {
        reason: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
