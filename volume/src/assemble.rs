//! Stacking a sorted slice series into a [`VolumeGrid`].

use crate::{EmptySeriesSnafu, InconsistentGeometrySnafu, Result, VolumeGrid};
use dcmstack_pixeldata::{PixelBuffer, Rescale};
use tracing::warn;

/// Relative tolerance admitted between the spacing of consecutive
/// slice pairs before the series is rejected as non-uniform.
const SPACING_TOLERANCE: f64 = 0.1;

/// The spatial description of one slice in a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGeometry {
    /// in-plane pixel spacing as (row spacing, column spacing),
    /// in millimeters
    pub pixel_spacing: (f64, f64),
    /// position of the slice along the anatomical axis, in millimeters
    pub location: f64,
    /// the modality rescale function of the slice's samples
    pub rescale: Rescale,
}

impl SliceGeometry {
    /// Create a slice geometry description.
    pub fn new(pixel_spacing: (f64, f64), location: f64, rescale: Rescale) -> Self {
        SliceGeometry {
            pixel_spacing,
            location,
            rescale,
        }
    }
}

/// Stack an ordered slice series into a single 3D scalar grid.
///
/// The caller contract is that slices arrive already sorted along the
/// anatomical axis; no re-sorting happens here. All slices must share
/// the same dimensions and have a single sample per pixel. The voxel
/// spacing along the stacking axis is derived from the distance between
/// the first two slices; every subsequent pair is checked against it
/// and the series is rejected if the spacing deviates by more than 10%,
/// rather than silently distorting the geometry.
///
/// Samples are stored rescaled, so thresholds over the grid are in
/// modality units.
pub fn assemble(slices: &[(PixelBuffer, SliceGeometry)]) -> Result<VolumeGrid> {
    if slices.len() < 2 {
        return EmptySeriesSnafu { got: slices.len() }.fail();
    }

    let (first, first_geometry) = &slices[0];
    let dim_x = usize::from(first.columns);
    let dim_y = usize::from(first.rows);
    let dim_z = slices.len();

    for (index, (buffer, _)) in slices.iter().enumerate() {
        if buffer.samples_per_pixel != 1 {
            return InconsistentGeometrySnafu {
                index,
                reason: format!(
                    "expected a single sample per pixel, got {}",
                    buffer.samples_per_pixel
                ),
            }
            .fail();
        }
        if usize::from(buffer.columns) != dim_x || usize::from(buffer.rows) != dim_y {
            return InconsistentGeometrySnafu {
                index,
                reason: format!(
                    "slice is {}x{}, series is {}x{}",
                    buffer.columns, buffer.rows, dim_x, dim_y
                ),
            }
            .fail();
        }
    }

    // spacing along the stacking axis, from the first pair
    let spacing_z = (slices[1].1.location - first_geometry.location).abs();
    if spacing_z == 0.0 {
        return InconsistentGeometrySnafu {
            index: 1usize,
            reason: "consecutive slices share the same location".to_string(),
        }
        .fail();
    }
    for (index, pair) in slices.windows(2).enumerate().skip(1) {
        let step = (pair[1].1.location - pair[0].1.location).abs();
        if (step - spacing_z).abs() > spacing_z * SPACING_TOLERANCE {
            return InconsistentGeometrySnafu {
                index: index + 1,
                reason: format!(
                    "inter-slice spacing {:.4} deviates from {:.4}",
                    step, spacing_z
                ),
            }
            .fail();
        }
    }

    let (mut spacing_y, mut spacing_x) = first_geometry.pixel_spacing;
    if spacing_x <= 0.0 || spacing_y <= 0.0 {
        warn!("no usable pixel spacing; assuming 1.0 mm");
        spacing_x = 1.0;
        spacing_y = 1.0;
    }

    let mut samples = Vec::with_capacity(dim_x * dim_y * dim_z);
    for (buffer, geometry) in slices {
        let rescale = geometry.rescale;
        for i in 0..buffer.sample_count() {
            samples.push(rescale.apply(buffer.data.get_f64(i)) as f32);
        }
    }

    Ok(VolumeGrid {
        dim: (dim_x, dim_y, dim_z),
        spacing: (spacing_x, spacing_y, spacing_z),
        origin: (0.0, 0.0, first_geometry.location.min(slices[dim_z - 1].1.location)),
        samples,
    })
}
