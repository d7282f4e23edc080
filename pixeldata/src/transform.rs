//! Pixel sample value transformation functions: the modality rescale
//! function and the linear window transformation which together map raw
//! samples into displayable 8-bit values.

use crate::{PhotometricInterpretation, PixelBuffer, SampleData};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Description of a modality rescale function,
/// defined by a _rescale slope_ and _rescale intercept_.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// the rescale slope
    pub slope: f64,
    /// the rescale intercept
    pub intercept: f64,
}

impl Rescale {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    /// The identity rescale function.
    #[inline]
    pub fn identity() -> Self {
        Rescale {
            slope: 1.,
            intercept: 0.,
        }
    }

    /// Apply the rescale function to a value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }
}

/// The parameters of a single window level:
/// the window center and the window width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    /// The _Window Center_.
    pub center: f64,
    /// The _Window Width_. Negative widths are treated as zero.
    pub width: f64,
}

impl WindowLevel {
    /// Create a new window level.
    #[inline]
    pub fn new(center: f64, width: f64) -> Self {
        WindowLevel {
            center,
            width: width.max(0.),
        }
    }

    /// Apply the linear window function to a rescaled value,
    /// mapping it into the `0..=255` display range.
    ///
    /// Values at or below the lower window edge map to 0,
    /// values at or above the upper edge map to 255,
    /// and values in between map linearly over the 256 display levels.
    pub fn apply(&self, value: f64) -> u8 {
        let lo = self.center - self.width / 2.;
        let hi = self.center + self.width / 2.;
        if value <= lo {
            0
        } else if value >= hi {
            255
        } else {
            // self.width > 0 here, since lo < value < hi
            ((((value - lo) / self.width) * 256.).floor()).min(255.) as u8
        }
    }
}

/// Map the raw samples of a pixel buffer into displayable 8-bit values.
///
/// Grayscale samples go through the rescale function, then the window
/// function; when no window is given, the full range of the rescaled
/// buffer is normalized instead (an intentional, documented fallback,
/// not an error). MONOCHROME1 output is inverted after windowing. RGB
/// samples are already display values and pass through unchanged.
pub fn to_display(buffer: &PixelBuffer, rescale: Rescale, window: Option<WindowLevel>) -> Vec<u8> {
    if buffer.photometric_interpretation == PhotometricInterpretation::Rgb {
        return match &buffer.data {
            SampleData::U8(v) => v.clone(),
            // RGB with 16 bits per sample is rejected at decoding time
            SampleData::U16(v) => v.iter().map(|&s| (s >> 8) as u8).collect(),
            SampleData::I16(v) => v.iter().map(|&s| s.max(0) as u8).collect(),
        };
    }

    let n = buffer.sample_count();
    let window = match window {
        Some(window) => window,
        None => {
            tracing::debug!("no window parameters; normalizing over the full sample range");
            full_range_window(buffer, rescale)
        }
    };
    let invert = buffer.photometric_interpretation == PhotometricInterpretation::Monochrome1;

    (0..n)
        .into_par_iter()
        .map(|i| {
            let value = window.apply(rescale.apply(buffer.data.get_f64(i)));
            if invert {
                255 - value
            } else {
                value
            }
        })
        .collect()
}

/// Derive the window which spans the full range of the rescaled buffer.
fn full_range_window(buffer: &PixelBuffer, rescale: Rescale) -> WindowLevel {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for i in 0..buffer.sample_count() {
        let value = rescale.apply(buffer.data.get_f64(i));
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() {
        // empty buffer; any window will do
        return WindowLevel::new(0., 0.);
    }
    WindowLevel::new((min + max) / 2., max - min)
}

#[cfg(test)]
mod tests {
    use super::{to_display, Rescale, WindowLevel};
    use crate::{PhotometricInterpretation, PixelBuffer, SampleData};

    fn gray_buffer(pi: PhotometricInterpretation, data: SampleData) -> PixelBuffer {
        let (bits, signed) = match data {
            SampleData::U8(_) => (8, false),
            SampleData::U16(_) => (16, false),
            SampleData::I16(_) => (16, true),
        };
        PixelBuffer {
            columns: data.len() as u16,
            rows: 1,
            samples_per_pixel: 1,
            bits_allocated: bits,
            signed,
            photometric_interpretation: pi,
            data,
        }
    }

    #[test]
    fn window_maps_edges_and_midpoint() {
        let w = WindowLevel::new(128., 256.);
        assert_eq!(w.apply(0.), 0);
        assert_eq!(w.apply(-500.), 0);
        assert_eq!(w.apply(1.), 1);
        assert_eq!(w.apply(128.), 128);
        assert_eq!(w.apply(255.), 255);
        assert_eq!(w.apply(256.), 255);
    }

    #[test]
    fn zero_width_window_is_a_step() {
        let w = WindowLevel::new(40., 0.);
        assert_eq!(w.apply(39.), 0);
        assert_eq!(w.apply(40.), 0);
        assert_eq!(w.apply(41.), 255);
    }

    #[test]
    fn output_is_monotonic_in_input() {
        let windows = [
            WindowLevel::new(40., 400.),
            WindowLevel::new(-600., 1500.),
            WindowLevel::new(0., 1.),
            WindowLevel::new(127.5, 255.),
        ];
        for w in windows {
            let mut last = 0u8;
            for raw in -1200..=1200 {
                let out = w.apply(f64::from(raw));
                assert!(out >= last, "window {:?} not monotonic at {}", w, raw);
                last = out;
            }
        }
    }

    #[test]
    fn rescale_applies_before_windowing() {
        // CT-like: stored 0..4095, slope 1, intercept -1024
        let buffer = gray_buffer(
            PhotometricInterpretation::Monochrome2,
            SampleData::U16(vec![0, 1024, 4095]),
        );
        let out = to_display(
            &buffer,
            Rescale::new(1., -1024.),
            Some(WindowLevel::new(0., 100.)),
        );
        assert_eq!(out, vec![0, 128, 255]);
    }

    #[test]
    fn monochrome1_inverts_output() {
        let buffer = gray_buffer(
            PhotometricInterpretation::Monochrome1,
            SampleData::U8(vec![0, 255]),
        );
        let out = to_display(
            &buffer,
            Rescale::identity(),
            Some(WindowLevel::new(127.5, 255.)),
        );
        assert_eq!(out, vec![255, 0]);
    }

    #[test]
    fn full_range_fallback_spans_min_to_max() {
        let buffer = gray_buffer(
            PhotometricInterpretation::Monochrome2,
            SampleData::I16(vec![-100, 0, 100]),
        );
        let out = to_display(&buffer, Rescale::identity(), None);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 128);
        assert_eq!(out[2], 255);
    }

    #[test]
    fn rgb_passes_through() {
        let buffer = PixelBuffer {
            columns: 1,
            rows: 1,
            samples_per_pixel: 3,
            bits_allocated: 8,
            signed: false,
            photometric_interpretation: PhotometricInterpretation::Rgb,
            data: SampleData::U8(vec![10, 20, 30]),
        };
        let out = to_display(&buffer, Rescale::identity(), None);
        assert_eq!(out, vec![10, 20, 30]);
    }
}
