//! Serialization of 8-bit raster buffers into general purpose
//! image formats.
//!
//! The encoders are deterministic and lossless: decoding the produced
//! bytes with a conforming reader yields the input samples unchanged.

use image::{ImageBuffer, ImageFormat, Luma, Rgb};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::io::Cursor;

/// An error which may occur when serializing a raster buffer.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The buffer does not hold `width * height * samples_per_pixel`
    /// samples.
    #[snafu(display(
        "Buffer of {} samples does not fit a {}x{} image with {} samples per pixel",
        got,
        width,
        height,
        samples_per_pixel
    ))]
    BufferMismatch {
        got: usize,
        width: u32,
        height: u32,
        samples_per_pixel: u16,
        backtrace: Backtrace,
    },

    /// The samples per pixel value has no image layout.
    #[snafu(display("No image layout for {} samples per pixel", samples_per_pixel))]
    UnsupportedLayout {
        samples_per_pixel: u16,
        backtrace: Backtrace,
    },

    /// The image container rejected the buffer.
    #[snafu(display("Invalid buffer when constructing image"))]
    InvalidImageBuffer { backtrace: Backtrace },

    /// The image writer failed.
    #[snafu(display("Could not encode image: {}", source))]
    WriteImage {
        source: image::ImageError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Serialize an 8-bit raster buffer into PNG bytes.
///
/// Single-sample input becomes an 8-bit grayscale image,
/// 3-sample input an 8-bit RGB image.
pub fn encode_png(
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    samples: &[u8],
) -> Result<Vec<u8>> {
    encode_image(width, height, samples_per_pixel, samples, ImageFormat::Png)
}

/// Serialize an 8-bit raster buffer into BMP bytes.
pub fn encode_bmp(
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    samples: &[u8],
) -> Result<Vec<u8>> {
    encode_image(width, height, samples_per_pixel, samples, ImageFormat::Bmp)
}

fn encode_image(
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    samples: &[u8],
    format: ImageFormat,
) -> Result<Vec<u8>> {
    let expected = width as usize * height as usize * usize::from(samples_per_pixel);
    if samples.len() != expected {
        return BufferMismatchSnafu {
            got: samples.len(),
            width,
            height,
            samples_per_pixel,
        }
        .fail();
    }

    let mut out = Cursor::new(Vec::new());
    match samples_per_pixel {
        1 => {
            let image: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, samples.to_vec())
                    .context(InvalidImageBufferSnafu)?;
            image.write_to(&mut out, format).context(WriteImageSnafu)?;
        }
        3 => {
            let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, samples.to_vec())
                    .context(InvalidImageBufferSnafu)?;
            image.write_to(&mut out, format).context(WriteImageSnafu)?;
        }
        spp => {
            return UnsupportedLayoutSnafu {
                samples_per_pixel: spp,
            }
            .fail();
        }
    }
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{encode_bmp, encode_png, Error};
    use image::ImageReader;
    use std::io::Cursor;

    #[test]
    fn png_round_trip_is_exact() {
        let samples: Vec<u8> = (0u16..256).map(|v| v as u8).collect();
        let bytes = encode_png(16, 16, 1, &samples).unwrap();

        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
            .into_luma8();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
        assert_eq!(decoded.into_raw(), samples);
    }

    #[test]
    fn bmp_round_trip_is_exact() {
        let samples = vec![0u8, 255, 128, 17, 34, 51];
        let bytes = encode_bmp(3, 2, 1, &samples).unwrap();

        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
            .into_luma8();
        assert_eq!(decoded.into_raw(), samples);
    }

    #[test]
    fn rgb_png_keeps_channels() {
        let samples = vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255, 9, 9, 9];
        let bytes = encode_png(2, 2, 3, &samples).unwrap();

        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
            .into_rgb8();
        assert_eq!(decoded.into_raw(), samples);
    }

    #[test]
    fn buffer_mismatch_is_reported() {
        assert!(matches!(
            encode_png(4, 4, 1, &[0u8; 15]),
            Err(Error::BufferMismatch { .. })
        ));
    }
}
