//! The caller-facing operation surface: 2D conversion, metadata and
//! pixel extraction, validation, series loading and 3D surface
//! reconstruction, writing derived artifacts through the cache.

use crate::cache::{ArtifactStore, CacheKey, DiskCache};
use dcmstack_object::{extract_metadata, open_file, FileDicomObject};
use dcmstack_pixeldata::{
    attribute, encode_bmp, encode_png, to_display, PixelBuffer, PixelDecoder, Rescale, WindowLevel,
};
use dcmstack_volume::{
    assemble, extract_isosurface, export_obj, write_raster, SliceGeometry, VolumeGrid,
};
use snafu::{Backtrace, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An error which may occur in a pipeline operation.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The DICOM object could not be opened or parsed.
    #[snafu(display("Could not read DICOM object '{}': {}", path.display(), source))]
    ReadObject {
        path: PathBuf,
        #[snafu(backtrace)]
        source: dcmstack_object::Error,
    },

    /// The object's pixel data could not be decoded.
    #[snafu(display("Could not decode pixel data of '{}': {}", path.display(), source))]
    DecodePixelData {
        path: PathBuf,
        #[snafu(backtrace)]
        source: dcmstack_pixeldata::Error,
    },

    /// The displayable image could not be serialized.
    #[snafu(display("Could not encode output image: {}", source))]
    EncodeImage {
        #[snafu(backtrace)]
        source: dcmstack_pixeldata::encode::Error,
    },

    /// A volume operation failed.
    #[snafu(display("{}", source))]
    Volume {
        #[snafu(backtrace)]
        source: dcmstack_volume::Error,
    },

    /// The artifact could not be stored.
    #[snafu(display("Could not store artifact: {}", source))]
    StoreArtifact {
        #[snafu(backtrace)]
        source: crate::cache::Error,
    },

    /// A series directory could not be listed.
    #[snafu(display("Could not list directory '{}': {}", path.display(), source))]
    ListDirectory {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The directory holds no readable DICOM series.
    #[snafu(display("No DICOM files found in '{}'", path.display()))]
    NoSeriesInDirectory { path: PathBuf, backtrace: Backtrace },

    /// `export_volume` was called before a series was loaded.
    #[snafu(display("No volume loaded"))]
    NoVolumeLoaded { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Output raster image format of [`DicomPipeline::convert_to_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Portable Network Graphics
    Png,
    /// Windows Bitmap
    Bmp,
}

impl ImageFormat {
    fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
        }
    }
}

/// How [`DicomPipeline::load_series`] treats files which fail to parse
/// or decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesPolicy {
    /// The first failing file aborts the whole operation.
    FailFast,
    /// Failing files are reported and skipped;
    /// the volume is assembled from the remaining slices.
    SkipInvalid,
}

/// The decoding and reconstruction pipeline over a cache of derived
/// artifacts.
///
/// Single-file operations are stateless and reentrant; the only state
/// held is the most recently assembled volume (consumed by
/// [`export_volume`](DicomPipeline::export_volume)) and the artifact
/// store handle.
#[derive(Debug)]
pub struct DicomPipeline<S = DiskCache> {
    store: S,
    volume: Option<VolumeGrid>,
}

impl DicomPipeline<DiskCache> {
    /// Create a pipeline writing artifacts to the given cache
    /// directory.
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = DiskCache::new(dir).context(StoreArtifactSnafu)?;
        Ok(Self::new(store))
    }
}

impl<S> DicomPipeline<S>
where
    S: ArtifactStore,
{
    /// Create a pipeline over the given artifact store.
    pub fn new(store: S) -> Self {
        DicomPipeline {
            store,
            volume: None,
        }
    }

    /// Run the full decode pipeline over a single file and write the
    /// displayable image through the cache, returning the output path.
    ///
    /// A previously converted artifact under the same key is returned
    /// without re-decoding.
    pub fn convert_to_image(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        format: ImageFormat,
    ) -> Result<PathBuf> {
        let path = path.as_ref();
        let key = CacheKey::new(path, "image", name, format.extension());
        if let Some(existing) = self.store.resolve(&key) {
            debug!("cache hit for '{}'", existing.display());
            return Ok(existing);
        }

        let obj = self.open(path)?;
        let buffer = obj
            .decode_pixel_data()
            .context(DecodePixelDataSnafu { path })?;

        let dataset = obj.dataset();
        let rescale = Rescale::new(
            attribute::rescale_slope(dataset),
            attribute::rescale_intercept(dataset),
        );
        let window = match (
            attribute::window_center(dataset),
            attribute::window_width(dataset),
        ) {
            (Some(center), Some(width)) => Some(WindowLevel::new(center, width)),
            _ => None,
        };

        let display = to_display(&buffer, rescale, window);
        let bytes = match format {
            ImageFormat::Png => encode_png(
                u32::from(buffer.columns),
                u32::from(buffer.rows),
                buffer.samples_per_pixel,
                &display,
            ),
            ImageFormat::Bmp => encode_bmp(
                u32::from(buffer.columns),
                u32::from(buffer.rows),
                buffer.samples_per_pixel,
                &display,
            ),
        }
        .context(EncodeImageSnafu)?;

        self.store.store(&key, &bytes).context(StoreArtifactSnafu)
    }

    /// Extract the fixed set of clinically relevant attributes.
    /// No pixel data is decoded.
    pub fn extract_metadata(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<BTreeMap<&'static str, String>> {
        let obj = self.open(path.as_ref())?;
        Ok(extract_metadata(&obj))
    }

    /// Expose the raw pixel samples of a file,
    /// without any intensity transformation.
    pub fn extract_pixel_data(&self, path: impl AsRef<Path>) -> Result<PixelBuffer> {
        let path = path.as_ref();
        let obj = self.open(path)?;
        obj.decode_pixel_data().context(DecodePixelDataSnafu { path })
    }

    /// Check whether the file parses as a well-formed DICOM data set
    /// containing a pixel data element.
    ///
    /// Malformed input returns `false`; this operation never fails.
    pub fn is_valid_dicom(&self, path: impl AsRef<Path>) -> bool {
        match open_file(path.as_ref()) {
            Ok(obj) => obj
                .element_opt(dcmstack_core::dictionary::tags::PIXEL_DATA)
                .is_some(),
            Err(e) => {
                debug!("not a usable DICOM file '{}': {}", path.as_ref().display(), e);
                false
            }
        }
    }

    /// Decode the given files as slices of one series, in the order
    /// given (the caller sorts along the anatomical axis), and assemble
    /// them into a volume retained for
    /// [`export_volume`](DicomPipeline::export_volume).
    ///
    /// Returns `Ok(false)` for recoverable geometry mismatches, so
    /// callers can probe series compatibility. How files that fail to
    /// parse are treated is selected by `policy`.
    pub fn load_series(
        &mut self,
        paths: &[impl AsRef<Path>],
        policy: SeriesPolicy,
    ) -> Result<bool> {
        let mut slices = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match self.read_slice(path) {
                Ok(slice) => slices.push(slice),
                Err(e) => match policy {
                    SeriesPolicy::FailFast => return Err(e),
                    SeriesPolicy::SkipInvalid => {
                        warn!("skipping unreadable slice '{}': {}", path.display(), e);
                    }
                },
            }
        }

        match assemble(&slices) {
            Ok(grid) => {
                debug!(
                    "assembled volume {}x{}x{}",
                    grid.dim.0, grid.dim.1, grid.dim.2
                );
                self.volume = Some(grid);
                Ok(true)
            }
            Err(e @ dcmstack_volume::Error::InconsistentGeometry { .. })
            | Err(e @ dcmstack_volume::Error::EmptySeries { .. }) => {
                warn!("series cannot form a volume: {}", e);
                Ok(false)
            }
            Err(e) => Err(Error::Volume { source: e }),
        }
    }

    /// Serialize the most recently assembled volume to the volumetric
    /// raster format, through the cache.
    pub fn export_volume(&self, name: &str) -> Result<PathBuf> {
        let grid = match &self.volume {
            Some(grid) => grid,
            None => return NoVolumeLoadedSnafu.fail(),
        };
        let mut bytes = Vec::new();
        write_raster(grid, &mut bytes).context(VolumeSnafu)?;
        let key = CacheKey::new("series", "volume", name, "dcvl");
        self.store.store(&key, &bytes).context(StoreArtifactSnafu)
    }

    /// Discover the DICOM files of a directory, sort them along the
    /// anatomical axis, reconstruct the isosurface at the given
    /// intensity threshold and export it as OBJ, returning the output
    /// path.
    ///
    /// Files that fail to parse or decode are reported and skipped,
    /// mirroring the validity filtering of series discovery.
    pub fn reconstruct_surface(
        &mut self,
        dir: impl AsRef<Path>,
        name: &str,
        threshold: f64,
    ) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .context(ListDirectorySnafu { path: dir })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut slices = Vec::new();
        for path in &paths {
            match self.read_sortable_slice(path) {
                Ok(slice) => slices.push(slice),
                Err(e) => {
                    warn!("skipping non-DICOM file '{}': {}", path.display(), e);
                }
            }
        }
        if slices.is_empty() {
            return NoSeriesInDirectorySnafu { path: dir }.fail();
        }

        // order along the anatomical axis; ties and missing locations
        // fall back to the instance number, then to the directory order
        slices.sort_by(|a, b| {
            a.sort_key
                .partial_cmp(&b.sort_key)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let slices: Vec<(PixelBuffer, SliceGeometry)> = slices
            .into_iter()
            .map(|s| (s.buffer, s.geometry))
            .collect();
        let grid = assemble(&slices).context(VolumeSnafu)?;

        let mesh = extract_isosurface(&grid, threshold as f32).context(VolumeSnafu)?;
        debug!(
            "surface at {} has {} triangles",
            threshold,
            mesh.triangle_count()
        );
        let bytes = export_obj(&mesh);

        self.volume = Some(grid);

        let key = CacheKey::new(dir, "surface", format!("{}-{}", name, threshold), "obj");
        self.store.store(&key, &bytes).context(StoreArtifactSnafu)
    }

    fn open(&self, path: &Path) -> Result<FileDicomObject> {
        open_file(path).context(ReadObjectSnafu { path })
    }

    fn read_slice(&self, path: &Path) -> Result<(PixelBuffer, SliceGeometry)> {
        let slice = self.read_sortable_slice(path)?;
        Ok((slice.buffer, slice.geometry))
    }

    fn read_sortable_slice(&self, path: &Path) -> Result<SortableSlice> {
        let obj = self.open(path)?;
        let buffer = obj
            .decode_pixel_data()
            .context(DecodePixelDataSnafu { path })?;
        let dataset = obj.dataset();

        let location = attribute::slice_location(dataset);
        let instance = attribute::instance_number(dataset);
        let pixel_spacing = attribute::pixel_spacing(dataset).unwrap_or((0.0, 0.0));
        let rescale = Rescale::new(
            attribute::rescale_slope(dataset),
            attribute::rescale_intercept(dataset),
        );

        // the location is primary; a missing location sorts by
        // instance number alone
        let sort_key = (
            location.unwrap_or(f64::MAX),
            instance.map(f64::from).unwrap_or(f64::MAX),
        );

        Ok(SortableSlice {
            geometry: SliceGeometry::new(
                pixel_spacing,
                location
                    .or_else(|| instance.map(f64::from))
                    .unwrap_or(0.0),
                rescale,
            ),
            buffer,
            sort_key,
        })
    }
}

struct SortableSlice {
    buffer: PixelBuffer,
    geometry: SliceGeometry,
    sort_key: (f64, f64),
}
