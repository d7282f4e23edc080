//! End-to-end tests over synthetic DICOM files.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcmstack::{DicomPipeline, ImageFormat, SeriesPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};

const TS_EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";

/// Append one data element in Explicit VR Little Endian.
fn put_element(out: &mut Vec<u8>, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) {
    let mut value = value.to_vec();
    if value.len() % 2 == 1 {
        // pad to even length; text values pad with space, UI with NUL,
        // binary values are always even already
        value.push(if vr == b"UI" { 0x00 } else { b' ' });
    }

    let mut buf = [0u8; 4];
    LittleEndian::write_u16(&mut buf[0..2], group);
    LittleEndian::write_u16(&mut buf[2..4], element);
    out.extend_from_slice(&buf);
    out.extend_from_slice(vr);

    match vr {
        b"OB" | b"OW" | b"UN" | b"UT" | b"SQ" => {
            out.extend_from_slice(&[0, 0]);
            LittleEndian::write_u32(&mut buf, value.len() as u32);
            out.extend_from_slice(&buf);
        }
        _ => {
            LittleEndian::write_u16(&mut buf[0..2], value.len() as u16);
            out.extend_from_slice(&buf[0..2]);
        }
    }
    out.extend_from_slice(&value);
}

fn put_us(out: &mut Vec<u8>, group: u16, element: u16, value: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value);
    put_element(out, group, element, b"US", &buf);
}

/// A synthetic single-frame grayscale DICOM file.
struct SyntheticSlice {
    rows: u16,
    columns: u16,
    window: Option<(f64, f64)>,
    slice_location: Option<f64>,
    pixel_spacing: Option<(f64, f64)>,
    instance_number: Option<i32>,
    pixel_data: Vec<u8>,
}

impl SyntheticSlice {
    fn new(rows: u16, columns: u16, pixel_data: Vec<u8>) -> Self {
        SyntheticSlice {
            rows,
            columns,
            window: None,
            slice_location: None,
            pixel_spacing: None,
            instance_number: None,
            pixel_data,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");

        // file meta group
        let mut meta = Vec::new();
        put_element(&mut meta, 0x0002, 0x0010, b"UI", TS_EXPLICIT_LE.as_bytes());
        let mut group_length = [0u8; 4];
        LittleEndian::write_u32(&mut group_length, meta.len() as u32);
        put_element(&mut out, 0x0002, 0x0000, b"UL", &group_length);
        out.extend_from_slice(&meta);

        // main data set, ascending tag order
        if let Some(instance) = self.instance_number {
            put_element(&mut out, 0x0020, 0x0013, b"IS", instance.to_string().as_bytes());
        }
        if let Some(location) = self.slice_location {
            put_element(&mut out, 0x0020, 0x1041, b"DS", location.to_string().as_bytes());
        }
        put_us(&mut out, 0x0028, 0x0002, 1); // SamplesPerPixel
        put_element(&mut out, 0x0028, 0x0004, b"CS", b"MONOCHROME2");
        put_us(&mut out, 0x0028, 0x0010, self.rows);
        put_us(&mut out, 0x0028, 0x0011, self.columns);
        if let Some((row_spacing, col_spacing)) = self.pixel_spacing {
            let text = format!("{}\\{}", row_spacing, col_spacing);
            put_element(&mut out, 0x0028, 0x0030, b"DS", text.as_bytes());
        }
        put_us(&mut out, 0x0028, 0x0100, 8); // BitsAllocated
        put_us(&mut out, 0x0028, 0x0101, 8); // BitsStored
        put_us(&mut out, 0x0028, 0x0102, 7); // HighBit
        put_us(&mut out, 0x0028, 0x0103, 0); // PixelRepresentation
        if let Some((center, width)) = self.window {
            put_element(&mut out, 0x0028, 0x1050, b"DS", center.to_string().as_bytes());
            put_element(&mut out, 0x0028, 0x1051, b"DS", width.to_string().as_bytes());
        }
        put_element(&mut out, 0x0028, 0x1052, b"DS", b"0"); // RescaleIntercept
        put_element(&mut out, 0x0028, 0x1053, b"DS", b"1"); // RescaleSlope
        put_element(&mut out, 0x7FE0, 0x0010, b"OW", &self.pixel_data);
        out
    }

    fn write_to(&self, path: &Path) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&self.encode()).unwrap();
    }
}

fn pipeline_in(dir: &Path) -> DicomPipeline {
    DicomPipeline::with_cache_dir(dir.join("cache")).unwrap()
}

#[test]
fn convert_to_png_preserves_windowed_values() {
    // 64x64 MONOCHROME2, slope 1, intercept 0, center 128, width 256:
    // the window maps every 8-bit sample onto itself
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..64 * 64).map(|i| (i % 256) as u8).collect();
    let mut slice = SyntheticSlice::new(64, 64, data.clone());
    slice.window = Some((128.0, 256.0));
    let input = dir.path().join("scan-0001.dcm");
    slice.write_to(&input);

    let pipeline = pipeline_in(dir.path());
    let out = pipeline
        .convert_to_image(&input, "scan-0001", ImageFormat::Png)
        .unwrap();

    let decoded = image::open(&out).unwrap().into_luma8();
    assert_eq!(decoded.width(), 64);
    assert_eq!(decoded.height(), 64);
    let decoded = decoded.into_raw();
    assert_eq!(decoded[0], 0);
    assert_eq!(decoded[255], 255);
    assert_eq!(decoded, data);
}

#[test]
fn convert_to_bmp_produces_readable_image() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..16 * 16).map(|i| (i % 256) as u8).collect();
    let mut slice = SyntheticSlice::new(16, 16, data);
    slice.window = Some((128.0, 256.0));
    let input = dir.path().join("scan-0001.dcm");
    slice.write_to(&input);

    let pipeline = pipeline_in(dir.path());
    let out = pipeline
        .convert_to_image(&input, "scan-0001", ImageFormat::Bmp)
        .unwrap();
    let decoded = image::open(&out).unwrap().into_luma8();
    assert_eq!(decoded.width(), 16);
}

#[test]
fn second_conversion_hits_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut slice = SyntheticSlice::new(8, 8, vec![0u8; 64]);
    slice.window = Some((128.0, 256.0));
    let input = dir.path().join("scan-0001.dcm");
    slice.write_to(&input);

    let pipeline = pipeline_in(dir.path());
    let first = pipeline
        .convert_to_image(&input, "scan-0001", ImageFormat::Png)
        .unwrap();
    let before = std::fs::metadata(&first).unwrap().modified().unwrap();

    let second = pipeline
        .convert_to_image(&input, "scan-0001", ImageFormat::Png)
        .unwrap();
    assert_eq!(first, second);
    let after = std::fs::metadata(&second).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn metadata_extraction_does_not_need_windowing() {
    let dir = tempfile::tempdir().unwrap();
    let mut slice = SyntheticSlice::new(4, 6, vec![0u8; 24]);
    slice.slice_location = Some(-12.5);
    let input = dir.path().join("scan-0001.dcm");
    slice.write_to(&input);

    let pipeline = pipeline_in(dir.path());
    let metadata = pipeline.extract_metadata(&input).unwrap();
    assert_eq!(metadata.get("Rows").map(String::as_str), Some("4"));
    assert_eq!(metadata.get("Columns").map(String::as_str), Some("6"));
    assert_eq!(
        metadata.get("SliceLocation").map(String::as_str),
        Some("-12.5")
    );
    assert!(!metadata.contains_key("PatientName"));
}

#[test]
fn extract_pixel_data_returns_raw_samples() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..16).collect();
    SyntheticSlice::new(4, 4, data.clone()).write_to(&dir.path().join("scan.dcm"));

    let pipeline = pipeline_in(dir.path());
    let buffer = pipeline
        .extract_pixel_data(dir.path().join("scan.dcm"))
        .unwrap();
    assert_eq!(buffer.columns, 4);
    assert_eq!(buffer.rows, 4);
    match buffer.data {
        dcmstack::pixeldata::SampleData::U8(samples) => assert_eq!(samples, data),
        other => panic!("unexpected sample layout: {:?}", other),
    }
}

#[test]
fn validate_is_false_for_malformed_input() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_in(dir.path());

    // empty file
    let empty = dir.path().join("empty.dcm");
    std::fs::File::create(&empty).unwrap();
    assert!(!pipeline.is_valid_dicom(&empty));

    // no DICM magic
    let garbage = dir.path().join("garbage.dcm");
    std::fs::write(&garbage, vec![0x42u8; 4096]).unwrap();
    assert!(!pipeline.is_valid_dicom(&garbage));

    // truncated pixel data element
    let truncated = dir.path().join("truncated.dcm");
    let bytes = SyntheticSlice::new(16, 16, vec![0u8; 256]).encode();
    std::fs::write(&truncated, &bytes[..bytes.len() - 100]).unwrap();
    assert!(!pipeline.is_valid_dicom(&truncated));

    // nonexistent path
    assert!(!pipeline.is_valid_dicom(dir.path().join("missing.dcm")));
}

#[test]
fn validate_is_true_for_well_formed_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.dcm");
    SyntheticSlice::new(8, 8, vec![0u8; 64]).write_to(&input);

    let pipeline = pipeline_in(dir.path());
    assert!(pipeline.is_valid_dicom(&input));
}

fn write_series(dir: &Path, count: usize, rows: u16, columns: u16) -> Vec<PathBuf> {
    (0..count)
        .map(|z| {
            let mut slice = SyntheticSlice::new(
                rows,
                columns,
                vec![0u8; usize::from(rows) * usize::from(columns)],
            );
            slice.slice_location = Some(z as f64);
            slice.pixel_spacing = Some((1.0, 1.0));
            slice.instance_number = Some(z as i32 + 1);
            let path = dir.join(format!("slice-{:03}.dcm", z));
            slice.write_to(&path);
            path
        })
        .collect()
}

#[test]
fn load_series_and_export_volume() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_series(dir.path(), 5, 8, 8);

    let mut pipeline = pipeline_in(dir.path());
    assert!(pipeline
        .load_series(&paths, SeriesPolicy::FailFast)
        .unwrap());

    let out = pipeline.export_volume("stack").unwrap();
    let grid = dcmstack::volume::read_raster(std::fs::File::open(out).unwrap()).unwrap();
    assert_eq!(grid.dim, (8, 8, 5));
    assert_eq!(grid.spacing.2, 1.0);
}

#[test]
fn export_volume_without_series_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_in(dir.path());
    assert!(matches!(
        pipeline.export_volume("nothing"),
        Err(dcmstack::Error::NoVolumeLoaded { .. })
    ));
}

#[test]
fn load_series_reports_incompatible_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = write_series(dir.path(), 3, 8, 8);

    // one slice with different dimensions
    let mut odd = SyntheticSlice::new(16, 16, vec![0u8; 256]);
    odd.slice_location = Some(3.0);
    odd.pixel_spacing = Some((1.0, 1.0));
    let odd_path = dir.path().join("slice-odd.dcm");
    odd.write_to(&odd_path);
    paths.push(odd_path);

    let mut pipeline = pipeline_in(dir.path());
    assert_eq!(
        pipeline.load_series(&paths, SeriesPolicy::FailFast).unwrap(),
        false
    );
}

#[test]
fn load_series_policy_controls_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = write_series(dir.path(), 4, 8, 8);
    let garbage = dir.path().join("garbage.dcm");
    std::fs::write(&garbage, b"not dicom at all").unwrap();
    paths.insert(2, garbage);

    let mut pipeline = pipeline_in(dir.path());
    assert!(pipeline
        .load_series(&paths, SeriesPolicy::FailFast)
        .is_err());
    assert!(pipeline
        .load_series(&paths, SeriesPolicy::SkipInvalid)
        .unwrap());
}

#[test]
fn reconstruct_surface_from_spherical_series() {
    // 10 slices of 32x32 with a spherical intensity pattern centered
    // in the stack
    let dir = tempfile::tempdir().unwrap();
    let series_dir = dir.path().join("series");
    std::fs::create_dir(&series_dir).unwrap();

    let (center_x, center_y, center_z, radius) = (15.5f64, 15.5f64, 4.5f64, 3.5f64);
    for z in 0..10 {
        let mut data = Vec::with_capacity(32 * 32);
        for y in 0..32 {
            for x in 0..32 {
                let r2 = (f64::from(x) - center_x).powi(2)
                    + (f64::from(y) - center_y).powi(2)
                    + (f64::from(z) - center_z).powi(2);
                data.push(if r2 < radius * radius { 100u8 } else { 0u8 });
            }
        }
        let mut slice = SyntheticSlice::new(32, 32, data);
        slice.slice_location = Some(f64::from(z));
        slice.pixel_spacing = Some((1.0, 1.0));
        slice.instance_number = Some(z + 1);
        slice.write_to(&series_dir.join(format!("slice-{:03}.dcm", z)));
    }

    let mut pipeline = pipeline_in(dir.path());
    let out = pipeline
        .reconstruct_surface(&series_dir, "sphere", 50.0)
        .unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    let vertices: Vec<[f64; 3]> = text
        .lines()
        .filter(|l| l.starts_with("v "))
        .map(|l| {
            let mut it = l[2..].split_whitespace().map(|v| v.parse().unwrap());
            [it.next().unwrap(), it.next().unwrap(), it.next().unwrap()]
        })
        .collect();
    let faces: Vec<[usize; 3]> = text
        .lines()
        .filter(|l| l.starts_with("f "))
        .map(|l| {
            let mut it = l[2..].split_whitespace().map(|v| v.parse::<usize>().unwrap());
            [it.next().unwrap(), it.next().unwrap(), it.next().unwrap()]
        })
        .collect();

    assert!(!vertices.is_empty());
    assert!(!faces.is_empty());

    // all face indices are 1-based and within bounds
    for f in &faces {
        for &ix in f {
            assert!(ix >= 1 && ix <= vertices.len());
        }
    }

    // consistent outward winding: the closed surface encloses a
    // positive volume
    let mut volume = 0.0f64;
    for f in &faces {
        let a = vertices[f[0] - 1];
        let b = vertices[f[1] - 1];
        let c = vertices[f[2] - 1];
        volume += a[0] * (b[1] * c[2] - b[2] * c[1])
            + a[1] * (b[2] * c[0] - b[0] * c[2])
            + a[2] * (b[0] * c[1] - b[1] * c[0]);
    }
    volume /= 6.0;
    assert!(volume > 0.0, "signed volume was {}", volume);

    // a sphere of radius 3.5 has volume ~180; the discrete surface is
    // in that ballpark
    assert!(volume > 60.0 && volume < 250.0, "volume was {}", volume);

    // the volume is retained for export
    assert!(pipeline.export_volume("sphere-grid").is_ok());
}

#[test]
fn reconstruct_surface_skips_non_dicom_files() {
    let dir = tempfile::tempdir().unwrap();
    let series_dir = dir.path().join("series");
    std::fs::create_dir(&series_dir).unwrap();
    write_series(&series_dir, 3, 8, 8);
    std::fs::write(series_dir.join("notes.txt"), b"not a scan").unwrap();

    let mut pipeline = pipeline_in(dir.path());
    let out = pipeline.reconstruct_surface(&series_dir, "flat", 50.0).unwrap();
    // all-zero slices cross no threshold: a valid, empty mesh
    let text = std::fs::read_to_string(out).unwrap();
    assert!(text.is_empty());
}
