//! A simple volumetric raster format for volume grid persistence.
//!
//! Layout, all numbers little endian:
//!
//! ```text
//! magic "DCVL" | version u8 | dims 3 x u32 | spacing 3 x f64
//! | origin 3 x f64 | samples dimX * dimY * dimZ x f32
//! ```
//!
//! The sample order matches [`VolumeGrid`]: x fastest, then y, then z.

use crate::{InvalidRasterSnafu, ReadRasterSnafu, Result, VolumeGrid, WriteRasterSnafu};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::ResultExt;
use std::io::{Read, Write};

const MAGIC: [u8; 4] = *b"DCVL";
const VERSION: u8 = 1;

/// Serialize the grid into the volume raster format.
pub fn write_raster<W: Write>(grid: &VolumeGrid, mut to: W) -> Result<()> {
    let mut header = [0u8; 4 + 1 + 12 + 24 + 24];
    header[0..4].copy_from_slice(&MAGIC);
    header[4] = VERSION;
    LittleEndian::write_u32(&mut header[5..9], grid.dim.0 as u32);
    LittleEndian::write_u32(&mut header[9..13], grid.dim.1 as u32);
    LittleEndian::write_u32(&mut header[13..17], grid.dim.2 as u32);
    LittleEndian::write_f64(&mut header[17..25], grid.spacing.0);
    LittleEndian::write_f64(&mut header[25..33], grid.spacing.1);
    LittleEndian::write_f64(&mut header[33..41], grid.spacing.2);
    LittleEndian::write_f64(&mut header[41..49], grid.origin.0);
    LittleEndian::write_f64(&mut header[49..57], grid.origin.1);
    LittleEndian::write_f64(&mut header[57..65], grid.origin.2);
    to.write_all(&header).context(WriteRasterSnafu)?;

    let mut buf = vec![0u8; grid.samples.len() * 4];
    LittleEndian::write_f32_into(&grid.samples, &mut buf);
    to.write_all(&buf).context(WriteRasterSnafu)?;
    Ok(())
}

/// Read a grid back from the volume raster format.
pub fn read_raster<R: Read>(mut from: R) -> Result<VolumeGrid> {
    let mut header = [0u8; 4 + 1 + 12 + 24 + 24];
    from.read_exact(&mut header).context(ReadRasterSnafu)?;
    if header[0..4] != MAGIC {
        return InvalidRasterSnafu {
            reason: "bad magic code".to_string(),
        }
        .fail();
    }
    if header[4] != VERSION {
        return InvalidRasterSnafu {
            reason: format!("unknown version {}", header[4]),
        }
        .fail();
    }
    let dim = (
        LittleEndian::read_u32(&header[5..9]) as usize,
        LittleEndian::read_u32(&header[9..13]) as usize,
        LittleEndian::read_u32(&header[13..17]) as usize,
    );
    let spacing = (
        LittleEndian::read_f64(&header[17..25]),
        LittleEndian::read_f64(&header[25..33]),
        LittleEndian::read_f64(&header[33..41]),
    );
    let origin = (
        LittleEndian::read_f64(&header[41..49]),
        LittleEndian::read_f64(&header[49..57]),
        LittleEndian::read_f64(&header[57..65]),
    );

    let n = dim.0 * dim.1 * dim.2;
    let mut buf = vec![0u8; n * 4];
    from.read_exact(&mut buf).context(ReadRasterSnafu)?;
    let mut samples = vec![0f32; n];
    LittleEndian::read_f32_into(&buf, &mut samples);

    Ok(VolumeGrid {
        dim,
        spacing,
        origin,
        samples,
    })
}
