//! This module provides the basic decoding of primitive binary values
//! in little endian byte order.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

type Result<T> = std::io::Result<T>;

/// A basic decoder of DICOM primitive values in little endian byte order.
#[derive(Debug, Default, Clone)]
pub struct LittleEndianBasicDecoder;

impl LittleEndianBasicDecoder {
    /// Decode an unsigned short value from the given source.
    pub fn decode_us<S>(&self, mut source: S) -> Result<u16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    /// Decode an unsigned long value from the given source.
    pub fn decode_ul<S>(&self, mut source: S) -> Result<u32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Decode a signed short value from the given source.
    pub fn decode_ss<S>(&self, mut source: S) -> Result<i16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i16(&buf))
    }

    /// Decode a signed long value from the given source.
    pub fn decode_sl<S>(&self, mut source: S) -> Result<i32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i32(&buf))
    }

    /// Decode a single precision float value from the given source.
    pub fn decode_fl<S>(&self, mut source: S) -> Result<f32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_f32(&buf))
    }

    /// Decode a double precision float value from the given source.
    pub fn decode_fd<S>(&self, mut source: S) -> Result<f64>
    where
        S: Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_f64(&buf))
    }

    /// Decode an attribute tag (group, element pair) from the given source.
    pub fn decode_tag<S>(&self, mut source: S) -> Result<dcmstack_core::Tag>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(dcmstack_core::Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::LittleEndianBasicDecoder;

    #[test]
    fn decodes_little_endian_integers() {
        let decoder = LittleEndianBasicDecoder;
        assert_eq!(decoder.decode_us(&[0x01u8, 0x02][..]).unwrap(), 0x0201);
        assert_eq!(
            decoder.decode_ul(&[0x04u8, 0x03, 0x02, 0x01][..]).unwrap(),
            0x0102_0304
        );
        assert_eq!(decoder.decode_ss(&[0x00u8, 0x80][..]).unwrap(), -32768);
    }

    #[test]
    fn decodes_tags() {
        let decoder = LittleEndianBasicDecoder;
        let tag = decoder.decode_tag(&[0xE0u8, 0x7F, 0x10, 0x00][..]).unwrap();
        assert_eq!(tag, dcmstack_core::Tag(0x7FE0, 0x0010));
    }
}
