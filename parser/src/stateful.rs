//! Stateful decoding of data elements from a byte source.
//!
//! [`StatefulDecoder`] reads one element header or value at a time,
//! dispatching the value's interpretation on the header's VR the same
//! way for both supported transfer syntaxes. Binary numeric values are
//! decoded into their native types; decimal and integer strings are
//! parsed into numbers at this stage; "other byte/word" data is kept as
//! raw little endian bytes for the pixel data consumers to lay out.

use dcmstack_core::dictionary::DataDictionary;
use dcmstack_core::header::{DataElementHeader, HasLength, Header, SequenceItemHeader};
use dcmstack_core::value::{PrimitiveValue, C};
use dcmstack_core::{Tag, VR};
use dcmstack_encoding::decode::{BodyDecoder, Decode};
use dcmstack_encoding::TransferSyntax;
use smallvec::smallvec;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Read;

/// An error occurred while decoding a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not decode a data element header.
    #[snafu(display("Could not decode element header at position {}: {}", position, source))]
    DecodeElementHeader {
        position: u64,
        source: dcmstack_encoding::decode::Error,
    },

    /// Could not decode a sequence item header.
    #[snafu(display("Could not decode item header at position {}: {}", position, source))]
    DecodeItemHeader {
        position: u64,
        source: dcmstack_encoding::decode::Error,
    },

    /// The value data of an element could not be fetched from the source.
    /// This is the usual outcome of a declared length which exceeds the
    /// remaining bytes of the stream.
    #[snafu(display(
        "Could not read value of element {} at position {}: {}",
        tag,
        position,
        source
    ))]
    ReadValueData {
        tag: Tag,
        position: u64,
        source: std::io::Error,
    },

    /// A primitive value was requested where the length is undefined.
    #[snafu(display("Undefined value length of element {} at position {}", tag, position))]
    UndefinedValueLength {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },

    /// A numeric string value could not be parsed.
    #[snafu(display(
        "Invalid {} numeric string in element {}: {:?}",
        vr,
        tag,
        text
    ))]
    InvalidNumericString {
        vr: VR,
        tag: Tag,
        text: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A stateful decoder of data elements from a byte source,
/// tracking the number of bytes consumed so far.
#[derive(Debug)]
pub struct StatefulDecoder<S, D> {
    from: S,
    decoder: BodyDecoder<D>,
    bytes_read: u64,
    /// reusable scratch buffer for value reading
    buffer: Vec<u8>,
}

impl<S, D> StatefulDecoder<S, D>
where
    S: Read,
    D: DataDictionary,
{
    /// Create a new stateful decoder over the given source,
    /// for the given transfer syntax and data dictionary.
    pub fn new(from: S, ts: TransferSyntax, dict: D) -> Self {
        StatefulDecoder {
            from,
            decoder: BodyDecoder::new(ts, dict),
            bytes_read: 0,
            buffer: Vec::with_capacity(2048),
        }
    }

    /// Retrieve the number of bytes consumed from the source so far.
    pub fn position(&self) -> u64 {
        self.bytes_read
    }

    /// Fetch and decode the next data element header.
    pub fn decode_header(&mut self) -> Result<DataElementHeader> {
        let position = self.bytes_read;
        let (header, bytes_read) = self
            .decoder
            .decode_header(&mut self.from)
            .context(DecodeElementHeaderSnafu { position })?;
        self.bytes_read += bytes_read as u64;
        Ok(header)
    }

    /// Fetch and decode the next sequence item header.
    pub fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let position = self.bytes_read;
        let header = self
            .decoder
            .decode_item_header(&mut self.from)
            .context(DecodeItemHeaderSnafu { position })?;
        self.bytes_read += 8;
        Ok(header)
    }

    /// Read the value of the given element header into a primitive value,
    /// interpreted according to the header's VR.
    pub fn read_value(&mut self, header: &DataElementHeader) -> Result<PrimitiveValue> {
        let len = self.require_known_length(header)?;
        if len == 0 {
            return Ok(PrimitiveValue::Empty);
        }

        match header.vr() {
            VR::US => self.read_value_us(header, len),
            VR::SS => self.read_value_ss(header, len),
            VR::UL => self.read_value_ul(header, len),
            VR::SL => self.read_value_sl(header, len),
            VR::FL | VR::OF => self.read_value_fl(header, len),
            VR::FD | VR::OD => self.read_value_fd(header, len),
            VR::AT => self.read_value_tag(header, len),
            VR::DS => self.read_value_ds(header, len),
            VR::IS => self.read_value_is(header, len),
            VR::ST | VR::LT | VR::UT | VR::UR => self.read_value_str(header, len),
            VR::AE
            | VR::AS
            | VR::CS
            | VR::DA
            | VR::DT
            | VR::LO
            | VR::PN
            | VR::SH
            | VR::TM
            | VR::UC
            | VR::UI => self.read_value_strs(header, len),
            // OB, OW, OL, OV, UN and anything else:
            // raw little endian bytes, laid out by the consumer
            _ => self.read_value_ob(header, len),
        }
    }

    /// Skip the given number of bytes from the source without
    /// interpreting them.
    pub fn skip_bytes(&mut self, tag: Tag, len: u32) -> Result<()> {
        self.buffer.resize_with(len as usize, Default::default);
        let position = self.bytes_read;
        self.from
            .read_exact(&mut self.buffer)
            .context(ReadValueDataSnafu { tag, position })?;
        self.bytes_read += u64::from(len);
        Ok(())
    }

    fn require_known_length(&self, header: &DataElementHeader) -> Result<usize> {
        match header.length().get() {
            Some(len) => Ok(len as usize),
            None => UndefinedValueLengthSnafu {
                tag: header.tag(),
                position: self.bytes_read,
            }
            .fail(),
        }
    }

    fn read_exact_to_buffer(&mut self, header: &DataElementHeader, len: usize) -> Result<()> {
        self.buffer.resize_with(len, Default::default);
        let position = self.bytes_read;
        self.from
            .read_exact(&mut self.buffer)
            .context(ReadValueDataSnafu {
                tag: header.tag(),
                position,
            })?;
        self.bytes_read += len as u64;
        Ok(())
    }

    fn read_value_ob(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        let mut buf = smallvec![0u8; len];
        let position = self.bytes_read;
        self.from.read_exact(&mut buf).context(ReadValueDataSnafu {
            tag: header.tag(),
            position,
        })?;
        self.bytes_read += len as u64;
        Ok(PrimitiveValue::U8(buf))
    }

    fn read_value_us(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<u16> = self
            .buffer
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(PrimitiveValue::U16(vec))
    }

    fn read_value_ss(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<i16> = self
            .buffer
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(PrimitiveValue::I16(vec))
    }

    fn read_value_ul(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<u32> = self
            .buffer
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(PrimitiveValue::U32(vec))
    }

    fn read_value_sl(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<i32> = self
            .buffer
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(PrimitiveValue::I32(vec))
    }

    fn read_value_fl(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<f32> = self
            .buffer
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(PrimitiveValue::F32(vec))
    }

    fn read_value_fd(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<f64> = self
            .buffer
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        Ok(PrimitiveValue::F64(vec))
    }

    fn read_value_tag(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let vec: C<Tag> = self
            .buffer
            .chunks_exact(4)
            .map(|c| {
                Tag(
                    u16::from_le_bytes([c[0], c[1]]),
                    u16::from_le_bytes([c[2], c[3]]),
                )
            })
            .collect();
        Ok(PrimitiveValue::Tags(vec))
    }

    fn read_value_str(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        Ok(PrimitiveValue::Str(decode_text(&self.buffer)))
    }

    fn read_value_strs(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let parts: C<String> = self
            .buffer
            .split(|v| *v == b'\\')
            .map(decode_text)
            .collect();
        Ok(PrimitiveValue::Strs(parts))
    }

    fn read_value_ds(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let buf = trim_trail_empty_bytes(&self.buffer);
        if buf.is_empty() {
            return Ok(PrimitiveValue::Empty);
        }

        let mut parts: C<f64> = smallvec![];
        for slice in buf.split(|v| *v == b'\\') {
            let txt = decode_text(slice);
            let txt = txt.trim();
            let value = txt.parse::<f64>().map_err(|_| {
                InvalidNumericStringSnafu {
                    vr: VR::DS,
                    tag: header.tag(),
                    text: txt.to_string(),
                }
                .build()
            })?;
            parts.push(value);
        }
        Ok(PrimitiveValue::F64(parts))
    }

    fn read_value_is(&mut self, header: &DataElementHeader, len: usize) -> Result<PrimitiveValue> {
        self.read_exact_to_buffer(header, len)?;
        let buf = trim_trail_empty_bytes(&self.buffer);
        if buf.is_empty() {
            return Ok(PrimitiveValue::Empty);
        }

        let mut parts: C<i32> = smallvec![];
        for slice in buf.split(|v| *v == b'\\') {
            let txt = decode_text(slice);
            let txt = txt.trim();
            let value = txt.parse::<i32>().map_err(|_| {
                InvalidNumericStringSnafu {
                    vr: VR::IS,
                    tag: header.tag(),
                    text: txt.to_string(),
                }
                .build()
            })?;
            parts.push(value);
        }
        Ok(PrimitiveValue::I32(parts))
    }
}

/// Decode element text in the default character repertoire.
fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Remove trailing spaces and null padding from a text value.
fn trim_trail_empty_bytes(mut x: &[u8]) -> &[u8] {
    while x.last() == Some(&b' ') || x.last() == Some(&b'\0') {
        x = &x[..x.len() - 1];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::StatefulDecoder;
    use dcmstack_core::dictionary::StandardDataDictionary;
    use dcmstack_core::header::{HasLength, Header, Length};
    use dcmstack_core::value::PrimitiveValue;
    use dcmstack_core::{Tag, VR};
    use dcmstack_encoding::TransferSyntax;
    use smallvec::smallvec;
    use std::io::Cursor;

    #[rustfmt::skip]
    const RAW_EXPLICIT: &[u8] = &[
        0x28, 0x00, 0x11, 0x00, // (0028,0011) Columns
            b'U', b'S',
            0x02, 0x00,
            0x40, 0x00,         // 64
        0x28, 0x00, 0x53, 0x10, // (0028,1053) Rescale Slope
            b'D', b'S',
            0x02, 0x00,
            b'1', b' ',
    ];

    #[test]
    fn reads_values_by_vr() {
        let mut decoder = StatefulDecoder::new(
            Cursor::new(RAW_EXPLICIT),
            TransferSyntax::ExplicitVRLittleEndian,
            StandardDataDictionary,
        );

        let header = decoder.decode_header().unwrap();
        assert_eq!(header.tag(), Tag(0x0028, 0x0011));
        assert_eq!(header.vr(), VR::US);
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value, PrimitiveValue::U16(smallvec![64]));

        let header = decoder.decode_header().unwrap();
        assert_eq!(header.vr(), VR::DS);
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value, PrimitiveValue::F64(smallvec![1.0]));

        assert_eq!(decoder.position(), RAW_EXPLICIT.len() as u64);
    }

    #[test]
    fn declared_length_beyond_stream_is_an_error() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, // (0008,0060) Modality
                b'C', b'S',
                0x20, 0x00,         // length: 32, but only 2 bytes remain
                b'C', b'T',
        ];
        let mut decoder = StatefulDecoder::new(
            Cursor::new(raw),
            TransferSyntax::ExplicitVRLittleEndian,
            StandardDataDictionary,
        );
        let header = decoder.decode_header().unwrap();
        assert_eq!(header.length(), Length(32));
        assert!(decoder.read_value(&header).is_err());
    }

    #[test]
    fn pixel_data_stays_as_raw_bytes() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, // (7FE0,0010) Pixel Data
                b'O', b'W',
                0x00, 0x00,
                0x04, 0x00, 0x00, 0x00,
                0x01, 0x02, 0x03, 0x04,
        ];
        let mut decoder = StatefulDecoder::new(
            Cursor::new(raw),
            TransferSyntax::ExplicitVRLittleEndian,
            StandardDataDictionary,
        );
        let header = decoder.decode_header().unwrap();
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value, PrimitiveValue::U8(smallvec![1, 2, 3, 4]));
    }
}
