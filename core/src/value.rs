//! Definitions for values in DICOM data elements: the primitive value
//! type with multiplicity awareness, the composite value type which
//! admits nested sequences, and the errors for casting and converting
//! between value forms.

use crate::header::{HasLength, Length, Tag};
use num_traits::NumCast;
use smallvec::SmallVec;
use snafu::Snafu;
use std::borrow::Cow;
use std::fmt;

/// Type alias for the in-memory representation of multiple values,
/// optimized for the common single-value case.
pub type C<T> = SmallVec<[T; 2]>;

/// An error triggered when a value reading method is retrieving a value
/// under an incompatible variant.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(display("bad value cast: requested {} but value is {}", requested, got))]
pub struct CastValueError {
    /// the name of the requested type
    pub requested: &'static str,
    /// the variant of the value where the conversion was attempted
    pub got: &'static str,
}

/// An error triggered when a value conversion method fails,
/// either because the variant is incompatible or because parsing
/// a textual form did not succeed.
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(display("could not convert value of type {} to {}", original, requested))]
pub struct ConvertValueError {
    /// the name of the requested type
    pub requested: &'static str,
    /// the variant of the value where the conversion was attempted
    pub original: &'static str,
}

/// An enum representing a primitive value from a DICOM element.
/// The result of decoding an element's data value without
/// sequence semantics.
///
/// Multiple elements are contained in a [`smallvec`] vector,
/// conveniently aliased to the type [`C`].
#[derive(Debug, PartialEq, Clone)]
pub enum PrimitiveValue {
    /// No data. Usually employed for zero-lengthed values.
    Empty,

    /// A sequence of strings.
    /// Used for AE, AS, CS, DA, DT, TM, UI and other
    /// backslash-separated textual representations.
    Strs(C<String>),

    /// A single string.
    /// Used for LT, ST, UT and other unsplittable text values.
    Str(String),

    /// A sequence of attribute tags.
    /// Used specifically for AT.
    Tags(C<Tag>),

    /// The value is a sequence of unsigned 8-bit integers,
    /// or raw byte data (OB).
    U8(C<u8>),

    /// A sequence of signed 16-bit integers (SS).
    I16(C<i16>),

    /// A sequence of unsigned 16-bit integers (US, OW).
    U16(C<u16>),

    /// A sequence of signed 32-bit integers (SL, parsed IS).
    I32(C<i32>),

    /// A sequence of unsigned 32-bit integers (UL).
    U32(C<u32>),

    /// A sequence of 32-bit floating point numbers (FL, OF).
    F32(C<f32>),

    /// A sequence of 64-bit floating point numbers (FD, OD, parsed DS).
    F64(C<f64>),
}

impl PrimitiveValue {
    /// Obtain the number of individual values.
    pub fn multiplicity(&self) -> u32 {
        use self::PrimitiveValue::*;
        match self {
            Empty => 0,
            Str(_) => 1,
            Strs(c) => c.len() as u32,
            Tags(c) => c.len() as u32,
            U8(c) => c.len() as u32,
            I16(c) => c.len() as u32,
            U16(c) => c.len() as u32,
            I32(c) => c.len() as u32,
            U32(c) => c.len() as u32,
            F32(c) => c.len() as u32,
            F64(c) => c.len() as u32,
        }
    }

    /// Obtain the name of the value's variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        use self::PrimitiveValue::*;
        match self {
            Empty => "Empty",
            Str(_) => "Str",
            Strs(_) => "Strs",
            Tags(_) => "Tags",
            U8(_) => "U8",
            I16(_) => "I16",
            U16(_) => "U16",
            I32(_) => "I32",
            U32(_) => "U32",
            F32(_) => "F32",
            F64(_) => "F64",
        }
    }

    /// Determine the number of bytes that the value would occupy
    /// when encoded, accounting for the even-length padding of
    /// textual values.
    pub fn calculate_byte_len(&self) -> u32 {
        use self::PrimitiveValue::*;
        match self {
            Empty => 0,
            U8(c) => c.len() as u32,
            I16(c) => 2 * c.len() as u32,
            U16(c) => 2 * c.len() as u32,
            I32(c) => 4 * c.len() as u32,
            U32(c) => 4 * c.len() as u32,
            F32(c) => 4 * c.len() as u32,
            F64(c) => 8 * c.len() as u32,
            Tags(c) => 4 * c.len() as u32,
            Str(s) => (s.len() as u32 + 1) & !1,
            Strs(c) => {
                let unpadded: u32 =
                    c.iter().map(|s| s.len() as u32).sum::<u32>() + c.len().saturating_sub(1) as u32;
                (unpadded + 1) & !1
            }
        }
    }

    /// Get a single string value,
    /// with trailing space and null padding trimmed.
    ///
    /// If the value holds multiple strings, only the first is returned.
    pub fn string(&self) -> Result<&str, CastValueError> {
        use self::PrimitiveValue::*;
        match self {
            Str(s) => Ok(s.trim_end_matches(|c| c == ' ' || c == '\0')),
            Strs(c) if !c.is_empty() => Ok(c[0].trim_end_matches(|c| c == ' ' || c == '\0')),
            value => Err(CastValueError {
                requested: "str",
                got: value.variant_name(),
            }),
        }
    }

    /// Get a single unsigned 16-bit value.
    pub fn uint16(&self) -> Result<u16, CastValueError> {
        match self {
            PrimitiveValue::U16(c) if !c.is_empty() => Ok(c[0]),
            value => Err(CastValueError {
                requested: "u16",
                got: value.variant_name(),
            }),
        }
    }

    /// Get the value as a slice of bytes, without copying.
    pub fn uint8_slice(&self) -> Result<&[u8], CastValueError> {
        match self {
            PrimitiveValue::U8(c) => Ok(c),
            value => Err(CastValueError {
                requested: "u8 slice",
                got: value.variant_name(),
            }),
        }
    }

    /// Get the value as a slice of unsigned 16-bit integers, without copying.
    pub fn uint16_slice(&self) -> Result<&[u16], CastValueError> {
        match self {
            PrimitiveValue::U16(c) => Ok(c),
            value => Err(CastValueError {
                requested: "u16 slice",
                got: value.variant_name(),
            }),
        }
    }

    /// Convert the first value to a 64-bit float,
    /// parsing decimal strings if necessary.
    pub fn to_float64(&self) -> Result<f64, ConvertValueError> {
        self.to_multi_float64().and_then(|v| {
            v.first().copied().ok_or(ConvertValueError {
                requested: "f64",
                original: self.variant_name(),
            })
        })
    }

    /// Convert the full value to a sequence of 64-bit floats,
    /// parsing decimal strings if necessary.
    pub fn to_multi_float64(&self) -> Result<Vec<f64>, ConvertValueError> {
        use self::PrimitiveValue::*;
        let err = ConvertValueError {
            requested: "f64",
            original: self.variant_name(),
        };
        match self {
            F64(c) => Ok(c.to_vec()),
            F32(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            I16(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            U16(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            I32(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            U32(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            U8(c) => Ok(c.iter().map(|&v| <f64 as From<_>>::from(v)).collect()),
            Str(s) => s
                .trim_matches(|c| c == ' ' || c == '\0')
                .parse::<f64>()
                .map(|v| vec![v])
                .map_err(|_| err),
            Strs(c) => c
                .iter()
                .map(|s| {
                    s.trim_matches(|c| c == ' ' || c == '\0')
                        .parse::<f64>()
                        .map_err(|_| err.clone())
                })
                .collect(),
            _ => Err(err),
        }
    }

    /// Convert the first value to a signed 32-bit integer,
    /// parsing integer strings if necessary.
    pub fn to_int32(&self) -> Result<i32, ConvertValueError> {
        use self::PrimitiveValue::*;
        let err = ConvertValueError {
            requested: "i32",
            original: self.variant_name(),
        };
        match self {
            I32(c) if !c.is_empty() => Ok(c[0]),
            U16(c) if !c.is_empty() => Ok(<i32 as From<_>>::from(c[0])),
            I16(c) if !c.is_empty() => Ok(<i32 as From<_>>::from(c[0])),
            U32(c) if !c.is_empty() => NumCast::from(c[0]).ok_or(err),
            Str(s) => s
                .trim_matches(|c| c == ' ' || c == '\0')
                .parse::<i32>()
                .map_err(|_| err),
            Strs(c) if !c.is_empty() => c[0]
                .trim_matches(|c| c == ' ' || c == '\0')
                .parse::<i32>()
                .map_err(|_| err),
            _ => Err(err),
        }
    }

    /// Retrieve a displayable text form of the value.
    /// Multiple values are joined by a backslash,
    /// following the standard's own multiplicity separator.
    pub fn to_str(&self) -> Cow<'_, str> {
        use self::PrimitiveValue::*;

        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("\\")
        }

        match self {
            Empty => Cow::from(""),
            Str(s) => Cow::from(s.trim_end_matches(|c| c == ' ' || c == '\0')),
            Strs(c) if c.len() == 1 => Cow::from(c[0].trim_end_matches(|c| c == ' ' || c == '\0')),
            Strs(c) => Cow::from(join(c)),
            Tags(c) => Cow::from(join(c)),
            U8(c) => Cow::from(join(c)),
            I16(c) => Cow::from(join(c)),
            U16(c) => Cow::from(join(c)),
            I32(c) => Cow::from(join(c)),
            U32(c) => Cow::from(join(c)),
            F32(c) => Cow::from(join(c)),
            F64(c) => Cow::from(join(c)),
        }
    }
}

impl HasLength for PrimitiveValue {
    fn length(&self) -> Length {
        Length::defined(self.calculate_byte_len())
    }
}

/// A representation of a full DICOM value, which may be either primitive
/// or another data set (as a sequence of items of type `I`).
#[derive(Debug, PartialEq, Clone)]
pub enum Value<I> {
    /// Primitive value.
    Primitive(PrimitiveValue),
    /// A complex sequence of items.
    Sequence {
        /// Item collection.
        items: Vec<I>,
        /// The length of the sequence in bytes.
        /// It may be undefined.
        size: Length,
    },
}

impl<I> Value<I> {
    /// Obtain the number of individual values.
    /// In the case of sequences, this is the number of items.
    pub fn multiplicity(&self) -> u32 {
        match self {
            Value::Primitive(v) => v.multiplicity(),
            Value::Sequence { items, .. } => items.len() as u32,
        }
    }

    /// Gets a reference to the primitive value, if the value is primitive.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Gets a reference to the items, if the value is a sequence.
    pub fn items(&self) -> Option<&[I]> {
        match self {
            Value::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }
}

impl<I> HasLength for Value<I> {
    fn length(&self) -> Length {
        match self {
            Value::Primitive(v) => v.length(),
            Value::Sequence { size, .. } => *size,
        }
    }
}

impl<I> From<PrimitiveValue> for Value<I> {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

macro_rules! delegate_primitive {
    ($name: ident, $ret: ty, $err: ty) => {
        /// Delegates to the primitive value's method of the same name.
        /// Sequences are reported as an incompatible variant.
        pub fn $name(&self) -> Result<$ret, $err> {
            match self {
                Value::Primitive(v) => v.$name(),
                Value::Sequence { .. } => Err(<$err>::sequence()),
            }
        }
    };
}

impl CastValueError {
    fn sequence() -> Self {
        CastValueError {
            requested: "primitive",
            got: "Sequence",
        }
    }
}

impl ConvertValueError {
    fn sequence() -> Self {
        ConvertValueError {
            requested: "primitive",
            original: "Sequence",
        }
    }
}

impl<I> Value<I> {
    delegate_primitive!(string, &str, CastValueError);
    delegate_primitive!(uint16, u16, CastValueError);
    delegate_primitive!(uint8_slice, &[u8], CastValueError);
    delegate_primitive!(uint16_slice, &[u16], CastValueError);
    delegate_primitive!(to_float64, f64, ConvertValueError);
    delegate_primitive!(to_multi_float64, Vec<f64>, ConvertValueError);
    delegate_primitive!(to_int32, i32, ConvertValueError);

    /// Retrieve a displayable text form of the value.
    /// Sequences display as an item count.
    pub fn to_str(&self) -> Cow<'_, str> {
        match self {
            Value::Primitive(v) => v.to_str(),
            Value::Sequence { items, .. } => Cow::from(format!("<sequence of {} items>", items.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn string_trims_padding() {
        let v = PrimitiveValue::Str("CT ".to_string());
        assert_eq!(v.string().unwrap(), "CT");
        let v = PrimitiveValue::Strs(smallvec!["1.2.840.10008.1.2.1\0".to_string()]);
        assert_eq!(v.string().unwrap(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn decimal_strings_convert_to_floats() {
        let v = PrimitiveValue::Strs(smallvec!["0.664062".to_string(), "0.664062 ".to_string()]);
        assert_eq!(v.to_multi_float64().unwrap(), vec![0.664062, 0.664062]);
        assert_eq!(v.to_float64().unwrap(), 0.664062);
    }

    #[test]
    fn numeric_values_convert_to_floats() {
        let v = PrimitiveValue::I16(smallvec![-1024, 3071]);
        assert_eq!(v.to_multi_float64().unwrap(), vec![-1024., 3071.]);
    }

    #[test]
    fn incompatible_cast_is_reported() {
        let v = PrimitiveValue::U16(smallvec![512]);
        let e = v.string().unwrap_err();
        assert_eq!(e.got, "U16");
    }

    #[test]
    fn multi_value_display_joins_with_backslash() {
        let v = PrimitiveValue::F64(smallvec![0.5, 0.5]);
        assert_eq!(v.to_str(), "0.5\\0.5");
    }

    #[test]
    fn byte_len_accounts_for_padding() {
        assert_eq!(
            PrimitiveValue::Str("ORIGINAL".to_string()).calculate_byte_len(),
            8
        );
        assert_eq!(
            PrimitiveValue::Str("MONOCHROME2".to_string()).calculate_byte_len(),
            12
        );
        assert_eq!(PrimitiveValue::U16(smallvec![1, 2, 3]).calculate_byte_len(), 6);
    }
}
