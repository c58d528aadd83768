//! Declaration and implementation of a DICOM primitive value.
//!
//! See [`PrimitiveValue`](./enum.PrimitiveValue.html).

use super::C;
use crate::header::{HasLength, Length, Tag};
use num_traits::NumCast;
use snafu::Snafu;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Triggered when a value reading attempt fails.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[non_exhaustive]
pub enum InvalidValueReadError {
    /// The text could not be parsed as an integer.
    #[snafu(display("Failed to parse text value as an integer"))]
    ParseInteger {
        /// the parse error
        source: std::num::ParseIntError,
    },
    /// The text could not be parsed as a floating point number.
    #[snafu(display("Failed to parse text value as a floating point number"))]
    ParseFloat {
        /// the parse error
        source: std::num::ParseFloatError,
    },
    /// The number does not fit in the requested type.
    #[snafu(display("Narrowing conversion of {} failed", value))]
    NarrowConvert {
        /// textual representation of the original number
        value: String,
    },
}

/// An error type for an attempt of accessing a value
/// in one internal representation as another.
///
/// This error is raised whenever it is not possible to retrieve the requested
/// value, either because the inner representation is not compatible with the
/// requested value type, or a conversion would be required. In other words,
/// if a reference to the inner value cannot be obtained with
/// the requested target type (for example, retrieving a date from a string),
/// an error of this type is returned.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(display("bad value cast: requested {} but value is {:?}", requested, got))]
pub struct CastValueError {
    /// The value format requested
    pub requested: &'static str,
    /// The value's actual representation
    pub got: ValueType,
}

/// An error type for a failed attempt at converting a value
/// into another representation.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(display("could not convert {:?} to a {}", original, requested))]
pub struct ConvertValueError {
    /// The value format requested
    pub requested: &'static str,
    /// The value's original representation
    pub original: ValueType,
    /// The reason why the conversion was unsuccessful,
    /// or none if a conversion from the given original representation
    /// is not possible
    pub cause: Option<InvalidValueReadError>,
}

/// An enum representing a primitive value from a DICOM element.
/// The result of decoding an element's data value
/// may be one of the enumerated types
/// depending on its content and value representation.
///
/// Multiple elements are contained in a [`smallvec`] vector,
/// conveniently aliased to the type [`C`].
///
/// Dates, times and person names are kept in their textual form.
///
/// # Example
///
/// ```
/// # use minidcm_core::PrimitiveValue;
/// # use smallvec::smallvec;
/// let value = PrimitiveValue::from("Smith^John");
/// assert_eq!(value, PrimitiveValue::Str("Smith^John".to_string()));
/// assert_eq!(value.multiplicity(), 1);
///
/// let value = PrimitiveValue::from(512_u16);
/// assert_eq!(value, PrimitiveValue::U16(smallvec![512]));
/// ```
///
/// [`smallvec`]: ../../smallvec/index.html
/// [`C`]: ./type.C.html
#[derive(Debug, PartialEq, Clone)]
pub enum PrimitiveValue {
    /// No data. Usually employed for zero-lengthed values.
    Empty,

    /// A sequence of strings.
    /// Used for AE, AS, PN, SH, CS, LO, UI, UC,
    /// and the textual numbers and dates IS, DS, DA, DT and TM.
    Strs(C<String>),

    /// A single string.
    /// Used for ST, LT, UT and UR, which are never multi-valued.
    Str(String),

    /// A sequence of attribute tags.
    /// Used specifically for AT.
    Tags(C<Tag>),

    /// The value is a sequence of bytes.
    /// Used for OB and UN.
    U8(C<u8>),

    /// The value is a sequence of signed 16-bit integers.
    /// Used for SS.
    I16(C<i16>),

    /// A sequence of unsigned 16-bit integers.
    /// Used for US and OW.
    U16(C<u16>),

    /// A sequence of signed 32-bit integers.
    /// Used for SL.
    I32(C<i32>),

    /// A sequence of unsigned 32-bit integers.
    /// Used for UL and OL.
    U32(C<u32>),

    /// A sequence of signed 64-bit integers.
    /// Used for SV.
    I64(C<i64>),

    /// A sequence of unsigned 64-bit integers.
    /// Used for UV and OV.
    U64(C<u64>),

    /// The value is a sequence of 32-bit floating point numbers.
    /// Used for OF and FL.
    F32(C<f32>),

    /// The value is a sequence of 64-bit floating point numbers.
    /// Used for OD and FD.
    F64(C<f64>),
}

/// A utility macro for implementing the conversion from a core type into a
/// DICOM primitive value with a single element.
macro_rules! impl_from_for_primitive {
    ($typ: ty, $variant: ident) => {
        impl From<$typ> for PrimitiveValue {
            fn from(value: $typ) -> Self {
                PrimitiveValue::$variant(C::from_elem(value, 1))
            }
        }
    };
}

impl_from_for_primitive!(u8, U8);
impl_from_for_primitive!(u16, U16);
impl_from_for_primitive!(i16, I16);
impl_from_for_primitive!(u32, U32);
impl_from_for_primitive!(i32, I32);
impl_from_for_primitive!(u64, U64);
impl_from_for_primitive!(i64, I64);
impl_from_for_primitive!(f32, F32);
impl_from_for_primitive!(f64, F64);
impl_from_for_primitive!(Tag, Tags);

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        PrimitiveValue::Str(value)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        PrimitiveValue::Str(value.to_owned())
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(value: Vec<u8>) -> Self {
        PrimitiveValue::U8(C::from(value))
    }
}

impl From<&[u8]> for PrimitiveValue {
    fn from(value: &[u8]) -> Self {
        PrimitiveValue::U8(C::from(value))
    }
}

/// Convert the first number of a numeric variant into `T`,
/// raising a narrowing error if it does not fit.
macro_rules! first_number {
    ($self: expr, $requested: expr, $target: ty, $( $variant: ident ),*) => {
        match $self {
            $(
                PrimitiveValue::$variant(c) if !c.is_empty() => {
                    <$target as NumCast>::from(c[0]).ok_or_else(|| ConvertValueError {
                        requested: $requested,
                        original: $self.value_type(),
                        cause: Some(InvalidValueReadError::NarrowConvert {
                            value: c[0].to_string(),
                        }),
                    })
                }
            )*
            _ => Err(ConvertValueError {
                requested: $requested,
                original: $self.value_type(),
                cause: None,
            }),
        }
    };
}

/// Convert all numbers of a numeric variant into `T`.
macro_rules! all_numbers {
    ($self: expr, $requested: expr, $target: ty, $( $variant: ident ),*) => {
        match $self {
            $(
                PrimitiveValue::$variant(c) => c
                    .iter()
                    .map(|v| {
                        <$target as NumCast>::from(*v).ok_or_else(|| ConvertValueError {
                            requested: $requested,
                            original: $self.value_type(),
                            cause: Some(InvalidValueReadError::NarrowConvert {
                                value: v.to_string(),
                            }),
                        })
                    })
                    .collect(),
            )*
            _ => Err(ConvertValueError {
                requested: $requested,
                original: $self.value_type(),
                cause: None,
            }),
        }
    };
}

impl PrimitiveValue {
    /// Obtain the number of individual elements. This number may not
    /// match the DICOM value multiplicity in some value representations.
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
            I64(c) => c.len() as u32,
            U64(c) => c.len() as u32,
            F32(c) => c.len() as u32,
            F64(c) => c.len() as u32,
        }
    }

    /// Determine the minimum number of bytes that this value would need to
    /// occupy in a DICOM file, without compression and without the header.
    /// As mandated by the standard, it is always even.
    pub fn calculate_byte_len(&self) -> usize {
        use self::PrimitiveValue::*;
        let len = match self {
            Empty => 0,
            U8(c) => c.len(),
            I16(c) => c.len() * 2,
            U16(c) => c.len() * 2,
            U32(c) => c.len() * 4,
            I32(c) => c.len() * 4,
            U64(c) => c.len() * 8,
            I64(c) => c.len() * 8,
            F32(c) => c.len() * 4,
            F64(c) => c.len() * 8,
            Tags(c) => c.len() * 4,
            Str(s) => s.len(),
            Strs(c) if c.is_empty() => 0,
            Strs(c) => c.iter().map(|s| s.len() + 1).sum::<usize>() - 1,
        };
        (len + 1) & !1
    }

    /// Convert the primitive value into a string representation.
    ///
    /// String values already encoded with the `Str` and `Strs` variants
    /// are provided as is, without trailing whitespace.
    /// In the case of `Strs`, the strings are joined together
    /// with a backslash (`'\\'`).
    /// All other type variants are first converted to a string,
    /// then joined together with a backslash.
    ///
    /// # Example
    ///
    /// ```
    /// # use minidcm_core::dicom_value;
    /// # use minidcm_core::value::PrimitiveValue;
    /// assert_eq!(PrimitiveValue::from("CT ").to_str(), "CT");
    /// assert_eq!(
    ///     dicom_value!(Strs, ["DERIVED", "PRIMARY "]).to_str(),
    ///     "DERIVED\\PRIMARY",
    /// );
    /// assert_eq!(dicom_value!(U16, [512, 512]).to_str(), "512\\512");
    /// ```
    pub fn to_str(&self) -> Cow<str> {
        match self {
            PrimitiveValue::Empty => Cow::from(""),
            PrimitiveValue::Str(value) => Cow::from(trim_padding(value)),
            PrimitiveValue::Strs(values) if values.len() == 1 => {
                Cow::from(trim_padding(&values[0]))
            }
            PrimitiveValue::Strs(values) => Cow::from(
                values
                    .iter()
                    .map(|s| trim_padding(s))
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
            prim => Cow::from(prim.to_string()),
        }
    }

    /// Convert the primitive value into a sequence of strings,
    /// one per value, each without trailing whitespace.
    pub fn to_multi_str(&self) -> Cow<[String]> {
        /// Auxilliary function for turning a sequence of values
        /// into a sequence of strings.
        fn seq_to_str<I>(iter: I) -> Vec<String>
        where
            I: IntoIterator,
            I::Item: fmt::Display,
        {
            iter.into_iter().map(|x| x.to_string()).collect()
        }

        match self {
            PrimitiveValue::Empty => Cow::from(&[][..]),
            PrimitiveValue::Str(value) => Cow::Owned(vec![trim_padding(value).to_string()]),
            PrimitiveValue::Strs(values) => {
                if values.iter().any(|s| trim_padding(s).len() != s.len()) {
                    Cow::Owned(values.iter().map(|s| trim_padding(s).to_string()).collect())
                } else {
                    Cow::Borrowed(&values[..])
                }
            }
            PrimitiveValue::Tags(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::U8(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::I16(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::U16(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::I32(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::U32(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::I64(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::U64(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::F32(values) => Cow::Owned(seq_to_str(values)),
            PrimitiveValue::F64(values) => Cow::Owned(seq_to_str(values)),
        }
    }

    /// Retrieve a single integer of type `T` from this value.
    ///
    /// If the value is already represented as an integer,
    /// it is returned after a conversion to the target type.
    /// An error is returned if the integer cannot be represented
    /// by the given integer type.
    /// If the value is a string or sequence of strings,
    /// the first string is parsed to obtain an integer,
    /// potentially failing if the string does not represent a valid integer.
    /// The string is stripped of surrounding whitespace before parsing,
    /// in order to account for the possible padding to even length.
    ///
    /// Floating point numbers are not truncated into integers.
    ///
    /// # Example
    ///
    /// ```
    /// # use minidcm_core::value::PrimitiveValue;
    /// # use smallvec::smallvec;
    /// assert_eq!(
    ///     PrimitiveValue::I32(smallvec![1, 2, 5]).to_int::<u32>(),
    ///     Ok(1_u32),
    /// );
    ///
    /// assert_eq!(
    ///     PrimitiveValue::from("505 ").to_int::<i32>(),
    ///     Ok(505),
    /// );
    /// ```
    pub fn to_int<T>(&self) -> Result<T, ConvertValueError>
    where
        T: NumCast,
        T: FromStr<Err = std::num::ParseIntError>,
    {
        match self {
            PrimitiveValue::Str(s) => parse_int(s, self.value_type()),
            PrimitiveValue::Strs(s) if !s.is_empty() => parse_int(&s[0], self.value_type()),
            _ => first_number!(self, "integer", T, U8, I16, U16, I32, U32, I64, U64),
        }
    }

    /// Retrieve a sequence of integers of type `T` from this value.
    ///
    /// Each string in a textual value is parsed individually.
    pub fn to_multi_int<T>(&self) -> Result<Vec<T>, ConvertValueError>
    where
        T: NumCast,
        T: FromStr<Err = std::num::ParseIntError>,
    {
        match self {
            PrimitiveValue::Empty => Ok(Vec::new()),
            PrimitiveValue::Str(s) => Ok(vec![parse_int(s, self.value_type())?]),
            PrimitiveValue::Strs(s) => s
                .iter()
                .map(|s| parse_int(s, self.value_type()))
                .collect(),
            _ => all_numbers!(self, "integer", T, U8, I16, U16, I32, U32, I64, U64),
        }
    }

    /// Retrieve one double-precision floating point from this value.
    ///
    /// If the value is already represented as a number,
    /// it is returned after a conversion to `f64`.
    /// If the value is a string or sequence of strings,
    /// the first string is parsed to obtain a number,
    /// potentially failing if the string does not represent a valid number.
    ///
    /// # Example
    ///
    /// ```
    /// # use minidcm_core::value::PrimitiveValue;
    /// # use smallvec::smallvec;
    /// assert_eq!(
    ///     PrimitiveValue::F32(smallvec![1.5, 2., 5.]).to_float64(),
    ///     Ok(1.5_f64),
    /// );
    ///
    /// assert_eq!(
    ///     PrimitiveValue::from(" -6.75 ").to_float64(),
    ///     Ok(-6.75),
    /// );
    /// ```
    pub fn to_float64(&self) -> Result<f64, ConvertValueError> {
        match self {
            PrimitiveValue::Str(s) => parse_float(s, self.value_type()),
            PrimitiveValue::Strs(s) if !s.is_empty() => parse_float(&s[0], self.value_type()),
            _ => first_number!(self, "float64", f64, U8, I16, U16, I32, U32, I64, U64, F32, F64),
        }
    }

    /// Retrieve a sequence of double-precision floating point numbers
    /// from this value.
    ///
    /// Each string in a textual value is parsed individually,
    /// so that a decimal string such as `"40\\400"` yields two numbers.
    pub fn to_multi_float64(&self) -> Result<Vec<f64>, ConvertValueError> {
        match self {
            PrimitiveValue::Empty => Ok(Vec::new()),
            PrimitiveValue::Str(s) => s
                .split('\\')
                .map(|s| parse_float(s, self.value_type()))
                .collect(),
            PrimitiveValue::Strs(s) => s
                .iter()
                .map(|s| parse_float(s, self.value_type()))
                .collect(),
            _ => all_numbers!(self, "float64", f64, U8, I16, U16, I32, U32, I64, U64, F32, F64),
        }
    }
}

fn parse_int<T>(text: &str, original: ValueType) -> Result<T, ConvertValueError>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    text.trim()
        .parse()
        .map_err(|source| ConvertValueError {
            requested: "integer",
            original,
            cause: Some(InvalidValueReadError::ParseInteger { source }),
        })
}

fn parse_float(text: &str, original: ValueType) -> Result<f64, ConvertValueError> {
    text.trim()
        .parse()
        .map_err(|source| ConvertValueError {
            requested: "float64",
            original,
            cause: Some(InvalidValueReadError::ParseFloat { source }),
        })
}

/// Remove trailing space and null padding from a text value.
fn trim_padding(text: &str) -> &str {
    text.trim_end_matches(|c| c == ' ' || c == '\0')
}

/// Macro for implementing getters to single and multi-values of each variant.
///
/// Should be placed inside `PrimitiveValue`'s impl block.
macro_rules! impl_primitive_getters {
    ($name_single: ident, $name_multi: ident, $variant: ident, $ret: ty) => {
        /// Get a single value of the requested type.
        /// If it contains multiple values,
        /// only the first one is returned.
        /// An error is returned if the variant is not compatible.
        pub fn $name_single(&self) -> Result<$ret, CastValueError> {
            match self {
                PrimitiveValue::$variant(c) if c.is_empty() => Err(CastValueError {
                    requested: stringify!($name_single),
                    got: ValueType::Empty,
                }),
                PrimitiveValue::$variant(c) => Ok(c[0]),
                value => Err(CastValueError {
                    requested: stringify!($name_single),
                    got: value.value_type(),
                }),
            }
        }

        /// Get a sequence of values of the requested type without copying.
        /// An error is returned if the variant is not compatible.
        pub fn $name_multi(&self) -> Result<&[$ret], CastValueError> {
            match self {
                PrimitiveValue::$variant(c) => Ok(c),
                value => Err(CastValueError {
                    requested: stringify!($name_multi),
                    got: value.value_type(),
                }),
            }
        }
    };
}

/// Per variant, strongly checked getters to DICOM values.
///
/// Conversions from one representation to another do not take place
/// when using these methods.
impl PrimitiveValue {
    /// Get a single string value. If it contains multiple strings,
    /// only the first one is returned.
    /// An error is returned if the variant is not compatible.
    ///
    /// To enable conversions of other variants to a textual representation,
    /// see [`to_str()`] instead.
    ///
    /// [`to_str()`]: #method.to_str
    pub fn string(&self) -> Result<&str, CastValueError> {
        use self::PrimitiveValue::*;
        match self {
            Strs(c) if c.is_empty() => Err(CastValueError {
                requested: "Str",
                got: ValueType::Empty,
            }),
            Strs(c) => Ok(&c[0]),
            Str(s) => Ok(s),
            value => Err(CastValueError {
                requested: "Str",
                got: value.value_type(),
            }),
        }
    }

    /// Get the inner sequence of string values
    /// if the variant is either `Str` or `Strs`.
    /// An error is returned if the variant is not compatible.
    pub fn strings(&self) -> Result<&[String], CastValueError> {
        use self::PrimitiveValue::*;
        match self {
            Strs(c) => Ok(c),
            Str(s) => Ok(std::slice::from_ref(s)),
            value => Err(CastValueError {
                requested: "strings",
                got: value.value_type(),
            }),
        }
    }

    impl_primitive_getters!(tag, tags, Tags, Tag);
    impl_primitive_getters!(uint8, uint8_slice, U8, u8);
    impl_primitive_getters!(uint16, uint16_slice, U16, u16);
    impl_primitive_getters!(int16, int16_slice, I16, i16);
    impl_primitive_getters!(uint32, uint32_slice, U32, u32);
    impl_primitive_getters!(int32, int32_slice, I32, i32);
    impl_primitive_getters!(int64, int64_slice, I64, i64);
    impl_primitive_getters!(uint64, uint64_slice, U64, u64);
    impl_primitive_getters!(float32, float32_slice, F32, f32);
    impl_primitive_getters!(float64, float64_slice, F64, f64);

    /// Retrieve the specific type of this value.
    pub fn value_type(&self) -> ValueType {
        match *self {
            PrimitiveValue::Empty => ValueType::Empty,
            PrimitiveValue::F32(_) => ValueType::F32,
            PrimitiveValue::F64(_) => ValueType::F64,
            PrimitiveValue::I16(_) => ValueType::I16,
            PrimitiveValue::I32(_) => ValueType::I32,
            PrimitiveValue::I64(_) => ValueType::I64,
            PrimitiveValue::Str(_) => ValueType::Str,
            PrimitiveValue::Strs(_) => ValueType::Strs,
            PrimitiveValue::Tags(_) => ValueType::Tags,
            PrimitiveValue::U16(_) => ValueType::U16,
            PrimitiveValue::U32(_) => ValueType::U32,
            PrimitiveValue::U64(_) => ValueType::U64,
            PrimitiveValue::U8(_) => ValueType::U8,
        }
    }
}

/// The output of this method is equivalent to calling the method `to_str`
impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        /// Auxilliary function for writing a sequence of values
        /// delimited by backslashes.
        fn write_seq<I>(f: &mut fmt::Formatter, iter: I) -> fmt::Result
        where
            I: IntoIterator,
            I::Item: fmt::Display,
        {
            for (i, x) in iter.into_iter().enumerate() {
                if i > 0 {
                    f.write_str("\\")?;
                }
                write!(f, "{}", x)?;
            }
            Ok(())
        }

        match self {
            PrimitiveValue::Empty => Ok(()),
            PrimitiveValue::Str(value) => f.write_str(trim_padding(value)),
            PrimitiveValue::Strs(values) => write_seq(f, values.iter().map(|s| trim_padding(s))),
            PrimitiveValue::U8(values) => write_seq(f, values),
            PrimitiveValue::U16(values) => write_seq(f, values),
            PrimitiveValue::U32(values) => write_seq(f, values),
            PrimitiveValue::I16(values) => write_seq(f, values),
            PrimitiveValue::I32(values) => write_seq(f, values),
            PrimitiveValue::U64(values) => write_seq(f, values),
            PrimitiveValue::I64(values) => write_seq(f, values),
            PrimitiveValue::F32(values) => write_seq(f, values),
            PrimitiveValue::F64(values) => write_seq(f, values),
            PrimitiveValue::Tags(values) => write_seq(f, values),
        }
    }
}

impl HasLength for PrimitiveValue {
    fn length(&self) -> Length {
        Length::defined(self.calculate_byte_len() as u32)
    }
}

/// An enum representing an abstraction of a DICOM element's data value type.
/// This should be the equivalent of `PrimitiveValue` without the content,
/// plus the `Item`, `PixelSequence` and `Deferred` entries.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValueType {
    /// No data. Used for any value of length 0.
    Empty,
    /// An item. Used for elements in a SQ, regardless of content.
    Item,
    /// An item. Used for the values of encapsulated pixel data.
    PixelSequence,
    /// Bulk data left in the source and not yet loaded.
    Deferred,
    /// A sequence of strings.
    Strs,
    /// A single string.
    Str,
    /// A sequence of attribute tags.
    Tags,
    /// A sequence of bytes.
    U8,
    /// A sequence of signed 16-bit integers.
    I16,
    /// A sequence of unsigned 16-bit integers.
    U16,
    /// A sequence of signed 32-bit integers.
    I32,
    /// A sequence of unsigned 32-bit integers.
    U32,
    /// A sequence of signed 64-bit integers.
    I64,
    /// A sequence of unsigned 64-bit integers.
    U64,
    /// A sequence of 32-bit floating point numbers.
    F32,
    /// A sequence of 64-bit floating point numbers.
    F64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom_value;
    use smallvec::smallvec;

    #[test]
    fn primitive_value_to_str() {
        assert_eq!(PrimitiveValue::Empty.to_str(), "");
        assert_eq!(dicom_value!(Str, "CT ").to_str(), "CT");
        assert_eq!(
            dicom_value!(Strs, ["1.2.840.10008.1.2.1\0"]).to_str(),
            "1.2.840.10008.1.2.1"
        );
        assert_eq!(
            dicom_value!(Strs, ["ORIGINAL", "PRIMARY"]).to_str(),
            "ORIGINAL\\PRIMARY"
        );
        assert_eq!(dicom_value!(F64, [1.5, -2.]).to_str(), "1.5\\-2");
        assert_eq!(
            dicom_value!(Tags, [Tag(0x0010, 0x0010)]).to_str(),
            "(0010,0010)"
        );
    }

    #[test]
    fn primitive_value_to_int() {
        assert_eq!(dicom_value!(Strs, ["512 "]).to_int::<u16>(), Ok(512));
        assert_eq!(PrimitiveValue::from(16_u16).to_int::<u32>(), Ok(16));
        assert_eq!(PrimitiveValue::from(-1_i16).to_int::<i32>(), Ok(-1));

        // does not fit
        let err = PrimitiveValue::from(-1_i16).to_int::<u16>().unwrap_err();
        assert!(matches!(
            err.cause,
            Some(InvalidValueReadError::NarrowConvert { .. })
        ));

        // not a number
        let err = dicom_value!(Strs, ["MONOCHROME2"])
            .to_int::<u16>()
            .unwrap_err();
        assert!(matches!(
            err.cause,
            Some(InvalidValueReadError::ParseInteger { .. })
        ));

        // floats are not truncated
        assert!(PrimitiveValue::from(1.5_f64).to_int::<i32>().is_err());
    }

    #[test]
    fn primitive_value_to_multi_float64() {
        assert_eq!(
            dicom_value!(Strs, ["40", " 400.5 "]).to_multi_float64(),
            Ok(vec![40., 400.5])
        );
        assert_eq!(
            dicom_value!(Str, "1\\2").to_multi_float64(),
            Ok(vec![1., 2.])
        );
        assert_eq!(
            PrimitiveValue::U16(smallvec![1, 2, 3]).to_multi_float64(),
            Ok(vec![1., 2., 3.])
        );
        assert_eq!(PrimitiveValue::Empty.to_multi_float64(), Ok(vec![]));
    }

    #[test]
    fn primitive_value_byte_len_is_even() {
        assert_eq!(dicom_value!(Strs, ["CT"]).calculate_byte_len(), 2);
        assert_eq!(dicom_value!(Strs, ["MR", "CT"]).calculate_byte_len(), 6);
        assert_eq!(dicom_value!(Str, "ABC").calculate_byte_len(), 4);
        assert_eq!(dicom_value!(U16, [1, 2, 3]).calculate_byte_len(), 6);
        assert_eq!(PrimitiveValue::U8(smallvec![1, 2, 3]).calculate_byte_len(), 4);
    }

    #[test]
    fn strongly_checked_getters() {
        let v = dicom_value!(U16, [256, 512]);
        assert_eq!(v.uint16(), Ok(256));
        assert_eq!(v.uint16_slice(), Ok(&[256, 512][..]));
        assert_eq!(
            v.uint32(),
            Err(CastValueError {
                requested: "uint32",
                got: ValueType::U16,
            })
        );
        assert_eq!(dicom_value!(Strs, ["A", "B"]).string(), Ok("A"));
    }
}
