//! This module includes a high level abstraction over a DICOM data element's value.

use crate::header::{HasLength, Length, Tag};
use num_traits::NumCast;
use smallvec::SmallVec;
use std::{borrow::Cow, str::FromStr};

mod primitive;

pub use self::primitive::{
    CastValueError, ConvertValueError, InvalidValueReadError, PrimitiveValue, ValueType,
};

/// An aggregation of one or more elements in a value.
pub type C<T> = SmallVec<[T; 2]>;

/// Type alias for the in-memory pixel data fragment data.
pub type InMemFragment = Vec<u8>;

/// An empty object, for data element values
/// which are never expected to contain nested data sets.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EmptyObject;

impl HasLength for EmptyObject {
    fn length(&self) -> Length {
        Length(0)
    }
}

/// The location of a value which was left in its source
/// instead of being loaded into memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Absolute byte offset of the first value byte in the source.
    pub offset: u64,
    /// Number of value bytes.
    pub len: u32,
}

impl ByteRange {
    /// Absolute byte offset right after the last value byte.
    pub fn end(&self) -> u64 {
        self.offset + <u64 as From<u32>>::from(self.len)
    }
}

/// Representation of a full DICOM value, which may be either primitive or
/// another DICOM object.
///
/// `I` is the complex type for nested data set items, which should usually
/// implement [`HasLength`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value<I = EmptyObject> {
    /// Primitive value.
    Primitive(PrimitiveValue),
    /// A complex sequence of items.
    Sequence(DataSetSequence<I>),
    /// A sequence of encapsulated pixel data fragments.
    PixelSequence(PixelFragmentSequence),
    /// Bulk data which was not loaded,
    /// identified by its position in the source.
    Deferred(ByteRange),
}

impl<I> Value<I> {
    /// Construct a DICOM data set sequence value
    /// from a list of items and length.
    #[inline]
    pub fn new_sequence<T>(items: T, length: Length) -> Self
    where
        T: Into<C<I>>,
    {
        Value::Sequence(DataSetSequence::new(items, length))
    }

    /// Construct a DICOM pixel sequence value
    /// from a basic offset table and a list of fragments.
    ///
    /// **Note:** This function does not validate the offset table
    /// against the fragments.
    pub fn new_pixel_sequence<T>(offset_table: C<u32>, fragments: T) -> Self
    where
        T: Into<C<InMemFragment>>,
    {
        Value::PixelSequence(PixelFragmentSequence::new(offset_table, fragments))
    }

    /// Obtain the number of individual values.
    /// In a primitive, this is the number of individual elements in the value.
    /// In a sequence item, this is the number of items.
    /// In a pixel sequence, this is currently set to 1
    /// regardless of the number of compressed fragments or frames.
    /// A deferred value counts as one.
    pub fn multiplicity(&self) -> u32 {
        match self {
            Value::Primitive(v) => v.multiplicity(),
            Value::Sequence(v) => v.multiplicity(),
            Value::PixelSequence(..) | Value::Deferred(..) => 1,
        }
    }

    /// Retrieve the specific type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Primitive(v) => v.value_type(),
            Value::Sequence(..) => ValueType::Item,
            Value::PixelSequence(..) => ValueType::PixelSequence,
            Value::Deferred(..) => ValueType::Deferred,
        }
    }

    /// Gets a reference to the primitive value.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Gets a reference to the items of a sequence.
    ///
    /// Returns `None` if the value is not a data set sequence.
    pub fn items(&self) -> Option<&[I]> {
        match self {
            Value::Sequence(v) => Some(v.items()),
            _ => None,
        }
    }

    /// Gets a reference to the encapsulated pixel data's fragments.
    ///
    /// Returns `None` if the value is not a pixel data fragment sequence.
    pub fn fragments(&self) -> Option<&[InMemFragment]> {
        match self {
            Value::PixelSequence(v) => Some(v.fragments()),
            _ => None,
        }
    }

    /// Gets a reference to the encapsulated pixel data's offset table.
    ///
    /// Returns `None` if the value is not a pixel data fragment sequence.
    pub fn offset_table(&self) -> Option<&[u32]> {
        match self {
            Value::PixelSequence(v) => Some(v.offset_table()),
            _ => None,
        }
    }

    /// Gets the source location of a value which was not loaded.
    pub fn deferred(&self) -> Option<ByteRange> {
        match self {
            Value::Deferred(range) => Some(*range),
            _ => None,
        }
    }

    /// Retrieves the data set items,
    /// discarding the recorded length information.
    pub fn into_items(self) -> Option<C<I>> {
        match self {
            Value::Sequence(v) => Some(v.into_items()),
            _ => None,
        }
    }

    fn cast_error(&self, requested: &'static str) -> CastValueError {
        CastValueError {
            requested,
            got: self.value_type(),
        }
    }

    fn convert_error(&self, requested: &'static str) -> ConvertValueError {
        ConvertValueError {
            requested,
            original: self.value_type(),
            cause: None,
        }
    }

    /// Convert the full primitive value into a clean string.
    ///
    /// The value is converted into a string
    /// as described in [`PrimitiveValue::to_str`].
    ///
    /// Returns an error if the value is not primitive.
    pub fn to_str(&self) -> Result<Cow<'_, str>, CastValueError> {
        match self {
            Value::Primitive(prim) => Ok(prim.to_str()),
            _ => Err(self.cast_error("string")),
        }
    }

    /// Convert the full primitive value into a sequence of strings.
    ///
    /// Returns an error if the value is not primitive.
    pub fn to_multi_str(&self) -> Result<Cow<'_, [String]>, CastValueError> {
        match self {
            Value::Primitive(prim) => Ok(prim.to_multi_str()),
            _ => Err(self.cast_error("strings")),
        }
    }

    /// Retrieve and convert the primitive value into an integer.
    ///
    /// If the value is a primitive, it will be converted into
    /// an integer as described in [`PrimitiveValue::to_int`].
    pub fn to_int<T>(&self) -> Result<T, ConvertValueError>
    where
        T: NumCast,
        T: FromStr<Err = std::num::ParseIntError>,
    {
        match self {
            Value::Primitive(v) => v.to_int::<T>(),
            _ => Err(self.convert_error("integer")),
        }
    }

    /// Retrieve and convert the primitive value into a sequence of integers.
    pub fn to_multi_int<T>(&self) -> Result<Vec<T>, ConvertValueError>
    where
        T: NumCast,
        T: FromStr<Err = std::num::ParseIntError>,
    {
        match self {
            Value::Primitive(v) => v.to_multi_int::<T>(),
            _ => Err(self.convert_error("integer")),
        }
    }

    /// Retrieve and convert the primitive value
    /// into a double-precision floating point number.
    pub fn to_float64(&self) -> Result<f64, ConvertValueError> {
        match self {
            Value::Primitive(v) => v.to_float64(),
            _ => Err(self.convert_error("float64")),
        }
    }

    /// Retrieve and convert the primitive value
    /// into a sequence of double-precision floating point numbers.
    pub fn to_multi_float64(&self) -> Result<Vec<f64>, ConvertValueError> {
        match self {
            Value::Primitive(v) => v.to_multi_float64(),
            _ => Err(self.convert_error("float64")),
        }
    }

    /// Retrieve the value data's length in bytes, as it would be encoded.
    pub fn byte_len(&self) -> Length {
        self.length()
    }
}

/// Macro for implementing getters to single and multi-values,
/// by delegating to `PrimitiveValue`.
///
/// Should be placed inside `Value`'s impl block.
macro_rules! impl_primitive_getters {
    ($name_single: ident, $name_multi: ident, $ret: ty) => {
        /// Get a single value of the requested type.
        ///
        /// If it contains multiple values,
        /// only the first one is returned.
        /// An error is returned if the variant is not compatible.
        pub fn $name_single(&self) -> Result<$ret, CastValueError> {
            match self {
                Value::Primitive(v) => v.$name_single(),
                value => Err(value.cast_error(stringify!($name_single))),
            }
        }

        /// Get a sequence of values of the requested type without copying.
        ///
        /// An error is returned if the variant is not compatible.
        pub fn $name_multi(&self) -> Result<&[$ret], CastValueError> {
            match self {
                Value::Primitive(v) => v.$name_multi(),
                value => Err(value.cast_error(stringify!($name_multi))),
            }
        }
    };
}

impl<I> Value<I> {
    /// Get a single string value.
    ///
    /// If it contains multiple strings,
    /// only the first one is returned.
    pub fn string(&self) -> Result<&str, CastValueError> {
        match self {
            Value::Primitive(v) => v.string(),
            _ => Err(self.cast_error("Str")),
        }
    }

    /// Get the inner sequence of string values
    /// if the variant is either `Str` or `Strs`.
    pub fn strings(&self) -> Result<&[String], CastValueError> {
        match self {
            Value::Primitive(v) => v.strings(),
            _ => Err(self.cast_error("strings")),
        }
    }

    impl_primitive_getters!(tag, tags, Tag);
    impl_primitive_getters!(uint8, uint8_slice, u8);
    impl_primitive_getters!(uint16, uint16_slice, u16);
    impl_primitive_getters!(int16, int16_slice, i16);
    impl_primitive_getters!(uint32, uint32_slice, u32);
    impl_primitive_getters!(int32, int32_slice, i32);
    impl_primitive_getters!(float32, float32_slice, f32);
    impl_primitive_getters!(float64, float64_slice, f64);
}

impl<I> HasLength for Value<I> {
    fn length(&self) -> Length {
        match self {
            Value::Primitive(v) => v.length(),
            Value::Sequence(v) => v.length(),
            Value::PixelSequence(..) => Length::UNDEFINED,
            Value::Deferred(range) => Length(range.len),
        }
    }
}

impl<I> From<PrimitiveValue> for Value<I> {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

impl<I> From<&str> for Value<I> {
    fn from(value: &str) -> Self {
        Value::Primitive(PrimitiveValue::from(value))
    }
}

impl<I> From<String> for Value<I> {
    fn from(value: String) -> Self {
        Value::Primitive(PrimitiveValue::from(value))
    }
}

impl<I> From<DataSetSequence<I>> for Value<I> {
    fn from(value: DataSetSequence<I>) -> Self {
        Value::Sequence(value)
    }
}

impl<I> From<PixelFragmentSequence> for Value<I> {
    fn from(value: PixelFragmentSequence) -> Self {
        Value::PixelSequence(value)
    }
}

impl<I> From<ByteRange> for Value<I> {
    fn from(value: ByteRange) -> Self {
        Value::Deferred(value)
    }
}

/// A sequence of complex data set items of type `I`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetSequence<I> {
    /// The item sequence.
    items: C<I>,
    /// The sequence length in bytes.
    ///
    /// The value may be [`UNDEFINED`](Length::UNDEFINED)
    /// if the length is implicitly defined,
    /// otherwise it should match the full byte length of all items.
    length: Length,
}

impl<I> DataSetSequence<I> {
    /// Construct a DICOM data sequence
    /// using a sequence of items and a length.
    ///
    /// **Note:** This function does not validate the `length`
    /// against the items.
    #[inline]
    pub fn new(items: impl Into<C<I>>, length: Length) -> Self {
        DataSetSequence {
            items: items.into(),
            length,
        }
    }

    /// Construct an empty DICOM data sequence,
    /// with the length explicitly defined to zero.
    #[inline]
    pub fn empty() -> Self {
        DataSetSequence {
            items: Default::default(),
            length: Length(0),
        }
    }

    /// Gets a reference to the items of a sequence.
    #[inline]
    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Obtain the number of items in the sequence.
    #[inline]
    pub fn multiplicity(&self) -> u32 {
        self.items.len() as u32
    }

    /// Retrieve the sequence of items,
    /// discarding the recorded length information.
    #[inline]
    pub fn into_items(self) -> C<I> {
        self.items
    }
}

impl<I> HasLength for DataSetSequence<I> {
    #[inline]
    fn length(&self) -> Length {
        self.length
    }
}

impl<I> From<Vec<I>> for DataSetSequence<I> {
    /// Converts a vector of items
    /// into a data set sequence with an undefined length.
    #[inline]
    fn from(items: Vec<I>) -> Self {
        DataSetSequence {
            items: items.into(),
            length: Length::UNDEFINED,
        }
    }
}

/// A sequence of pixel data fragments.
///
/// Each fragment (of data type `P`) is
/// an even-lengthed sequence of bytes
/// representing the encoded pixel data.
/// The first item of the sequence is interpreted as a basic offset table,
/// which is defined separately.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFragmentSequence {
    /// The value contents of the basic offset table.
    offset_table: C<u32>,
    /// The sequence of pixel data fragments.
    fragments: C<InMemFragment>,
}

impl PixelFragmentSequence {
    /// Construct a DICOM pixel sequence sequence value
    /// from a basic offset table and a list of fragments.
    #[inline]
    pub fn new(offset_table: impl Into<C<u32>>, fragments: impl Into<C<InMemFragment>>) -> Self {
        PixelFragmentSequence {
            offset_table: offset_table.into(),
            fragments: fragments.into(),
        }
    }

    /// Gets a reference to the pixel data fragments.
    #[inline]
    pub fn fragments(&self) -> &[InMemFragment] {
        &self.fragments
    }

    /// Gets a reference to the basic offset table.
    #[inline]
    pub fn offset_table(&self) -> &[u32] {
        &self.offset_table
    }
}
