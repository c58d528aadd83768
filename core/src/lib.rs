#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core library of minidcm containing the concepts
//! and data structures shared by the decoder, the data set model
//! and the pixel data resolver.
//!
//! - [`header`] comprises the DICOM attribute tag,
//!   the value representation, the value length,
//!   and the data element types.
//! - [`value`] holds definitions for element values,
//!   with awareness of multiplicity, nested data sets,
//!   encapsulated pixel data and deferred bulk data.
//! - [`dictionary`] describes the attribute dictionary used
//!   to resolve value representations in implicit VR data
//!   and attribute aliases.
//!
//! [`dictionary`]: ./dictionary/index.html
//! [`header`]: ./header/index.html
//! [`value`]: ./value/index.html

pub mod dictionary;
pub mod header;
pub mod prelude;
pub mod value;

pub use dictionary::{DataDictionary, StandardDataDictionary};
pub use header::{DataElement, DataElementHeader, HasLength, Header, Length, Tag, VR};
pub use value::{PrimitiveValue, Value as DicomValue};

// re-export crates that are part of the public API
pub use smallvec;

/// Helper macro for constructing a DICOM primitive value,
/// of an arbitrary variant and multiplicity.
///
/// ```
/// # use minidcm_core::{dicom_value, PrimitiveValue};
/// let value = dicom_value!(U16, [256, 0, 16]);
/// assert_eq!(value.multiplicity(), 3);
///
/// let value = dicom_value!(Strs, ["ORIGINAL", "PRIMARY"]);
/// assert_eq!(value.to_str(), "ORIGINAL\\PRIMARY");
///
/// let value = dicom_value!(Str, "Doe^John");
/// assert_eq!(value, PrimitiveValue::Str("Doe^John".to_string()));
/// ```
#[macro_export]
macro_rules! dicom_value {
    () => {
        $crate::value::PrimitiveValue::Empty
    };
    (Str, $elem: expr) => {
        $crate::value::PrimitiveValue::Str(String::from($elem))
    };
    (Strs, [ $($elem: expr),+ , ]) => {
        $crate::value::PrimitiveValue::Strs($crate::smallvec::smallvec![$(String::from($elem),)*])
    };
    (Strs, [ $($elem: expr),+ ]) => {
        $crate::value::PrimitiveValue::Strs($crate::smallvec::smallvec![$(String::from($elem),)*])
    };
    ($typ: ident, [ $($elem: expr),+ , ]) => {
        $crate::value::PrimitiveValue :: $typ ($crate::smallvec::smallvec![$($elem,)*])
    };
    ($typ: ident, [ $($elem: expr),+ ]) => {
        $crate::value::PrimitiveValue :: $typ ($crate::smallvec::smallvec![$($elem,)*])
    };
    ($typ: ident, $elem: expr) => {
        $crate::value::PrimitiveValue :: $typ ($crate::value::C::from_elem($elem, 1))
    };
}
