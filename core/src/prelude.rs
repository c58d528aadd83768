//! Prelude module.
//!
//! You may import all symbols within for convenient usage of this library.
//!
//! # Example
//!
//! ```ignore
//! use minidcm_core::prelude::*;
//! ```

pub use crate::value::{PrimitiveValue, Value as DicomValue};
pub use crate::{dicom_value, DataElement, DataElementHeader, Length, Tag, VR};
pub use crate::{dictionary::DataDictionary as _, header::HasLength as _, header::Header as _};
