#![allow(clippy::derive_partial_eq_without_eq)]
//! This crate contains the data set model of minidcm
//! and the means to read, validate and write DICOM Part-10 files.
//!
//! A DICOM file is loaded in one pass into an [`InMemDicomObject`],
//! a dictionary of data elements ordered by tag,
//! in which sequence items are DICOM objects themselves.
//! Decoding is lenient:
//! problems found along the way are collected as [`DecodeIssue`]s
//! next to whatever could be decoded,
//! and only problems with the file as a whole are returned as errors.
//!
//! # Examples
//!
//! Read an object and fetch some attributes:
//!
//! ```no_run
//! use minidcm_core::dictionary::tags;
//! use minidcm_object::{open_file, ReadOptions};
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = open_file("0001.dcm", &ReadOptions::default())?;
//! let obj = outcome.object;
//!
//! let patient_name = obj.element(tags::PATIENT_NAME)?.to_str()?;
//! let modality = obj.element_by_name("Modality")?.to_str()?;
//! for issue in &outcome.issues {
//!     println!("{}", issue);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Required elements are then checked against a [`RequiredElementPolicy`]:
//!
//! ```no_run
//! # use minidcm_object::{open_file, ReadOptions, RequiredElementPolicy};
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = open_file("0001.dcm", &ReadOptions::default())?;
//! let result = RequiredElementPolicy::default().validate(&outcome.object, &outcome.issues);
//! println!("{:?}: missing {:?}", result.overall(), result.missing());
//! # Ok(())
//! # }
//! ```
//!
//! Finally, file objects can be written back into a DICOM file.
//!
//! ```no_run
//! # use minidcm_object::DefaultDicomObject;
//! # fn something(obj: DefaultDicomObject) -> Result<(), Box<dyn std::error::Error>> {
//! obj.write_to_file("0001_new.dcm")?;
//! # Ok(())
//! # }
//! ```
pub mod mem;
pub mod meta;
pub mod read;
pub mod validate;
pub mod write;

pub use crate::mem::{InMemDicomObject, InMemElement, Provenance};
pub use crate::meta::{FileMetaTable, FileMetaTableBuilder};
pub use crate::read::{
    from_reader, open_file, read_with_dict, DecodeIssue, IssueKind, ReadError, ReadOptions,
    ReadOutcome,
};
pub use crate::validate::{
    ElementStatus, OverallStatus, PolicyError, RequiredElementPolicy, ValidationResult,
};
pub use crate::write::{DataSetWriter, WriteError};
pub use minidcm_core::dictionary::{DataDictionary, StandardDataDictionary};
pub use minidcm_core::{DataElement, Tag, VR};
pub use minidcm_encoding::TransferSyntax;

use minidcm_encoding::transfer_syntax;
use snafu::{Backtrace, Snafu};
use std::ops::{Deref, DerefMut};

/// The implementation class UID written to new file meta groups.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.305828488182831875890203105390285383139";

/// The implementation version name written to new file meta groups.
pub const IMPLEMENTATION_VERSION_NAME: &str = "MINIDCM_010";

/// The default implementation of a root DICOM object.
pub type DefaultDicomObject<D = StandardDataDictionary> = FileDicomObject<InMemDicomObject<D>>;

/// An error which may occur when looking up a DICOM object's attributes.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AccessError {
    #[snafu(display("No such data element with tag {}", tag))]
    NoSuchDataElementTag { tag: Tag, backtrace: Backtrace },
}

impl AccessError {
    pub fn into_access_by_name(self, alias: impl Into<String>) -> AccessByNameError {
        match self {
            AccessError::NoSuchDataElementTag { tag, backtrace } => {
                AccessByNameError::NoSuchDataElementAlias {
                    tag,
                    alias: alias.into(),
                    backtrace,
                }
            }
        }
    }
}

/// An error which may occur when looking up a DICOM object's attributes
/// by a keyword (or alias) instead of by tag.
///
/// These accesses incur a look-up at the data element dictionary,
/// which may fail if no such entry exists.
#[derive(Debug, Snafu)]
pub enum AccessByNameError {
    #[snafu(display("No such data element {} (with tag {})", alias, tag))]
    NoSuchDataElementAlias {
        tag: Tag,
        alias: String,
        backtrace: Backtrace,
    },

    /// Could not resolve attribute name from the data dictionary
    #[snafu(display("Unknown data attribute named `{}`", name))]
    NoSuchAttributeName { name: String, backtrace: Backtrace },
}

/// A root DICOM object retrieved from a standard DICOM file,
/// containing additional information from the file meta group
/// in a separate table value.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDicomObject<O> {
    meta: FileMetaTable,
    obj: O,
}

impl<O> FileDicomObject<O> {
    /// Put together a file meta table and the main data set.
    pub fn new(meta: FileMetaTable, obj: O) -> Self {
        FileDicomObject { meta, obj }
    }

    /// Retrieve the processed meta header table.
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    /// Retrieve a mutable reference to the processed meta header table.
    pub fn meta_mut(&mut self) -> &mut FileMetaTable {
        &mut self.meta
    }

    /// Retrieve the inner DICOM object structure, discarding the meta table.
    pub fn into_inner(self) -> O {
        self.obj
    }

    /// Look up the transfer syntax declared in the file meta group.
    ///
    /// Returns `None` if the transfer syntax is not known.
    pub fn transfer_syntax(&self) -> Option<&'static TransferSyntax> {
        transfer_syntax::get(self.meta.transfer_syntax())
    }
}

impl<O> Deref for FileDicomObject<O> {
    type Target = O;

    fn deref(&self) -> &Self::Target {
        &self.obj
    }
}

impl<O> DerefMut for FileDicomObject<O> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.obj
    }
}
