//! This module contains the concept of a DICOM data dictionary, and aggregates
//! the built-in data dictionaries.
//!
//! The standard data dictionary covers the attributes
//! needed to decode, validate and display images.
//! Decoders take the dictionary as a parameter,
//! so that a broader or private dictionary can be injected.

pub mod standard;
pub mod stub;
pub mod tags;

pub use self::standard::StandardDataDictionary;
pub use self::stub::StubDataDictionary;

use crate::header::{Tag, VR};
use std::fmt::Debug;

/// Type trait for a dictionary of DICOM attributes.
/// Attribute dictionaries provide the
/// means to convert a tag to an alias and vice versa, as well as a form of retrieving
/// additional information about the attribute.
///
/// The methods herein have no generic parameters, so as to enable being
/// used as a trait object.
pub trait DataDictionary: Debug {
    /// The type of the dictionary entry.
    type Entry: DictionaryEntry;

    /// Fetch an entry by its usual alias (e.g. "PatientName" or "SOPInstanceUID").
    /// Aliases are case sensitive and not separated by spaces.
    fn by_name(&self, name: &str) -> Option<&Self::Entry>;

    /// Fetch an entry by its tag.
    fn by_tag(&self, tag: Tag) -> Option<&Self::Entry>;

    /// Resolve an attribute selector into a tag.
    ///
    /// The selector may be a tag in one of the forms
    /// accepted by [`Tag::from_str`](std::str::FromStr),
    /// such as `(0010,0010)`,
    /// or an attribute alias known to this dictionary.
    fn parse_tag(&self, selector: &str) -> Option<Tag> {
        let selector = selector.trim();
        selector
            .parse()
            .ok()
            .or_else(|| self.by_name(selector).map(|e| e.tag()))
    }

    /// Obtain the typical value representation of the given attribute,
    /// or `UN` if the attribute is unknown.
    fn vr_of(&self, tag: Tag) -> VR {
        self.by_tag(tag).map(|e| e.vr()).unwrap_or(VR::UN)
    }
}

impl<D> DataDictionary for &D
where
    D: DataDictionary,
{
    type Entry = D::Entry;

    fn by_name(&self, name: &str) -> Option<&Self::Entry> {
        (**self).by_name(name)
    }

    fn by_tag(&self, tag: Tag) -> Option<&Self::Entry> {
        (**self).by_tag(tag)
    }
}

/// The dictionary entry data type, representing a DICOM attribute.
pub trait DictionaryEntry {
    /// The attribute tag.
    fn tag(&self) -> Tag;
    /// The alias of the attribute, with no spaces, usually in UpperCamelCase.
    fn alias(&self) -> &str;
    /// The _typical_ value representation of the attribute.
    fn vr(&self) -> VR;
}

/// A data type for a dictionary entry with full ownership.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DictionaryEntryBuf {
    /// The attribute tag
    pub tag: Tag,
    /// The alias of the attribute, with no spaces, usually InCapitalizedCamelCase
    pub alias: String,
    /// The _typical_ value representation of the attribute
    pub vr: VR,
}

impl DictionaryEntry for DictionaryEntryBuf {
    fn tag(&self) -> Tag {
        self.tag
    }
    fn alias(&self) -> &str {
        self.alias.as_str()
    }
    fn vr(&self) -> VR {
        self.vr
    }
}

/// A data type for a dictionary entry with a string slice for its alias.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DictionaryEntryRef<'a> {
    /// The attribute tag
    pub tag: Tag,
    /// The alias of the attribute, with no spaces, usually InCapitalizedCamelCase
    pub alias: &'a str,
    /// The _typical_ value representation of the attribute
    pub vr: VR,
}

impl<'a> DictionaryEntry for DictionaryEntryRef<'a> {
    fn tag(&self) -> Tag {
        self.tag
    }
    fn alias(&self) -> &str {
        self.alias
    }
    fn vr(&self) -> VR {
        self.vr
    }
}
