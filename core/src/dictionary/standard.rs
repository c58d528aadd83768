//! This module implements the built-in attribute dictionary.
//!
//! The dictionary is a singleton indexed on first use.

use super::tags::ENTRIES;
use super::{DataDictionary, DictionaryEntryRef};
use crate::header::{Tag, VR};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};

static DICT: Lazy<StandardDataDictionaryRegistry> = Lazy::new(init_dictionary);

/// Retrieve a singleton instance of the standard dictionary registry.
#[inline]
pub fn registry() -> &'static StandardDataDictionaryRegistry {
    &DICT
}

/// The data struct actually containing the standard dictionary.
#[derive(Debug)]
pub struct StandardDataDictionaryRegistry {
    /// mapping: name → entry
    by_name: HashMap<&'static str, &'static DictionaryEntryRef<'static>>,
    /// mapping: tag → entry
    by_tag: HashMap<Tag, &'static DictionaryEntryRef<'static>>,
}

impl StandardDataDictionaryRegistry {
    fn new() -> StandardDataDictionaryRegistry {
        StandardDataDictionaryRegistry {
            by_name: HashMap::with_capacity(ENTRIES.len()),
            by_tag: HashMap::with_capacity(ENTRIES.len()),
        }
    }

    /// record the given dictionary entry reference
    fn index(&mut self, entry: &'static DictionaryEntryRef<'static>) -> &mut Self {
        self.by_name.insert(entry.alias, entry);
        self.by_tag.insert(entry.tag, entry);
        self
    }
}

/// Generic Group Length dictionary entry.
static GROUP_LENGTH_ENTRY: DictionaryEntryRef<'static> = DictionaryEntryRef {
    tag: Tag(0x0000, 0x0000),
    alias: "GenericGroupLength",
    vr: VR::UL,
};

/// Generic Private Creator dictionary entry.
static PRIVATE_CREATOR_ENTRY: DictionaryEntryRef<'static> = DictionaryEntryRef {
    tag: Tag(0x0009, 0x0010),
    alias: "PrivateCreator",
    vr: VR::LO,
};

/// A data element dictionary which consults
/// the library's global DICOM attribute registry.
///
/// This is the type which would generally be used
/// whenever a data element dictionary is needed,
/// such as when reading DICOM objects.
///
/// The dictionary index is automatically initialized upon the first use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StandardDataDictionary;

impl StandardDataDictionary {
    fn indexed_tag(tag: Tag) -> Option<&'static DictionaryEntryRef<'static>> {
        registry().by_tag.get(&tag).copied().or_else(|| {
            // check for private creator
            if tag.is_private() && (0x0010..=0x00FF).contains(&tag.1) {
                return Some(&PRIVATE_CREATOR_ENTRY);
            }
            // check for group length
            if tag.element() == 0x0000 {
                return Some(&GROUP_LENGTH_ENTRY);
            }
            None
        })
    }
}

impl DataDictionary for StandardDataDictionary {
    type Entry = DictionaryEntryRef<'static>;

    fn by_name(&self, name: &str) -> Option<&Self::Entry> {
        registry().by_name.get(name).copied()
    }

    fn by_tag(&self, tag: Tag) -> Option<&Self::Entry> {
        StandardDataDictionary::indexed_tag(tag)
    }
}

impl Display for StandardDataDictionary {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.write_str("Standard DICOM Data Dictionary")
    }
}

fn init_dictionary() -> StandardDataDictionaryRegistry {
    let mut d = StandardDataDictionaryRegistry::new();
    for entry in ENTRIES {
        d.index(entry);
    }
    d
}

#[cfg(test)]
mod tests {
    use super::StandardDataDictionary;
    use crate::dictionary::tags;
    use crate::dictionary::{DataDictionary, DictionaryEntry, DictionaryEntryRef};
    use crate::header::{Tag, VR};

    #[test]
    fn smoke_test() {
        let dict = StandardDataDictionary;

        assert_eq!(
            dict.by_name("PatientName"),
            Some(&DictionaryEntryRef {
                tag: Tag(0x0010, 0x0010),
                alias: "PatientName",
                vr: VR::PN,
            })
        );

        assert_eq!(
            dict.by_name("Modality"),
            Some(&DictionaryEntryRef {
                tag: Tag(0x0008, 0x0060),
                alias: "Modality",
                vr: VR::CS,
            })
        );

        let pixel_data = dict
            .by_tag(Tag(0x7FE0, 0x0010))
            .expect("Pixel Data attribute should exist");
        assert_eq!(pixel_data.tag(), Tag(0x7FE0, 0x0010));
        assert_eq!(pixel_data.alias(), "PixelData");
        assert!(pixel_data.vr() == VR::OB);
    }

    #[test]
    fn constants_available() {
        assert_eq!(tags::PATIENT_NAME, Tag(0x0010, 0x0010));
        assert_eq!(tags::MODALITY, Tag(0x0008, 0x0060));
        assert_eq!(tags::PIXEL_DATA, Tag(0x7FE0, 0x0010));
        assert_eq!(tags::TRANSFER_SYNTAX_UID, Tag(0x0002, 0x0010));
    }

    #[test]
    fn group_length_and_private_creator() {
        let dict = StandardDataDictionary;
        assert_eq!(dict.vr_of(Tag(0x0018, 0x0000)), VR::UL);
        assert_eq!(
            dict.by_tag(Tag(0x0029, 0x0010)).map(|e| e.alias()),
            Some("PrivateCreator")
        );
        assert_eq!(dict.vr_of(Tag(0x0029, 0x1010)), VR::UN);
    }

    #[test]
    fn parse_tag_by_alias_or_number() {
        let dict = StandardDataDictionary;
        assert_eq!(dict.parse_tag("StudyDate"), Some(Tag(0x0008, 0x0020)));
        assert_eq!(dict.parse_tag("(0028,0010)"), Some(Tag(0x0028, 0x0010)));
        assert_eq!(dict.parse_tag("NoSuchAttribute"), None);
    }
}
