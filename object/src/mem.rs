//! This module contains the implementation for an in-memory DICOM object.
//!
//! An [`InMemDicomObject`] is built once per file by the data set reader.
//! Afterwards, the only expected mutation is the injection
//! of user supplied values for missing elements,
//! which is tracked through each element's [`Provenance`].

use crate::{AccessByNameError, AccessError, NoSuchAttributeNameSnafu, NoSuchDataElementTagSnafu};
use minidcm_core::dictionary::{DataDictionary, DictionaryEntry};
use minidcm_core::header::{HasLength, Header};
use minidcm_core::value::{PrimitiveValue, Value};
use minidcm_core::{DataElement, Length, StandardDataDictionary, Tag, VR};
use minidcm_encoding::text::SpecificCharacterSet;
use snafu::OptionExt;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A full in-memory DICOM data element.
pub type InMemElement<D = StandardDataDictionary> = DataElement<InMemDicomObject<D>>;

/// Where the value of a data element came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Decoded from the source file.
    Decoded,
    /// Provided afterwards by the user of the application.
    UserSupplied,
}

/** A DICOM object that is fully contained in memory.
 */
#[derive(Debug, Clone)]
pub struct InMemDicomObject<D = StandardDataDictionary> {
    /// the element map
    entries: BTreeMap<Tag, InMemElement<D>>,
    /// where each element came from
    provenance: BTreeMap<Tag, Provenance>,
    /// the data dictionary
    dict: D,
    /// the character set of the text values
    charset: SpecificCharacterSet,
}

impl<D> PartialEq for InMemDicomObject<D> {
    // The data dictionary and the recorded lengths are ignored,
    // so that a data set equals its re-encoded self.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .values()
                .zip(other.entries.values())
                .all(|(a, b)| elements_eq(a, b))
    }
}

fn elements_eq<D>(a: &InMemElement<D>, b: &InMemElement<D>) -> bool {
    if a.tag() != b.tag() || a.vr() != b.vr() {
        return false;
    }
    match (a.value(), b.value()) {
        (Value::Sequence(x), Value::Sequence(y)) => x.items() == y.items(),
        (Value::Primitive(x), Value::Primitive(y)) => x == y,
        (Value::PixelSequence(x), Value::PixelSequence(y)) => x == y,
        (Value::Deferred(x), Value::Deferred(y)) => x == y,
        _ => false,
    }
}

impl<D> HasLength for InMemDicomObject<D> {
    fn length(&self) -> Length {
        Length::UNDEFINED
    }
}

impl InMemDicomObject<StandardDataDictionary> {
    /// Create a new empty DICOM object.
    pub fn new_empty() -> Self {
        InMemDicomObject::new_empty_with_dict(StandardDataDictionary)
    }

    /// Construct a DICOM object from a non-fallible source of structured elements.
    #[inline]
    pub fn from_element_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = InMemElement<StandardDataDictionary>>,
    {
        Self::from_iter_with_dict(iter, StandardDataDictionary)
    }
}

impl<D> InMemDicomObject<D>
where
    D: DataDictionary,
{
    /// Create a new empty object, using the given dictionary for name lookup.
    pub fn new_empty_with_dict(dict: D) -> Self {
        InMemDicomObject {
            entries: BTreeMap::new(),
            provenance: BTreeMap::new(),
            dict,
            charset: SpecificCharacterSet::Default,
        }
    }

    /// Construct a DICOM object from a non-fallible source of structured elements,
    /// all of them considered as decoded.
    pub fn from_iter_with_dict<I>(iter: I, dict: D) -> Self
    where
        I: IntoIterator<Item = InMemElement<D>>,
    {
        let mut obj = InMemDicomObject::new_empty_with_dict(dict);
        for elem in iter {
            obj.put(elem);
        }
        obj
    }

    /// Retrieve a particular DICOM element by its tag.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement<D>, AccessError> {
        self.entries
            .get(&tag)
            .context(NoSuchDataElementTagSnafu { tag })
    }

    /// Retrieve a particular DICOM element by its name (keyword).
    pub fn element_by_name(&self, name: &str) -> Result<&InMemElement<D>, AccessByNameError> {
        let tag = self.lookup_name(name)?;
        self.element(tag)
            .map_err(|e| e.into_access_by_name(name))
    }

    /// Retrieve a particular DICOM element by its tag,
    /// or `None` if it is not in the object.
    pub fn get(&self, tag: Tag) -> Option<&InMemElement<D>> {
        self.entries.get(&tag)
    }

    /// Retrieve a particular DICOM element by its name (keyword),
    /// or `None` if the name is unknown or the element is not in the object.
    pub fn get_by_name(&self, name: &str) -> Option<&InMemElement<D>> {
        self.dict.by_name(name).and_then(|e| self.get(e.tag()))
    }

    /// Whether the object contains an element with the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Insert a decoded data element into the object,
    /// replacing and returning the previous one with the same tag, if any.
    pub fn put(&mut self, elem: InMemElement<D>) -> Option<InMemElement<D>> {
        self.put_with_provenance(elem, Provenance::Decoded)
    }

    /// Insert a value provided by the user for the given attribute,
    /// replacing and returning the previous element with the same tag, if any.
    pub fn supply(
        &mut self,
        tag: Tag,
        vr: VR,
        value: PrimitiveValue,
    ) -> Option<InMemElement<D>> {
        let elem = DataElement::new(tag, vr, value);
        self.put_with_provenance(elem, Provenance::UserSupplied)
    }

    fn put_with_provenance(
        &mut self,
        elem: InMemElement<D>,
        provenance: Provenance,
    ) -> Option<InMemElement<D>> {
        let tag = elem.tag();
        self.provenance.insert(tag, provenance);
        self.entries.insert(tag, elem)
    }

    /// Remove a DICOM element by its tag,
    /// reporting whether it was present.
    pub fn remove(&mut self, tag: Tag) -> bool {
        self.provenance.remove(&tag);
        self.entries.remove(&tag).is_some()
    }

    /// Obtain where the element with the given tag came from.
    pub fn provenance(&self, tag: Tag) -> Option<Provenance> {
        self.provenance.get(&tag).copied()
    }

    /// Obtain an iterator over the elements of this object, in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &InMemElement<D>> + '_ {
        self.entries.values()
    }

    /// Obtain an iterator over the tags of the object's elements, in order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.keys().copied()
    }

    /// The number of elements at the root of this object.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the object has no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retrieve the value of an element as a single string
    /// without trailing padding.
    pub fn string(&self, tag: Tag) -> Option<Cow<'_, str>> {
        self.get(tag).and_then(|e| e.to_str().ok())
    }

    /// Retrieve the first value of an element as an unsigned 16-bit integer.
    pub fn uint16(&self, tag: Tag) -> Option<u16> {
        self.get(tag).and_then(|e| e.to_int::<u16>().ok())
    }

    /// Retrieve the first value of an element
    /// as a double-precision floating point number.
    pub fn float64(&self, tag: Tag) -> Option<f64> {
        self.get(tag).and_then(|e| e.to_float64().ok())
    }

    /// Retrieve all values of an element
    /// as double-precision floating point numbers.
    pub fn float64_multi(&self, tag: Tag) -> Option<Vec<f64>> {
        self.get(tag).and_then(|e| e.to_multi_float64().ok())
    }

    /// The character set in effect for the text values of this object.
    pub fn charset(&self) -> SpecificCharacterSet {
        self.charset
    }

    /// Declare the character set of the text values of this object.
    pub fn set_charset(&mut self, charset: SpecificCharacterSet) {
        self.charset = charset;
    }

    /// Retrieve the data dictionary of this object.
    pub fn dictionary(&self) -> &D {
        &self.dict
    }

    /// Obtain the keyword of the given attribute, if known.
    pub fn alias_of(&self, tag: Tag) -> Option<&str> {
        self.dict.by_tag(tag).map(|e| e.alias())
    }

    fn lookup_name(&self, name: &str) -> Result<Tag, AccessByNameError> {
        self.dict
            .by_name(name)
            .context(NoSuchAttributeNameSnafu { name })
            .map(|e| e.tag())
    }
}

impl<'a, D> IntoIterator for &'a InMemDicomObject<D> {
    type Item = &'a InMemElement<D>;
    type IntoIter = std::collections::btree_map::Values<'a, Tag, InMemElement<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessByNameError;
    use minidcm_core::dicom_value;
    use minidcm_core::dictionary::tags;
    use minidcm_core::value::DataSetSequence;

    fn sample() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^John")),
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(512_u16)),
            DataElement::new(
                tags::PIXEL_SPACING,
                VR::DS,
                dicom_value!(F64, [0.5, 0.75]),
            ),
        ])
    }

    #[test]
    fn get_and_typed_helpers() {
        let obj = sample();
        assert_eq!(obj.len(), 4);
        assert!(obj.contains(tags::MODALITY));
        assert_eq!(obj.string(tags::MODALITY).as_deref(), Some("CT"));
        assert_eq!(obj.string(tags::PATIENT_NAME).as_deref(), Some("Doe^John"));
        assert_eq!(obj.uint16(tags::ROWS), Some(512));
        assert_eq!(obj.float64(tags::PIXEL_SPACING), Some(0.5));
        assert_eq!(obj.float64_multi(tags::PIXEL_SPACING), Some(vec![0.5, 0.75]));
        assert_eq!(obj.uint16(tags::COLUMNS), None);
        assert!(obj.get(tags::PATIENT_ID).is_none());
    }

    #[test]
    fn lookup_by_name() {
        let obj = sample();
        assert_eq!(
            obj.get_by_name("Modality").map(|e| e.tag()),
            Some(tags::MODALITY)
        );
        assert!(obj.get_by_name("PatientID").is_none());
        assert!(matches!(
            obj.element_by_name("PatientID"),
            Err(AccessByNameError::NoSuchDataElementAlias { .. })
        ));
        assert!(matches!(
            obj.element_by_name("NotAnAttribute"),
            Err(AccessByNameError::NoSuchAttributeName { .. })
        ));
    }

    #[test]
    fn put_replaces_and_returns_previous() {
        let mut obj = sample();
        let old = obj.put(DataElement::new(
            tags::MODALITY,
            VR::CS,
            PrimitiveValue::from("MR"),
        ));
        assert_eq!(old.unwrap().to_str().unwrap(), "CT");
        assert_eq!(obj.string(tags::MODALITY).as_deref(), Some("MR"));
        assert_eq!(obj.len(), 4);
    }

    #[test]
    fn supplied_values_are_tracked() {
        let mut obj = sample();
        assert_eq!(obj.provenance(tags::MODALITY), Some(Provenance::Decoded));
        assert_eq!(obj.provenance(tags::PATIENT_ID), None);

        obj.supply(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("12345"));
        assert_eq!(obj.provenance(tags::PATIENT_ID), Some(Provenance::UserSupplied));
        assert_eq!(obj.string(tags::PATIENT_ID).as_deref(), Some("12345"));

        assert!(obj.remove(tags::PATIENT_ID));
        assert_eq!(obj.provenance(tags::PATIENT_ID), None);
    }

    #[test]
    fn iteration_is_in_tag_order() {
        let obj = sample();
        let tags: Vec<_> = obj.tags().collect();
        assert_eq!(
            tags,
            vec![tags::MODALITY, tags::PATIENT_NAME, tags::ROWS, tags::PIXEL_SPACING]
        );
    }

    #[test]
    fn equality_ignores_sequence_lengths() {
        let item = InMemDicomObject::from_element_iter([DataElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4"),
        )]);
        let defined = InMemDicomObject::from_element_iter([DataElement::new_with_len(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            Length(26),
            DataSetSequence::new(vec![item.clone()], Length(26)),
        )]);
        let undefined = InMemDicomObject::from_element_iter([DataElement::new_with_len(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            Length::UNDEFINED,
            DataSetSequence::from(vec![item]),
        )]);
        assert_eq!(defined, undefined);
        assert_ne!(defined, sample());
    }
}
