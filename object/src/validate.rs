//! Checking decoded objects for the data elements the application needs.
//!
//! A [`RequiredElementPolicy`] lists the required elements, in order.
//! Validating an object against it yields a [`ValidationResult`]
//! with one [`ElementStatus`] per required element.
//! Problems are logged as they are found.
use crate::mem::{InMemDicomObject, Provenance};
use crate::read::DecodeIssue;
use minidcm_core::dictionary::{tags, DataDictionary, DictionaryEntry};
use minidcm_core::{StandardDataDictionary, Tag};
use snafu::{OptionExt, Snafu};
use tracing::warn;

/// An error which may occur when building a policy from element names.
#[derive(Debug, Snafu)]
pub enum PolicyError {
    #[snafu(display("Unknown data element `{}`", name))]
    UnknownElement { name: String },
}

/// The state of one required data element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementStatus {
    /// The element is there, with a usable value.
    Present { provenance: Provenance },
    /// The element is not in the data set.
    Missing,
    /// The element was found but could not be decoded.
    Malformed,
}

/// The state of a whole data set, from best to worst.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverallStatus {
    Valid,
    MissingRequired,
    Malformed,
}

impl From<ElementStatus> for OverallStatus {
    fn from(status: ElementStatus) -> Self {
        match status {
            ElementStatus::Present { .. } => OverallStatus::Valid,
            ElementStatus::Missing => OverallStatus::MissingRequired,
            ElementStatus::Malformed => OverallStatus::Malformed,
        }
    }
}

/// An ordered list of the data elements which a data set must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredElementPolicy {
    entries: Vec<(Tag, String)>,
}

impl Default for RequiredElementPolicy {
    fn default() -> Self {
        RequiredElementPolicy::new([
            (tags::PATIENT_NAME, "PatientName"),
            (tags::PATIENT_ID, "PatientID"),
            (tags::MODALITY, "Modality"),
            (tags::STUDY_DATE, "StudyDate"),
            (tags::PIXEL_DATA, "PixelData"),
            (tags::ROWS, "Rows"),
            (tags::COLUMNS, "Columns"),
            (tags::BITS_ALLOCATED, "BitsAllocated"),
            (tags::SOP_CLASS_UID, "SOPClassUID"),
        ])
    }
}

impl RequiredElementPolicy {
    /// Create a policy from tags and their display names.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Tag, S)>,
        S: Into<String>,
    {
        RequiredElementPolicy {
            entries: entries
                .into_iter()
                .map(|(tag, alias)| (tag, alias.into()))
                .collect(),
        }
    }

    /// Create a policy from attribute aliases or tag selectors
    /// such as `(0010,0010)`, resolved with the standard dictionary.
    pub fn from_names<I, S>(names: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_names_with_dict(names, &StandardDataDictionary)
    }

    /// Create a policy from attribute aliases or tag selectors,
    /// resolved with the given dictionary.
    pub fn from_names_with_dict<I, S, D>(names: I, dict: &D) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        D: DataDictionary,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                let tag = dict
                    .parse_tag(name)
                    .context(UnknownElementSnafu { name })?;
                let alias = dict
                    .by_tag(tag)
                    .map(|e| e.alias().to_string())
                    .unwrap_or_else(|| name.trim().to_string());
                Ok((tag, alias))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RequiredElementPolicy { entries })
    }

    /// The required elements, in order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &str)> + '_ {
        self.entries.iter().map(|(tag, alias)| (*tag, alias.as_str()))
    }

    /// Whether the given tag is required.
    pub fn requires(&self, tag: Tag) -> bool {
        self.entries.iter().any(|(t, _)| *t == tag)
    }

    /// Check the root data set of an object
    /// against this policy.
    ///
    /// Elements for which decoding reported a problem at the root level
    /// are considered malformed, whether or not they made it into the object.
    pub fn validate<D>(&self, obj: &InMemDicomObject<D>, issues: &[DecodeIssue]) -> ValidationResult
    where
        D: DataDictionary,
    {
        let entries = self
            .entries
            .iter()
            .map(|(tag, alias)| {
                let tag = *tag;
                let malformed = issues.iter().any(|issue| {
                    issue.depth == 0 && issue.tag == Some(tag) && issue.kind.marks_malformed()
                });
                let status = if malformed {
                    ElementStatus::Malformed
                } else {
                    match obj.provenance(tag) {
                        Some(provenance) => ElementStatus::Present { provenance },
                        None => ElementStatus::Missing,
                    }
                };

                match status {
                    ElementStatus::Present { .. } => {}
                    ElementStatus::Missing => warn!(
                        tag = %tag,
                        alias = alias.as_str(),
                        condition = "missing",
                        severity = "recoverable",
                        "Required data element check failed"
                    ),
                    ElementStatus::Malformed => warn!(
                        tag = %tag,
                        alias = alias.as_str(),
                        condition = "malformed",
                        severity = "fatal",
                        "Required data element check failed"
                    ),
                }
                (tag, alias.clone(), status)
            })
            .collect();
        ValidationResult { entries }
    }
}

/// The outcome of checking an object against a [`RequiredElementPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    entries: Vec<(Tag, String, ElementStatus)>,
}

impl ValidationResult {
    /// The worst status among all required elements.
    pub fn overall(&self) -> OverallStatus {
        self.entries
            .iter()
            .map(|(_, _, status)| OverallStatus::from(*status))
            .max()
            .unwrap_or(OverallStatus::Valid)
    }

    /// Whether all required elements are present.
    pub fn is_valid(&self) -> bool {
        self.overall() == OverallStatus::Valid
    }

    /// The missing elements, in policy order.
    pub fn missing(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .filter(|(_, _, status)| *status == ElementStatus::Missing)
            .map(|(tag, _, _)| *tag)
            .collect()
    }

    /// The malformed elements, in policy order.
    pub fn malformed(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .filter(|(_, _, status)| *status == ElementStatus::Malformed)
            .map(|(tag, _, _)| *tag)
            .collect()
    }

    pub fn status(&self, tag: Tag) -> Option<ElementStatus> {
        self.entries
            .iter()
            .find(|(t, _, _)| *t == tag)
            .map(|(_, _, status)| *status)
    }

    /// Iterate over all required elements, in policy order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &str, ElementStatus)> + '_ {
        self.entries
            .iter()
            .map(|(tag, alias, status)| (*tag, alias.as_str(), *status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::IssueKind;
    use minidcm_core::{dicom_value, DataElement, VR};

    fn complete_object() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.2"),
            DataElement::new(tags::STUDY_DATE, VR::DA, "20240101"),
            DataElement::new(tags::MODALITY, VR::CS, "CT"),
            DataElement::new(tags::PATIENT_NAME, VR::PN, "Doe^John"),
            DataElement::new(tags::PATIENT_ID, VR::LO, "12345"),
            DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [2])),
            DataElement::new(tags::COLUMNS, VR::US, dicom_value!(U16, [2])),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, dicom_value!(U16, [8])),
            DataElement::new(tags::PIXEL_DATA, VR::OB, dicom_value!(U8, [1, 2, 3, 4])),
        ])
    }

    #[test]
    fn complete_object_is_valid() {
        let obj = complete_object();
        let result = RequiredElementPolicy::default().validate(&obj, &[]);
        assert_eq!(result.overall(), OverallStatus::Valid);
        assert!(result.is_valid());
        assert!(result.missing().is_empty());
        assert_eq!(
            result.status(tags::MODALITY),
            Some(ElementStatus::Present {
                provenance: Provenance::Decoded
            })
        );
        assert_eq!(result.iter().count(), 9);
    }

    #[test]
    fn missing_pixel_data() {
        let mut obj = complete_object();
        obj.remove(tags::PIXEL_DATA);
        let result = RequiredElementPolicy::default().validate(&obj, &[]);
        assert_eq!(result.overall(), OverallStatus::MissingRequired);
        assert_eq!(result.missing(), vec![tags::PIXEL_DATA]);
    }

    #[test]
    fn missing_elements_are_listed_in_policy_order() {
        let mut obj = complete_object();
        obj.remove(tags::SOP_CLASS_UID);
        obj.remove(tags::PATIENT_ID);
        obj.remove(tags::ROWS);
        let result = RequiredElementPolicy::default().validate(&obj, &[]);
        assert_eq!(
            result.missing(),
            vec![tags::PATIENT_ID, tags::ROWS, tags::SOP_CLASS_UID]
        );
    }

    #[test]
    fn root_issues_mark_elements_as_malformed() {
        let mut obj = complete_object();
        obj.remove(tags::PATIENT_ID);
        obj.remove(tags::ROWS);
        let issues = [
            DecodeIssue {
                tag: Some(tags::ROWS),
                offset: 100,
                depth: 0,
                kind: IssueKind::InvalidValue {
                    vr: VR::US,
                    reason: "length 3 is not a multiple of 2".into(),
                },
            },
            // nested issues and mere warnings do not count
            DecodeIssue {
                tag: Some(tags::PATIENT_ID),
                offset: 200,
                depth: 1,
                kind: IssueKind::Unreadable {
                    message: "?".into(),
                },
            },
            DecodeIssue {
                tag: Some(tags::MODALITY),
                offset: 300,
                depth: 0,
                kind: IssueKind::DuplicateTag {},
            },
        ];
        let result = RequiredElementPolicy::default().validate(&obj, &issues);
        assert_eq!(result.status(tags::ROWS), Some(ElementStatus::Malformed));
        assert_eq!(result.status(tags::PATIENT_ID), Some(ElementStatus::Missing));
        assert!(matches!(
            result.status(tags::MODALITY),
            Some(ElementStatus::Present { .. })
        ));
        assert_eq!(result.malformed(), vec![tags::ROWS]);
        assert_eq!(result.overall(), OverallStatus::Malformed);
    }

    #[test]
    fn supplied_elements_count_as_present() {
        let mut obj = complete_object();
        obj.remove(tags::PATIENT_ID);
        obj.supply(tags::PATIENT_ID, VR::LO, "ANON".into());
        let result = RequiredElementPolicy::default().validate(&obj, &[]);
        assert!(result.is_valid());
        assert_eq!(
            result.status(tags::PATIENT_ID),
            Some(ElementStatus::Present {
                provenance: Provenance::UserSupplied
            })
        );
    }

    #[test]
    fn policy_from_names() {
        let policy =
            RequiredElementPolicy::from_names(["PatientName", "(0028,0010)", " Modality "])
                .unwrap();
        assert_eq!(
            policy.iter().collect::<Vec<_>>(),
            vec![
                (tags::PATIENT_NAME, "PatientName"),
                (tags::ROWS, "Rows"),
                (tags::MODALITY, "Modality"),
            ]
        );
        assert!(policy.requires(tags::ROWS));
        assert!(!policy.requires(tags::PIXEL_DATA));

        let err = RequiredElementPolicy::from_names(["PatientName", "NotAThing"]).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownElement { name } if name == "NotAThing"));
    }

    #[test]
    fn empty_policy_is_always_valid() {
        let policy = RequiredElementPolicy::new(Vec::<(Tag, String)>::new());
        let result = policy.validate(&InMemDicomObject::new_empty(), &[]);
        assert_eq!(result.overall(), OverallStatus::Valid);
    }
}
