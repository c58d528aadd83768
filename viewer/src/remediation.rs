//! Deciding what to do about missing required data elements.
//!
//! Loading a file which lacks required elements does not block on the user.
//! Instead, the load returns a [`PendingDecision`]
//! listing what is missing,
//! and the caller answers later with a [`Decision`].

use minidcm_core::dictionary::{tags, DataDictionary};
use minidcm_core::value::PrimitiveValue;
use minidcm_core::{dicom_value, Tag, VR};
use minidcm_object::{DecodeIssue, InMemDicomObject, RequiredElementPolicy, ValidationResult};
use snafu::{OptionExt, Snafu};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Data element {} is not awaiting a value", tag))]
    NotPending { tag: Tag },

    #[snafu(display("Invalid {} value `{}` for {}: {}", vr, value, tag, reason))]
    InvalidSuppliedValue {
        tag: Tag,
        vr: VR,
        value: String,
        reason: String,
    },

    #[snafu(display("Loading was aborted"))]
    Aborted,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A required data element which the data set lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingElement {
    pub tag: Tag,
    pub alias: String,
    /// the value representation a supplied value will be parsed as
    pub vr: VR,
}

/// The missing data elements of a loaded file,
/// waiting for a [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDecision {
    pub missing: Vec<MissingElement>,
}

impl PendingDecision {
    /// Gather the missing elements of a validation result,
    /// or `None` if nothing is missing.
    pub fn from_validation<D>(validation: &ValidationResult, dict: &D) -> Option<Self>
    where
        D: DataDictionary,
    {
        let missing: Vec<_> = validation
            .iter()
            .filter(|(_, _, status)| *status == minidcm_object::ElementStatus::Missing)
            .map(|(tag, alias, _)| MissingElement {
                tag,
                alias: alias.to_string(),
                vr: dict.vr_of(tag),
            })
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(PendingDecision { missing })
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&MissingElement> {
        self.missing.iter().find(|m| m.tag == tag)
    }
}

/// The answer to a [`PendingDecision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Stop loading the file.
    Abort,
    /// Keep the file as it is.
    Continue,
    /// Inject the given textual values, parsed per value representation.
    Supply(BTreeMap<Tag, String>),
    /// Inject placeholder values wherever one makes sense.
    /// Pixel data is never made up.
    FillDefaults,
}

/// Carry out a decision on the object,
/// returning the validation result of the updated object.
///
/// Supplied values are all checked before any of them is injected.
pub fn apply_decision<D>(
    obj: &mut InMemDicomObject<D>,
    pending: &PendingDecision,
    decision: Decision,
    policy: &RequiredElementPolicy,
    issues: &[DecodeIssue],
) -> Result<ValidationResult>
where
    D: DataDictionary,
{
    match decision {
        Decision::Abort => {
            info!(missing = pending.missing.len(), "Loading aborted");
            return AbortedSnafu.fail();
        }
        Decision::Continue => {
            info!(
                missing = pending.missing.len(),
                "Continuing without the missing elements"
            );
        }
        Decision::Supply(values) => {
            let parsed = values
                .into_iter()
                .map(|(tag, text)| {
                    let missing = pending.get(tag).context(NotPendingSnafu { tag })?;
                    let value = parse_value(missing.vr, &text).map_err(|reason| {
                        InvalidSuppliedValueSnafu {
                            tag,
                            vr: missing.vr,
                            value: text.as_str(),
                            reason,
                        }
                        .build()
                    })?;
                    Ok((tag, missing.vr, value))
                })
                .collect::<Result<Vec<_>>>()?;
            for (tag, vr, value) in parsed {
                info!(tag = %tag, vr = %vr, "Injecting supplied value");
                obj.supply(tag, vr, value);
            }
        }
        Decision::FillDefaults => {
            for missing in &pending.missing {
                if missing.tag == tags::PIXEL_DATA {
                    continue;
                }
                if let Some(value) = placeholder(missing.tag, missing.vr) {
                    info!(tag = %missing.tag, "Injecting placeholder value");
                    obj.supply(missing.tag, missing.vr, value);
                }
            }
        }
    }
    Ok(policy.validate(obj, issues))
}

/// The placeholder value for a data element,
/// if there is a sensible one for its value representation.
pub fn placeholder(tag: Tag, vr: VR) -> Option<PrimitiveValue> {
    if tag == tags::PIXEL_DATA {
        return None;
    }
    let value = match vr {
        VR::PN => dicom_value!(Strs, ["UNKNOWN^UNKNOWN"]),
        VR::AE | VR::CS | VR::LO | VR::SH | VR::UC => dicom_value!(Strs, ["UNKNOWN"]),
        VR::LT | VR::ST | VR::UT => dicom_value!(Str, "UNKNOWN"),
        VR::DA => dicom_value!(Strs, ["19000101"]),
        VR::TM => dicom_value!(Strs, ["000000"]),
        VR::DT => dicom_value!(Strs, ["19000101000000"]),
        VR::AS => dicom_value!(Strs, ["000Y"]),
        VR::UI => dicom_value!(Strs, ["2.25.0"]),
        VR::IS => dicom_value!(I32, [0]),
        VR::DS => dicom_value!(F64, [0.]),
        VR::US => dicom_value!(U16, [0]),
        VR::SS => dicom_value!(I16, [0]),
        VR::UL => dicom_value!(U32, [0]),
        VR::SL => dicom_value!(I32, [0]),
        VR::UV => dicom_value!(U64, [0]),
        VR::SV => dicom_value!(I64, [0]),
        VR::FL => dicom_value!(F32, [0.]),
        VR::FD => dicom_value!(F64, [0.]),
        _ => return None,
    };
    Some(value)
}

fn parse_all<T: std::str::FromStr>(text: &str) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    text.split('\\')
        .map(|part| {
            let part = part.trim();
            part.parse::<T>()
                .map_err(|e| format!("`{}`: {}", part, e))
        })
        .collect()
}

/// Parse text typed in by a user into a value of the given representation.
///
/// Multiple values are separated by backslashes.
pub fn parse_value(vr: VR, text: &str) -> Result<PrimitiveValue, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty value".to_string());
    }

    let value = match vr {
        VR::LT | VR::ST | VR::UT | VR::UR => PrimitiveValue::Str(text.to_string()),
        VR::AE | VR::CS | VR::LO | VR::PN | VR::SH | VR::UC | VR::AS | VR::TM | VR::DT => {
            PrimitiveValue::Strs(text.split('\\').map(|s| s.trim().to_string()).collect())
        }
        VR::DA => {
            let dates: Vec<String> = text.split('\\').map(|s| s.trim().to_string()).collect();
            if let Some(bad) = dates
                .iter()
                .find(|d| d.len() != 8 || !d.bytes().all(|b| b.is_ascii_digit()))
            {
                return Err(format!("`{}` is not a YYYYMMDD date", bad));
            }
            PrimitiveValue::Strs(dates.into_iter().collect())
        }
        VR::UI => {
            let uids: Vec<String> = text.split('\\').map(|s| s.trim().to_string()).collect();
            if let Some(bad) = uids.iter().find(|u| {
                u.len() > 64
                    || u.is_empty()
                    || !u.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            }) {
                return Err(format!("`{}` is not a UID", bad));
            }
            PrimitiveValue::Strs(uids.into_iter().collect())
        }
        VR::IS => PrimitiveValue::I32(parse_all::<i32>(text)?.into()),
        VR::DS => {
            let values: Vec<f64> = parse_all(text)?;
            if values.iter().any(|v| !v.is_finite()) {
                return Err("not a finite number".to_string());
            }
            PrimitiveValue::F64(values.into())
        }
        VR::US => PrimitiveValue::U16(parse_all::<u16>(text)?.into()),
        VR::SS => PrimitiveValue::I16(parse_all::<i16>(text)?.into()),
        VR::UL => PrimitiveValue::U32(parse_all::<u32>(text)?.into()),
        VR::SL => PrimitiveValue::I32(parse_all::<i32>(text)?.into()),
        VR::UV => PrimitiveValue::U64(parse_all::<u64>(text)?.into()),
        VR::SV => PrimitiveValue::I64(parse_all::<i64>(text)?.into()),
        VR::FL => PrimitiveValue::F32(parse_all::<f32>(text)?.into()),
        VR::FD => PrimitiveValue::F64(parse_all::<f64>(text)?.into()),
        VR::AT => PrimitiveValue::Tags(parse_all::<Tag>(text)?.into()),
        other => return Err(format!("{} values cannot be typed in", other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidcm_core::DataElement;
    use minidcm_object::{ElementStatus, OverallStatus, Provenance};

    fn object() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_ID, VR::LO, dicom_value!(Strs, ["ID1"])),
            DataElement::new(tags::MODALITY, VR::CS, dicom_value!(Strs, ["CT"])),
        ])
    }

    fn policy() -> RequiredElementPolicy {
        RequiredElementPolicy::new([
            (tags::PATIENT_NAME, "PatientName"),
            (tags::PATIENT_ID, "PatientID"),
            (tags::STUDY_DATE, "StudyDate"),
            (tags::PIXEL_DATA, "PixelData"),
        ])
    }

    fn pending(obj: &InMemDicomObject) -> PendingDecision {
        let validation = policy().validate(obj, &[]);
        PendingDecision::from_validation(&validation, obj.dictionary()).unwrap()
    }

    #[test]
    fn pending_lists_missing_elements() {
        let obj = object();
        let pending = pending(&obj);
        let tags: Vec<_> = pending.missing.iter().map(|m| (m.tag, m.vr)).collect();
        assert_eq!(
            tags,
            vec![
                (tags::PATIENT_NAME, VR::PN),
                (tags::STUDY_DATE, VR::DA),
                (tags::PIXEL_DATA, VR::OB),
            ]
        );
        assert_eq!(pending.missing[0].alias, "PatientName");
    }

    #[test]
    fn supplied_values_are_user_supplied() {
        let mut obj = object();
        let pending = pending(&obj);
        let values = BTreeMap::from([
            (tags::PATIENT_NAME, "Doe^Jane".to_string()),
            (tags::STUDY_DATE, "20240229".to_string()),
        ]);
        let validation =
            apply_decision(&mut obj, &pending, Decision::Supply(values), &policy(), &[]).unwrap();

        assert_eq!(
            validation.status(tags::PATIENT_NAME),
            Some(ElementStatus::Present {
                provenance: Provenance::UserSupplied
            })
        );
        assert_eq!(
            validation.status(tags::PATIENT_ID),
            Some(ElementStatus::Present {
                provenance: Provenance::Decoded
            })
        );
        assert_eq!(validation.missing(), vec![tags::PIXEL_DATA]);
        assert_eq!(obj.string(tags::STUDY_DATE).as_deref(), Some("20240229"));
    }

    #[test]
    fn supplying_a_present_element_is_rejected() {
        let mut obj = object();
        let pending = pending(&obj);
        let values = BTreeMap::from([(tags::PATIENT_ID, "other".to_string())]);
        let err = apply_decision(&mut obj, &pending, Decision::Supply(values), &policy(), &[])
            .unwrap_err();
        assert!(matches!(err, Error::NotPending { tag } if tag == tags::PATIENT_ID));
        assert_eq!(obj.string(tags::PATIENT_ID).as_deref(), Some("ID1"));
    }

    #[test]
    fn bad_values_are_rejected_before_injection() {
        let mut obj = object();
        let pending = pending(&obj);
        let values = BTreeMap::from([
            (tags::PATIENT_NAME, "Doe^Jane".to_string()),
            (tags::STUDY_DATE, "yesterday".to_string()),
        ]);
        let err = apply_decision(&mut obj, &pending, Decision::Supply(values), &policy(), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSuppliedValue { tag, vr: VR::DA, .. } if tag == tags::STUDY_DATE
        ));
        assert!(obj.get(tags::PATIENT_NAME).is_none());
    }

    #[test]
    fn fill_defaults_never_fills_pixel_data() {
        let mut obj = object();
        let pending = pending(&obj);
        let validation =
            apply_decision(&mut obj, &pending, Decision::FillDefaults, &policy(), &[]).unwrap();
        assert_eq!(validation.overall(), OverallStatus::MissingRequired);
        assert_eq!(validation.missing(), vec![tags::PIXEL_DATA]);
        assert_eq!(obj.string(tags::STUDY_DATE).as_deref(), Some("19000101"));
        assert_eq!(obj.provenance(tags::PATIENT_NAME), Some(Provenance::UserSupplied));
    }

    #[test]
    fn abort_and_continue() {
        let mut obj = object();
        let pending = pending(&obj);
        let err = apply_decision(&mut obj, &pending, Decision::Abort, &policy(), &[]).unwrap_err();
        assert!(matches!(err, Error::Aborted));

        let validation =
            apply_decision(&mut obj, &pending, Decision::Continue, &policy(), &[]).unwrap();
        assert_eq!(validation.missing().len(), 3);
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn parse_values_per_vr() {
        assert_eq!(parse_value(VR::PN, " Doe^John "), Ok(dicom_value!(Strs, ["Doe^John"])));
        assert_eq!(parse_value(VR::LT, "free text"), Ok(dicom_value!(Str, "free text")));
        assert_eq!(parse_value(VR::IS, "1\\2"), Ok(dicom_value!(I32, [1, 2])));
        assert_eq!(parse_value(VR::DS, "0.5"), Ok(dicom_value!(F64, [0.5])));
        assert_eq!(parse_value(VR::US, "512"), Ok(dicom_value!(U16, [512])));
        assert_eq!(
            parse_value(VR::UI, "1.2.840.10008.5.1.4.1.1.2"),
            Ok(dicom_value!(Strs, ["1.2.840.10008.5.1.4.1.1.2"]))
        );
        assert!(parse_value(VR::US, "-1").is_err());
        assert!(parse_value(VR::US, "70000").is_err());
        assert!(parse_value(VR::DS, "NaN").is_err());
        assert!(parse_value(VR::UI, "1.2.abc").is_err());
        assert!(parse_value(VR::OB, "00").is_err());
        assert!(parse_value(VR::PN, "   ").is_err());
    }
}
