use minidcm_core::dictionary::tags;
use minidcm_core::{dicom_value, DataElement, PrimitiveValue, VR};
use minidcm_object::{
    ElementStatus, FileDicomObject, FileMetaTableBuilder, InMemDicomObject, IssueKind,
    OverallStatus, Provenance,
};
use minidcm_viewer::handler::Error;
use minidcm_viewer::remediation;
use minidcm_viewer::{Decision, DicomHandler, Preferences};
use rstest::rstest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

fn ct_image(ts: &str, pixels: Option<Vec<u16>>) -> FileDicomObject<InMemDicomObject> {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("2.25.77")
        .transfer_syntax(ts)
        .build()
        .expect("meta group should be complete");

    let mut obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Strs, [CT_IMAGE_STORAGE])),
        DataElement::new(tags::STUDY_DATE, VR::DA, dicom_value!(Strs, ["20240131"])),
        DataElement::new(tags::MODALITY, VR::CS, dicom_value!(Strs, ["CT"])),
        DataElement::new(tags::PATIENT_NAME, VR::PN, dicom_value!(Strs, ["Doe^Jane"])),
        DataElement::new(tags::PATIENT_ID, VR::LO, dicom_value!(Strs, ["ID0042"])),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, dicom_value!(U16, [1])),
        DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            dicom_value!(Strs, ["MONOCHROME2"]),
        ),
        DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [2])),
        DataElement::new(tags::COLUMNS, VR::US, dicom_value!(U16, [2])),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, dicom_value!(U16, [16])),
        DataElement::new(tags::BITS_STORED, VR::US, dicom_value!(U16, [12])),
        DataElement::new(tags::HIGH_BIT, VR::US, dicom_value!(U16, [11])),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, dicom_value!(U16, [0])),
        DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, dicom_value!(F64, [-1024.])),
        DataElement::new(tags::RESCALE_SLOPE, VR::DS, dicom_value!(F64, [2.])),
    ]);
    if let Some(pixels) = pixels {
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(pixels.into()),
        ));
    }
    FileDicomObject::new(meta, obj)
}

fn write_file(dir: &Path, name: &str, obj: &FileDicomObject<InMemDicomObject>) -> PathBuf {
    let path = dir.join(name);
    obj.write_to_file(&path).unwrap();
    path
}

/// Preamble, magic code and meta group, followed by the given data set bytes.
fn raw_file(ts: &str, body: &[u8]) -> Vec<u8> {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("2.25.77")
        .transfer_syntax(ts)
        .build()
        .unwrap();
    let mut bytes = vec![0; 128];
    bytes.extend_from_slice(b"DICM");
    meta.write(&mut bytes).unwrap();
    bytes.extend_from_slice(body);
    bytes
}

#[rstest]
#[case(true)]
#[case(false)]
fn load_complete_file(#[case] defer: bool) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ct.dcm",
        &ct_image(EXPLICIT_VR_LE, Some(vec![1024, 1536, 0, 4095])),
    );

    let mut handler = DicomHandler::new(Preferences {
        defer_pixel_data: defer,
        ..Preferences::default()
    })
    .unwrap();
    let loaded = handler.load_file(&path).unwrap();
    assert!(loaded.warnings.is_empty());
    assert!(loaded.pending.is_none());
    assert_eq!(loaded.validation.overall(), OverallStatus::Valid);

    assert_eq!(
        handler.metadata().unwrap(),
        vec![
            ("PatientName", "Doe^Jane".to_string()),
            ("PatientID", "ID0042".to_string()),
            ("Modality", "CT".to_string()),
            ("StudyDate", "20240131".to_string()),
        ]
    );

    let rows = handler.elements().unwrap();
    assert!(rows.windows(2).all(|w| w[0].tag < w[1].tag));
    let modality = rows.iter().find(|r| r.tag == tags::MODALITY).unwrap();
    assert_eq!(modality.alias.as_deref(), Some("Modality"));
    assert_eq!(modality.vr, VR::CS);
    assert_eq!(modality.value, "CT");

    assert_eq!(handler.frame_count().unwrap(), 1);
    let frame = handler.frame(0).unwrap();
    // slope 2, intercept -1024
    assert_eq!(frame.rescaled, vec![1024., 2048., -1024., 7166.]);
}

#[test]
fn frames_are_cached_until_the_next_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ct.dcm",
        &ct_image(EXPLICIT_VR_LE, Some(vec![1024, 1536, 0, 4095])),
    );

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    handler.load_file(&path).unwrap();
    let first = handler.frame(0).unwrap();
    let again = handler.frame(0).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let uncached = handler.decode_frame(0).unwrap();
    assert_eq!(uncached, *first);

    handler.load_file(&path).unwrap();
    let reloaded = handler.frame(0).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(*first, *reloaded);
}

#[test]
fn concurrent_frame_requests_share_one_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ct.dcm",
        &ct_image(EXPLICIT_VR_LE, Some(vec![1024, 1536, 0, 4095])),
    );

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    handler.load_file(&path).unwrap();
    let handler = &handler;
    let buffers: Vec<_> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..4).map(|_| s.spawn(move || handler.frame(0))).collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap().unwrap())
            .collect()
    });

    let cached = handler.frame(0).unwrap();
    // racing requests all hand out the buffer that was stored first
    assert!(buffers.iter().all(|buffer| Arc::ptr_eq(buffer, &cached)));
    assert!(Arc::ptr_eq(&cached, &handler.frame(0).unwrap()));
}

#[test]
fn load_from_memory_with_deferred_pixel_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ct.dcm",
        &ct_image("1.2.840.10008.1.2.2", Some(vec![1024, 1536, 0, 4095])),
    );
    let bytes = std::fs::read(&path).unwrap();

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    let loaded = handler.load_bytes(bytes).unwrap();
    assert!(loaded
        .object
        .get(tags::PIXEL_DATA)
        .unwrap()
        .value()
        .deferred()
        .is_some());
    let frame = handler.frame(0).unwrap();
    assert_eq!(frame.rescaled, vec![1024., 2048., -1024., 7166.]);
}

#[test]
fn missing_pixel_data_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "nopixels.dcm", &ct_image(EXPLICIT_VR_LE, None));

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    let loaded = handler.load_file(&path).unwrap();
    assert_eq!(loaded.validation.overall(), OverallStatus::MissingRequired);
    assert_eq!(loaded.validation.missing(), vec![tags::PIXEL_DATA]);
    let pending = loaded.pending.as_ref().unwrap();
    assert_eq!(pending.missing.len(), 1);
    assert_eq!(pending.missing[0].tag, tags::PIXEL_DATA);
    assert_eq!(pending.missing[0].alias, "PixelData");

    // placeholders are never made up for pixel data
    let validation = handler.apply_decision(Decision::FillDefaults).unwrap();
    assert_eq!(validation.missing(), vec![tags::PIXEL_DATA]);

    let validation = handler.apply_decision(Decision::Continue).unwrap();
    assert_eq!(validation.overall(), OverallStatus::MissingRequired);
    assert!(handler.current().is_some());
    assert!(matches!(
        handler.frame(0),
        Err(Error::Pixel {
            source: minidcm_pixeldata::Error::MissingPixelData { .. },
            ..
        })
    ));
}

fn without(tag: minidcm_core::Tag) -> FileDicomObject<InMemDicomObject> {
    let mut obj = ct_image(EXPLICIT_VR_LE, Some(vec![0, 1, 2, 3]));
    obj.remove(tag);
    obj
}

#[test]
fn supplied_values_are_marked() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "noid.dcm", &without(tags::PATIENT_ID));

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    let loaded = handler.load_file(&path).unwrap();
    assert_eq!(loaded.validation.missing(), vec![tags::PATIENT_ID]);

    let values = BTreeMap::from([(tags::PATIENT_ID, "12345".to_string())]);
    let validation = handler.apply_decision(Decision::Supply(values)).unwrap();
    assert!(validation.is_valid());
    assert_eq!(
        validation.status(tags::PATIENT_ID),
        Some(ElementStatus::Present {
            provenance: Provenance::UserSupplied
        })
    );
    let loaded = handler.current().unwrap();
    assert!(loaded.pending.is_none());
    assert_eq!(loaded.object.string(tags::PATIENT_ID).as_deref(), Some("12345"));
}

#[test]
fn bad_supplied_values_change_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "nodate.dcm", &without(tags::STUDY_DATE));

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    handler.load_file(&path).unwrap();

    let values = BTreeMap::from([(tags::PATIENT_NAME, "Someone^Else".to_string())]);
    assert!(matches!(
        handler.apply_decision(Decision::Supply(values)),
        Err(Error::Remediation {
            source: remediation::Error::NotPending { .. }
        })
    ));

    let values = BTreeMap::from([(tags::STUDY_DATE, "yesterday".to_string())]);
    assert!(matches!(
        handler.apply_decision(Decision::Supply(values)),
        Err(Error::Remediation {
            source: remediation::Error::InvalidSuppliedValue { .. }
        })
    ));

    let loaded = handler.current().unwrap();
    assert!(!loaded.object.contains(tags::STUDY_DATE));
    assert_eq!(loaded.validation.missing(), vec![tags::STUDY_DATE]);
}

#[test]
fn abort_unloads_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "noname.dcm", &without(tags::PATIENT_NAME));

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    handler.load_file(&path).unwrap();
    assert!(matches!(
        handler.apply_decision(Decision::Abort),
        Err(Error::Aborted)
    ));
    assert!(handler.current().is_none());
    assert!(matches!(handler.metadata(), Err(Error::NoFileLoaded)));
}

#[test]
fn inconsistent_pixel_data_keeps_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "short.dcm",
        &ct_image(EXPLICIT_VR_LE, Some(vec![0, 1])),
    );

    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    let loaded = handler.load_file(&path).unwrap();
    assert_eq!(loaded.validation.overall(), OverallStatus::Valid);
    assert!(matches!(
        handler.frame(0),
        Err(Error::Pixel {
            source: minidcm_pixeldata::Error::InconsistentDimensions {
                expected: 8,
                actual: 4,
                ..
            },
            ..
        })
    ));
    assert_eq!(handler.metadata().unwrap().len(), 4);
    assert!(handler.current().is_some());
}

#[test]
fn duplicate_tags_are_reported() {
    #[rustfmt::skip]
    let body: &[u8] = &[
        // (0008,0060) Modality ; CS ; 2 ; "CT"
        0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T',
        // (0008,0060) Modality ; CS ; 2 ; "MR"
        0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'R',
    ];
    let mut handler = DicomHandler::new(Preferences::default()).unwrap();
    let loaded = handler.load_bytes(raw_file(EXPLICIT_VR_LE, body)).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].tag, Some(tags::MODALITY));
    assert_eq!(loaded.warnings[0].kind, IssueKind::DuplicateTag {});
    assert_eq!(loaded.object.string(tags::MODALITY).as_deref(), Some("MR"));
    assert_eq!(
        handler.metadata().unwrap(),
        vec![("Modality", "MR".to_string())]
    );
}

#[test]
fn oversized_files_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ct.dcm",
        &ct_image(EXPLICIT_VR_LE, Some(vec![0, 1, 2, 3])),
    );

    let mut handler = DicomHandler::new(Preferences {
        max_file_size: 256,
        ..Preferences::default()
    })
    .unwrap();
    assert!(matches!(
        handler.load_file(&path),
        Err(Error::FileTooLarge { max: 256, .. })
    ));
    let bytes = std::fs::read(&path).unwrap();
    assert!(matches!(
        handler.load_bytes(bytes),
        Err(Error::FileTooLarge { max: 256, .. })
    ));
}

#[test]
fn unreadable_inputs() {
    let mut handler = DicomHandler::new(Preferences::default()).unwrap();

    assert!(matches!(
        handler.load_file("/definitely/not/here.dcm"),
        Err(Error::Io { .. })
    ));

    let mut bytes = vec![0; 200];
    bytes[128..132].copy_from_slice(b"DICN");
    assert!(matches!(
        handler.load_bytes(bytes),
        Err(Error::NotDicom { .. })
    ));
    assert!(matches!(
        handler.load_bytes(b"DICM".to_vec()),
        Err(Error::NotDicom { .. })
    ));

    let deflated = raw_file("1.2.840.10008.1.2.1.99", &[0x78, 0x9C, 0x03, 0x00]);
    match handler.load_bytes(deflated) {
        Err(Error::UnsupportedTransferSyntax { uid, .. }) => {
            assert_eq!(uid, "1.2.840.10008.1.2.1.99")
        }
        other => panic!("unexpected outcome {:?}", other.map(|_| ())),
    }

    let mut truncated = raw_file(EXPLICIT_VR_LE, &[]);
    truncated.truncate(150);
    assert!(matches!(
        handler.load_bytes(truncated),
        Err(Error::MetaGroup { .. })
    ));
    assert!(handler.current().is_none());
}
