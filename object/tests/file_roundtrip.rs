use minidcm_core::dictionary::tags;
use minidcm_core::value::{DataSetSequence, PixelFragmentSequence, Value};
use minidcm_core::{dicom_value, DataElement, Tag, VR};
use minidcm_encoding::text::SpecificCharacterSet;
use minidcm_object::{
    open_file, FileDicomObject, FileMetaTableBuilder, InMemDicomObject, OverallStatus,
    ReadOptions, RequiredElementPolicy,
};
use rstest::rstest;

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

fn sample_object(ts: &str) -> FileDicomObject<InMemDicomObject> {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("2.25.1234")
        .transfer_syntax(ts)
        .build()
        .expect("meta group should be complete");

    let item = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::REFERENCED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Strs, [CT_IMAGE_STORAGE]),
        ),
        DataElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Strs, ["2.25.99"]),
        ),
    ]);

    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Strs, [CT_IMAGE_STORAGE])),
        DataElement::new(tags::STUDY_DATE, VR::DA, dicom_value!(Strs, ["20240131"])),
        DataElement::new(tags::MODALITY, VR::CS, dicom_value!(Strs, ["CT"])),
        DataElement::new(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![item]),
        ),
        DataElement::new(tags::PATIENT_NAME, VR::PN, dicom_value!(Strs, ["Doe^John"])),
        DataElement::new(tags::PATIENT_ID, VR::LO, dicom_value!(Strs, ["ID0001"])),
        DataElement::new(tags::PATIENT_COMMENTS, VR::LT, dicom_value!(Str, "none")),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, dicom_value!(I32, [3])),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, dicom_value!(U16, [1])),
        DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            dicom_value!(Strs, ["MONOCHROME2"]),
        ),
        DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [2])),
        DataElement::new(tags::COLUMNS, VR::US, dicom_value!(U16, [2])),
        DataElement::new(tags::PIXEL_SPACING, VR::DS, dicom_value!(F64, [0.5, 0.25])),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, dicom_value!(U16, [16])),
        DataElement::new(tags::BITS_STORED, VR::US, dicom_value!(U16, [12])),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, dicom_value!(U16, [0])),
        DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, dicom_value!(F64, [-1024.])),
        DataElement::new(tags::RESCALE_SLOPE, VR::DS, dicom_value!(F64, [1.])),
        DataElement::new(tags::PIXEL_DATA, VR::OW, dicom_value!(U16, [0, 1024, 2048, 4095])),
    ]);
    FileDicomObject::new(meta, obj)
}

#[rstest]
#[case("1.2.840.10008.1.2")]
#[case("1.2.840.10008.1.2.1")]
#[case("1.2.840.10008.1.2.2")]
fn write_then_read_gives_back_the_same_object(#[case] ts: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.dcm");

    let obj = sample_object(ts);
    obj.write_to_file(&path).unwrap();

    let outcome = open_file(&path, &ReadOptions::default()).unwrap();
    assert_eq!(outcome.issues, vec![]);
    assert_eq!(outcome.object.meta(), obj.meta());
    assert_eq!(outcome.object, obj);

    let result = RequiredElementPolicy::default().validate(&outcome.object, &outcome.issues);
    assert_eq!(result.overall(), OverallStatus::Valid);
}

#[test]
fn encapsulated_pixel_data_roundtrip() {
    let mut obj = sample_object("1.2.840.10008.1.2.5");
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PixelFragmentSequence::new(vec![0_u32], vec![vec![0x00, 0x01, 0x02, 0x03]]),
    ));

    let mut bytes = Vec::new();
    obj.write_all(&mut bytes).unwrap();
    let outcome =
        minidcm_object::from_reader(std::io::Cursor::new(bytes), &ReadOptions::default())
            .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.object, obj);
}

#[test]
fn character_set_survives_roundtrip() {
    let mut obj = sample_object("1.2.840.10008.1.2.1");
    obj.put(DataElement::new(
        tags::SPECIFIC_CHARACTER_SET,
        VR::CS,
        dicom_value!(Strs, ["ISO_IR 100"]),
    ));
    obj.set_charset(SpecificCharacterSet::IsoIr100);
    obj.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        dicom_value!(Strs, ["Müller^José"]),
    ));

    let mut bytes = Vec::new();
    obj.write_all(&mut bytes).unwrap();
    // Latin-1 encoded, one byte per character
    assert!(bytes.windows(11).any(|w| w == b"M\xFCller^Jos\xE9"));

    let outcome =
        minidcm_object::from_reader(std::io::Cursor::new(bytes), &ReadOptions::default())
            .unwrap();
    assert_eq!(
        outcome.object.string(tags::PATIENT_NAME).as_deref(),
        Some("Müller^José")
    );
}

#[test]
fn deferred_pixel_data_points_into_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deferred.dcm");
    sample_object("1.2.840.10008.1.2.1")
        .write_to_file(&path)
        .unwrap();

    let outcome = open_file(&path, &ReadOptions::new().defer_pixel_data(true)).unwrap();
    let range = outcome
        .object
        .get(Tag::PIXEL_DATA)
        .and_then(|e| e.value().deferred())
        .expect("pixel data should be deferred");
    assert_eq!(range.len, 8);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(range.end(), bytes.len() as u64);
    assert_eq!(
        &bytes[range.offset as usize..range.end() as usize],
        &[0x00, 0x00, 0x00, 0x04, 0x00, 0x08, 0xFF, 0x0F]
    );

    // everything else is still loaded
    assert!(matches!(
        outcome.object.get(tags::ROWS).map(|e| e.value()),
        Some(Value::Primitive(_))
    ));
}

#[test]
fn missing_pixel_data_is_reported() {
    let mut obj = sample_object("1.2.840.10008.1.2.1");
    obj.remove(tags::PIXEL_DATA);
    let mut bytes = Vec::new();
    obj.write_all(&mut bytes).unwrap();

    let outcome =
        minidcm_object::from_reader(std::io::Cursor::new(bytes), &ReadOptions::default())
            .unwrap();
    let result = RequiredElementPolicy::default().validate(&outcome.object, &outcome.issues);
    assert_eq!(result.overall(), OverallStatus::MissingRequired);
    assert_eq!(result.missing(), vec![tags::PIXEL_DATA]);
}
