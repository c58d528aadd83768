use minidcm_core::prelude::*;

#[test]
fn can_use_prelude() {
    // can refer to `DataElement`, `Tag`, `VR`, and `dicom_value!`
    let elem: DataElement<minidcm_core::value::EmptyObject> = DataElement::new(
        Tag(0x0010, 0x0010),
        VR::PN,
        dicom_value!(Str, "Simões^João"),
    );
    // 13 bytes of UTF-8, padded to an even length
    let length = elem.length().0;
    assert_eq!(length as usize, "Simões^João".len() + 1);

    // can call `by_tag`
    assert_eq!(
        minidcm_core::dictionary::StubDataDictionary.by_tag(Tag(0x0010, 0x0010)),
        None,
    );
}
