//! Module containing data structures and readers of DICOM file meta information tables.
//!
//! The file meta group (group `0002`) is always encoded
//! in Explicit VR Little Endian,
//! regardless of the transfer syntax of the rest of the file.
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use minidcm_core::dicom_value;
use minidcm_core::header::{DataElement, DataElementHeader, HasLength, Header};
use minidcm_core::value::{EmptyObject, PrimitiveValue};
use minidcm_core::{Length, Tag, VR};
use minidcm_encoding::decode::{self, Decode};
use minidcm_encoding::encode::explicit::ExplicitVREncoder;
use minidcm_encoding::encode::Encode;
use minidcm_encoding::source::{self, ByteSource};
use minidcm_encoding::text::{DecodeTextError, SpecificCharacterSet, TextCodec};
use minidcm_encoding::Endianness;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{Read, Seek, Write};
use tracing::debug;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The next tag could not be read from the source.
    #[snafu(display("Could not peek the next tag"))]
    PeekTag {
        #[snafu(backtrace)]
        source: source::Error,
    },

    /// The file meta group parser could not fetch
    /// the value of a data element from its source.
    #[snafu(display("Could not read value of {}", tag))]
    ReadValueData {
        tag: Tag,
        #[snafu(backtrace)]
        source: source::Error,
    },

    /// The file meta group parser could not decode
    /// the text in one of its data elements.
    #[snafu(display("Could not decode text in {}", tag))]
    DecodeText {
        tag: Tag,
        #[snafu(backtrace)]
        source: DecodeTextError,
    },

    /// An issue occurred while decoding the next data element
    /// in the file meta data set.
    #[snafu(display("Could not decode data element header"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: decode::Error,
    },

    /// A required file meta data element is missing.
    #[snafu(display("Missing data element `{}`", alias))]
    MissingElement {
        alias: &'static str,
        backtrace: Backtrace,
    },

    /// The value length of a data elements in the file meta group
    /// was unexpected.
    #[snafu(display("Unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// The value length of a data element is undefined,
    /// but knowing the length is required in its context.
    #[snafu(display("Undefined value length for data element tagged {}", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },

    /// A data element could not be encoded.
    #[snafu(display("Could not encode data element {}", tag))]
    EncodeElement {
        tag: Tag,
        #[snafu(backtrace)]
        source: minidcm_encoding::encode::Error,
    },

    /// The file meta group data set could not be written.
    #[snafu(display("Could not write file meta group data set"))]
    WriteSet {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// DICOM File Meta Information Table.
///
/// Text values are kept without their trailing padding.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: [u8; 2],
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: String,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: String,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: String,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// Source Application Entity Title
    pub source_application_entity_title: Option<String>,
}

fn trim_text(text: &str) -> &str {
    text.trim_end_matches(|c: char| c == ' ' || c == '\0')
}

impl FileMetaTable {
    /// Read the file meta group from the current position of the source,
    /// which should be right after the `DICM` code.
    ///
    /// Reading stops at the first element outside of group `0002`.
    /// Only the transfer syntax is strictly required.
    pub fn read_from<R>(source: &mut ByteSource<R>) -> Result<Self>
    where
        R: Read + Seek,
    {
        let decoder = decode::file_header_decoder();
        let text = SpecificCharacterSet::Default;
        source.set_endianness(Endianness::Little);

        let mut builder = FileMetaTableBuilder::new();
        while source.remaining() >= 8 {
            let tag = source.peek_tag().context(PeekTagSnafu)?;
            if tag.group() != 0x0002 {
                break;
            }
            let (header, _) = decoder.decode_header(source).context(DecodeElementSnafu)?;
            let len = header
                .length()
                .get()
                .context(UndefinedValueLengthSnafu { tag })?;
            let value = source
                .read_bytes(len as usize)
                .context(ReadValueDataSnafu { tag })?;

            let read_text = |value: &[u8]| -> Result<String> {
                let s = text.decode(value).context(DecodeTextSnafu { tag })?;
                Ok(trim_text(&s).to_string())
            };

            builder = match tag {
                Tag(0x0002, 0x0000) => {
                    ensure!(
                        len == 4,
                        UnexpectedDataValueLengthSnafu {
                            tag,
                            length: header.length(),
                        }
                    );
                    builder.group_length(u32::from_le_bytes([
                        value[0], value[1], value[2], value[3],
                    ]))
                }
                Tag(0x0002, 0x0001) => {
                    ensure!(
                        len == 2,
                        UnexpectedDataValueLengthSnafu {
                            tag,
                            length: header.length(),
                        }
                    );
                    builder.information_version([value[0], value[1]])
                }
                Tag(0x0002, 0x0002) => builder.media_storage_sop_class_uid(read_text(&value)?),
                Tag(0x0002, 0x0003) => {
                    builder.media_storage_sop_instance_uid(read_text(&value)?)
                }
                Tag(0x0002, 0x0010) => builder.transfer_syntax(read_text(&value)?),
                Tag(0x0002, 0x0012) => builder.implementation_class_uid(read_text(&value)?),
                Tag(0x0002, 0x0013) => builder.implementation_version_name(read_text(&value)?),
                Tag(0x0002, 0x0016) => {
                    builder.source_application_entity_title(read_text(&value)?)
                }
                _ => {
                    debug!(%tag, "Ignoring file meta element");
                    builder
                }
            };
        }

        builder.build()
    }

    /// The transfer syntax UID without padding.
    pub fn transfer_syntax(&self) -> &str {
        trim_text(&self.transfer_syntax)
    }

    /// The media storage SOP class UID without padding.
    pub fn media_storage_sop_class_uid(&self) -> &str {
        trim_text(&self.media_storage_sop_class_uid)
    }

    /// The media storage SOP instance UID without padding.
    pub fn media_storage_sop_instance_uid(&self) -> &str {
        trim_text(&self.media_storage_sop_instance_uid)
    }

    /// Turn the table into data elements,
    /// excluding the group length.
    pub fn into_element_iter(self) -> impl Iterator<Item = DataElement<EmptyObject>> {
        let mut elems = vec![
            DataElement::new(
                Tag(0x0002, 0x0001),
                VR::OB,
                dicom_value!(U8, [self.information_version[0], self.information_version[1]]),
            ),
            DataElement::new(
                Tag(0x0002, 0x0002),
                VR::UI,
                PrimitiveValue::from(self.media_storage_sop_class_uid),
            ),
            DataElement::new(
                Tag(0x0002, 0x0003),
                VR::UI,
                PrimitiveValue::from(self.media_storage_sop_instance_uid),
            ),
            DataElement::new(
                Tag(0x0002, 0x0010),
                VR::UI,
                PrimitiveValue::from(self.transfer_syntax),
            ),
            DataElement::new(
                Tag(0x0002, 0x0012),
                VR::UI,
                PrimitiveValue::from(self.implementation_class_uid),
            ),
        ];
        if let Some(v) = self.implementation_version_name {
            elems.push(DataElement::new(
                Tag(0x0002, 0x0013),
                VR::SH,
                PrimitiveValue::from(v),
            ));
        }
        if let Some(v) = self.source_application_entity_title {
            elems.push(DataElement::new(
                Tag(0x0002, 0x0016),
                VR::AE,
                PrimitiveValue::from(v),
            ));
        }

        elems.into_iter()
    }

    /// Write the file meta group in Explicit VR Little Endian,
    /// led by a freshly computed group length.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let encoder = ExplicitVREncoder::new(Endianness::Little);
        let text = SpecificCharacterSet::Default;

        let mut body = Vec::new();
        for elem in self.clone().into_element_iter() {
            let tag = elem.tag();
            let value = elem
                .value()
                .primitive()
                .cloned()
                .unwrap_or(PrimitiveValue::Empty);
            let bytes = encoder
                .encode_primitive(elem.vr(), &value, &text)
                .context(EncodeElementSnafu { tag })?;
            encoder
                .encode_element_header(
                    &mut body,
                    DataElementHeader::new(tag, elem.vr(), Length(bytes.len() as u32)),
                )
                .context(EncodeElementSnafu { tag })?;
            body.extend_from_slice(&bytes);
        }

        let tag = Tag(0x0002, 0x0000);
        encoder
            .encode_element_header(&mut writer, DataElementHeader::new(tag, VR::UL, Length(4)))
            .context(EncodeElementSnafu { tag })?;
        writer
            .write_all(&(body.len() as u32).to_le_bytes())
            .context(WriteSetSnafu)?;
        writer.write_all(&body).context(WriteSetSnafu)
    }
}

/// A builder for DICOM meta information tables.
#[derive(Debug, Default, Clone)]
pub struct FileMetaTableBuilder {
    /// File Meta Information Group Length (UL)
    information_group_length: Option<u32>,
    /// File Meta Information Version (OB)
    information_version: Option<[u8; 2]>,
    /// Media Storage SOP Class UID (UI)
    media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID (UI)
    media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID (UI)
    transfer_syntax: Option<String>,
    /// Implementation Class UID (UI)
    implementation_class_uid: Option<String>,
    /// Implementation Version Name (SH)
    implementation_version_name: Option<String>,
    /// Source Application Entity Title (AE)
    source_application_entity_title: Option<String>,
}

impl FileMetaTableBuilder {
    /// Create a new, empty builder.
    pub fn new() -> FileMetaTableBuilder {
        FileMetaTableBuilder::default()
    }

    /// Define the meta information group length.
    pub fn group_length(mut self, value: u32) -> FileMetaTableBuilder {
        self.information_group_length = Some(value);
        self
    }

    /// Define the meta information version.
    pub fn information_version(mut self, value: [u8; 2]) -> FileMetaTableBuilder {
        self.information_version = Some(value);
        self
    }

    /// Define the media storage SOP class UID.
    pub fn media_storage_sop_class_uid<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.media_storage_sop_class_uid = Some(value.into());
        self
    }

    /// Define the media storage SOP instance UID.
    pub fn media_storage_sop_instance_uid<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.media_storage_sop_instance_uid = Some(value.into());
        self
    }

    /// Define the transfer syntax UID.
    pub fn transfer_syntax<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.transfer_syntax = Some(value.into());
        self
    }

    /// Define the implementation class UID.
    pub fn implementation_class_uid<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.implementation_class_uid = Some(value.into());
        self
    }

    /// Define the implementation version name.
    pub fn implementation_version_name<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.implementation_version_name = Some(value.into());
        self
    }

    /// Define the source application entity title.
    pub fn source_application_entity_title<T>(mut self, value: T) -> FileMetaTableBuilder
    where
        T: Into<String>,
    {
        self.source_application_entity_title = Some(value.into());
        self
    }

    /// Build the table.
    ///
    /// Only the transfer syntax is required.
    /// The implementation class UID and version name
    /// default to the ones of this library,
    /// and the group length is computed if not given.
    pub fn build(self) -> Result<FileMetaTable> {
        let transfer_syntax = self
            .transfer_syntax
            .context(MissingElementSnafu {
                alias: "TransferSyntaxUID",
            })?;
        let implementation_version_name = match (
            &self.implementation_class_uid,
            self.implementation_version_name,
        ) {
            (None, None) => Some(IMPLEMENTATION_VERSION_NAME.to_string()),
            (_, name) => name,
        };

        let mut table = FileMetaTable {
            information_group_length: 0,
            information_version: self.information_version.unwrap_or([0, 1]),
            media_storage_sop_class_uid: self.media_storage_sop_class_uid.unwrap_or_default(),
            media_storage_sop_instance_uid: self
                .media_storage_sop_instance_uid
                .unwrap_or_default(),
            transfer_syntax,
            implementation_class_uid: self
                .implementation_class_uid
                .unwrap_or_else(|| IMPLEMENTATION_CLASS_UID.to_string()),
            implementation_version_name,
            source_application_entity_title: self.source_application_entity_title,
        };

        table.information_group_length = match self.information_group_length {
            Some(len) => len,
            None => table
                .clone()
                .into_element_iter()
                .map(|e| {
                    let header = if e.vr().has_long_length() { 12 } else { 8 };
                    header + e.value().primitive().map_or(0, |v| v.calculate_byte_len()) as u32
                })
                .sum(),
        };
        Ok(table)
    }
}
