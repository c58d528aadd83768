//! Writing in-memory objects back into DICOM Part-10 files.
//!
//! Sequences and items are always written with undefined length,
//! closed by delimiters,
//! so that nothing needs to be measured in advance.
use crate::mem::{InMemDicomObject, InMemElement};
use crate::meta;
use crate::FileDicomObject;
use minidcm_core::dictionary::DataDictionary;
use minidcm_core::header::{DataElementHeader, Header};
use minidcm_core::value::{PixelFragmentSequence, Value};
use minidcm_core::{Length, Tag, VR};
use minidcm_encoding::encode::basic::BasicEncoder;
use minidcm_encoding::encode::{self, BasicEncode, EncodeTo};
use minidcm_encoding::text::SpecificCharacterSet;
use minidcm_encoding::transfer_syntax::{self, DynEncoder};
use minidcm_encoding::{Endianness, TransferSyntax};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const PREAMBLE: [u8; 128] = [0; 128];

/// An error which may occur when writing a DICOM object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("Could not encode data element {}", tag))]
    EncodeElement {
        tag: Tag,
        #[snafu(backtrace)]
        source: encode::Error,
    },
    #[snafu(display("Could not write value of data element {}", tag))]
    WriteValue {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    /// The value of the element was left in its source when it was read.
    #[snafu(display("Value of data element {} was not loaded", tag))]
    DeferredValue { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Value of data element {} is too long ({} bytes)", tag, len))]
    ValueTooLong {
        tag: Tag,
        len: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not create file '{}'", filename.display()))]
    CreateFile {
        filename: PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not write file preamble"))]
    WritePreamble {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not write file meta group"))]
    WriteMeta {
        #[snafu(backtrace)]
        source: meta::Error,
    },
    #[snafu(display("Could not flush the written data"))]
    Flush {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Cannot encode data set in transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
}

pub type Result<T, E = WriteError> = std::result::Result<T, E>;

/// A writer of data sets in a given transfer syntax.
pub struct DataSetWriter<'w, W: ?Sized + 'w> {
    to: &'w mut W,
    encoder: DynEncoder<'w, W>,
    endianness: Endianness,
    charset: SpecificCharacterSet,
}

impl<'w, W> std::fmt::Debug for DataSetWriter<'w, W>
where
    W: ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSetWriter")
            .field("endianness", &self.endianness)
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

impl<'w, W> DataSetWriter<'w, W>
where
    W: ?Sized + Write + 'w,
{
    /// Create a data set writer for the given transfer syntax.
    ///
    /// Fails if data sets cannot be encoded in that transfer syntax.
    pub fn new(to: &'w mut W, ts: &TransferSyntax) -> Result<Self> {
        let encoder = ts
            .encoder_for()
            .context(UnsupportedTransferSyntaxSnafu { uid: ts.uid() })?;
        Ok(DataSetWriter {
            to,
            encoder,
            endianness: ts.endianness(),
            charset: SpecificCharacterSet::Default,
        })
    }

    /// Write all elements of a data set, in tag order.
    pub fn write_dataset<D>(&mut self, obj: &InMemDicomObject<D>) -> Result<()>
    where
        D: DataDictionary,
    {
        let parent_charset = self.charset;
        self.charset = obj.charset();
        for elem in obj {
            self.write_element(elem)?;
        }
        self.charset = parent_charset;
        Ok(())
    }

    fn write_element<D>(&mut self, elem: &InMemElement<D>) -> Result<()>
    where
        D: DataDictionary,
    {
        let tag = elem.tag();
        match elem.value() {
            Value::Primitive(value) => {
                let bytes = self
                    .encoder
                    .encode_primitive(elem.vr(), value, &self.charset)
                    .context(EncodeElementSnafu { tag })?;
                ensure!(
                    bytes.len() < Length::UNDEFINED.0 as usize,
                    ValueTooLongSnafu {
                        tag,
                        len: bytes.len()
                    }
                );
                self.write_header(tag, elem.vr(), Length(bytes.len() as u32))?;
                self.to.write_all(&bytes).context(WriteValueSnafu { tag })
            }
            Value::Sequence(seq) => {
                self.write_header(tag, VR::SQ, Length::UNDEFINED)?;
                for item in seq.items() {
                    self.encoder
                        .encode_item_header(&mut *self.to, Length::UNDEFINED.0)
                        .context(EncodeElementSnafu { tag })?;
                    self.write_dataset(item)?;
                    self.encoder
                        .encode_item_delimiter(&mut *self.to)
                        .context(EncodeElementSnafu { tag })?;
                }
                self.encoder
                    .encode_sequence_delimiter(&mut *self.to)
                    .context(EncodeElementSnafu { tag })
            }
            Value::PixelSequence(seq) => self.write_pixel_sequence(tag, elem.vr(), seq),
            Value::Deferred(_) => DeferredValueSnafu { tag }.fail(),
        }
    }

    fn write_header(&mut self, tag: Tag, vr: VR, len: Length) -> Result<()> {
        self.encoder
            .encode_element_header(&mut *self.to, DataElementHeader::new(tag, vr, len))
            .context(EncodeElementSnafu { tag })?;
        Ok(())
    }

    fn write_pixel_sequence(&mut self, tag: Tag, vr: VR, seq: &PixelFragmentSequence) -> Result<()> {
        self.write_header(tag, vr, Length::UNDEFINED)?;

        let basic = BasicEncoder::new(self.endianness);
        let offset_table = seq.offset_table();
        self.encoder
            .encode_item_header(&mut *self.to, offset_table.len() as u32 * 4)
            .context(EncodeElementSnafu { tag })?;
        for offset in offset_table {
            basic
                .encode_ul(&mut *self.to, *offset)
                .context(WriteValueSnafu { tag })?;
        }

        for fragment in seq.fragments() {
            let padded_len = (fragment.len() + 1) & !1;
            ensure!(
                padded_len < Length::UNDEFINED.0 as usize,
                ValueTooLongSnafu {
                    tag,
                    len: fragment.len()
                }
            );
            self.encoder
                .encode_item_header(&mut *self.to, padded_len as u32)
                .context(EncodeElementSnafu { tag })?;
            self.to.write_all(fragment).context(WriteValueSnafu { tag })?;
            if padded_len != fragment.len() {
                self.to.write_all(&[0]).context(WriteValueSnafu { tag })?;
            }
        }

        self.encoder
            .encode_sequence_delimiter(&mut *self.to)
            .context(EncodeElementSnafu { tag })
    }
}

impl<D> FileDicomObject<InMemDicomObject<D>>
where
    D: DataDictionary,
{
    /// Write the entire object as a DICOM file:
    /// the preamble, the magic code, the file meta group,
    /// and the data set in the transfer syntax declared by the meta group.
    pub fn write_all<W: Write>(&self, to: W) -> Result<()> {
        let mut to = to;
        let uid = self.meta().transfer_syntax();
        let ts = transfer_syntax::get(uid).context(UnsupportedTransferSyntaxSnafu { uid })?;

        to.write_all(&PREAMBLE).context(WritePreambleSnafu)?;
        to.write_all(b"DICM").context(WritePreambleSnafu)?;
        self.meta().write(&mut to).context(WriteMetaSnafu)?;

        DataSetWriter::new(&mut to, ts)?.write_dataset(self)?;
        to.flush().context(FlushSnafu)
    }

    /// Write the entire object as a DICOM file at the given path.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).context(CreateFileSnafu { filename: path })?;
        self.write_all(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidcm_core::dictionary::tags;
    use minidcm_core::value::{ByteRange, DataSetSequence};
    use minidcm_core::{dicom_value, DataElement};
    use minidcm_encoding::transfer_syntax::{EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN};

    fn write_explicit_le(obj: &InMemDicomObject) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        DataSetWriter::new(&mut out, &EXPLICIT_VR_LITTLE_ENDIAN)?.write_dataset(obj)?;
        Ok(out)
    }

    #[test]
    fn write_primitive_elements() {
        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(tags::MODALITY, VR::CS, dicom_value!(Strs, ["CT"])),
            DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [512])),
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Strs, ["1.2.3"])),
        ]);
        let out = write_explicit_le(&obj).unwrap();
        #[rustfmt::skip]
        let expected: &[u8] = &[
            // (0008,0016) SOPClassUID ; UI ; 6 ; "1.2.3\0"
            0x08, 0x00, 0x16, 0x00, b'U', b'I', 0x06, 0x00, b'1', b'.', b'2', b'.', b'3', 0x00,
            // (0008,0060) Modality ; CS ; 2 ; "CT"
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T',
            // (0028,0010) Rows ; US ; 2 ; 512
            0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x00, 0x02,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn sequences_are_written_with_delimiters() {
        let item = InMemDicomObject::from_element_iter([DataElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Strs, ["1.2.3.4"]),
        )]);
        let obj = InMemDicomObject::from_element_iter([DataElement::new(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![item]),
        )]);

        let mut out = Vec::new();
        DataSetWriter::new(&mut out, &IMPLICIT_VR_LITTLE_ENDIAN)
            .unwrap()
            .write_dataset(&obj)
            .unwrap();
        #[rustfmt::skip]
        let expected: &[u8] = &[
            // (0008,1140) ReferencedImageSequence ; undefined length
            0x08, 0x00, 0x40, 0x11, 0xFF, 0xFF, 0xFF, 0xFF,
            // item, undefined length
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF,
            // (0008,1155) ReferencedSOPInstanceUID ; 8 ; "1.2.3.4\0"
            0x08, 0x00, 0x55, 0x11, 0x08, 0x00, 0x00, 0x00,
            b'1', b'.', b'2', b'.', b'3', b'.', b'4', 0x00,
            // item delimiter
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00,
            // sequence delimiter
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn pixel_fragments_are_padded() {
        let obj = InMemDicomObject::from_element_iter([DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PixelFragmentSequence::new(Vec::<u32>::new(), vec![vec![0xAA, 0xBB, 0xCC]]),
        )]);
        let out = write_explicit_le(&obj).unwrap();
        #[rustfmt::skip]
        let expected: &[u8] = &[
            // (7FE0,0010) PixelData ; OB ; undefined length
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            // empty offset table
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00,
            // fragment ; 4
            0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0x00,
            // sequence delimiter
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn deferred_values_cannot_be_written() {
        let obj = InMemDicomObject::from_element_iter([DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            ByteRange {
                offset: 300,
                len: 8,
            },
        )]);
        let err = write_explicit_le(&obj).unwrap_err();
        assert!(matches!(
            err,
            WriteError::DeferredValue {
                tag: tags::PIXEL_DATA,
                ..
            }
        ));
    }

    #[test]
    fn short_length_overflow_is_an_error() {
        let obj = InMemDicomObject::from_element_iter([DataElement::new(
            tags::PATIENT_COMMENTS,
            VR::LT,
            "x".repeat(70_000),
        )]);
        let err = write_explicit_le(&obj).unwrap_err();
        assert!(matches!(err, WriteError::EncodeElement { .. }));
    }
}
