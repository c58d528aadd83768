//! Explicit VR Little Endian syntax transfer implementation

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    check_undefined_length, impl_decode_from, BadSequenceHeaderSnafu, BasicDecode, Decode,
    InvalidVrSnafu, ReadHeaderTagSnafu, ReadItemHeaderSnafu, ReadItemLengthSnafu,
    ReadLengthSnafu, ReadReservedSnafu, ReadTagSnafu, ReadVrSnafu, Result,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use minidcm_core::header::{DataElementHeader, Length, SequenceItemHeader};
use minidcm_core::{Tag, VR};
use snafu::{OptionExt, ResultExt};
use std::io::Read;

/// A data element decoder for the Explicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl Decode for ExplicitVRLittleEndianDecoder {
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadHeaderTagSnafu)?;

        let mut buf = [0u8; 4];
        if tag.group() == 0xFFFE {
            // item delimiters do not have VR or reserved field
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok((DataElementHeader::new(tag, VR::UN, Length(len)), 8));
        }

        // retrieve explicit VR
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let code = [buf[0], buf[1]];
        let vr = VR::from_binary(code).context(InvalidVrSnafu { tag, code })?;

        // retrieve data length
        let (len, bytes_read) = if vr.has_long_length() {
            // 2 reserved bytes, then a 32-bit length
            source
                .read_exact(&mut buf[0..2])
                .context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            (LittleEndian::read_u32(&buf), 12)
        } else {
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            (u32::from(LittleEndian::read_u16(&buf[0..2])), 8)
        };

        let header = DataElementHeader::new(tag, vr, Length(len));
        check_undefined_length(&header)?;
        Ok((header, bytes_read))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        // retrieve tag
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;
        Ok(Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        ))
    }
}

impl_decode_from!(ExplicitVRLittleEndianDecoder);

#[cfg(test)]
mod tests {
    use super::ExplicitVRLittleEndianDecoder;
    use crate::decode::{Decode, Error};
    use minidcm_core::header::{HasLength, Header, Length, SequenceItemHeader};
    use minidcm_core::{Tag, VR};
    use std::io::{Cursor, Read};

    // manually crafting some DICOM data elements
    #[rustfmt::skip]
    const RAW: &[u8] = &[
        0x02, 0x00, 0x10, 0x00,     // (0002,0010) (LE) Transfer Syntax UID
            b'U', b'I',             // VR: UI (UID)
            0x14, 0x00,             // Length: 20 bytes (LE)
                // UID: 1.2.840.10008.1.2.1 (ExplicitVRLittleEndian)
                b'1', b'.', b'2', b'.', b'8', b'4', b'0', b'.', b'1', b'0', b'0', b'0', b'8', b'.',
                b'1', b'.', b'2', b'.', b'1',
                0x00,               // Padding to make length even
        0x08, 0x00, 0x60, 0x00,     // (0008,0060) (LE) Modality
            b'C', b'S',             // VR: CS (Code String)
            0x02, 0x00,             // Length: 2 bytes (LE)
                b'C', b'T',
        0x10, 0x00, 0x10, 0x00,     // (0010,0010) (LE) Patient Name
            b'P', b'N',             // VR: PN (Person Name)
            0x08, 0x00,             // Length: 8 bytes (LE)
                // String: "Doe^John"
                b'D', b'o', b'e', b'^', b'J', b'o', b'h', b'n',
        0x28, 0x00, 0x10, 0x00,     // (0028,0010) (LE) Rows
            b'U', b'S',             // VR: US (Unsigned Short)
            0x02, 0x00,             // Length: 2 bytes (LE)
                0x00, 0x02,         // Value: 512 (LE)
        0x29, 0x00, 0x10, 0x10,     // (0029,1010) (LE) private data element
            b'U', b'N',             // VR: UN (Unknown)
            0x00, 0x00,             // Reserved, always 0
            0x06, 0x00, 0x00, 0x00, // Length: 6 bytes (LE)
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
        0x18, 0x00, 0x17, 0x99,     // (0018,9917) (LE) Instruction Description
            b'U', b'T',             // VR: UT (Unlimited Text)
            0x00, 0x00,             // Reserved, always 0
            0x08, 0x00, 0x00, 0x00, // Length: 8 bytes (LE)
                // String: "No text"
                b'N', b'o', b' ', b't', b'e', b'x', b't',
                b' ',               // Padding to make length even
        0xE0, 0x7F, 0x10, 0x00,     // (7FE0,0010) (LE) Pixel Data
            b'O', b'W',             // VR: OW (Other Word)
            0x00, 0x00,             // Reserved, always 0
            0x04, 0x00, 0x00, 0x00, // Length: 4 bytes (LE)
                0x01, 0x00, 0x02, 0x00,
    ];

    fn skip_value(cursor: &mut Cursor<&[u8]>, len: Length) {
        let n = len.get().expect("defined length") as u64;
        cursor.set_position(cursor.position() + n);
    }

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);

        let expected = [
            (Tag(0x0002, 0x0010), VR::UI, 20, 8),
            (Tag(0x0008, 0x0060), VR::CS, 2, 8),
            (Tag(0x0010, 0x0010), VR::PN, 8, 8),
            (Tag(0x0028, 0x0010), VR::US, 2, 8),
            (Tag(0x0029, 0x1010), VR::UN, 6, 12),
            (Tag(0x0018, 0x9917), VR::UT, 8, 12),
            (Tag(0x7FE0, 0x0010), VR::OW, 4, 12),
        ];

        for (tag, vr, len, header_len) in expected {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element");
            assert_eq!(elem.tag(), tag);
            assert_eq!(elem.vr(), vr);
            assert_eq!(elem.length(), Length(len));
            assert_eq!(bytes_read, header_len);
            if tag == Tag(0x0008, 0x0060) {
                let mut value = [0; 2];
                cursor.read_exact(&mut value).unwrap();
                assert_eq!(&value, b"CT");
            } else {
                skip_value(&mut cursor, elem.length());
            }
        }
        assert_eq!(cursor.position() as usize, RAW.len());
    }

    // manually crafting some DICOM sequence/item delimiters
    #[rustfmt::skip]
    const RAW_SEQUENCE_ITEMS: &[u8] = &[
        0x08, 0x00, 0x40, 0x11,     // (0008,1140) ReferencedImageSequence
            b'S', b'Q',             // VR: SQ
            0x00, 0x00,             // Reserved, always 0
            0xFF, 0xFF, 0xFF, 0xFF, // Length: undefined
        0xFE, 0xFF, 0x00, 0xE0,     // (FFFE,E000) Item
            0xFF, 0xFF, 0xFF, 0xFF, // Length: undefined
        0xFE, 0xFF, 0x0D, 0xE0,     // (FFFE,E00D) Item delimiter
            0x00, 0x00, 0x00, 0x00, // Length: 0
        0xFE, 0xFF, 0xDD, 0xE0,     // (FFFE,E0DD) Sequence delimiter
            0x00, 0x00, 0x00, 0x00, // Length: 0
    ];

    #[test]
    fn decode_items() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW_SEQUENCE_ITEMS);
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element header");
            assert_eq!(elem.tag(), Tag(0x0008, 0x1140));
            assert_eq!(elem.vr(), VR::SQ);
            assert!(elem.length().is_undefined());
            assert_eq!(bytes_read, 12);
        }
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert!(elem.is_item());
            assert_eq!(elem.tag(), Tag(0xFFFE, 0xE000));
            assert!(elem.length().is_undefined());
        }
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert_eq!(elem, SequenceItemHeader::ItemDelimiter);
        }
        {
            // delimiters also go through the regular header path
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find a delimiter header");
            assert!(elem.is_sequence_delimiter());
            assert_eq!(elem.length(), Length(0));
            assert_eq!(bytes_read, 8);
        }
    }

    #[test]
    fn rejects_unknown_vr() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, // (0008,0060) Modality
                b'Z', b'Z',         // VR: not a VR
                0x02, 0x00,
                b'C', b'T',
        ];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec.decode_header(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidVr {
                tag: Tag(0x0008, 0x0060),
                code: [b'Z', b'Z'],
                ..
            }
        ));
    }

    #[test]
    fn rejects_undefined_length_on_text() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x18, 0x00, 0x17, 0x99,     // (0018,9917) Instruction Description
                b'U', b'T',             // VR: UT
                0x00, 0x00,             // Reserved
                0xFF, 0xFF, 0xFF, 0xFF, // Length: undefined
        ];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec.decode_header(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, Error::UndefinedLength { vr: VR::UT, .. }));
    }

    #[test]
    fn truncated_header_is_reported() {
        let raw: &[u8] = &[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02];
        let dec = ExplicitVRLittleEndianDecoder::default();
        let err = dec.decode_header(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, Error::ReadLength { .. }));
        assert!(err.is_truncation());
    }
}
