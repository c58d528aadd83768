//! Explicit VR Big Endian syntax transfer implementation.

use crate::decode::basic::BigEndianBasicDecoder;
use crate::decode::{
    check_undefined_length, impl_decode_from, BadSequenceHeaderSnafu, BasicDecode, Decode,
    InvalidVrSnafu, ReadHeaderTagSnafu, ReadItemHeaderSnafu, ReadItemLengthSnafu,
    ReadLengthSnafu, ReadReservedSnafu, ReadTagSnafu, ReadVrSnafu, Result,
};
use byteordered::byteorder::{BigEndian, ByteOrder};
use minidcm_core::header::{DataElementHeader, Length, SequenceItemHeader};
use minidcm_core::{Tag, VR};
use snafu::{OptionExt, ResultExt};
use std::io::Read;

/// A data element decoder for the Explicit VR Big Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRBigEndianDecoder {
    basic: BigEndianBasicDecoder,
}

impl Decode for ExplicitVRBigEndianDecoder {
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadHeaderTagSnafu)?;

        let mut buf = [0u8; 4];
        if tag.group() == 0xFFFE {
            // item delimiters do not have VR or reserved field
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = BigEndian::read_u32(&buf);
            return Ok((DataElementHeader::new(tag, VR::UN, Length(len)), 8));
        }

        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let code = [buf[0], buf[1]];
        let vr = VR::from_binary(code).context(InvalidVrSnafu { tag, code })?;

        let (len, bytes_read) = if vr.has_long_length() {
            source
                .read_exact(&mut buf[0..2])
                .context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            (BigEndian::read_u32(&buf), 12)
        } else {
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            (u32::from(BigEndian::read_u16(&buf[0..2])), 8)
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
        let group = BigEndian::read_u16(&buf[0..2]);
        let element = BigEndian::read_u16(&buf[2..4]);
        let len = BigEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;
        Ok(Tag(
            BigEndian::read_u16(&buf[0..2]),
            BigEndian::read_u16(&buf[2..4]),
        ))
    }
}

impl_decode_from!(ExplicitVRBigEndianDecoder);
