//! This module contains all DICOM data element encoding logic.
//!
//! Encoders write element headers and primitive values
//! in the byte order and VR mode of a transfer syntax.
//! They are the counterpart of the header decoders in [`crate::decode`]
//! and are used by the data set writer.

use crate::text::{EncodeTextError, TextCodec};
use byteordered::Endianness;
use minidcm_core::header::{DataElementHeader, Header};
use minidcm_core::{PrimitiveValue, Tag, VR};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{self, Write};

pub mod basic;
pub mod explicit;
pub mod implicit_le;

use self::basic::BasicEncoder;

/// Module-level error type:
/// for errors which may occur while encoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to write tag"))]
    WriteTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write value representation"))]
    WriteVr {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write element length"))]
    WriteLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write item header"))]
    WriteItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to write value data"))]
    WriteValue {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to encode text value"))]
    EncodeText { source: EncodeTextError },
    /// The value is too long for the 16-bit length field of its VR.
    #[snafu(display("Value of {} ({}) is too long: {} bytes", tag, vr, len))]
    ValueTooLong {
        tag: Tag,
        vr: VR,
        len: u32,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Type trait for an encoder of basic data properties.
/// Unlike `Encode` (and similar to `BasicDecode`), this trait is not object
/// safe because it's better to just provide a dynamic implementation.
pub trait BasicEncode {
    /// Retrieve the encoder's endianness.
    fn endianness(&self) -> Endianness;

    /// Encode an unsigned short value to the given writer.
    fn encode_us<W: Write>(&self, to: W, value: u16) -> io::Result<()>;

    /// Encode an unsigned long value to the given writer.
    fn encode_ul<W: Write>(&self, to: W, value: u32) -> io::Result<()>;

    /// Encode an unsigned very long value to the given writer.
    fn encode_uv<W: Write>(&self, to: W, value: u64) -> io::Result<()>;

    /// Encode a signed short value to the given writer.
    fn encode_ss<W: Write>(&self, to: W, value: i16) -> io::Result<()>;

    /// Encode a signed long value to the given writer.
    fn encode_sl<W: Write>(&self, to: W, value: i32) -> io::Result<()>;

    /// Encode a signed very long value to the given writer.
    fn encode_sv<W: Write>(&self, to: W, value: i64) -> io::Result<()>;

    /// Encode a single precision float value to the given writer.
    fn encode_fl<W: Write>(&self, to: W, value: f32) -> io::Result<()>;

    /// Encode a double precision float value to the given writer.
    fn encode_fd<W: Write>(&self, to: W, value: f64) -> io::Result<()>;
}

/// Type trait for a data element encoder.
pub trait Encode {
    /// The byte order of everything written by this encoder.
    fn endianness(&self) -> Endianness;

    /// Encode and write an element tag.
    fn encode_tag<W>(&self, to: W, tag: Tag) -> Result<()>
    where
        W: Write,
    {
        let basic = BasicEncoder::new(self.endianness());
        let mut to = to;
        basic
            .encode_us(&mut to, tag.group())
            .and_then(|_| basic.encode_us(&mut to, tag.element()))
            .context(WriteTagSnafu)
    }

    /// Encode and write a data element header to the given destination.
    /// Returns the number of bytes effectively written on success.
    fn encode_element_header<W>(&self, to: W, de: DataElementHeader) -> Result<usize>
    where
        W: Write;

    /// Encode and write a DICOM sequence item header to the given destination.
    fn encode_item_header<W>(&self, to: W, len: u32) -> Result<()>
    where
        W: Write,
    {
        write_item_like(self.endianness(), to, Tag::ITEM, len)
    }

    /// Encode and write a DICOM sequence item delimiter to the given destination.
    fn encode_item_delimiter<W>(&self, to: W) -> Result<()>
    where
        W: Write,
    {
        write_item_like(self.endianness(), to, Tag::ITEM_DELIMITER, 0)
    }

    /// Encode and write a DICOM sequence delimiter to the given destination.
    fn encode_sequence_delimiter<W>(&self, to: W) -> Result<()>
    where
        W: Write,
    {
        write_item_like(self.endianness(), to, Tag::SEQUENCE_DELIMITER, 0)
    }

    /// Encode a primitive value into its byte representation,
    /// padded to an even length with the VR's padding byte.
    /// Text is encoded with the given character set.
    fn encode_primitive(
        &self,
        vr: VR,
        value: &PrimitiveValue,
        text: &dyn TextCodec,
    ) -> Result<Vec<u8>> {
        encode_primitive_value(BasicEncoder::new(self.endianness()), vr, value, text)
    }
}

fn write_item_like<W: Write>(endianness: Endianness, mut to: W, tag: Tag, len: u32) -> Result<()> {
    let basic = BasicEncoder::new(endianness);
    basic
        .encode_us(&mut to, tag.group())
        .and_then(|_| basic.encode_us(&mut to, tag.element()))
        .and_then(|_| basic.encode_ul(&mut to, len))
        .context(WriteItemHeaderSnafu)
}

fn encode_primitive_value(
    basic: BasicEncoder,
    vr: VR,
    value: &PrimitiveValue,
    text: &dyn TextCodec,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(value.calculate_byte_len());
    if vr.is_textual() && !matches!(value, PrimitiveValue::Empty) {
        // numbers read from IS and DS go back out as text
        let s = value.to_str();
        let bytes = if vr == VR::UI {
            s.as_bytes().to_vec()
        } else {
            text.encode(&s).context(EncodeTextSnafu)?
        };
        out.extend_from_slice(&bytes);
        if out.len() % 2 == 1 {
            out.push(vr.padding());
        }
        return Ok(out);
    }
    match value {
        PrimitiveValue::Empty => {}
        PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
            let s = value.to_str();
            out.extend_from_slice(s.as_bytes());
        }
        PrimitiveValue::Tags(tags) => {
            for tag in tags {
                basic
                    .encode_us(&mut out, tag.group())
                    .and_then(|_| basic.encode_us(&mut out, tag.element()))
                    .context(WriteValueSnafu)?;
            }
        }
        PrimitiveValue::U8(bytes) => out.extend_from_slice(bytes),
        PrimitiveValue::I16(values) => write_all(&mut out, values, |w, v| basic.encode_ss(w, *v))?,
        PrimitiveValue::U16(values) => write_all(&mut out, values, |w, v| basic.encode_us(w, *v))?,
        PrimitiveValue::I32(values) => write_all(&mut out, values, |w, v| basic.encode_sl(w, *v))?,
        PrimitiveValue::U32(values) => write_all(&mut out, values, |w, v| basic.encode_ul(w, *v))?,
        PrimitiveValue::I64(values) => write_all(&mut out, values, |w, v| basic.encode_sv(w, *v))?,
        PrimitiveValue::U64(values) => write_all(&mut out, values, |w, v| basic.encode_uv(w, *v))?,
        PrimitiveValue::F32(values) => write_all(&mut out, values, |w, v| basic.encode_fl(w, *v))?,
        PrimitiveValue::F64(values) => write_all(&mut out, values, |w, v| basic.encode_fd(w, *v))?,
    }
    if out.len() % 2 == 1 {
        out.push(vr.padding());
    }
    Ok(out)
}

fn write_all<T, F>(out: &mut Vec<u8>, values: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&mut Vec<u8>, &T) -> io::Result<()>,
{
    for v in values {
        f(out, v).context(WriteValueSnafu)?;
    }
    Ok(())
}

/// Type trait for a data element encoder to a single known writer type.
///
/// Unlike [`Encode`], this trait is object safe,
/// so that the encoder can be chosen at run-time
/// from the file's transfer syntax.
pub trait EncodeTo<W: ?Sized> {
    /// Encode and write a data element header.
    /// Returns the number of bytes written.
    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize>;

    /// Encode and write a sequence item header.
    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()>;

    /// Encode and write a sequence item delimiter.
    fn encode_item_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode and write a sequence delimiter.
    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode a primitive value into bytes, padded to an even length.
    fn encode_primitive(
        &self,
        vr: VR,
        value: &PrimitiveValue,
        text: &dyn TextCodec,
    ) -> Result<Vec<u8>>;
}

impl<W: ?Sized, T: ?Sized> EncodeTo<W> for Box<T>
where
    T: EncodeTo<W>,
{
    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize> {
        (**self).encode_element_header(to, de)
    }

    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()> {
        (**self).encode_item_header(to, len)
    }

    fn encode_item_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_item_delimiter(to)
    }

    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_sequence_delimiter(to)
    }

    fn encode_primitive(
        &self,
        vr: VR,
        value: &PrimitiveValue,
        text: &dyn TextCodec,
    ) -> Result<Vec<u8>> {
        (**self).encode_primitive(vr, value, text)
    }
}

/// Implement `EncodeTo<W>` for every writer type
/// by delegating to the encoder's `Encode` implementation.
macro_rules! impl_encode_to {
    ($typ: ty) => {
        impl<W: ?Sized> $crate::encode::EncodeTo<W> for $typ
        where
            W: std::io::Write,
        {
            fn encode_element_header(
                &self,
                to: &mut W,
                de: minidcm_core::DataElementHeader,
            ) -> $crate::encode::Result<usize> {
                $crate::encode::Encode::encode_element_header(self, to, de)
            }

            fn encode_item_header(&self, to: &mut W, len: u32) -> $crate::encode::Result<()> {
                $crate::encode::Encode::encode_item_header(self, to, len)
            }

            fn encode_item_delimiter(&self, to: &mut W) -> $crate::encode::Result<()> {
                $crate::encode::Encode::encode_item_delimiter(self, to)
            }

            fn encode_sequence_delimiter(&self, to: &mut W) -> $crate::encode::Result<()> {
                $crate::encode::Encode::encode_sequence_delimiter(self, to)
            }

            fn encode_primitive(
                &self,
                vr: minidcm_core::VR,
                value: &minidcm_core::PrimitiveValue,
                text: &dyn $crate::text::TextCodec,
            ) -> $crate::encode::Result<Vec<u8>> {
                $crate::encode::Encode::encode_primitive(self, vr, value, text)
            }
        }
    };
}

pub(crate) use impl_encode_to;

/// Check that a header can be written with a 16-bit length field.
pub(crate) fn check_short_length(de: &DataElementHeader) -> Result<u16> {
    u16::try_from(de.len.0).map_err(|_| {
        ValueTooLongSnafu {
            tag: de.tag(),
            vr: de.vr,
            len: de.len.0,
        }
        .build()
    })
}
