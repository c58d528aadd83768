//! This module contains all DICOM data element header decoding logic.
//!
//! Header decoders read the tag, value representation and length of the
//! next data element, leaving the source at the start of its value.
//! Value decoding is left to the data set reader.

use self::explicit_le::ExplicitVRLittleEndianDecoder;
use byteordered::Endianness;
use minidcm_core::header::{DataElementHeader, SequenceItemHeader, SequenceItemHeaderError};
use minidcm_core::{Tag, VR};
use snafu::{ensure, Backtrace, Snafu};
use std::io::{self, Read};

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

/// Module-level error type:
/// for errors which may occur while decoding DICOM data element headers.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to read the beginning (tag) of the header"))]
    ReadHeaderTag {
        backtrace: Option<Backtrace>,
        source: io::Error,
    },
    #[snafu(display("Failed to read the item header"))]
    ReadItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's item length field"))]
    ReadItemLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's tag field"))]
    ReadTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's reserved bytes"))]
    ReadReserved {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's element length field"))]
    ReadLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's value representation"))]
    ReadVr {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Bad sequence item header"))]
    BadSequenceHeader { source: SequenceItemHeaderError },
    /// The two bytes in the VR position are not a known value representation.
    #[snafu(display(
        "Invalid value representation {:02X?} in element {}",
        code,
        tag
    ))]
    InvalidVr {
        tag: Tag,
        code: [u8; 2],
        backtrace: Backtrace,
    },
    /// An undefined length was declared by an element which cannot have one.
    #[snafu(display("Undefined length is not allowed for element {} ({})", tag, vr))]
    UndefinedLength {
        tag: Tag,
        vr: VR,
        backtrace: Backtrace,
    },
}

impl Error {
    /// Whether the error was caused by the source ending
    /// in the middle of a header.
    pub fn is_truncation(&self) -> bool {
        let source = match self {
            Error::ReadHeaderTag { source, .. }
            | Error::ReadItemHeader { source, .. }
            | Error::ReadItemLength { source, .. }
            | Error::ReadTag { source, .. }
            | Error::ReadReserved { source, .. }
            | Error::ReadLength { source, .. }
            | Error::ReadVr { source, .. } => source,
            _ => return false,
        };
        source.kind() == io::ErrorKind::UnexpectedEof
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Obtain a data element decoder for reading the data elements in a DICOM
/// file's Meta information. According to the standard, these are always
/// encoded in Explicit VR Little Endian.
pub fn file_header_decoder() -> ExplicitVRLittleEndianDecoder {
    ExplicitVRLittleEndianDecoder::default()
}

/// Check the rules on undefined lengths for a freshly decoded header.
///
/// Only sequences, `UN` elements and encapsulated pixel data
/// may declare an undefined length.
/// Item and delimiter headers are not subject to this rule.
pub fn check_undefined_length(header: &DataElementHeader) -> Result<()> {
    if header.len.is_defined() || header.tag.group() == 0xFFFE {
        return Ok(());
    }
    let allowed = match header.vr {
        VR::SQ | VR::UN => true,
        VR::OB | VR::OW => header.tag == Tag::PIXEL_DATA,
        _ => false,
    };
    ensure!(
        allowed,
        UndefinedLengthSnafu {
            tag: header.tag,
            vr: header.vr,
        }
    );
    Ok(())
}

/// Type trait for reading and decoding basic data values from a data source.
///
/// This trait aims to provide methods for reading binary numbers based on the
/// source's endianness. Unlike `Decode`, this trait is not object safe.
/// However, it doesn't have to because there are, and only will be, two
/// possible implementations (`LittleEndianBasicDecoder` and
/// `BigEndianBasicDecoder`).
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S: Read>(&self, source: S) -> io::Result<u16>;

    /// Decode a sequence of unsigned shorts into the given buffer.
    fn decode_us_into<S: Read>(&self, source: S, target: &mut [u16]) -> io::Result<()>;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S: Read>(&self, source: S) -> io::Result<u32>;

    /// Decode a sequence of unsigned longs into the given buffer.
    fn decode_ul_into<S: Read>(&self, source: S, target: &mut [u32]) -> io::Result<()>;

    /// Decode a sequence of unsigned very longs into the given buffer.
    fn decode_uv_into<S: Read>(&self, source: S, target: &mut [u64]) -> io::Result<()>;

    /// Decode a sequence of signed shorts into the given buffer.
    fn decode_ss_into<S: Read>(&self, source: S, target: &mut [i16]) -> io::Result<()>;

    /// Decode a sequence of signed longs into the given buffer.
    fn decode_sl_into<S: Read>(&self, source: S, target: &mut [i32]) -> io::Result<()>;

    /// Decode a sequence of signed very longs into the given buffer.
    fn decode_sv_into<S: Read>(&self, source: S, target: &mut [i64]) -> io::Result<()>;

    /// Decode a sequence of single precision floats into the given buffer.
    fn decode_fl_into<S: Read>(&self, source: S, target: &mut [f32]) -> io::Result<()>;

    /// Decode a sequence of double precision floats into the given buffer.
    fn decode_fd_into<S: Read>(&self, source: S, target: &mut [f64]) -> io::Result<()>;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S: Read>(&self, mut source: S) -> io::Result<Tag> {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}

/// Type trait for reading and decoding DICOM data elements.
///
/// The specific behaviour of decoding, even when abstracted from the original source,
/// may depend on the transfer syntax.
pub trait Decode {
    /// Fetch and decode the next data element header from the given source.
    /// This method returns only the header of the element. At the end of this operation, the source
    /// will be pointing at the element's value data, which should be read or skipped as necessary.
    ///
    /// Decoding an item or sequence delimiter is considered valid, and so should be properly handled
    /// by the decoder. The value representation in this case should be `UN`.
    ///
    /// Returns the expected header and the exact number of bytes read from the source.
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next sequence item head from the given source. It is a separate method
    /// because value representation is always implicit when reading item headers and delimiters.
    /// This method returns only the header of the item. At the end of this operation, the source
    /// will be pointing at the beginning of the item's data, which should be traversed if necessary.
    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read;
}

/// Type trait for reading and decoding DICOM data elements from a specific source
/// reader type.
///
/// Unlike [`Decode`], this trait is object safe,
/// so that the decoder can be chosen at run-time
/// from the file's transfer syntax.
pub trait DecodeFrom<S: ?Sized + Read> {
    /// Fetch and decode the next data element header from the given source.
    ///
    /// See [`Decode::decode_header`].
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)>;

    /// Fetch and decode the next sequence item head from the given source.
    ///
    /// See [`Decode::decode_item_header`].
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader>;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag(&self, source: &mut S) -> Result<Tag>;
}

impl<S: ?Sized, T: ?Sized> DecodeFrom<S> for Box<T>
where
    S: Read,
    T: DecodeFrom<S>,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        (**self).decode_header(source)
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        (**self).decode_item_header(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        (**self).decode_tag(source)
    }
}

/// Implement `DecodeFrom<S>` for every source type
/// by delegating to the decoder's `Decode` implementation.
macro_rules! impl_decode_from {
    ($typ: ty $(, $bound: ident)?) => {
        impl<S: ?Sized $(, $bound)?> $crate::decode::DecodeFrom<S> for $typ
        where
            S: std::io::Read,
            $($bound: minidcm_core::dictionary::DataDictionary,)?
        {
            #[inline]
            fn decode_header(
                &self,
                source: &mut S,
            ) -> $crate::decode::Result<(minidcm_core::DataElementHeader, usize)> {
                $crate::decode::Decode::decode_header(self, source)
            }

            #[inline]
            fn decode_item_header(
                &self,
                source: &mut S,
            ) -> $crate::decode::Result<minidcm_core::header::SequenceItemHeader> {
                $crate::decode::Decode::decode_item_header(self, source)
            }

            #[inline]
            fn decode_tag(&self, source: &mut S) -> $crate::decode::Result<minidcm_core::Tag> {
                $crate::decode::Decode::decode_tag(self, source)
            }
        }
    };
}

pub(crate) use impl_decode_from;
