//! Implicit VR Little Endian encoder.

use crate::encode::basic::LittleEndianBasicEncoder;
use crate::encode::{impl_encode_to, BasicEncode, Encode, Result, WriteLengthSnafu};
use byteordered::Endianness;
use minidcm_core::header::{DataElementHeader, Header};
use snafu::ResultExt;
use std::io::Write;

/// A data element encoder for the Implicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ImplicitVRLittleEndianEncoder {
    basic: LittleEndianBasicEncoder,
}

impl Encode for ImplicitVRLittleEndianEncoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn encode_element_header<W>(&self, mut to: W, de: DataElementHeader) -> Result<usize>
    where
        W: Write,
    {
        self.encode_tag(&mut to, de.tag())?;
        self.basic
            .encode_ul(&mut to, de.len.0)
            .context(WriteLengthSnafu)?;
        Ok(8)
    }
}

impl_encode_to!(ImplicitVRLittleEndianEncoder);
