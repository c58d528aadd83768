//! Explicit VR encoder, in either byte order.

use crate::encode::basic::BasicEncoder;
use crate::encode::{
    check_short_length, impl_encode_to, BasicEncode, Encode, Result, WriteLengthSnafu,
    WriteVrSnafu,
};
use byteordered::Endianness;
use minidcm_core::header::{DataElementHeader, Header};
use snafu::ResultExt;
use std::io::Write;

/// A data element encoder for the Explicit VR transfer syntaxes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExplicitVREncoder {
    basic: BasicEncoder,
}

impl ExplicitVREncoder {
    /// Create an explicit VR encoder in the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        ExplicitVREncoder {
            basic: BasicEncoder::new(endianness),
        }
    }
}

impl Default for ExplicitVREncoder {
    fn default() -> Self {
        ExplicitVREncoder::new(Endianness::Little)
    }
}

impl Encode for ExplicitVREncoder {
    fn endianness(&self) -> Endianness {
        self.basic.endianness()
    }

    fn encode_element_header<W>(&self, mut to: W, de: DataElementHeader) -> Result<usize>
    where
        W: Write,
    {
        self.encode_tag(&mut to, de.tag())?;
        if de.tag().group() == 0xFFFE {
            // items and delimiters carry no VR
            self.basic
                .encode_ul(&mut to, de.len.0)
                .context(WriteLengthSnafu)?;
            return Ok(8);
        }

        to.write_all(&de.vr.to_bytes()).context(WriteVrSnafu)?;
        if de.vr.has_long_length() {
            to.write_all(&[0, 0]).context(WriteVrSnafu)?;
            self.basic
                .encode_ul(&mut to, de.len.0)
                .context(WriteLengthSnafu)?;
            Ok(12)
        } else {
            let len = check_short_length(&de)?;
            self.basic
                .encode_us(&mut to, len)
                .context(WriteLengthSnafu)?;
            Ok(8)
        }
    }
}

impl_encode_to!(ExplicitVREncoder);
