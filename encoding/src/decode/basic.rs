//! Primitive decoders of binary numbers,
//! in either little endian or big endian.

use super::BasicDecode;
use byteordered::{ByteOrdered, Endianness};
use std::io::Read;

type Result<T> = std::io::Result<T>;

/// A basic decoder of DICOM primitive elements in little endian.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct LittleEndianBasicDecoder;

/// A basic decoder of DICOM primitive elements in big endian.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct BigEndianBasicDecoder;

/// Implement `BasicDecode` for a fixed byte order,
/// where `$ordered` is the `ByteOrdered` constructor for that order.
macro_rules! impl_fixed_order {
    ($typ: ty, $ordered: ident, $endianness: expr) => {
        impl BasicDecode for $typ {
            fn endianness(&self) -> Endianness {
                $endianness
            }

            fn decode_us<S: Read>(&self, source: S) -> Result<u16> {
                ByteOrdered::$ordered(source).read_u16()
            }

            fn decode_us_into<S: Read>(&self, source: S, target: &mut [u16]) -> Result<()> {
                ByteOrdered::$ordered(source).read_u16_into(target)
            }

            fn decode_ul<S: Read>(&self, source: S) -> Result<u32> {
                ByteOrdered::$ordered(source).read_u32()
            }

            fn decode_ul_into<S: Read>(&self, source: S, target: &mut [u32]) -> Result<()> {
                ByteOrdered::$ordered(source).read_u32_into(target)
            }

            fn decode_uv_into<S: Read>(&self, source: S, target: &mut [u64]) -> Result<()> {
                ByteOrdered::$ordered(source).read_u64_into(target)
            }

            fn decode_ss_into<S: Read>(&self, source: S, target: &mut [i16]) -> Result<()> {
                ByteOrdered::$ordered(source).read_i16_into(target)
            }

            fn decode_sl_into<S: Read>(&self, source: S, target: &mut [i32]) -> Result<()> {
                ByteOrdered::$ordered(source).read_i32_into(target)
            }

            fn decode_sv_into<S: Read>(&self, source: S, target: &mut [i64]) -> Result<()> {
                ByteOrdered::$ordered(source).read_i64_into(target)
            }

            fn decode_fl_into<S: Read>(&self, source: S, target: &mut [f32]) -> Result<()> {
                ByteOrdered::$ordered(source).read_f32_into(target)
            }

            fn decode_fd_into<S: Read>(&self, source: S, target: &mut [f64]) -> Result<()> {
                ByteOrdered::$ordered(source).read_f64_into(target)
            }
        }
    };
}

impl_fixed_order!(LittleEndianBasicDecoder, le, Endianness::Little);
impl_fixed_order!(BigEndianBasicDecoder, be, Endianness::Big);

/// A basic decoder with support for both Little Endian an Big Endian
/// encoding, decided at run-time. Since only two values are possible,
/// this enum may become more efficient than the use of a trait object.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BasicDecoder {
    /// Decode in Little Endian
    LE(LittleEndianBasicDecoder),
    /// Decode in Big Endian
    BE(BigEndianBasicDecoder),
}

impl BasicDecoder {
    /// Create a basic decoder for the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => BasicDecoder::LE(LittleEndianBasicDecoder),
            Endianness::Big => BasicDecoder::BE(BigEndianBasicDecoder),
        }
    }
}

impl From<Endianness> for BasicDecoder {
    fn from(endianness: Endianness) -> Self {
        BasicDecoder::new(endianness)
    }
}

macro_rules! for_both {
    ($s: expr, |$e: ident| $f: expr) => {
        match *$s {
            BasicDecoder::LE(ref $e) => $f,
            BasicDecoder::BE(ref $e) => $f,
        }
    };
}

impl BasicDecode for BasicDecoder {
    fn endianness(&self) -> Endianness {
        for_both!(self, |e| e.endianness())
    }

    fn decode_us<S: Read>(&self, source: S) -> Result<u16> {
        for_both!(self, |e| e.decode_us(source))
    }

    fn decode_us_into<S: Read>(&self, source: S, target: &mut [u16]) -> Result<()> {
        for_both!(self, |e| e.decode_us_into(source, target))
    }

    fn decode_ul<S: Read>(&self, source: S) -> Result<u32> {
        for_both!(self, |e| e.decode_ul(source))
    }

    fn decode_ul_into<S: Read>(&self, source: S, target: &mut [u32]) -> Result<()> {
        for_both!(self, |e| e.decode_ul_into(source, target))
    }

    fn decode_uv_into<S: Read>(&self, source: S, target: &mut [u64]) -> Result<()> {
        for_both!(self, |e| e.decode_uv_into(source, target))
    }

    fn decode_ss_into<S: Read>(&self, source: S, target: &mut [i16]) -> Result<()> {
        for_both!(self, |e| e.decode_ss_into(source, target))
    }

    fn decode_sl_into<S: Read>(&self, source: S, target: &mut [i32]) -> Result<()> {
        for_both!(self, |e| e.decode_sl_into(source, target))
    }

    fn decode_sv_into<S: Read>(&self, source: S, target: &mut [i64]) -> Result<()> {
        for_both!(self, |e| e.decode_sv_into(source, target))
    }

    fn decode_fl_into<S: Read>(&self, source: S, target: &mut [f32]) -> Result<()> {
        for_both!(self, |e| e.decode_fl_into(source, target))
    }

    fn decode_fd_into<S: Read>(&self, source: S, target: &mut [f64]) -> Result<()> {
        for_both!(self, |e| e.decode_fd_into(source, target))
    }
}
