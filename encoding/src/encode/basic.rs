//! This module provides implementations for basic encoders: little endian and big endian.

use super::BasicEncode;
use byteordered::{ByteOrdered, Endianness};
use std::io::Write;

type Result<T> = std::io::Result<T>;

/// A basic encoder of primitive elements in little endian.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LittleEndianBasicEncoder;

/// A basic encoder of primitive elements in big endian.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BigEndianBasicEncoder;

macro_rules! impl_fixed_order {
    ($typ: ty, $ordered: ident, $endianness: expr) => {
        impl BasicEncode for $typ {
            fn endianness(&self) -> Endianness {
                $endianness
            }

            fn encode_us<W: Write>(&self, to: W, value: u16) -> Result<()> {
                ByteOrdered::$ordered(to).write_u16(value)
            }

            fn encode_ul<W: Write>(&self, to: W, value: u32) -> Result<()> {
                ByteOrdered::$ordered(to).write_u32(value)
            }

            fn encode_uv<W: Write>(&self, to: W, value: u64) -> Result<()> {
                ByteOrdered::$ordered(to).write_u64(value)
            }

            fn encode_ss<W: Write>(&self, to: W, value: i16) -> Result<()> {
                ByteOrdered::$ordered(to).write_i16(value)
            }

            fn encode_sl<W: Write>(&self, to: W, value: i32) -> Result<()> {
                ByteOrdered::$ordered(to).write_i32(value)
            }

            fn encode_sv<W: Write>(&self, to: W, value: i64) -> Result<()> {
                ByteOrdered::$ordered(to).write_i64(value)
            }

            fn encode_fl<W: Write>(&self, to: W, value: f32) -> Result<()> {
                ByteOrdered::$ordered(to).write_f32(value)
            }

            fn encode_fd<W: Write>(&self, to: W, value: f64) -> Result<()> {
                ByteOrdered::$ordered(to).write_f64(value)
            }
        }
    };
}

impl_fixed_order!(LittleEndianBasicEncoder, le, Endianness::Little);
impl_fixed_order!(BigEndianBasicEncoder, be, Endianness::Big);

/// A basic encoder with support for both Little Endian an Big Endian
/// encoding, decided at run-time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BasicEncoder {
    /// Encode in Little Endian
    LE(LittleEndianBasicEncoder),
    /// Encode in Big Endian
    BE(BigEndianBasicEncoder),
}

impl BasicEncoder {
    /// Create a basic encoder for the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => BasicEncoder::LE(LittleEndianBasicEncoder),
            Endianness::Big => BasicEncoder::BE(BigEndianBasicEncoder),
        }
    }
}

impl From<Endianness> for BasicEncoder {
    fn from(endianness: Endianness) -> Self {
        BasicEncoder::new(endianness)
    }
}

macro_rules! for_both {
    ($s: expr, |$e: ident| $f: expr) => {
        match *$s {
            BasicEncoder::LE(ref $e) => $f,
            BasicEncoder::BE(ref $e) => $f,
        }
    };
}

impl BasicEncode for BasicEncoder {
    fn endianness(&self) -> Endianness {
        for_both!(self, |e| e.endianness())
    }

    fn encode_us<W: Write>(&self, to: W, value: u16) -> Result<()> {
        for_both!(self, |e| e.encode_us(to, value))
    }

    fn encode_ul<W: Write>(&self, to: W, value: u32) -> Result<()> {
        for_both!(self, |e| e.encode_ul(to, value))
    }

    fn encode_uv<W: Write>(&self, to: W, value: u64) -> Result<()> {
        for_both!(self, |e| e.encode_uv(to, value))
    }

    fn encode_ss<W: Write>(&self, to: W, value: i16) -> Result<()> {
        for_both!(self, |e| e.encode_ss(to, value))
    }

    fn encode_sl<W: Write>(&self, to: W, value: i32) -> Result<()> {
        for_both!(self, |e| e.encode_sl(to, value))
    }

    fn encode_sv<W: Write>(&self, to: W, value: i64) -> Result<()> {
        for_both!(self, |e| e.encode_sv(to, value))
    }

    fn encode_fl<W: Write>(&self, to: W, value: f32) -> Result<()> {
        for_both!(self, |e| e.encode_fl(to, value))
    }

    fn encode_fd<W: Write>(&self, to: W, value: f64) -> Result<()> {
        for_both!(self, |e| e.encode_fd(to, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_in_both_orders() {
        let le = BasicEncoder::new(Endianness::Little);
        let be = BasicEncoder::new(Endianness::Big);

        let mut out = Vec::new();
        le.encode_ul(&mut out, 0x1234_5678).unwrap();
        be.encode_ul(&mut out, 0x1234_5678).unwrap();
        assert_eq!(out, [0x78, 0x56, 0x34, 0x12, 0x12, 0x34, 0x56, 0x78]);

        let mut out = Vec::new();
        le.encode_ss(&mut out, -4567).unwrap();
        le.encode_fl(&mut out, std::f32::consts::PI).unwrap();
        assert_eq!(out, [0x29, 0xEE, 0xDB, 0x0F, 0x49, 0x40]);
    }
}
