//! Extraction of stored sample values from native pixel data bytes.

use byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, Snafu};

#[derive(Debug, PartialEq, Snafu)]
pub enum UnpackError {
    #[snafu(display("Unsupported bits allocated {}", bits_allocated))]
    UnsupportedBitsAllocated { bits_allocated: u16 },

    #[snafu(display("Expected {} bytes of samples, got {}", expected, actual))]
    NotEnoughBytes { expected: usize, actual: usize },
}

/// How stored values sit inside their allocated bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SampleLayout {
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub signed: bool,
}

impl SampleLayout {
    /// The number of bytes taken by `count` samples.
    pub fn byte_len(&self, count: usize) -> usize {
        (count * usize::from(self.bits_allocated) + 7) / 8
    }

    /// Extract a stored value from the raw allocated bits of a sample.
    #[inline]
    fn stored(&self, raw: u32) -> i64 {
        let shift = u32::from(self.high_bit + 1 - self.bits_stored);
        let bits = u32::from(self.bits_stored);
        let value = u64::from(raw >> shift) & ((1_u64 << bits) - 1);
        if self.signed && value >> (bits - 1) == 1 {
            value as i64 - (1_i64 << bits)
        } else {
            value as i64
        }
    }
}

/// Unpack `count` little endian samples from `bytes`.
///
/// Bits outside of the stored range are discarded,
/// and signed samples are sign extended.
pub fn unpack(bytes: &[u8], layout: SampleLayout, count: usize) -> Result<Vec<i64>, UnpackError> {
    ensure!(
        matches!(layout.bits_allocated, 1 | 8 | 16 | 32),
        UnsupportedBitsAllocatedSnafu {
            bits_allocated: layout.bits_allocated
        }
    );
    let expected = layout.byte_len(count);
    ensure!(
        bytes.len() >= expected,
        NotEnoughBytesSnafu {
            expected,
            actual: bytes.len()
        }
    );

    let samples = match layout.bits_allocated {
        1 => (0..count)
            .map(|i| i64::from((bytes[i / 8] >> (i % 8)) & 1))
            .collect(),
        8 => bytes[..count]
            .iter()
            .map(|&b| layout.stored(u32::from(b)))
            .collect(),
        16 => bytes[..count * 2]
            .chunks_exact(2)
            .map(|c| layout.stored(u32::from(LittleEndian::read_u16(c))))
            .collect(),
        _ => bytes[..count * 4]
            .chunks_exact(4)
            .map(|c| layout.stored(LittleEndian::read_u32(c)))
            .collect(),
    };
    Ok(samples)
}

/// Rearrange a frame of color-by-plane samples into color-by-pixel order.
pub fn planar_to_interleaved<T: Copy>(planar: &[T], samples_per_pixel: usize) -> Vec<T> {
    if samples_per_pixel <= 1 {
        return planar.to_vec();
    }
    let pixels = planar.len() / samples_per_pixel;
    (0..pixels * samples_per_pixel)
        .map(|i| planar[(i % samples_per_pixel) * pixels + i / samples_per_pixel])
        .collect()
}
