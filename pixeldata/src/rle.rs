//! RLE Lossless decoding (PS3.5 Annex G).
//!
//! A frame is compressed as one to fifteen segments,
//! each holding one byte of every sample,
//! most significant byte first.

use byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, OptionExt, Snafu};

const HEADER_LEN: usize = 64;
const MAX_SEGMENTS: usize = 15;

#[derive(Debug, PartialEq, Snafu)]
pub enum RleError {
    #[snafu(display("RLE frame of {} bytes is too short for its header", len))]
    MissingHeader { len: usize },

    #[snafu(display("Invalid number of RLE segments {}, expected {}", found, expected))]
    SegmentCount { found: u32, expected: usize },

    #[snafu(display("RLE segment #{} has invalid bounds {}..{}", segment, start, end))]
    SegmentBounds {
        segment: usize,
        start: usize,
        end: usize,
    },

    #[snafu(display("RLE segment #{} decoded to {} bytes, expected {}", segment, actual, expected))]
    SegmentLength {
        segment: usize,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("RLE frames of {} bits allocated are not supported", bits_allocated))]
    BitsAllocated { bits_allocated: u16 },
}

/// Decode one RLE compressed frame
/// into interleaved little endian samples.
pub fn decode_frame(
    data: &[u8],
    pixels: usize,
    samples_per_pixel: u16,
    bits_allocated: u16,
) -> Result<Vec<u8>, RleError> {
    ensure!(
        matches!(bits_allocated, 8 | 16 | 32),
        BitsAllocatedSnafu { bits_allocated }
    );
    ensure!(data.len() >= HEADER_LEN, MissingHeaderSnafu { len: data.len() });

    let bytes_per_sample = usize::from(bits_allocated / 8);
    let samples = usize::from(samples_per_pixel);
    let expected = samples * bytes_per_sample;
    let found = LittleEndian::read_u32(&data[..4]);
    ensure!(
        found as usize == expected && expected <= MAX_SEGMENTS,
        SegmentCountSnafu { found, expected }
    );

    let offsets: Vec<usize> = (0..expected)
        .map(|i| LittleEndian::read_u32(&data[4 + i * 4..8 + i * 4]) as usize)
        .collect();

    let mut out = vec![0; pixels * expected];
    for (segment, &start) in offsets.iter().enumerate() {
        let end = offsets.get(segment + 1).copied().unwrap_or(data.len());
        let compressed = data
            .get(start..end)
            .filter(|_| start >= HEADER_LEN)
            .context(SegmentBoundsSnafu {
                segment,
                start,
                end,
            })?;
        let decoded = unpack_bits(compressed, pixels);
        ensure!(
            decoded.len() == pixels,
            SegmentLengthSnafu {
                segment,
                expected: pixels,
                actual: decoded.len(),
            }
        );

        // segments run from the most significant byte of the first sample
        let sample = segment / bytes_per_sample;
        let byte = bytes_per_sample - 1 - segment % bytes_per_sample;
        let position = sample * bytes_per_sample + byte;
        for (pixel, value) in decoded.into_iter().enumerate() {
            out[pixel * expected + position] = value;
        }
    }
    Ok(out)
}

/// PackBits decoding, stopping once `limit` bytes are produced.
fn unpack_bits(mut input: &[u8], limit: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(limit);
    while out.len() < limit {
        let Some((&header, rest)) = input.split_first() else {
            break;
        };
        let n = header as i8;
        match n {
            0..=127 => {
                let count = (n as usize + 1).min(rest.len());
                out.extend_from_slice(&rest[..count]);
                input = &rest[count..];
            }
            -127..=-1 => {
                let Some((&value, rest)) = rest.split_first() else {
                    break;
                };
                let count = (1 - i32::from(n)) as usize;
                out.extend(std::iter::repeat(value).take(count));
                input = rest;
            }
            -128 => input = rest,
        }
    }
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(offsets: &[u32]) -> Vec<u8> {
        let mut data = vec![0; HEADER_LEN];
        LittleEndian::write_u32(&mut data[..4], offsets.len() as u32);
        for (i, offset) in offsets.iter().enumerate() {
            LittleEndian::write_u32(&mut data[4 + i * 4..8 + i * 4], *offset);
        }
        data
    }

    #[test]
    fn packbits_runs_and_literals() {
        // literal run of 3, replicate run of 4, no-op, literal run of 1
        let input = [2, 1, 2, 3, 0xFD, 9, 0x80, 0, 7];
        assert_eq!(unpack_bits(&input, 100), vec![1, 2, 3, 9, 9, 9, 9, 7]);
        assert_eq!(unpack_bits(&input, 5), vec![1, 2, 3, 9, 9]);
    }

    #[test]
    fn decode_8_bit_frame() {
        let mut data = header(&[64]);
        // 4 pixels: 0x10 replicated 3 times, then literal 0x20
        data.extend_from_slice(&[0xFE, 0x10, 0x00, 0x20]);
        let out = decode_frame(&data, 4, 1, 8).unwrap();
        assert_eq!(out, vec![0x10, 0x10, 0x10, 0x20]);
    }

    #[test]
    fn decode_16_bit_frame_to_little_endian() {
        let mut data = header(&[64, 67]);
        // high bytes segment
        data.extend_from_slice(&[0x01, 0x12, 0x34]);
        // low bytes segment
        data.extend_from_slice(&[0x01, 0x56, 0x78]);
        let out = decode_frame(&data, 2, 1, 16).unwrap();
        assert_eq!(out, vec![0x56, 0x12, 0x78, 0x34]);
    }

    #[test]
    fn decode_rgb_frame_to_interleaved() {
        let mut data = header(&[64, 66, 68]);
        data.extend_from_slice(&[0xFF, 0xAA]);
        data.extend_from_slice(&[0xFF, 0xBB]);
        data.extend_from_slice(&[0xFF, 0xCC]);
        let out = decode_frame(&data, 2, 3, 8).unwrap();
        assert_eq!(out, vec![0xAA, 0xBB, 0xCC, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn bad_frames() {
        assert_eq!(
            decode_frame(&[0; 10], 1, 1, 8),
            Err(RleError::MissingHeader { len: 10 })
        );

        let data = header(&[64, 65]);
        assert_eq!(
            decode_frame(&data, 1, 1, 8),
            Err(RleError::SegmentCount {
                found: 2,
                expected: 1
            })
        );

        let mut data = header(&[64]);
        data.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(
            decode_frame(&data, 2, 1, 8),
            Err(RleError::SegmentLength {
                segment: 0,
                expected: 2,
                actual: 1
            })
        );

        assert_eq!(
            decode_frame(&data, 2, 1, 1),
            Err(RleError::BitsAllocated { bits_allocated: 1 })
        );
    }
}
