//! Pixel codecs, which turn the stored pixel data of one frame
//! into plain samples.
//!
//! Codecs are looked up by transfer syntax UID in a [`CodecRegistry`].
//! Whatever the source, a codec produces the samples of a frame
//! in color-by-pixel order, each sample in little endian.
//! Frames of 1 bit allocated are packed, least significant bit first.

use crate::rle::{self, RleError};
use crate::sample::planar_to_interleaved;
use minidcm_encoding::transfer_syntax;
use once_cell::sync::Lazy;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CodecError {
    #[snafu(display("Frame #{} needs {} bytes, only {} available", frame, expected, actual))]
    FrameTooShort {
        frame: u32,
        expected: u64,
        actual: u64,
    },

    #[snafu(display("No fragments for frame #{} out of {}", frame, frame_count))]
    MissingFragments { frame: u32, frame_count: u32 },

    #[snafu(display("Frame layout not supported by codec `{}`", codec))]
    UnsupportedLayout { codec: &'static str },

    #[snafu(display("Could not decode RLE frame"))]
    DecodeRle { source: RleError },
}

/// The arrangement of the samples of a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub planar_configuration: u16,
}

impl FrameLayout {
    pub fn pixels(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns)
    }

    /// The number of bits taken by one frame of samples.
    pub fn frame_bits(&self) -> u64 {
        u64::from(self.rows)
            * u64::from(self.columns)
            * u64::from(self.samples_per_pixel)
            * u64::from(self.bits_allocated)
    }

    /// The number of bytes taken by one frame of samples.
    pub fn frame_len(&self) -> usize {
        ((self.frame_bits() + 7) / 8) as usize
    }
}

/// The stored pixel data of an object, as handed to a codec.
#[derive(Debug, Clone)]
pub struct PixelFragments<'a> {
    /// the basic offset table, empty if absent or for native pixel data
    pub offset_table: &'a [u32],
    /// the pixel data fragments;
    /// native pixel data comes as a single fragment
    pub fragments: Vec<&'a [u8]>,
    pub layout: FrameLayout,
}

impl<'a> PixelFragments<'a> {
    /// Native pixel data, as a single contiguous stream.
    pub fn native(data: &'a [u8], layout: FrameLayout) -> Self {
        PixelFragments {
            offset_table: &[],
            fragments: vec![data],
            layout,
        }
    }

    /// The fragments making up the given frame.
    ///
    /// A single frame takes all fragments.
    /// Otherwise the offset table is used when present,
    /// or else each fragment is taken as a whole frame.
    pub fn frame_fragments(&self, frame: u32, frame_count: u32) -> Result<Vec<&'a [u8]>, CodecError> {
        if frame_count <= 1 {
            return Ok(self.fragments.clone());
        }

        if !self.offset_table.is_empty() {
            let start = *self
                .offset_table
                .get(frame as usize)
                .context(MissingFragmentsSnafu { frame, frame_count })?;
            let end = self.offset_table.get(frame as usize + 1).copied();

            // offsets count from the first byte of the first fragment item
            let mut position = 0_u64;
            let mut selected = Vec::new();
            for fragment in &self.fragments {
                let in_frame = position >= u64::from(start)
                    && end.map_or(true, |end| position < u64::from(end));
                if in_frame {
                    selected.push(*fragment);
                }
                position += 8 + fragment.len() as u64;
            }
            ensure!(
                !selected.is_empty(),
                MissingFragmentsSnafu { frame, frame_count }
            );
            return Ok(selected);
        }

        ensure!(
            self.fragments.len() == frame_count as usize,
            MissingFragmentsSnafu { frame, frame_count }
        );
        Ok(vec![self.fragments[frame as usize]])
    }
}

/// A decoder of the pixel data of a transfer syntax.
pub trait PixelCodec: Send + Sync {
    /// A short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Decode one frame of pixel data
    /// into interleaved little endian samples.
    fn decode_frame(
        &self,
        ts_uid: &str,
        fragments: &PixelFragments<'_>,
        frame: u32,
        frame_count: u32,
    ) -> Result<Vec<u8>, CodecError>;
}

fn interleave(bytes: Vec<u8>, layout: &FrameLayout) -> Vec<u8> {
    if layout.planar_configuration == 0 || layout.samples_per_pixel <= 1 {
        return bytes;
    }
    let width = usize::from(layout.bits_allocated / 8).max(1);
    let samples: Vec<&[u8]> = bytes.chunks_exact(width).collect();
    planar_to_interleaved(&samples, usize::from(layout.samples_per_pixel)).concat()
}

/// Native pixel data of the uncompressed transfer syntaxes.
#[derive(Debug, Default, Copy, Clone)]
pub struct NativeCodec;

impl PixelCodec for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn decode_frame(
        &self,
        _ts_uid: &str,
        fragments: &PixelFragments<'_>,
        frame: u32,
        _frame_count: u32,
    ) -> Result<Vec<u8>, CodecError> {
        let layout = &fragments.layout;
        let data: Cow<[u8]> = match fragments.fragments.as_slice() {
            [single] => Cow::Borrowed(single),
            many => Cow::Owned(many.concat()),
        };
        let frame_bits = layout.frame_bits();
        let available = data.len() as u64;
        let bounds = frame_bits
            .checked_mul(u64::from(frame))
            .and_then(|start| Some((start, start.checked_add(frame_bits)?)));
        let (start_bit, needed) = match bounds {
            Some((start, end)) => (start, end / 8 + u64::from(end % 8 != 0)),
            None => (u64::MAX, u64::MAX),
        };
        ensure!(
            needed <= available,
            FrameTooShortSnafu {
                frame,
                expected: needed,
                actual: available,
            }
        );

        if layout.bits_allocated == 1 {
            ensure!(
                layout.samples_per_pixel == 1,
                UnsupportedLayoutSnafu {
                    codec: self.name()
                }
            );
            let mut out = vec![0_u8; layout.frame_len()];
            for i in 0..frame_bits {
                let bit = start_bit + i;
                if data[(bit / 8) as usize] >> (bit % 8) & 1 == 1 {
                    out[(i / 8) as usize] |= 1 << (i % 8);
                }
            }
            return Ok(out);
        }

        let start = (start_bit / 8) as usize;
        let bytes = data[start..start + layout.frame_len()].to_vec();
        Ok(interleave(bytes, layout))
    }
}

/// Encapsulated Uncompressed Explicit VR Little Endian,
/// where each frame is stored as is in its fragments.
#[derive(Debug, Default, Copy, Clone)]
pub struct EncapsulatedUncompressedCodec;

impl PixelCodec for EncapsulatedUncompressedCodec {
    fn name(&self) -> &'static str {
        "encapsulated uncompressed"
    }

    fn decode_frame(
        &self,
        _ts_uid: &str,
        fragments: &PixelFragments<'_>,
        frame: u32,
        frame_count: u32,
    ) -> Result<Vec<u8>, CodecError> {
        let layout = &fragments.layout;
        ensure!(
            layout.bits_allocated >= 8,
            UnsupportedLayoutSnafu {
                codec: self.name()
            }
        );
        let mut bytes = fragments.frame_fragments(frame, frame_count)?.concat();
        let expected = layout.frame_len();
        ensure!(
            bytes.len() >= expected,
            FrameTooShortSnafu {
                frame,
                expected: expected as u64,
                actual: bytes.len() as u64,
            }
        );
        // drop the fragment padding
        bytes.truncate(expected);
        Ok(interleave(bytes, layout))
    }
}

/// RLE Lossless.
#[derive(Debug, Default, Copy, Clone)]
pub struct RleCodec;

impl PixelCodec for RleCodec {
    fn name(&self) -> &'static str {
        "RLE lossless"
    }

    fn decode_frame(
        &self,
        _ts_uid: &str,
        fragments: &PixelFragments<'_>,
        frame: u32,
        frame_count: u32,
    ) -> Result<Vec<u8>, CodecError> {
        let layout = &fragments.layout;
        let data = fragments.frame_fragments(frame, frame_count)?.concat();
        rle::decode_frame(
            &data,
            layout.pixels(),
            layout.samples_per_pixel,
            layout.bits_allocated,
        )
        .context(DecodeRleSnafu)
    }
}

/// A table of pixel codecs by transfer syntax UID.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn PixelCodec>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.codecs.iter().map(|(uid, codec)| (uid, codec.name())))
            .finish()
    }
}

static BUILTIN: Lazy<CodecRegistry> = Lazy::new(|| {
    let mut registry = CodecRegistry::empty();
    let native: Arc<dyn PixelCodec> = Arc::new(NativeCodec);
    for ts in [
        transfer_syntax::IMPLICIT_VR_LITTLE_ENDIAN,
        transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN,
        transfer_syntax::EXPLICIT_VR_BIG_ENDIAN,
    ] {
        registry.register_arc(ts.uid(), native.clone());
    }
    registry.register(
        transfer_syntax::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN.uid(),
        EncapsulatedUncompressedCodec,
    );
    registry.register(transfer_syntax::RLE_LOSSLESS.uid(), RleCodec);
    registry
});

impl CodecRegistry {
    /// A registry without any codec.
    pub fn empty() -> Self {
        CodecRegistry {
            codecs: HashMap::new(),
        }
    }

    /// The registry of built-in codecs.
    pub fn builtin() -> &'static CodecRegistry {
        &BUILTIN
    }

    /// Register a codec for a transfer syntax,
    /// replacing any previous one.
    pub fn register(&mut self, ts_uid: &str, codec: impl PixelCodec + 'static) -> &mut Self {
        self.register_arc(ts_uid, Arc::new(codec))
    }

    pub fn register_arc(&mut self, ts_uid: &str, codec: Arc<dyn PixelCodec>) -> &mut Self {
        self.codecs.insert(trim_uid(ts_uid).to_string(), codec);
        self
    }

    /// Fetch the codec for a transfer syntax.
    pub fn get(&self, ts_uid: &str) -> Option<&Arc<dyn PixelCodec>> {
        self.codecs.get(trim_uid(ts_uid))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        CodecRegistry::builtin().clone()
    }
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c: char| c == ' ' || c == '\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(rows: u16, columns: u16, spp: u16, ba: u16, planar: u16) -> FrameLayout {
        FrameLayout {
            rows,
            columns,
            samples_per_pixel: spp,
            bits_allocated: ba,
            planar_configuration: planar,
        }
    }

    #[test]
    fn builtin_codecs() {
        let registry = CodecRegistry::builtin();
        assert_eq!(registry.get("1.2.840.10008.1.2").unwrap().name(), "native");
        assert_eq!(registry.get("1.2.840.10008.1.2.1\0").unwrap().name(), "native");
        assert_eq!(registry.get("1.2.840.10008.1.2.2").unwrap().name(), "native");
        assert_eq!(
            registry.get("1.2.840.10008.1.2.1.98").unwrap().name(),
            "encapsulated uncompressed"
        );
        assert_eq!(registry.get("1.2.840.10008.1.2.5").unwrap().name(), "RLE lossless");
        assert!(registry.get("1.2.840.10008.1.2.4.50").is_none());
    }

    #[test]
    fn native_second_frame() {
        let data: Vec<u8> = (0..8).collect();
        let fragments = PixelFragments::native(&data, layout(1, 2, 1, 16, 0));
        let frame = NativeCodec.decode_frame("", &fragments, 1, 2).unwrap();
        assert_eq!(frame, vec![4, 5, 6, 7]);

        let err = NativeCodec.decode_frame("", &fragments, 2, 3).unwrap_err();
        assert!(matches!(
            err,
            CodecError::FrameTooShort {
                frame: 2,
                expected: 12,
                actual: 8
            }
        ));
    }

    #[test]
    fn native_frame_past_addressable_bits() {
        let data = [0_u8; 16];
        let fragments = PixelFragments::native(&data, layout(u16::MAX, u16::MAX, 3, 32, 0));
        let err = NativeCodec
            .decode_frame("", &fragments, u32::MAX, u32::MAX)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::FrameTooShort {
                expected: u64::MAX,
                actual: 16,
                ..
            }
        ));
    }

    #[test]
    fn native_planar_rgb() {
        let data = [1, 2, 10, 20, 100, 200];
        let fragments = PixelFragments::native(&data, layout(1, 2, 3, 8, 1));
        let frame = NativeCodec.decode_frame("", &fragments, 0, 1).unwrap();
        assert_eq!(frame, vec![1, 10, 100, 2, 20, 200]);
    }

    #[test]
    fn native_single_bit_frames() {
        // two frames of 2x2 pixels packed in one byte
        let data = [0b1010_0110];
        let fragments = PixelFragments::native(&data, layout(2, 2, 1, 1, 0));
        let first = NativeCodec.decode_frame("", &fragments, 0, 2).unwrap();
        let second = NativeCodec.decode_frame("", &fragments, 1, 2).unwrap();
        assert_eq!(first, vec![0b0110]);
        assert_eq!(second, vec![0b1010]);
    }

    #[test]
    fn fragments_through_offset_table() {
        let a = [1_u8, 2];
        let b = [3_u8, 4];
        let c = [5_u8, 6];
        let fragments = PixelFragments {
            offset_table: &[0, 20],
            fragments: vec![&a[..], &b[..], &c[..]],
            layout: layout(1, 2, 1, 8, 0),
        };
        assert_eq!(fragments.frame_fragments(0, 2).unwrap(), vec![&a[..], &b[..]]);
        assert_eq!(fragments.frame_fragments(1, 2).unwrap(), vec![&c[..]]);
        assert!(matches!(
            fragments.frame_fragments(2, 3),
            Err(CodecError::MissingFragments { frame: 2, .. })
        ));
    }

    #[test]
    fn one_fragment_per_frame_without_table() {
        let a = [1_u8, 2, 0];
        let b = [3_u8, 4, 0];
        let fragments = PixelFragments {
            offset_table: &[],
            fragments: vec![&a[..], &b[..]],
            layout: layout(1, 2, 1, 8, 0),
        };
        let frame = EncapsulatedUncompressedCodec
            .decode_frame("1.2.840.10008.1.2.1.98", &fragments, 1, 2)
            .unwrap();
        assert_eq!(frame, vec![3, 4]);

        assert!(matches!(
            fragments.frame_fragments(0, 3),
            Err(CodecError::MissingFragments { .. })
        ));
    }
}
