//! This crate resolves the pixel data of DICOM objects into
//! displayable frames.
//!
//! For each frame, the stored pixel data is decoded by a [`PixelCodec`]
//! picked by transfer syntax,
//! its samples are unpacked,
//! the modality rescale is applied,
//! and a VOI window maps them to normalized intensities.
//! The outcome is a [`PixelBuffer`].
//!
//! # Examples
//! ```no_run
//! # use std::error::Error;
//! use minidcm_object::{open_file, ReadOptions};
//! use minidcm_pixeldata::PixelDecoder;
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let outcome = open_file("dicom.dcm", &ReadOptions::default())?;
//! let frame = outcome.object.decode_frame(0)?;
//! println!("{}x{}, window {:?}", frame.columns, frame.rows, frame.window);
//! #   Ok(())
//! # }
//! ```
//!
//! Files read with deferred pixel data need a [`BulkDataSource`]
//! to fetch the pixel data from,
//! which is given to a [`PixelDataResolver`].

use byteorder::{ByteOrder, LittleEndian};
use minidcm_core::dictionary::tags;
use minidcm_core::value::{ByteRange, PrimitiveValue, Value, ValueType};
use minidcm_core::{DataDictionary, StandardDataDictionary, VR};
use minidcm_encoding::transfer_syntax;
use minidcm_object::{FileDicomObject, InMemDicomObject};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, warn};

pub mod attribute;
pub mod bulk;
pub mod codec;
mod lut;
pub mod rle;
pub mod sample;
mod transform;

pub use attribute::{
    GetAttributeError, ImageAttributes, PhotometricInterpretation, PixelRepresentation,
};
pub use bulk::{BulkDataSource, FileBulkData};
pub use codec::{CodecError, CodecRegistry, FrameLayout, PixelCodec, PixelFragments};
pub use lut::{CreateLutError, Lut};
pub use transform::{
    ParseVoiLutFunctionError, Rescale, VoiLutFunction, WindowLevel, WindowLevelTransform,
};

use sample::{SampleLayout, UnpackError};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read image attributes"))]
    GetAttribute {
        #[snafu(backtrace)]
        source: GetAttributeError,
    },

    #[snafu(display("Missing pixel data"))]
    MissingPixelData { backtrace: Backtrace },

    #[snafu(display("No pixel codec for transfer syntax {}", ts_uid))]
    UnsupportedCodec { ts_uid: String, backtrace: Backtrace },

    #[snafu(display("Frame #{} is out of range ({} frames)", frame, frame_count))]
    FrameOutOfRange {
        frame: u32,
        frame_count: u32,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Pixel data holds {} bytes, but the image attributes call for {}",
        actual,
        expected
    ))]
    InconsistentDimensions {
        expected: u64,
        actual: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported bits allocated {}", bits_allocated))]
    UnsupportedBitsAllocated {
        bits_allocated: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Pixel data value of type {:?} cannot be resolved", value_type))]
    InvalidPixelValue {
        value_type: ValueType,
        backtrace: Backtrace,
    },

    #[snafu(display("Pixel data was left in the source, but no bulk data source was given"))]
    NoBulkDataSource { backtrace: Backtrace },

    #[snafu(display("Could not read bulk pixel data"))]
    ReadBulkData {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not decode frame #{}", frame))]
    DecodeFrame {
        frame: u32,
        source: CodecError,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not unpack the samples of frame #{}", frame))]
    UnpackSamples {
        frame: u32,
        source: UnpackError,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not build the look-up table"))]
    CreateLut {
        source: CreateLutError,
        backtrace: Backtrace,
    },
}

impl Error {
    /// Whether the error only keeps the image from being displayed,
    /// leaving the rest of the object usable.
    pub fn is_display_only(&self) -> bool {
        !matches!(self, Error::NoBulkDataSource { .. } | Error::ReadBulkData { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where the window applied to a frame came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowSource {
    /// Window Center and Window Width of the object
    File,
    /// the window requested by the caller
    Override,
    /// the range of the rescaled values of the frame
    MinMax,
}

/// The VOI window applied to a monochrome frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AppliedWindow {
    pub window: WindowLevel,
    pub function: VoiLutFunction,
    pub source: WindowSource,
}

/// Summary statistics of the rescaled values of a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// One resolved frame of pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub columns: u16,
    pub rows: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub signed: bool,
    pub photometric_interpretation: PhotometricInterpretation,
    /// the index of this frame
    pub frame: u32,
    /// modality values, in color-by-pixel order
    pub rescaled: Vec<f64>,
    pub rescale: Rescale,
    /// `None` for color images
    pub window: Option<AppliedWindow>,
    /// display values in `0..=1`,
    /// in the same order as `rescaled`
    pub intensities: Vec<f32>,
}

impl PixelBuffer {
    /// Compute the minimum, maximum and mean of the rescaled values.
    pub fn stats(&self) -> Option<FrameStats> {
        if self.rescaled.is_empty() {
            return None;
        }
        let (min, max, sum) = self.rescaled.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        Some(FrameStats {
            min,
            max,
            mean: sum / self.rescaled.len() as f64,
        })
    }

    /// The intensity of a sample, if in bounds.
    pub fn intensity(&self, x: u16, y: u16, sample: u16) -> Option<f32> {
        if x >= self.columns || y >= self.rows || sample >= self.samples_per_pixel {
            return None;
        }
        let index = (usize::from(y) * usize::from(self.columns) + usize::from(x))
            * usize::from(self.samples_per_pixel)
            + usize::from(sample);
        self.intensities.get(index).copied()
    }
}

/// Resolves the frames of an object's pixel data.
///
/// Resolution only reads from the object,
/// so the same resolver may serve frames from several threads.
pub struct PixelDataResolver<'a, D = StandardDataDictionary> {
    obj: &'a FileDicomObject<InMemDicomObject<D>>,
    codecs: &'a CodecRegistry,
    bulk: Option<&'a dyn BulkDataSource>,
    window: Option<WindowLevel>,
}

impl<D> fmt::Debug for PixelDataResolver<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelDataResolver")
            .field("transfer_syntax", &self.obj.meta().transfer_syntax())
            .field("codecs", &self.codecs)
            .field("bulk", &self.bulk.is_some())
            .field("window", &self.window)
            .finish()
    }
}

impl<'a, D> PixelDataResolver<'a, D>
where
    D: DataDictionary,
{
    /// Resolve the frames of the given object with the built-in codecs.
    pub fn new(obj: &'a FileDicomObject<InMemDicomObject<D>>) -> Self {
        PixelDataResolver {
            obj,
            codecs: CodecRegistry::builtin(),
            bulk: None,
            window: None,
        }
    }

    /// Use another set of codecs.
    pub fn with_codecs(mut self, codecs: &'a CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Fetch pixel data left in the source from the given bulk data source.
    pub fn with_bulk_data(mut self, bulk: &'a dyn BulkDataSource) -> Self {
        self.bulk = Some(bulk);
        self
    }

    /// Apply this window to monochrome frames
    /// when the object does not declare one.
    pub fn with_window(mut self, window: Option<WindowLevel>) -> Self {
        self.window = window;
        self
    }

    /// Read the image attributes of the object.
    pub fn attributes(&self) -> Result<ImageAttributes> {
        ImageAttributes::from_object(self.obj).context(GetAttributeSnafu)
    }

    /// The number of frames in the pixel data.
    pub fn frame_count(&self) -> Result<u32> {
        attribute::number_of_frames(&**self.obj).context(GetAttributeSnafu)
    }

    /// Resolve one frame of pixel data.
    pub fn resolve_frame(&self, frame: u32) -> Result<PixelBuffer> {
        let attrs = self.attributes()?;
        let frame_count = attrs.number_of_frames;
        ensure!(
            frame < frame_count,
            FrameOutOfRangeSnafu { frame, frame_count }
        );
        ensure!(
            matches!(attrs.bits_allocated, 1 | 8 | 16 | 32),
            UnsupportedBitsAllocatedSnafu {
                bits_allocated: attrs.bits_allocated
            }
        );

        let ts_uid = self.obj.meta().transfer_syntax();
        let codec = self
            .codecs
            .get(ts_uid)
            .context(UnsupportedCodecSnafu { ts_uid })?;
        debug!(frame, transfer_syntax = ts_uid, codec = codec.name(), "Resolving frame");

        let elem = self
            .obj
            .get(tags::PIXEL_DATA)
            .context(MissingPixelDataSnafu)?;
        let layout = FrameLayout {
            rows: attrs.rows,
            columns: attrs.columns,
            samples_per_pixel: attrs.samples_per_pixel,
            bits_allocated: attrs.bits_allocated,
            planar_configuration: attrs.planar_configuration,
        };

        let native: Cow<[u8]>;
        // deferred data is fetched one frame at a time,
        // so the codec then sees a single-frame stream
        let (fragments, codec_frame, codec_frame_count) = match elem.value() {
            Value::PixelSequence(seq) => (
                PixelFragments {
                    offset_table: seq.offset_table(),
                    fragments: seq.fragments().iter().map(Vec::as_slice).collect(),
                    layout,
                },
                frame,
                frame_count,
            ),
            Value::Primitive(value) => {
                native = native_bytes(value)?;
                check_native_len(&attrs, native.len() as u64)?;
                (PixelFragments::native(&native, layout), frame, frame_count)
            }
            Value::Deferred(range) => {
                let bulk = self.bulk.context(NoBulkDataSourceSnafu)?;
                check_native_len(&attrs, u64::from(range.len))?;
                let span = FrameSpan::of(&attrs, *range, frame);
                let mut bytes = bulk.read_range(span.range).context(ReadBulkDataSnafu)?;
                if is_big_endian(ts_uid) && elem.vr() == VR::OW {
                    for pair in bytes.chunks_exact_mut(2) {
                        pair.swap(0, 1);
                    }
                }
                if span.first_bit != 0 {
                    bytes = shift_bits(&bytes, span.first_bit, attrs.frame_bits());
                }
                native = Cow::Owned(bytes);
                (PixelFragments::native(&native, layout), 0, 1)
            }
            Value::Sequence(_) => {
                return InvalidPixelValueSnafu {
                    value_type: ValueType::Item,
                }
                .fail()
            }
        };

        let bytes = codec
            .decode_frame(ts_uid, &fragments, codec_frame, codec_frame_count)
            .context(DecodeFrameSnafu { frame })?;
        let samples = sample::unpack(
            &bytes,
            SampleLayout {
                bits_allocated: attrs.bits_allocated,
                bits_stored: attrs.bits_stored,
                high_bit: attrs.high_bit,
                signed: attrs.is_signed(),
            },
            attrs.samples_per_frame(),
        )
        .context(UnpackSamplesSnafu { frame })?;

        let rescale = attrs.rescale;
        let rescaled: Vec<f64> = samples.iter().map(|&v| rescale.apply(v as f64)).collect();

        let (window, intensities) = if attrs.photometric_interpretation.is_monochrome() {
            let window = self.pick_window(&attrs, &rescaled);
            let voi = WindowLevelTransform::new(window.function, window.window);
            let mut intensities = monochrome_intensities(&attrs, &samples, &rescaled, voi)?;
            if attrs.photometric_interpretation == PhotometricInterpretation::Monochrome1 {
                for v in &mut intensities {
                    *v = 1. - *v;
                }
            }
            (Some(window), intensities)
        } else {
            // color samples only need to fit the display range
            let max = ((1_u64 << attrs.bits_stored) - 1) as f64;
            let intensities = samples
                .iter()
                .map(|&v| (v as f64 / max).clamp(0., 1.) as f32)
                .collect();
            (None, intensities)
        };

        Ok(PixelBuffer {
            columns: attrs.columns,
            rows: attrs.rows,
            samples_per_pixel: attrs.samples_per_pixel,
            bits_allocated: attrs.bits_allocated,
            bits_stored: attrs.bits_stored,
            signed: attrs.is_signed(),
            photometric_interpretation: attrs.photometric_interpretation,
            frame,
            rescaled,
            rescale,
            window,
            intensities,
        })
    }

    fn pick_window(&self, attrs: &ImageAttributes, rescaled: &[f64]) -> AppliedWindow {
        let function = attrs.voi_lut_function;
        if let Some(window) = attrs.window {
            return AppliedWindow {
                window,
                function,
                source: WindowSource::File,
            };
        }
        if let Some(window) = self.window {
            return AppliedWindow {
                window,
                function,
                source: WindowSource::Override,
            };
        }
        let (min, max) = rescaled
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        let window = if min <= max {
            WindowLevel::from_range(min, max)
        } else {
            WindowLevel::new(0., 1.)
        };
        AppliedWindow {
            window,
            function,
            source: WindowSource::MinMax,
        }
    }
}

fn monochrome_intensities(
    attrs: &ImageAttributes,
    samples: &[i64],
    rescaled: &[f64],
    voi: WindowLevelTransform,
) -> Result<Vec<f32>> {
    if attrs.bits_stored <= lut::MAX_LUT_BITS && samples.len() > 1 << attrs.bits_stored {
        let lut: Lut<f32> =
            Lut::new_rescale_and_window(attrs.bits_stored, attrs.is_signed(), attrs.rescale, voi)
                .context(CreateLutSnafu)?;
        Ok(samples.iter().map(|&v| lut.get(v)).collect())
    } else {
        Ok(rescaled.iter().map(|&v| voi.apply(v) as f32).collect())
    }
}

fn native_bytes(value: &PrimitiveValue) -> Result<Cow<'_, [u8]>> {
    match value {
        PrimitiveValue::U8(bytes) => Ok(Cow::Borrowed(&bytes[..])),
        PrimitiveValue::U16(words) => {
            let mut bytes = vec![0; words.len() * 2];
            LittleEndian::write_u16_into(words, &mut bytes);
            Ok(Cow::Owned(bytes))
        }
        PrimitiveValue::U32(words) => {
            let mut bytes = vec![0; words.len() * 4];
            LittleEndian::write_u32_into(words, &mut bytes);
            Ok(Cow::Owned(bytes))
        }
        PrimitiveValue::Empty => MissingPixelDataSnafu.fail(),
        other => InvalidPixelValueSnafu {
            value_type: other.value_type(),
        }
        .fail(),
    }
}

/// Native pixel data must match the image attributes,
/// give or take one padding byte.
fn check_native_len(attrs: &ImageAttributes, actual: u64) -> Result<()> {
    let expected = attrs.native_len();
    match expected {
        Some(expected) if actual == expected => return Ok(()),
        Some(expected) if actual == expected + 1 && expected % 2 == 1 => return Ok(()),
        _ => {}
    }
    let expected = expected.unwrap_or(u64::MAX);
    warn!(
        tag = %tags::PIXEL_DATA,
        condition = "InconsistentDimensions",
        severity = "display",
        expected,
        actual,
        "Pixel data length does not match the image attributes"
    );
    InconsistentDimensionsSnafu { expected, actual }.fail()
}

/// The bytes of deferred native pixel data holding one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct FrameSpan {
    range: ByteRange,
    /// bit position of the frame's first sample in the first byte,
    /// nonzero only for packed 1-bit frames
    first_bit: u8,
}

impl FrameSpan {
    /// Locate a frame within pixel data
    /// whose length was checked against the attributes.
    fn of(attrs: &ImageAttributes, data: ByteRange, frame: u32) -> Self {
        let frame_bits = attrs.frame_bits();
        let start_bit = frame_bits * u64::from(frame);
        let end_bit = start_bit + frame_bits;
        let start = start_bit / 8;
        let end = end_bit / 8 + u64::from(end_bit % 8 != 0);
        FrameSpan {
            range: ByteRange {
                offset: data.offset + start,
                len: (end - start) as u32,
            },
            first_bit: (start_bit % 8) as u8,
        }
    }
}

/// Move a run of packed bits to the start of a fresh buffer.
fn shift_bits(bytes: &[u8], first_bit: u8, bits: u64) -> Vec<u8> {
    let mut out = vec![0_u8; (bits / 8 + u64::from(bits % 8 != 0)) as usize];
    for i in 0..bits {
        let bit = u64::from(first_bit) + i;
        if bytes[(bit / 8) as usize] >> (bit % 8) & 1 == 1 {
            out[(i / 8) as usize] |= 1 << (i % 8);
        }
    }
    out
}

fn is_big_endian(ts_uid: &str) -> bool {
    transfer_syntax::get(ts_uid)
        .map_or(false, |ts| ts.endianness() == byteordered::Endianness::Big)
}

/// Frame decoding for file DICOM objects,
/// with the built-in codecs and no bulk data source.
pub trait PixelDecoder {
    /// Resolve one frame of the pixel data.
    fn decode_frame(&self, frame: u32) -> Result<PixelBuffer>;
}

impl<D> PixelDecoder for FileDicomObject<InMemDicomObject<D>>
where
    D: DataDictionary,
{
    fn decode_frame(&self, frame: u32) -> Result<PixelBuffer> {
        PixelDataResolver::new(self).resolve_frame(frame)
    }
}
