//! Fetching the image attributes which drive pixel data decoding.

use crate::transform::{Rescale, VoiLutFunction, WindowLevel};
use minidcm_core::dictionary::tags;
use minidcm_core::value::ConvertValueError;
use minidcm_core::{DataDictionary, Tag};
use minidcm_object::InMemDicomObject;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fmt;
use tracing::warn;

#[derive(Debug, Snafu)]
pub enum GetAttributeError {
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingRequiredField {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertValue {
        name: &'static str,
        source: ConvertValueError,
        backtrace: Backtrace,
    },

    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidValue {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

/// An interpreted representation of the _Pixel Representation_ attribute.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PixelRepresentation {
    /// unsigned pixel data sample values
    #[default]
    Unsigned,
    /// signed pixel data sample values, in two's complement
    Signed,
}

/// An interpreted representation of the _Photometric Interpretation_ attribute.
#[derive(Debug, Default, Clone, Eq, Hash, PartialEq)]
pub enum PhotometricInterpretation {
    /// the minimum sample value is displayed as white
    Monochrome1,
    /// the minimum sample value is displayed as black
    #[default]
    Monochrome2,
    PaletteColor,
    Rgb,
    YbrFull,
    YbrFull422,
    /// any other interpretation, kept as written
    Other(String),
}

impl PhotometricInterpretation {
    pub fn as_str(&self) -> &str {
        match self {
            PhotometricInterpretation::Monochrome1 => "MONOCHROME1",
            PhotometricInterpretation::Monochrome2 => "MONOCHROME2",
            PhotometricInterpretation::PaletteColor => "PALETTE COLOR",
            PhotometricInterpretation::Rgb => "RGB",
            PhotometricInterpretation::YbrFull => "YBR_FULL",
            PhotometricInterpretation::YbrFull422 => "YBR_FULL_422",
            PhotometricInterpretation::Other(s) => s,
        }
    }

    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }
}

impl From<&str> for PhotometricInterpretation {
    fn from(s: &str) -> Self {
        match s.trim() {
            "MONOCHROME1" => PhotometricInterpretation::Monochrome1,
            "MONOCHROME2" => PhotometricInterpretation::Monochrome2,
            "PALETTE COLOR" => PhotometricInterpretation::PaletteColor,
            "RGB" => PhotometricInterpretation::Rgb,
            "YBR_FULL" => PhotometricInterpretation::YbrFull,
            "YBR_FULL_422" => PhotometricInterpretation::YbrFull422,
            other => PhotometricInterpretation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get the Columns from the DICOM object
pub fn cols<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u16> {
    retrieve_required_u16(obj, tags::COLUMNS, "Columns")
}

/// Get the Rows from the DICOM object
pub fn rows<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u16> {
    retrieve_required_u16(obj, tags::ROWS, "Rows")
}

/// Get the BitsAllocated from the DICOM object
pub fn bits_allocated<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u16> {
    retrieve_required_u16(obj, tags::BITS_ALLOCATED, "BitsAllocated")
}

/// Get the BitsStored from the DICOM object, if present
pub fn bits_stored<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<Option<u16>> {
    retrieve_optional_u16(obj, tags::BITS_STORED, "BitsStored")
}

/// Get the HighBit from the DICOM object, if present
pub fn high_bit<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<Option<u16>> {
    retrieve_optional_u16(obj, tags::HIGH_BIT, "HighBit")
}

/// Get the SamplesPerPixel from the DICOM object, 1 by default
pub fn samples_per_pixel<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u16> {
    let spp = retrieve_optional_u16(obj, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?
        .unwrap_or(1);
    ensure!(
        spp > 0,
        InvalidValueSnafu {
            name: "SamplesPerPixel",
            value: spp.to_string(),
        }
    );
    Ok(spp)
}

/// Get the PlanarConfiguration from the DICOM object, 0 by default
pub fn planar_configuration<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u16> {
    let value = retrieve_optional_u16(obj, tags::PLANAR_CONFIGURATION, "PlanarConfiguration")?
        .unwrap_or(0);
    ensure!(
        value <= 1,
        InvalidValueSnafu {
            name: "PlanarConfiguration",
            value: value.to_string(),
        }
    );
    Ok(value)
}

/// Get the PhotometricInterpretation from the DICOM object,
/// MONOCHROME2 by default
pub fn photometric_interpretation<D: DataDictionary>(
    obj: &InMemDicomObject<D>,
) -> PhotometricInterpretation {
    obj.string(tags::PHOTOMETRIC_INTERPRETATION)
        .filter(|s| !s.trim().is_empty())
        .map(|s| PhotometricInterpretation::from(s.as_ref()))
        .unwrap_or_default()
}

/// Get the PixelRepresentation from the DICOM object, unsigned by default
pub fn pixel_representation<D: DataDictionary>(
    obj: &InMemDicomObject<D>,
) -> Result<PixelRepresentation> {
    match retrieve_optional_u16(obj, tags::PIXEL_REPRESENTATION, "PixelRepresentation")? {
        None | Some(0) => Ok(PixelRepresentation::Unsigned),
        Some(1) => Ok(PixelRepresentation::Signed),
        Some(p) => InvalidValueSnafu {
            name: "PixelRepresentation",
            value: p.to_string(),
        }
        .fail(),
    }
}

/// Get the NumberOfFrames from the DICOM object,
/// returning 1 if it is not present
pub fn number_of_frames<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<u32> {
    let Some(elem) = obj.get(tags::NUMBER_OF_FRAMES) else {
        return Ok(1);
    };
    if elem.value().primitive().map_or(true, |v| v.multiplicity() == 0) {
        return Ok(1);
    }

    let integer = elem.to_int::<i64>().context(ConvertValueSnafu {
        name: "NumberOfFrames",
    })?;
    ensure!(
        integer > 0 && integer <= i64::from(u32::MAX),
        InvalidValueSnafu {
            name: "NumberOfFrames",
            value: integer.to_string(),
        }
    );
    Ok(integer as u32)
}

/// Get the rescale function from the DICOM object,
/// with slope 1 and intercept 0 for whatever is missing
pub fn rescale<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Rescale {
    Rescale::new(
        obj.float64(tags::RESCALE_SLOPE).unwrap_or(1.),
        obj.float64(tags::RESCALE_INTERCEPT).unwrap_or(0.),
    )
}

/// Retrieve the first window of the DICOM object, if it has one.
pub fn window<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Option<WindowLevel> {
    let center = obj.float64(tags::WINDOW_CENTER)?;
    let width = obj.float64(tags::WINDOW_WIDTH)?;
    Some(WindowLevel::new(center, width))
}

/// Get the VOILUTFunction from the DICOM object.
///
/// Unknown functions fall back to `LINEAR`.
pub fn voi_lut_function<D: DataDictionary>(obj: &InMemDicomObject<D>) -> VoiLutFunction {
    let Some(name) = obj.string(tags::VOILUT_FUNCTION) else {
        return VoiLutFunction::default();
    };
    name.parse().unwrap_or_else(|e| {
        warn!("{}, using LINEAR", e);
        VoiLutFunction::default()
    })
}

#[inline]
fn retrieve_required_u16<D>(obj: &InMemDicomObject<D>, tag: Tag, name: &'static str) -> Result<u16>
where
    D: DataDictionary,
{
    retrieve_optional_u16(obj, tag, name)?.context(MissingRequiredFieldSnafu { name })
}

#[inline]
fn retrieve_optional_u16<D>(
    obj: &InMemDicomObject<D>,
    tag: Tag,
    name: &'static str,
) -> Result<Option<u16>>
where
    D: DataDictionary,
{
    let Some(elem) = obj.get(tag) else {
        return Ok(None);
    };
    if elem.value().primitive().map_or(false, |v| v.multiplicity() == 0) {
        return Ok(None);
    }
    elem.to_int::<u16>()
        .context(ConvertValueSnafu { name })
        .map(Some)
}

/// All attributes describing how the pixel data of an image is laid out
/// and how its sample values are to be transformed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    pub rows: u16,
    pub columns: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub pixel_representation: PixelRepresentation,
    pub samples_per_pixel: u16,
    pub photometric_interpretation: PhotometricInterpretation,
    pub planar_configuration: u16,
    pub number_of_frames: u32,
    pub rescale: Rescale,
    /// the first window declared by the object
    pub window: Option<WindowLevel>,
    pub voi_lut_function: VoiLutFunction,
}

impl ImageAttributes {
    /// Gather the image attributes of an object,
    /// applying defaults for those which are optional.
    pub fn from_object<D: DataDictionary>(obj: &InMemDicomObject<D>) -> Result<Self> {
        let bits_allocated = bits_allocated(obj)?;
        ensure!(
            bits_allocated > 0,
            InvalidValueSnafu {
                name: "BitsAllocated",
                value: "0",
            }
        );
        let bits_stored = bits_stored(obj)?.unwrap_or(bits_allocated);
        ensure!(
            bits_stored > 0 && bits_stored <= bits_allocated,
            InvalidValueSnafu {
                name: "BitsStored",
                value: bits_stored.to_string(),
            }
        );
        let high_bit = high_bit(obj)?.unwrap_or(bits_stored - 1);
        ensure!(
            high_bit >= bits_stored - 1 && high_bit < bits_allocated,
            InvalidValueSnafu {
                name: "HighBit",
                value: high_bit.to_string(),
            }
        );

        let attrs = ImageAttributes {
            rows: rows(obj)?,
            columns: cols(obj)?,
            bits_allocated,
            bits_stored,
            high_bit,
            pixel_representation: pixel_representation(obj)?,
            samples_per_pixel: samples_per_pixel(obj)?,
            photometric_interpretation: photometric_interpretation(obj),
            planar_configuration: planar_configuration(obj)?,
            number_of_frames: number_of_frames(obj)?,
            rescale: rescale(obj),
            window: window(obj),
            voi_lut_function: voi_lut_function(obj),
        };
        ensure!(
            attrs.native_len().is_some(),
            InvalidValueSnafu {
                name: "NumberOfFrames",
                value: attrs.number_of_frames.to_string(),
            }
        );
        Ok(attrs)
    }

    pub fn is_signed(&self) -> bool {
        self.pixel_representation == PixelRepresentation::Signed
    }

    /// The number of samples in one frame.
    pub fn samples_per_frame(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns) * usize::from(self.samples_per_pixel)
    }

    /// The number of bits taken by one frame of native pixel data.
    ///
    /// Four 16-bit factors always fit in 64 bits.
    pub fn frame_bits(&self) -> u64 {
        u64::from(self.rows)
            * u64::from(self.columns)
            * u64::from(self.samples_per_pixel)
            * u64::from(self.bits_allocated)
    }

    /// The byte length of the native pixel data of all frames,
    /// or `None` if it does not fit in 64 bits.
    pub fn native_len(&self) -> Option<u64> {
        let bits = self
            .frame_bits()
            .checked_mul(u64::from(self.number_of_frames))?;
        Some(bits / 8 + u64::from(bits % 8 != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidcm_core::{dicom_value, DataElement, VR};

    fn minimal() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [4])),
            DataElement::new(tags::COLUMNS, VR::US, dicom_value!(U16, [3])),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, dicom_value!(U16, [16])),
        ])
    }

    #[test]
    fn defaults_are_applied() {
        let attrs = ImageAttributes::from_object(&minimal()).unwrap();
        assert_eq!(attrs.rows, 4);
        assert_eq!(attrs.columns, 3);
        assert_eq!(attrs.bits_stored, 16);
        assert_eq!(attrs.high_bit, 15);
        assert_eq!(attrs.pixel_representation, PixelRepresentation::Unsigned);
        assert_eq!(attrs.samples_per_pixel, 1);
        assert_eq!(
            attrs.photometric_interpretation,
            PhotometricInterpretation::Monochrome2
        );
        assert_eq!(attrs.planar_configuration, 0);
        assert_eq!(attrs.number_of_frames, 1);
        assert_eq!(attrs.rescale, Rescale::new(1., 0.));
        assert_eq!(attrs.window, None);
        assert_eq!(attrs.voi_lut_function, VoiLutFunction::Linear);
        assert_eq!(attrs.native_len(), Some(24));
    }

    #[test]
    fn declared_values_are_read() {
        let mut obj = minimal();
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, dicom_value!(U16, [12])));
        obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, dicom_value!(U16, [1])));
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            dicom_value!(Strs, ["MONOCHROME1"]),
        ));
        obj.put(DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, dicom_value!(I32, [3])));
        obj.put(DataElement::new(tags::RESCALE_SLOPE, VR::DS, dicom_value!(F64, [2.])));
        obj.put(DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, dicom_value!(F64, [-1024.])));
        obj.put(DataElement::new(tags::WINDOW_CENTER, VR::DS, dicom_value!(F64, [40., 400.])));
        obj.put(DataElement::new(tags::WINDOW_WIDTH, VR::DS, dicom_value!(F64, [80., 2000.])));
        obj.put(DataElement::new(
            tags::VOILUT_FUNCTION,
            VR::CS,
            dicom_value!(Strs, ["SIGMOID"]),
        ));

        let attrs = ImageAttributes::from_object(&obj).unwrap();
        assert_eq!(attrs.bits_stored, 12);
        assert_eq!(attrs.high_bit, 11);
        assert!(attrs.is_signed());
        assert_eq!(
            attrs.photometric_interpretation,
            PhotometricInterpretation::Monochrome1
        );
        assert_eq!(attrs.number_of_frames, 3);
        assert_eq!(attrs.rescale, Rescale::new(2., -1024.));
        assert_eq!(attrs.window, Some(WindowLevel::new(40., 80.)));
        assert_eq!(attrs.voi_lut_function, VoiLutFunction::Sigmoid);
        assert_eq!(attrs.native_len(), Some(72));
    }

    #[test]
    fn missing_rows_is_an_error() {
        let mut obj = minimal();
        obj.remove(tags::ROWS);
        let err = ImageAttributes::from_object(&obj).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::MissingRequiredField { name: "Rows", .. }
        ));
    }

    #[test]
    fn bits_stored_beyond_bits_allocated_is_invalid() {
        let mut obj = minimal();
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, dicom_value!(U16, [17])));
        let err = ImageAttributes::from_object(&obj).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::InvalidValue { name: "BitsStored", .. }
        ));
    }

    #[test]
    fn high_bit_at_the_type_limit_is_invalid() {
        let mut obj = minimal();
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, dicom_value!(U16, [u16::MAX])));
        let err = ImageAttributes::from_object(&obj).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::InvalidValue { name: "HighBit", .. }
        ));
    }

    #[test]
    fn high_bit_below_bits_stored_is_invalid() {
        let mut obj = minimal();
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, dicom_value!(U16, [12])));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, dicom_value!(U16, [10])));
        let err = ImageAttributes::from_object(&obj).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::InvalidValue { name: "HighBit", .. }
        ));
    }

    #[test]
    fn pixel_data_too_large_to_address_is_invalid() {
        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(tags::ROWS, VR::US, dicom_value!(U16, [u16::MAX])),
            DataElement::new(tags::COLUMNS, VR::US, dicom_value!(U16, [u16::MAX])),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, dicom_value!(U16, [3])),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, dicom_value!(U16, [32])),
            DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, dicom_value!(I32, [i32::MAX])),
        ]);
        let err = ImageAttributes::from_object(&obj).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::InvalidValue {
                name: "NumberOfFrames",
                ..
            }
        ));

        let attrs = ImageAttributes {
            rows: u16::MAX,
            columns: u16::MAX,
            bits_allocated: 32,
            bits_stored: 32,
            high_bit: 31,
            pixel_representation: PixelRepresentation::Unsigned,
            samples_per_pixel: 3,
            photometric_interpretation: PhotometricInterpretation::Rgb,
            planar_configuration: 0,
            number_of_frames: u32::MAX,
            rescale: Rescale::new(1., 0.),
            window: None,
            voi_lut_function: VoiLutFunction::Linear,
        };
        assert_eq!(attrs.native_len(), None);
        assert_eq!(attrs.frame_bits(), 65535 * 65535 * 3 * 32);
    }

    #[test]
    fn unknown_photometric_interpretation_is_kept() {
        let pi = PhotometricInterpretation::from("XYZ ");
        assert_eq!(pi, PhotometricInterpretation::Other("XYZ".to_string()));
        assert!(!pi.is_monochrome());
        assert_eq!(pi.to_string(), "XYZ");
    }
}
