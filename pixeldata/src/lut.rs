//! Look-up tables over stored sample values.
//!
//! A [`Lut`] holds the outcome of a sample value transformation
//! for every value representable in _Bits Stored_ bits,
//! so that frames with many pixels only compute each distinct value once.

use num_traits::NumCast;
use snafu::{ensure, OptionExt, Snafu};

use crate::transform::{Rescale, WindowLevelTransform};

/// The largest _Bits Stored_ for which a table is built.
pub const MAX_LUT_BITS: u16 = 16;

/// An error which may occur when creating a look-up table.
#[derive(Debug, PartialEq, Snafu)]
pub enum CreateLutError {
    /// Tables are not built for this sample depth.
    #[snafu(display("Cannot build a look-up table for {} bits stored", bits_stored))]
    UnsupportedBitsStored { bits_stored: u16 },
    /// A transformed value could not be cast to the table's type.
    #[snafu(display("Entry #{} was mapped to {}, which is out of range", index, y_value))]
    CastEntry { index: usize, y_value: f64 },
}

/// A look-up table from stored sample values to transformed values.
///
/// # Example
///
/// ```
/// # use minidcm_pixeldata::{Lut, Rescale, WindowLevel, WindowLevelTransform};
/// let lut: Lut<f32> = Lut::new_rescale_and_window(
///     12,
///     false,
///     Rescale::new(1., -1024.),
///     WindowLevelTransform::linear(WindowLevel::new(40., 80.)),
/// )?;
/// assert_eq!(lut.get(0), 0.);
/// assert_eq!(lut.get(4095), 1.);
/// # Ok::<(), minidcm_pixeldata::CreateLutError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Lut<T> {
    /// one entry per stored value;
    /// negative values sit in the upper half of a signed table
    table: Vec<T>,
    signed: bool,
}

impl<T> Lut<T>
where
    T: NumCast + Copy,
{
    /// Build a table by calling `f` with every value
    /// which fits in `bits_stored` bits,
    /// interpreted as two's complement if `signed`.
    pub fn new_with_fn(
        bits_stored: u16,
        signed: bool,
        f: impl Fn(f64) -> f64,
    ) -> Result<Self, CreateLutError> {
        ensure!(
            bits_stored > 0 && bits_stored <= MAX_LUT_BITS,
            UnsupportedBitsStoredSnafu { bits_stored }
        );
        let size = 1_usize << bits_stored;
        let table = (0..size)
            .map(|index| {
                let x = if signed && index >= size / 2 {
                    index as f64 - size as f64
                } else {
                    index as f64
                };
                let y_value = f(x);
                T::from(y_value).context(CastEntrySnafu { index, y_value })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Lut { table, signed })
    }

    /// A table of rescaled values.
    pub fn new_rescale(
        bits_stored: u16,
        signed: bool,
        rescale: Rescale,
    ) -> Result<Self, CreateLutError> {
        Self::new_with_fn(bits_stored, signed, |x| rescale.apply(x))
    }

    /// A table of rescaled then windowed values, in `0..=1`.
    pub fn new_rescale_and_window(
        bits_stored: u16,
        signed: bool,
        rescale: Rescale,
        voi: WindowLevelTransform,
    ) -> Result<Self, CreateLutError> {
        Self::new_with_fn(bits_stored, signed, |x| voi.apply(rescale.apply(x)))
    }

    /// Look up a stored value,
    /// which must be representable in the table's number of bits.
    ///
    /// # Panics
    ///
    /// Panics if the value is out of range.
    #[inline]
    pub fn get(&self, stored: i64) -> T {
        let index = if self.signed && stored < 0 {
            stored + self.table.len() as i64
        } else {
            stored
        };
        self.table[index as usize]
    }

    /// The number of entries in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{VoiLutFunction, WindowLevel};

    #[test]
    fn signed_rescale_table() {
        let lut: Lut<i16> = Lut::new_rescale(10, true, Rescale::new(2., -1024.)).unwrap();
        assert_eq!(lut.len(), 1024);
        assert_eq!(lut.get(0), -1024);
        assert_eq!(lut.get(1), -1022);
        assert_eq!(lut.get(-1), -1026);
        assert_eq!(lut.get(-512), -2048);
        assert_eq!(lut.get(500), -24);
    }

    #[test]
    fn windowed_table_16_bits() {
        let lut: Lut<f32> = Lut::new_rescale_and_window(
            16,
            false,
            Rescale::new(1., -1024.),
            WindowLevelTransform::new(VoiLutFunction::Linear, WindowLevel::new(50., 300.)),
        )
        .unwrap();

        assert_eq!(lut.get(824), 0.);
        assert_eq!(lut.get(1224), 1.);
        let mid = lut.get(1024 + 50);
        assert!(mid > 0.49 && mid < 0.51, "got {}", mid);
    }

    #[test]
    fn out_of_range_entries_are_rejected() {
        let err = Lut::<u8>::new_rescale(8, false, Rescale::new(2., 0.)).unwrap_err();
        assert_eq!(
            err,
            CreateLutError::CastEntry {
                index: 128,
                y_value: 256.
            }
        );
    }

    #[test]
    fn deep_samples_have_no_table() {
        let err = Lut::<f32>::new_rescale(32, false, Rescale::default()).unwrap_err();
        assert_eq!(err, CreateLutError::UnsupportedBitsStored { bits_stored: 32 });
    }
}
