//! Sample value transformations: modality rescale and VOI windowing.
//!
//! Windowing functions map rescaled values into the `0..=1` range.

use snafu::Snafu;
use std::str::FromStr;

/// The modality rescale function,
/// `output = slope * raw + intercept`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Rescale::IDENTITY
    }
}

impl Rescale {
    /// Slope 1, intercept 0.
    pub const IDENTITY: Rescale = Rescale {
        slope: 1.,
        intercept: 0.,
    };

    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.slope + self.intercept
    }
}

/// A VOI LUT function, as in the _VOI LUT Function_ attribute.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum VoiLutFunction {
    /// `LINEAR`
    #[default]
    Linear,
    /// `LINEAR_EXACT`
    LinearExact,
    /// `SIGMOID`
    Sigmoid,
}

/// The name of a VOI LUT function was not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("Unknown VOI LUT function `{}`", name))]
pub struct ParseVoiLutFunctionError {
    name: String,
}

impl FromStr for VoiLutFunction {
    type Err = ParseVoiLutFunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LINEAR" => Ok(VoiLutFunction::Linear),
            "LINEAR_EXACT" => Ok(VoiLutFunction::LinearExact),
            "SIGMOID" => Ok(VoiLutFunction::Sigmoid),
            other => ParseVoiLutFunctionSnafu { name: other }.fail(),
        }
    }
}

/// A window, made of a center and a width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    pub center: f64,
    pub width: f64,
}

impl WindowLevel {
    pub fn new(center: f64, width: f64) -> Self {
        WindowLevel { center, width }
    }

    /// The window covering exactly the range from `min` to `max`.
    pub fn from_range(min: f64, max: f64) -> Self {
        WindowLevel {
            center: (min + max) / 2.,
            width: max - min + 1.,
        }
    }
}

/// A window combined with the function applying it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevelTransform {
    function: VoiLutFunction,
    window: WindowLevel,
}

impl WindowLevelTransform {
    /// Combine a VOI LUT function with a window.
    ///
    /// The window width is clamped to what the function accepts:
    /// at least 1 for `LINEAR` and `SIGMOID`,
    /// and non-negative for `LINEAR_EXACT`.
    pub fn new(function: VoiLutFunction, window: WindowLevel) -> Self {
        let min_width = match function {
            VoiLutFunction::LinearExact => 0.,
            VoiLutFunction::Linear | VoiLutFunction::Sigmoid => 1.,
        };
        WindowLevelTransform {
            function,
            window: WindowLevel {
                center: window.center,
                width: window.width.max(min_width),
            },
        }
    }

    pub fn linear(window: WindowLevel) -> Self {
        Self::new(VoiLutFunction::Linear, window)
    }

    pub fn function(&self) -> VoiLutFunction {
        self.function
    }

    pub fn window(&self) -> WindowLevel {
        self.window
    }

    /// Map a rescaled value into `0..=1`.
    pub fn apply(&self, value: f64) -> f64 {
        let WindowLevel { center, width } = self.window;
        match self.function {
            VoiLutFunction::Linear => {
                // PS3.3 C.11.2.1.2.1
                let lower = center - 0.5 - (width - 1.) / 2.;
                let upper = center - 0.5 + (width - 1.) / 2.;
                if value <= lower {
                    0.
                } else if value > upper {
                    1.
                } else {
                    (value - (center - 0.5)) / (width - 1.) + 0.5
                }
            }
            VoiLutFunction::LinearExact => {
                // PS3.3 C.11.2.1.3.2
                if width == 0. {
                    return if value <= center { 0. } else { 1. };
                }
                let lower = center - width / 2.;
                let upper = center + width / 2.;
                if value <= lower {
                    0.
                } else if value > upper {
                    1.
                } else {
                    (value - center) / width + 0.5
                }
            }
            // PS3.3 C.11.2.1.3.1
            VoiLutFunction::Sigmoid => 1. / (1. + f64::exp(-4. * (value - center) / width)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_ct_values() {
        let rescale = Rescale::new(1., -1024.);
        assert_eq!(rescale.apply(0.), -1024.);
        assert_eq!(rescale.apply(1024.), 0.);

        let rescale = Rescale::new(2., -1024.);
        assert_eq!(rescale.apply(1024.), 1024.);
        assert_eq!(Rescale::default().apply(7.), 7.);
    }

    #[test]
    fn parse_voi_lut_functions() {
        assert_eq!("LINEAR".parse(), Ok(VoiLutFunction::Linear));
        assert_eq!("LINEAR_EXACT ".parse(), Ok(VoiLutFunction::LinearExact));
        assert_eq!("SIGMOID".parse(), Ok(VoiLutFunction::Sigmoid));
        assert!("GAMMA".parse::<VoiLutFunction>().is_err());
    }

    /// the example in PS3.3 C.11.2.1.2.1
    #[test]
    fn linear_window_standard_example() {
        let voi = WindowLevelTransform::linear(WindowLevel::new(2048., 4096.));
        assert_eq!(voi.apply(-1.), 0.);
        assert_eq!(voi.apply(0.), 0.);
        assert_eq!(voi.apply(4095.5), 1.);
        assert_eq!(voi.apply(4097.), 1.);

        let y = voi.apply(1024.);
        let expected = (1024. - 2047.5) / 4095. + 0.5;
        assert!((y - expected).abs() < 1e-9);
    }

    #[test]
    fn linear_window_brain_preset() {
        let voi = WindowLevelTransform::linear(WindowLevel::new(40., 80.));
        assert_eq!(voi.apply(-10.), 0.);
        assert_eq!(voi.apply(100.), 1.);
        let mid = voi.apply(40.);
        assert!(mid > 0.49 && mid < 0.51, "got {}", mid);
    }

    #[test]
    fn linear_exact_window() {
        let voi = WindowLevelTransform::new(VoiLutFunction::LinearExact, WindowLevel::new(0., 100.));
        assert_eq!(voi.apply(-50.), 0.);
        assert_eq!(voi.apply(0.), 0.5);
        assert_eq!(voi.apply(25.), 0.75);
        assert_eq!(voi.apply(51.), 1.);
    }

    #[test]
    fn sigmoid_window() {
        let voi = WindowLevelTransform::new(VoiLutFunction::Sigmoid, WindowLevel::new(0., 100.));
        assert_eq!(voi.apply(0.), 0.5);
        assert!(voi.apply(-1000.) < 1e-6);
        assert!(voi.apply(1000.) > 1. - 1e-6);
    }

    #[test]
    fn narrow_windows_are_clamped() {
        let voi = WindowLevelTransform::linear(WindowLevel::new(10., 0.));
        assert_eq!(voi.window().width, 1.);
        assert_eq!(voi.apply(9.), 0.);
        assert_eq!(voi.apply(10.), 1.);
    }
}
