//! Viewer preferences.
//!
//! Preferences are kept as a JSON document.
//! Fields missing from the document take their default values,
//! so an empty object `{}` is a valid preferences file.

use minidcm_object::{PolicyError, RequiredElementPolicy};
use minidcm_pixeldata::WindowLevel;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, Level};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not open preferences file '{}'", path.display()))]
    OpenPreferences {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse preferences file '{}'", path.display()))]
    ParsePreferences {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Could not write preferences file '{}'", path.display()))]
    WritePreferences {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Invalid required elements"))]
    RequiredElements { source: PolicyError },

    #[snafu(display("Unknown log level `{}`", level))]
    LogLevel { level: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 512 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// A named window, as center and width.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPreset {
    pub center: f64,
    pub width: f64,
}

impl WindowPreset {
    pub const fn new(center: f64, width: f64) -> Self {
        WindowPreset { center, width }
    }
}

impl From<WindowPreset> for WindowLevel {
    fn from(preset: WindowPreset) -> Self {
        WindowLevel::new(preset.center, preset.width)
    }
}

/// The preferences of the viewer which concern file handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// aliases or `(gggg,eeee)` selectors of the required data elements
    pub required_elements: Vec<String>,
    pub window_presets: BTreeMap<String, WindowPreset>,
    /// the preset applied to images without a window of their own
    pub default_preset: Option<String>,
    /// the window shown before any preset is picked
    pub initial_window: WindowPreset,
    /// files larger than this are refused before decoding
    pub max_file_size: u64,
    /// leave native pixel data in the file until a frame is requested
    pub defer_pixel_data: bool,
    pub dicom_directory: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Preferences {
    fn default() -> Self {
        let window_presets = [
            ("abdomen", WindowPreset::new(50., 400.)),
            ("bone", WindowPreset::new(600., 2000.)),
            ("brain", WindowPreset::new(40., 80.)),
            ("lung", WindowPreset::new(-600., 1500.)),
        ]
        .into_iter()
        .map(|(name, preset)| (name.to_string(), preset))
        .collect();

        Preferences {
            required_elements: RequiredElementPolicy::default()
                .iter()
                .map(|(_, alias)| alias.to_string())
                .collect(),
            window_presets,
            default_preset: None,
            initial_window: WindowPreset::new(1000., 2000.),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            defer_pixel_data: true,
            dicom_directory: None,
            log_level: "info".to_string(),
        }
    }
}

impl Preferences {
    /// Read preferences from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenPreferencesSnafu { path })?;
        serde_json::from_reader(BufReader::new(file)).context(ParsePreferencesSnafu { path })
    }

    /// Write these preferences to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).context(OpenPreferencesSnafu { path })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context(WritePreferencesSnafu { path })
    }

    /// Build the required element policy.
    pub fn policy(&self) -> Result<RequiredElementPolicy> {
        RequiredElementPolicy::from_names(&self.required_elements).context(RequiredElementsSnafu)
    }

    /// Look up a window preset by name, ignoring case.
    pub fn preset(&self, name: &str) -> Option<WindowLevel> {
        self.window_presets
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(_, preset)| WindowLevel::from(*preset))
    }

    /// The window for images which do not declare one:
    /// the default preset if there is one,
    /// or else the initial window.
    pub fn default_window(&self) -> WindowLevel {
        self.default_preset
            .as_deref()
            .and_then(|name| self.preset(name))
            .unwrap_or_else(|| self.initial_window.into())
    }

    /// The configured logging level.
    pub fn log_level(&self) -> Result<Level> {
        self.log_level
            .trim()
            .parse::<Level>()
            .ok()
            .context(LogLevelSnafu {
                level: &self.log_level,
            })
    }
}

/// A read-only provider of preferences.
pub trait PreferenceStore: Send + Sync {
    /// Obtain the current preferences.
    fn preferences(&self) -> Preferences;
}

/// Preferences kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    preferences: RwLock<Preferences>,
}

impl InMemoryPreferenceStore {
    pub fn new(preferences: Preferences) -> Self {
        InMemoryPreferenceStore {
            preferences: RwLock::new(preferences),
        }
    }

    /// Replace the stored preferences.
    pub fn replace(&self, preferences: Preferences) {
        match self.preferences.write() {
            Ok(mut guard) => *guard = preferences,
            Err(poisoned) => *poisoned.into_inner() = preferences,
        }
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn preferences(&self) -> Preferences {
        match self.preferences.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Preferences read from a JSON file on every request,
/// falling back to the defaults if the file is absent.
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonPreferenceStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the preferences file,
    /// reporting a file which exists but cannot be read.
    pub fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preferences file, using defaults");
            return Ok(Preferences::default());
        }
        Preferences::from_json_file(&self.path)
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn preferences(&self) -> Preferences {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(
                path = %self.path.display(),
                "{}, using default preferences",
                snafu::Report::from_error(e)
            );
            Preferences::default()
        })
    }
}
