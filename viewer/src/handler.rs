//! Loading files and serving their frames.
//!
//! A [`DicomHandler`] keeps at most one file open at a time,
//! along with the frames decoded from it so far.

use crate::preferences::{self, Preferences, PreferenceStore};
use crate::remediation::{self, Decision, PendingDecision};
use minidcm_core::dictionary::tags;
use minidcm_core::value::Value;
use minidcm_core::{Header, Tag, VR};
use minidcm_object::{
    read_with_dict, DecodeIssue, DefaultDicomObject, ReadError, ReadOptions,
    RequiredElementPolicy, StandardDataDictionary, ValidationResult,
};
use minidcm_pixeldata::{
    BulkDataSource, FileBulkData, PixelBuffer, PixelDataResolver, WindowLevel,
};
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read '{}'", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Not a DICOM file"))]
    NotDicom { source: ReadError },

    #[snafu(display("File is too large ({} bytes, at most {} allowed)", size, max))]
    FileTooLarge { size: u64, max: u64 },

    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, source: ReadError },

    #[snafu(display("Could not read the file meta group"))]
    MetaGroup { source: ReadError },

    #[snafu(display("Invalid preferences"))]
    Preferences { source: preferences::Error },

    #[snafu(display("No file is loaded"))]
    NoFileLoaded,

    #[snafu(display("Loading was aborted"))]
    Aborted,

    #[snafu(display("Could not apply decision"))]
    Remediation { source: remediation::Error },

    #[snafu(display("Could not resolve frame #{}", frame))]
    Pixel {
        frame: u32,
        source: minidcm_pixeldata::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        if let ReadError::UnsupportedTransferSyntax { uid, .. } = &e {
            let uid = uid.clone();
            return Error::UnsupportedTransferSyntax { uid, source: e };
        }
        match e {
            ReadError::NotDicom { .. } => Error::NotDicom { source: e },
            _ => Error::MetaGroup { source: e },
        }
    }
}

/// A decoded file with what was learned while decoding it.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub object: DefaultDicomObject,
    pub validation: ValidationResult,
    /// problems found while decoding, in stream order
    pub warnings: Vec<DecodeIssue>,
    /// the missing required elements awaiting a [`Decision`]
    pub pending: Option<PendingDecision>,
}

/// One row of the element table.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRow {
    pub tag: Tag,
    pub alias: Option<String>,
    pub vr: VR,
    pub value: String,
}

/// Where deferred pixel data is read back from.
enum Origin {
    File(FileBulkData),
    Memory(Vec<u8>),
}

impl Origin {
    fn bulk_data(&self) -> &dyn BulkDataSource {
        match self {
            Origin::File(file) => file,
            Origin::Memory(bytes) => bytes,
        }
    }
}

struct Current {
    loaded: LoadedFile,
    origin: Origin,
    frames: Mutex<HashMap<u32, Arc<PixelBuffer>>>,
}

impl Current {
    fn lock_frames(&self) -> MutexGuard<'_, HashMap<u32, Arc<PixelBuffer>>> {
        match self.frames.lock() {
            Ok(frames) => frames,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn clear_frames(&self) {
        self.lock_frames().clear();
    }
}

/// Loads DICOM files and hands out their validated contents and frames.
pub struct DicomHandler {
    preferences: Preferences,
    policy: RequiredElementPolicy,
    window: Option<WindowLevel>,
    current: Option<Current>,
}

impl std::fmt::Debug for DicomHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DicomHandler")
            .field("preferences", &self.preferences)
            .field("window", &self.window)
            .field("loaded", &self.current.is_some())
            .finish()
    }
}

impl DicomHandler {
    /// Create a handler with the given preferences.
    pub fn new(preferences: Preferences) -> Result<Self> {
        let policy = preferences.policy().context(PreferencesSnafu)?;
        Ok(DicomHandler {
            preferences,
            policy,
            window: None,
            current: None,
        })
    }

    /// Create a handler with the current preferences of a store.
    pub fn from_store(store: &dyn PreferenceStore) -> Result<Self> {
        Self::new(store.preferences())
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn policy(&self) -> &RequiredElementPolicy {
        &self.policy
    }

    /// Load a DICOM file from the file system,
    /// replacing the file loaded before.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&LoadedFile> {
        let path = path.as_ref();
        self.unload();
        info!(path = %path.display(), "Loading file");

        let size = std::fs::metadata(path).context(IoSnafu { path })?.len();
        self.check_size(size)?;

        let file = File::open(path).context(IoSnafu { path })?;
        let outcome = read_with_dict(
            BufReader::new(file),
            StandardDataDictionary,
            &self.read_options(),
        )?;
        let origin = Origin::File(FileBulkData::new(path));
        Ok(self.install(outcome.object, outcome.issues, origin))
    }

    /// Load a DICOM file held in memory,
    /// replacing the file loaded before.
    pub fn load_bytes(&mut self, bytes: Vec<u8>) -> Result<&LoadedFile> {
        self.unload();
        info!(size = bytes.len(), "Loading file from memory");
        self.check_size(bytes.len() as u64)?;

        let outcome = read_with_dict(
            Cursor::new(bytes.as_slice()),
            StandardDataDictionary,
            &self.read_options(),
        )?;
        Ok(self.install(outcome.object, outcome.issues, Origin::Memory(bytes)))
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions::new().defer_pixel_data(self.preferences.defer_pixel_data)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        let max = self.preferences.max_file_size;
        if size > max {
            warn!(size, max, "File exceeds the size limit");
            return FileTooLargeSnafu { size, max }.fail();
        }
        Ok(())
    }

    fn install(
        &mut self,
        object: DefaultDicomObject,
        warnings: Vec<DecodeIssue>,
        origin: Origin,
    ) -> &LoadedFile {
        let validation = self.policy.validate(&object, &warnings);
        let pending = PendingDecision::from_validation(&validation, object.dictionary());
        info!(
            elements = object.len(),
            warnings = warnings.len(),
            status = ?validation.overall(),
            "File loaded"
        );

        let current = self.current.insert(Current {
            loaded: LoadedFile {
                object,
                validation,
                warnings,
                pending,
            },
            origin,
            frames: Mutex::new(HashMap::new()),
        });
        &current.loaded
    }

    /// Discard the loaded file and its frames.
    pub fn unload(&mut self) {
        self.current = None;
    }

    /// The loaded file, if any.
    pub fn current(&self) -> Option<&LoadedFile> {
        self.current.as_ref().map(|c| &c.loaded)
    }

    fn loaded(&self) -> Result<&Current> {
        self.current.as_ref().context(NoFileLoadedSnafu)
    }

    /// Answer the pending decision of the loaded file,
    /// returning its new validation result.
    ///
    /// Aborting unloads the file.
    pub fn apply_decision(&mut self, decision: Decision) -> Result<ValidationResult> {
        let current = self.current.as_mut().context(NoFileLoadedSnafu)?;
        let pending = current
            .loaded
            .pending
            .clone()
            .unwrap_or(PendingDecision { missing: vec![] });

        let loaded = &mut current.loaded;
        let outcome = remediation::apply_decision(
            &mut loaded.object,
            &pending,
            decision,
            &self.policy,
            &loaded.warnings,
        );
        let validation = match outcome {
            Ok(validation) => validation,
            Err(remediation::Error::Aborted) => {
                self.unload();
                return AbortedSnafu.fail();
            }
            Err(e) => return Err(e).context(RemediationSnafu),
        };

        loaded.pending = PendingDecision::from_validation(&validation, loaded.object.dictionary());
        loaded.validation = validation.clone();
        current.clear_frames();
        Ok(validation)
    }

    /// Use this window for images which do not declare one,
    /// instead of the window from the preferences.
    pub fn set_window(&mut self, window: Option<WindowLevel>) {
        self.window = window;
        if let Some(current) = &self.current {
            current.clear_frames();
        }
    }

    /// Use the window preset of the given name.
    /// Returns whether such a preset exists.
    pub fn set_preset(&mut self, name: &str) -> bool {
        match self.preferences.preset(name) {
            Some(window) => {
                self.set_window(Some(window));
                true
            }
            None => false,
        }
    }

    fn window(&self) -> WindowLevel {
        self.window
            .unwrap_or_else(|| self.preferences.default_window())
    }

    /// The number of frames of the loaded file.
    pub fn frame_count(&self) -> Result<u32> {
        let current = self.loaded()?;
        PixelDataResolver::new(&current.loaded.object)
            .frame_count()
            .context(PixelSnafu { frame: 0_u32 })
    }

    /// Resolve a frame of the loaded file,
    /// reusing the buffer of an earlier request.
    pub fn frame(&self, frame: u32) -> Result<Arc<PixelBuffer>> {
        let current = self.loaded()?;
        if let Some(buffer) = current.lock_frames().get(&frame) {
            return Ok(Arc::clone(buffer));
        }
        // decoding runs unlocked; the first buffer stored wins
        let buffer = Arc::new(self.resolve(current, frame)?);
        let mut frames = current.lock_frames();
        Ok(Arc::clone(frames.entry(frame).or_insert(buffer)))
    }

    /// Resolve a frame of the loaded file without caching it.
    pub fn decode_frame(&self, frame: u32) -> Result<PixelBuffer> {
        let current = self.loaded()?;
        self.resolve(current, frame)
    }

    fn resolve(&self, current: &Current, frame: u32) -> Result<PixelBuffer> {
        PixelDataResolver::new(&current.loaded.object)
            .with_bulk_data(current.origin.bulk_data())
            .with_window(Some(self.window()))
            .resolve_frame(frame)
            .map_err(|e| {
                warn!(frame, "Could not resolve frame: {}", snafu::Report::from_error(&e));
                e
            })
            .context(PixelSnafu { frame })
    }

    /// The patient and study summary of the loaded file:
    /// patient name, patient ID, modality and study date,
    /// leaving out those which are absent.
    pub fn metadata(&self) -> Result<Vec<(&'static str, String)>> {
        let object = &self.loaded()?.loaded.object;
        Ok([
            ("PatientName", tags::PATIENT_NAME),
            ("PatientID", tags::PATIENT_ID),
            ("Modality", tags::MODALITY),
            ("StudyDate", tags::STUDY_DATE),
        ]
        .into_iter()
        .filter_map(|(name, tag)| {
            object
                .string(tag)
                .map(|value| (name, value.trim().to_string()))
        })
        .collect())
    }

    /// All data elements of the loaded file, in tag order.
    pub fn elements(&self) -> Result<Vec<ElementRow>> {
        let object = &self.loaded()?.loaded.object;
        Ok(object
            .iter()
            .map(|elem| ElementRow {
                tag: elem.tag(),
                alias: object.alias_of(elem.tag()).map(str::to_string),
                vr: elem.vr(),
                value: display_value(elem.vr(), elem.value()),
            })
            .collect())
    }
}

const MAX_DISPLAY_LEN: usize = 64;

fn display_value<I>(vr: VR, value: &Value<I>) -> String {
    match value {
        Value::Sequence(seq) => format!("<{} item(s)>", seq.multiplicity()),
        Value::PixelSequence(seq) => format!("<{} fragment(s)>", seq.fragments().len()),
        Value::Deferred(range) => format!("<{} bytes at offset {}>", range.len, range.offset),
        Value::Primitive(prim) => match vr {
            VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN => {
                format!("<{} bytes>", prim.calculate_byte_len())
            }
            _ => {
                let text = prim.to_str();
                if text.chars().count() > MAX_DISPLAY_LEN {
                    let mut short: String = text.chars().take(MAX_DISPLAY_LEN).collect();
                    short.push_str("...");
                    short
                } else {
                    text.into_owned()
                }
            }
        },
    }
}
