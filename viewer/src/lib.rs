//! File handling for the minidcm viewer.
//!
//! The [`DicomHandler`] loads a DICOM file,
//! checks it against the required elements from the [`Preferences`],
//! and resolves its frames on demand.
//! When required elements are missing,
//! loading still succeeds with a [`PendingDecision`],
//! which the caller answers with a [`Decision`]:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use minidcm_viewer::{Decision, DicomHandler, Preferences};
//!
//! let mut handler = DicomHandler::new(Preferences::default())?;
//! let loaded = handler.load_file("ct.dcm")?;
//! if loaded.pending.is_some() {
//!     handler.apply_decision(Decision::Continue)?;
//! }
//! let frame = handler.frame(0)?;
//! println!("{:?}", frame.stats());
//! # Ok(())
//! # }
//! ```
pub mod handler;
pub mod preferences;
pub mod remediation;

pub use handler::{DicomHandler, ElementRow, Error, LoadedFile};
pub use preferences::{
    InMemoryPreferenceStore, JsonPreferenceStore, PreferenceStore, Preferences, WindowPreset,
};
pub use remediation::{Decision, MissingElement, PendingDecision};
