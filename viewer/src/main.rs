//! A CLI tool for checking a DICOM file the way the viewer loads it.
use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use minidcm_core::dictionary::{DataDictionary, StandardDataDictionary};
use minidcm_core::Tag;
use minidcm_object::ElementStatus;
use minidcm_viewer::{Decision, DicomHandler, Error, JsonPreferenceStore, PreferenceStore};
use snafu::{OptionExt, Report, ResultExt, Whatever};
use tracing::{error, warn, Level};

/// Load a DICOM file, validate it and resolve one of its frames
#[derive(Debug, Parser)]
#[command(name = "minidcm-inspect", version)]
struct App {
    /// Path to the DICOM file
    file: PathBuf,

    /// Path to the JSON preferences file
    #[arg(long = "prefs")]
    prefs: Option<PathBuf>,

    /// Frame number (0-indexed)
    #[arg(short = 'F', long = "frame", default_value = "0")]
    frame_number: u32,

    /// Window preset for images without a window of their own
    #[arg(long = "preset")]
    preset: Option<String>,

    /// Supply a missing element (e.g. `PatientID=12345`)
    #[arg(long = "set", value_name = "TAG=VALUE")]
    set: Vec<String>,

    /// Fill missing elements with placeholder values
    #[arg(long = "fill-defaults", conflicts_with = "abort_on_missing")]
    fill_defaults: bool,

    /// Stop if any required element is missing
    #[arg(long = "abort-on-missing")]
    abort_on_missing: bool,

    /// Print debug information
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn parse_assignment(text: &str) -> Result<(Tag, String), Whatever> {
    let (selector, value) = text
        .split_once('=')
        .whatever_context("Expected TAG=VALUE")?;
    let tag = StandardDataDictionary
        .parse_tag(selector)
        .with_whatever_context(|| format!("Unknown data element `{}`", selector))?;
    Ok((tag, value.to_string()))
}

fn decision_for(app: &App) -> Result<Decision, Whatever> {
    if app.abort_on_missing {
        return Ok(Decision::Abort);
    }
    if app.fill_defaults {
        return Ok(Decision::FillDefaults);
    }
    if app.set.is_empty() {
        return Ok(Decision::Continue);
    }
    let values = app
        .set
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(Decision::Supply(values))
}

fn main() {
    let app = App::parse();

    let preferences = match &app.prefs {
        Some(path) => JsonPreferenceStore::new(path).preferences(),
        None => Default::default(),
    };
    let level = if app.verbose {
        Level::DEBUG
    } else {
        preferences.log_level().unwrap_or(Level::INFO)
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let decision = decision_for(&app).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });

    let mut handler = DicomHandler::new(preferences).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
    if let Some(preset) = &app.preset {
        if !handler.set_preset(preset) {
            warn!("No window preset named `{}`", preset);
        }
    }

    let loaded = handler.load_file(&app.file).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
    for issue in &loaded.warnings {
        println!("warning: {}", issue);
    }
    let pending = loaded.pending.clone();

    if let Some(pending) = pending {
        for missing in &pending.missing {
            println!("missing: {} {} ({})", missing.tag, missing.alias, missing.vr);
        }
        match handler.apply_decision(decision) {
            Ok(_) => {}
            Err(Error::Aborted) => {
                error!("Aborted: required elements are missing");
                std::process::exit(-2);
            }
            Err(e) => {
                error!("{}", Report::from_error(e));
                std::process::exit(-2);
            }
        }
    }

    let metadata = handler.metadata().unwrap_or_default();
    for (name, value) in metadata {
        println!("{:<12} {}", name, value);
    }

    if let Some(loaded) = handler.current() {
        println!("validation: {:?}", loaded.validation.overall());
        for (tag, alias, status) in loaded.validation.iter() {
            let status = match status {
                ElementStatus::Present { provenance } => format!("present ({:?})", provenance),
                ElementStatus::Missing => "missing".to_string(),
                ElementStatus::Malformed => "malformed".to_string(),
            };
            println!("  {} {:<24} {}", tag, alias, status);
        }
    }

    let frame = handler.frame(app.frame_number).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-3);
    });
    println!(
        "frame #{}: {}x{}x{}, {}-bit",
        frame.frame, frame.columns, frame.rows, frame.samples_per_pixel, frame.bits_stored
    );
    if let Some(window) = &frame.window {
        println!(
            "window: center {} width {} ({:?})",
            window.window.center, window.window.width, window.source
        );
    }
    if let Some(stats) = frame.stats() {
        println!(
            "values: min {} max {} mean {:.2}",
            stats.min, stats.max, stats.mean
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::{decision_for, parse_assignment, App};
    use clap::{CommandFactory, Parser};
    use minidcm_core::dictionary::tags;
    use minidcm_viewer::Decision;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn assignments() {
        assert_eq!(
            parse_assignment("PatientID=12345").unwrap(),
            (tags::PATIENT_ID, "12345".to_string())
        );
        assert_eq!(
            parse_assignment("(0008,0060)=CT").unwrap(),
            (tags::MODALITY, "CT".to_string())
        );
        assert!(parse_assignment("PatientID").is_err());
        assert!(parse_assignment("NoSuchThing=1").is_err());
    }

    #[test]
    fn decisions_from_arguments() {
        let app = App::parse_from(["minidcm-inspect", "ct.dcm"]);
        assert_eq!(decision_for(&app).unwrap(), Decision::Continue);

        let app = App::parse_from(["minidcm-inspect", "ct.dcm", "--fill-defaults"]);
        assert_eq!(decision_for(&app).unwrap(), Decision::FillDefaults);

        let app = App::parse_from([
            "minidcm-inspect",
            "ct.dcm",
            "--set",
            "PatientID=12345",
            "--set",
            "StudyDate=20240101",
        ]);
        match decision_for(&app).unwrap() {
            Decision::Supply(values) => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[&tags::STUDY_DATE], "20240101");
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
