//! `validate` command: loads configuration files and reports problems.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning, LoaderOptions};
use crate::engine::builtin_effects;
use crate::error::{ConfigError, PhantasmError};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    warnings: Vec<WarningReport>,
}

#[derive(Debug, Serialize)]
struct WarningReport {
    location: Option<String>,
    message: String,
}

impl From<&LoadWarning> for WarningReport {
    fn from(w: &LoadWarning) -> Self {
        Self {
            location: w.location.clone(),
            message: w.message.clone(),
        }
    }
}

/// Validate each file and print a report.
///
/// Every file is checked before returning. With `--strict`, warnings count
/// as failures.
///
/// # Errors
///
/// Returns the first configuration error encountered, or
/// [`ConfigError::InvalidValue`] when `--strict` and a file has warnings.
pub fn run(args: &ValidateArgs) -> Result<(), PhantasmError> {
    let loader = ConfigLoader::new(LoaderOptions {
        known_effects: Some(
            builtin_effects()
                .iter()
                .map(|d| d.key().to_string())
                .collect(),
        ),
        ..LoaderOptions::default()
    });

    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<PhantasmError> = None;
    for path in &args.files {
        let (report, error) = check(&loader, path, args.strict);
        reports.push(report);
        if first_error.is_none() {
            first_error = error;
        }
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_error.map_or(Ok(()), Err)
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> (FileReport, Option<PhantasmError>) {
    tracing::info!(file = %path.display(), "validating configuration");
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(loaded) => {
            for warning in &loaded.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            let warnings: Vec<WarningReport> = loaded.warnings.iter().map(Into::into).collect();
            let error = (strict && !warnings.is_empty()).then(|| {
                PhantasmError::from(ConfigError::InvalidValue {
                    field: file.clone(),
                    value: format!("{} warning(s)", warnings.len()),
                    expected: "no warnings in strict mode".to_string(),
                })
            });
            let report = FileReport {
                valid: error.is_none(),
                error: error.as_ref().map(ToString::to_string),
                file,
                warnings,
            };
            (report, error)
        }
        Err(e) => {
            let report = FileReport {
                file,
                valid: false,
                error: Some(e.to_string()),
                warnings: Vec::new(),
            };
            (report, Some(e.into()))
        }
    }
}

fn print_human(report: &FileReport) {
    if report.valid {
        println!("ok    {}", report.file);
    } else {
        println!("FAIL  {}", report.file);
    }
    if let Some(error) = &report.error {
        println!("      error: {error}");
    }
    for w in &report.warnings {
        match &w.location {
            Some(location) => println!("      warning: {location}: {}", w.message),
            None => println!("      warning: {}", w.message),
        }
    }
}
