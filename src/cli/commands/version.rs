//! Version information display
//!
//! Prints version metadata in human or JSON format.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::engine::builtin_effects;
use crate::error::PhantasmError;

/// Print version information.
///
/// # Errors
///
/// Returns a JSON error if the JSON form cannot be serialized.
pub fn run(args: &VersionArgs) -> Result<(), PhantasmError> {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let effects = builtin_effects().len();

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version} ({effects} built-in effects)");
        }
        OutputFormat::Json => {
            let doc = json!({ "name": name, "version": version, "effects": effects });
            println!("{}", serde_json::to_string(&doc)?);
        }
    }
    Ok(())
}
