//! `effects` command: lists the built-in effects.

use crate::cli::args::{EffectsArgs, OutputFormat};
use crate::effect::EffectDescriptor;
use crate::engine::builtin_effects;
use crate::error::PhantasmError;

/// Print every built-in effect sorted by key.
///
/// # Errors
///
/// Returns a JSON error if the JSON form cannot be serialized.
pub fn run(args: &EffectsArgs) -> Result<(), PhantasmError> {
    let effects = builtin_effects();
    match args.format {
        OutputFormat::Human => print!("{}", render_table(&effects)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&effects)?),
    }
    Ok(())
}

fn render_table(effects: &[EffectDescriptor]) -> String {
    let width = effects.iter().map(|d| d.key().len()).max().unwrap_or(0);
    let mut out = String::new();
    for d in effects {
        let cooldown = humantime::format_duration(d.default_cooldown());
        out.push_str(&format!(
            "{:<width$}  {:>8}  {}\n",
            d.key(),
            cooldown.to_string(),
            d.description()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_each_effect_once() {
        let effects = builtin_effects();
        let table = render_table(&effects);
        assert_eq!(table.lines().count(), effects.len());
        assert!(table.lines().any(|l| l.starts_with("stalker") && l.contains("15m")));
        assert!(table.lines().any(|l| l.starts_with("footstep") && l.contains("30s")));
    }
}
