//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check and read
//! 2. BOM strip and YAML parsing (an empty file yields the defaults)
//! 3. Normalization: out-of-range values are clamped or reset, each with a
//!    warning, so a bad value never stops the engine
//! 4. Optional check of per-effect keys against the registered effects
//! 5. Freeze with `Arc`

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::schema::{EngineConfig, Multipliers, SchedulerConfig};
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for configuration size.
    pub limits: ConfigLimits,

    /// Registered effect keys; when set, unknown `effects.<key>` entries warn.
    pub known_effects: Option<BTreeSet<String>>,
}

/// Limits for configuration size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("PHANTASM_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and normalized configuration.
    pub config: Arc<EngineConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl LoadWarning {
    fn at(location: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Some(location.to_string()),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads and normalizes a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file exceeds the size limit
    /// - YAML parsing fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > limit {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {limit} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Parses and normalizes configuration text; `origin` is used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] when the YAML is malformed or a
    /// field has the wrong type.
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let content = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut warnings = Vec::new();

        let mut config = if content.trim().is_empty() {
            warnings.push(LoadWarning {
                message: "configuration is empty; using defaults".to_string(),
                location: None,
            });
            EngineConfig::default()
        } else {
            serde_yaml::from_str::<Option<EngineConfig>>(content)
                .map_err(|e| ConfigError::ParseError {
                    path: origin.to_path_buf(),
                    line: e.location().map(|l| l.line()),
                    message: e.to_string(),
                })?
                .unwrap_or_default()
        };

        normalize(&mut config, &mut warnings);
        if let Some(known) = &self.options.known_effects {
            check_effect_keys(&config, known, &mut warnings);
        }

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Clamps and repairs out-of-range values in place.
pub fn normalize(config: &mut EngineConfig, warnings: &mut Vec<LoadWarning>) {
    let defaults = SchedulerConfig::default();
    let scheduler = &mut config.scheduler;

    if scheduler.interval_ticks == 0 {
        warnings.push(LoadWarning::at(
            "scheduler.interval-ticks",
            "must be at least 1; using 1",
        ));
        scheduler.interval_ticks = 1;
    }
    if scheduler.tick_duration.is_zero() {
        warnings.push(LoadWarning::at(
            "scheduler.tick-duration",
            "must be positive; using default",
        ));
        scheduler.tick_duration = defaults.tick_duration;
    }
    scheduler.base_event_probability = clamp_unit(
        scheduler.base_event_probability,
        defaults.base_event_probability,
        "scheduler.base-event-probability",
        warnings,
    );

    let chances = &mut config.chances;
    chances.max_calculated_chance = clamp_unit(
        chances.max_calculated_chance,
        0.35,
        "chances.max-calculated-chance",
        warnings,
    );
    if !chances.isolation_radius.is_finite() || chances.isolation_radius < 0.0 {
        warnings.push(LoadWarning::at(
            "chances.isolation-radius",
            "must be a non-negative number; using 64",
        ));
        chances.isolation_radius = 64.0;
    }

    let defaults = Multipliers::default();
    let default_values = [
        defaults.darkness,
        defaults.dimness,
        defaults.underground_deep,
        defaults.underground_shallow,
        defaults.isolated,
        defaults.night,
        defaults.nether,
        defaults.the_end,
    ];
    for ((name, value), default) in chances.multipliers.fields_mut().into_iter().zip(default_values) {
        if !value.is_finite() || *value < 0.0 {
            warnings.push(LoadWarning::at(
                &format!("chances.multipliers.{name}"),
                format!("must be a non-negative number; using {default}"),
            ));
            *value = default;
        }
    }

    let effects = std::mem::take(&mut config.effects);
    config.effects = effects
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();
}

fn clamp_unit(value: f64, default: f64, location: &str, warnings: &mut Vec<LoadWarning>) -> f64 {
    if !value.is_finite() {
        warnings.push(LoadWarning::at(location, format!("not a number; using {default}")));
        return default;
    }
    let clamped = value.clamp(0.0, 1.0);
    if (clamped - value).abs() > f64::EPSILON {
        warnings.push(LoadWarning::at(
            location,
            format!("{value} is outside [0, 1]; clamped to {clamped}"),
        ));
    }
    clamped
}

fn check_effect_keys(config: &EngineConfig, known: &BTreeSet<String>, warnings: &mut Vec<LoadWarning>) {
    for key in config.effects.keys() {
        if known.contains(key) {
            continue;
        }
        let closest = known
            .iter()
            .map(|k| (k, strsim::damerau_levenshtein(key, k)))
            .filter(|(_, dist)| *dist <= 3)
            .min_by_key(|(_, dist)| *dist);
        let message = match closest {
            Some((k, _)) => format!("no registered effect has this key (did you mean '{k}'?)"),
            None => "no registered effect has this key".to_string(),
        };
        warnings.push(LoadWarning::at(&format!("effects.{key}"), message));
    }
}

/// Reads an environment variable as `T`, falling back to `default`.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
