//! Configuration schema types
//!
//! Every field is optional in YAML; missing values fall back to the defaults
//! below. Keys are kebab-case. Durations accept either a humantime string
//! (`"30s"`, `"15m"`) or an integer number of milliseconds.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Tick interval and base probability.
    pub scheduler: SchedulerConfig,

    /// Environmental multipliers and the probability cap.
    pub chances: ChanceConfig,

    /// Default cooldown durations.
    pub cooldowns: CooldownConfig,

    /// Per-effect overrides keyed by effect key.
    pub effects: BTreeMap<String, EffectSettings>,
}

impl EngineConfig {
    /// Wall-clock period between scheduler passes.
    #[must_use]
    pub fn scheduler_interval(&self) -> Duration {
        let ticks = u32::try_from(self.scheduler.interval_ticks.max(1)).unwrap_or(u32::MAX);
        self.scheduler.tick_duration.saturating_mul(ticks)
    }

    /// Cooldown applied after a successful trigger of `key`.
    ///
    /// Resolution: explicit per-effect override, then the effect's own
    /// default, then `cooldowns.default-effect` when the effect declares none.
    #[must_use]
    pub fn effect_cooldown(&self, key: &str, descriptor_default: Duration) -> Duration {
        if let Some(cooldown) = self.settings(key).and_then(|s| s.cooldown) {
            return cooldown;
        }
        if descriptor_default.is_zero() {
            self.cooldowns.default_effect
        } else {
            descriptor_default
        }
    }

    /// Whether the scheduler may pick `key`.
    #[must_use]
    pub fn is_effect_enabled(&self, key: &str) -> bool {
        self.settings(key).is_none_or(|s| s.enabled)
    }

    /// Configured message pool for `key`, if any and non-empty.
    #[must_use]
    pub fn effect_messages(&self, key: &str) -> Option<&[String]> {
        self.settings(key)
            .map(|s| s.messages.as_slice())
            .filter(|m| !m.is_empty())
    }

    fn settings(&self, key: &str) -> Option<&EffectSettings> {
        self.effects.get(&key.to_ascii_lowercase())
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Scheduler timing and base probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Host ticks between scheduler passes.
    pub interval_ticks: u64,

    /// Length of one host tick; also the phantom sub-tick period.
    #[serde(with = "duration_repr")]
    pub tick_duration: Duration,

    /// Per-pass trigger probability before multipliers.
    pub base_event_probability: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 100,
            tick_duration: Duration::from_millis(50),
            base_event_probability: 0.02,
        }
    }
}

// ============================================================================
// Chances
// ============================================================================

/// Environmental chance shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChanceConfig {
    /// Multipliers applied when the matching condition holds.
    pub multipliers: Multipliers,

    /// Upper bound on the computed chance.
    pub max_calculated_chance: f64,

    /// Radius within which another participant breaks isolation.
    pub isolation_radius: f64,
}

impl Default for ChanceConfig {
    fn default() -> Self {
        Self {
            multipliers: Multipliers::default(),
            max_calculated_chance: 0.35,
            isolation_radius: 64.0,
        }
    }
}

/// Individual environmental multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Multipliers {
    /// Light below 5.
    pub darkness: f64,
    /// Light below 8.
    pub dimness: f64,
    /// More than 10 below the surface reference.
    pub underground_deep: f64,
    /// More than 5 below the surface reference.
    pub underground_shallow: f64,
    /// No other participant nearby.
    pub isolated: f64,
    /// Night time.
    pub night: f64,
    /// First hostile realm.
    pub nether: f64,
    /// Second hostile realm.
    pub the_end: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            darkness: 2.0,
            dimness: 1.4,
            underground_deep: 1.5,
            underground_shallow: 1.2,
            isolated: 1.75,
            night: 1.6,
            nether: 1.3,
            the_end: 1.5,
        }
    }
}

impl Multipliers {
    /// All multipliers set to 1.0.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            darkness: 1.0,
            dimness: 1.0,
            underground_deep: 1.0,
            underground_shallow: 1.0,
            isolated: 1.0,
            night: 1.0,
            nether: 1.0,
            the_end: 1.0,
        }
    }

    /// Mutable access by kebab-case name, for normalization.
    pub(crate) fn fields_mut(&mut self) -> [(&'static str, &mut f64); 8] {
        [
            ("darkness", &mut self.darkness),
            ("dimness", &mut self.dimness),
            ("underground-deep", &mut self.underground_deep),
            ("underground-shallow", &mut self.underground_shallow),
            ("isolated", &mut self.isolated),
            ("night", &mut self.night),
            ("nether", &mut self.nether),
            ("the-end", &mut self.the_end),
        ]
    }
}

// ============================================================================
// Cooldowns
// ============================================================================

/// Default cooldown durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CooldownConfig {
    /// Fallback per-effect cooldown.
    #[serde(with = "duration_repr")]
    pub default_effect: Duration,

    /// Cooldown blocking every effect after any success.
    #[serde(with = "duration_repr")]
    pub default_global: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_effect: Duration::from_secs(30),
            default_global: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// Per-Effect Settings
// ============================================================================

/// Overrides for a single effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EffectSettings {
    /// Cooldown override.
    #[serde(
        with = "optional_duration_repr",
        skip_serializing_if = "Option::is_none"
    )]
    pub cooldown: Option<Duration>,

    /// Whether the scheduler may pick this effect.
    pub enabled: bool,

    /// Replacement message pool for message effects.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            cooldown: None,
            enabled: true,
            messages: Vec::new(),
        }
    }
}

// ============================================================================
// Duration encoding
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Millis(u64),
    Text(String),
}

impl DurationRepr {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            Self::Millis(ms) => Ok(Duration::from_millis(ms)),
            Self::Text(s) => humantime::parse_duration(s.trim()).map_err(E::custom),
        }
    }
}

mod duration_repr {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::DurationRepr;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        DurationRepr::deserialize(d)?.into_duration()
    }
}

mod optional_duration_repr {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::DurationRepr;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<DurationRepr>::deserialize(d)?
            .map(DurationRepr::into_duration)
            .transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scheduler.interval_ticks, 100);
        assert_eq!(cfg.scheduler_interval(), Duration::from_secs(5));
        assert!((cfg.scheduler.base_event_probability - 0.02).abs() < f64::EPSILON);
        assert!((cfg.chances.max_calculated_chance - 0.35).abs() < f64::EPSILON);
        assert_eq!(cfg.cooldowns.default_global, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_kebab_case_and_durations() {
        let yaml = r"
scheduler:
  interval-ticks: 40
  tick-duration: 25ms
chances:
  multipliers:
    the-end: 3.0
    underground-deep: 2.5
cooldowns:
  default-global: 2s
effects:
  stalker:
    cooldown: 20m
  fake_chat:
    cooldown: 1500
    messages: ['psst']
  footstep:
    enabled: false
";
        let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.scheduler.interval_ticks, 40);
        assert_eq!(cfg.scheduler_interval(), Duration::from_secs(1));
        assert!((cfg.chances.multipliers.the_end - 3.0).abs() < f64::EPSILON);
        assert!((cfg.chances.multipliers.darkness - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.cooldowns.default_global, Duration::from_secs(2));
        assert_eq!(
            cfg.effect_cooldown("stalker", Duration::from_secs(900)),
            Duration::from_secs(1200)
        );
        assert_eq!(
            cfg.effect_cooldown("fake_chat", Duration::from_secs(30)),
            Duration::from_millis(1500)
        );
        assert_eq!(cfg.effect_messages("fake_chat"), Some(&["psst".to_string()][..]));
        assert!(!cfg.is_effect_enabled("footstep"));
        assert!(cfg.is_effect_enabled("stalker"));
    }

    #[test]
    fn test_effect_cooldown_fallbacks() {
        let cfg = EngineConfig::default();
        assert_eq!(
            cfg.effect_cooldown("anything", Duration::from_secs(45)),
            Duration::from_secs(45)
        );
        assert_eq!(
            cfg.effect_cooldown("anything", Duration::ZERO),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let yaml = "cooldowns:\n  default-global: soon\n";
        assert!(serde_yaml::from_str::<EngineConfig>(yaml).is_err());
    }

    #[test]
    fn test_serialize_round_trips_durations_as_text() {
        let cfg = EngineConfig::default();
        let text = serde_yaml::to_string(&cfg).unwrap();
        assert!(text.contains("default-effect: 30s"));
        let back: EngineConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
