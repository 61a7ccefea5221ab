//! Effect descriptors, the behavior trait and the keyed registry.
//!
//! Each illusion type is one [`EffectBehavior`] implementation registered
//! under a unique lowercase key at startup. The registry is read-mostly: it
//! is filled once and then only looked up.

pub mod ambient;
pub mod catalog;
pub mod messages;
pub mod visual;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::EffectContext;
use crate::error::EffectError;
use crate::world::{ActorId, ActorSnapshot};

// ============================================================================
// Descriptor
// ============================================================================

/// Immutable identity of an illusion type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectDescriptor {
    key: String,
    description: String,
    #[serde(with = "humantime_text")]
    default_cooldown: Duration,
}

impl EffectDescriptor {
    /// Creates a descriptor; the key is lowercased.
    #[must_use]
    pub fn new(key: &str, description: &str, default_cooldown: Duration) -> Self {
        Self {
            key: key.to_ascii_lowercase(),
            description: description.to_string(),
            default_cooldown,
        }
    }

    /// Unique lowercase key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Cooldown used when the configuration does not override it.
    #[must_use]
    pub const fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }
}

mod humantime_text {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }
}

// ============================================================================
// Behavior
// ============================================================================

/// One illusion type.
///
/// Implementations hold their collaborators (world view, render channel,
/// phantom registries) from construction and keep no per-call state outside
/// those registries.
pub trait EffectBehavior: Send + Sync + Debug {
    /// Identity of this effect.
    fn descriptor(&self) -> &EffectDescriptor;

    /// Whether the effect could run for `actor` right now, ignoring cooldowns.
    ///
    /// # Errors
    ///
    /// Returns an error when the check itself could not be evaluated; the
    /// dispatcher treats that as "not eligible".
    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError>;

    /// Starts the illusion for `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error when the illusion could not be started. Anything the
    /// effect partially set up must already be rolled back.
    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError>;
}

/// Current snapshot of `actor`, or [`EffectError::ActorUnavailable`].
///
/// # Errors
///
/// Returns an error once the actor has disconnected.
pub fn require_actor(cx: &EffectContext, actor: &ActorId) -> Result<ActorSnapshot, EffectError> {
    cx.world()
        .actor(actor)
        .ok_or_else(|| EffectError::ActorUnavailable(actor.to_string()))
}

// ============================================================================
// Registry
// ============================================================================

/// Keyed collection of effect behaviors.
#[derive(Default)]
pub struct EffectRegistry {
    effects: DashMap<String, Arc<dyn EffectBehavior>>,
}

impl EffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a behavior under its descriptor key.
    ///
    /// A duplicate key replaces the earlier registration with a warning.
    pub fn register(&self, behavior: Arc<dyn EffectBehavior>) {
        let key = behavior.descriptor().key().to_string();
        if self.effects.insert(key.clone(), behavior).is_some() {
            warn!(effect = %key, "duplicate effect key registered; replacing earlier behavior");
        } else {
            debug!(effect = %key, "effect registered");
        }
    }

    /// Looks up a behavior by key (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn EffectBehavior>> {
        self.effects
            .get(&key.to_ascii_lowercase())
            .map(|e| Arc::clone(e.value()))
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.effects.contains_key(&key.to_ascii_lowercase())
    }

    /// All registered keys, sorted.
    #[must_use]
    pub fn all_keys(&self) -> BTreeSet<String> {
        self.effects.iter().map(|e| e.key().clone()).collect()
    }

    /// All registered behaviors, sorted by key.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn EffectBehavior>> {
        let mut all: Vec<_> = self.effects.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.descriptor().key().cmp(b.descriptor().key()));
        all
    }

    /// Descriptors of all registered behaviors, sorted by key.
    #[must_use]
    pub fn descriptors(&self) -> Vec<EffectDescriptor> {
        self.all().iter().map(|b| b.descriptor().clone()).collect()
    }

    /// Number of registered effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Closest registered key to `input`, for typo hints.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Option<String> {
        let input = input.to_ascii_lowercase();
        self.effects
            .iter()
            .map(|e| {
                let dist = strsim::damerau_levenshtein(&input, e.key());
                (e.key().clone(), dist)
            })
            .filter(|(_, dist)| *dist <= 3)
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(key, _)| key)
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("keys", &self.all_keys())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scriptable behavior for dispatcher and scheduler tests.
    #[derive(Debug)]
    pub struct StubEffect {
        descriptor: EffectDescriptor,
        pub eligible: AtomicBool,
        pub fail_check: AtomicBool,
        pub fail_trigger: AtomicBool,
        pub checks: AtomicUsize,
        pub runs: AtomicUsize,
    }

    impl StubEffect {
        pub fn new(key: &str, cooldown: Duration) -> Self {
            Self {
                descriptor: EffectDescriptor::new(key, "stub", cooldown),
                eligible: AtomicBool::new(true),
                fail_check: AtomicBool::new(false),
                fail_trigger: AtomicBool::new(false),
                checks: AtomicUsize::new(0),
                runs: AtomicUsize::new(0),
            }
        }
    }

    impl EffectBehavior for StubEffect {
        fn descriptor(&self) -> &EffectDescriptor {
            &self.descriptor
        }

        fn can_trigger(&self, _actor: &ActorId) -> Result<bool, EffectError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.fail_check.load(Ordering::SeqCst) {
                return Err(EffectError::ExecutionFailed("check exploded".into()));
            }
            Ok(self.eligible.load(Ordering::SeqCst))
        }

        fn trigger(&self, _actor: &ActorId) -> Result<(), EffectError> {
            if self.fail_trigger.load(Ordering::SeqCst) {
                return Err(EffectError::ExecutionFailed("trigger exploded".into()));
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_descriptor_key_is_lowercased() {
        let d = EffectDescriptor::new("Fake_Chat", "x", Duration::from_secs(1));
        assert_eq!(d.key(), "fake_chat");
    }

    #[test]
    fn test_register_and_lookup_case_insensitive() {
        let registry = EffectRegistry::new();
        registry.register(Arc::new(StubEffect::new("footstep", Duration::ZERO)));
        assert!(registry.get("FOOTSTEP").is_some());
        assert!(registry.contains("footstep"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_key_overwrites() {
        let registry = EffectRegistry::new();
        registry.register(Arc::new(StubEffect::new("a", Duration::from_secs(1))));
        registry.register(Arc::new(StubEffect::new("a", Duration::from_secs(9))));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("a").unwrap().descriptor().default_cooldown(),
            Duration::from_secs(9)
        );
    }

    #[test]
    fn test_all_is_sorted_by_key() {
        let registry = EffectRegistry::new();
        for key in ["zeta", "alpha", "mid"] {
            registry.register(Arc::new(StubEffect::new(key, Duration::ZERO)));
        }
        let keys: Vec<String> = registry
            .all()
            .iter()
            .map(|b| b.descriptor().key().to_string())
            .collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.all_keys().len(), 3);
    }

    #[test]
    fn test_suggest_closest_key() {
        let registry = EffectRegistry::new();
        registry.register(Arc::new(StubEffect::new("stalker", Duration::ZERO)));
        registry.register(Arc::new(StubEffect::new("footstep", Duration::ZERO)));
        assert_eq!(registry.suggest("stalkr").as_deref(), Some("stalker"));
        assert_eq!(registry.suggest("completely_else"), None);
    }

    #[test]
    fn test_descriptor_serializes_cooldown_as_text() {
        let d = EffectDescriptor::new("x", "y", Duration::from_secs(90));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["default_cooldown"], "1m 30s");
    }
}
