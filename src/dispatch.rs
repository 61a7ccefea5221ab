//! Effect dispatch: cooldown gating, precondition checks and execution.
//!
//! The dispatcher is the only place cooldowns are applied. A trigger either
//! runs to completion and starts both the effect and the global cooldown, or
//! reports why it did not run and leaves every cooldown untouched.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::EffectContext;
use crate::cooldown::CooldownGate;
use crate::effect::EffectRegistry;
use crate::observability::{Event, metrics};
use crate::world::ActorId;

// ============================================================================
// Outcome
// ============================================================================

/// Result of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The effect ran and cooldowns were applied.
    Triggered,
    /// No effect is registered under the key.
    UnknownEffect {
        /// Closest registered key, if any is close enough.
        suggestion: Option<String>,
    },
    /// The actor's global cooldown is running.
    OnGlobalCooldown,
    /// The effect's own cooldown is running.
    OnCooldown,
    /// The effect is disabled or its precondition did not hold.
    PreconditionFailed,
    /// The effect started but failed.
    ExecutionFailed {
        /// Error text.
        reason: String,
    },
}

impl TriggerOutcome {
    /// Whether the effect ran.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered)
    }

    /// Stable name used in metrics labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::UnknownEffect { .. } => "unknown_effect",
            Self::OnGlobalCooldown => "on_global_cooldown",
            Self::OnCooldown => "on_cooldown",
            Self::PreconditionFailed => "precondition_failed",
            Self::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

impl fmt::Display for TriggerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEffect {
                suggestion: Some(s),
            } => write!(f, "unknown effect (did you mean '{s}'?)"),
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            other => f.write_str(&other.as_str().replace('_', " ")),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Coordinates registry lookups, cooldowns and effect execution.
pub struct Dispatcher {
    registry: Arc<EffectRegistry>,
    cooldowns: Arc<CooldownGate>,
    cx: Arc<EffectContext>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub const fn new(
        registry: Arc<EffectRegistry>,
        cooldowns: Arc<CooldownGate>,
        cx: Arc<EffectContext>,
    ) -> Self {
        Self {
            registry,
            cooldowns,
            cx,
        }
    }

    /// Registered effects.
    #[must_use]
    pub const fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    /// Cooldown store.
    #[must_use]
    pub const fn cooldowns(&self) -> &Arc<CooldownGate> {
        &self.cooldowns
    }

    /// Runs `key` for `actor`.
    ///
    /// With `force`, cooldowns, the enabled flag and the precondition are all
    /// skipped. Cooldowns are applied only when the effect succeeds.
    pub fn trigger(&self, actor: &ActorId, key: &str, force: bool) -> TriggerOutcome {
        let outcome = self.dispatch(actor, key, force);
        metrics::record_trigger(key, outcome.as_str());
        outcome
    }

    fn dispatch(&self, actor: &ActorId, key: &str, force: bool) -> TriggerOutcome {
        let Some(behavior) = self.registry.get(key) else {
            let suggestion = self.registry.suggest(key);
            debug!(actor = %actor, effect = key, ?suggestion, "unknown effect key");
            return TriggerOutcome::UnknownEffect { suggestion };
        };
        let key = behavior.descriptor().key();
        let config = self.cx.config().current();

        if !force {
            if self.cooldowns.is_on_global_cooldown(actor) {
                return TriggerOutcome::OnGlobalCooldown;
            }
            if self.cooldowns.is_on_cooldown(actor, key) {
                return TriggerOutcome::OnCooldown;
            }
            if !config.is_effect_enabled(key) {
                debug!(actor = %actor, effect = key, "effect disabled by configuration");
                return TriggerOutcome::PreconditionFailed;
            }
            match behavior.can_trigger(actor) {
                Ok(true) => {}
                Ok(false) => return TriggerOutcome::PreconditionFailed,
                Err(e) => {
                    warn!(actor = %actor, effect = key, error = %e, "precondition check failed");
                    return TriggerOutcome::PreconditionFailed;
                }
            }
        }

        if let Err(e) = behavior.trigger(actor) {
            warn!(actor = %actor, effect = key, error = %e, "effect execution failed");
            return TriggerOutcome::ExecutionFailed {
                reason: e.to_string(),
            };
        }

        let cooldown = config.effect_cooldown(key, behavior.descriptor().default_cooldown());
        self.cooldowns.apply_cooldown(actor, key, cooldown);
        self.cooldowns
            .apply_global_cooldown(actor, config.cooldowns.default_global);
        info!(actor = %actor, effect = key, forced = force, "effect triggered");
        self.cx.events().emit(Event::EffectTriggered {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            effect: key.to_string(),
            forced: force,
        });
        TriggerOutcome::Triggered
    }

    /// Keys of every enabled effect whose precondition holds for `actor`.
    ///
    /// Cooldowns are not consulted. A failing check is logged and skipped.
    #[must_use]
    pub fn currently_triggerable(&self, actor: &ActorId) -> Vec<String> {
        let config = self.cx.config().current();
        self.registry
            .all()
            .into_iter()
            .filter(|b| config.is_effect_enabled(b.descriptor().key()))
            .filter(|b| match b.can_trigger(actor) {
                Ok(eligible) => eligible,
                Err(e) => {
                    warn!(actor = %actor, effect = b.descriptor().key(), error = %e, "precondition check failed");
                    false
                }
            })
            .map(|b| b.descriptor().key().to_string())
            .collect()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("cooldowns", &self.cooldowns)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{ConfigHandle, EffectSettings, EngineConfig};
    use crate::effect::tests::StubEffect;
    use crate::geometry::Vec3;
    use crate::observability::EventEmitter;
    use crate::observability::events::tests::TestWriter;
    use crate::world::WorldId;
    use crate::world::memory::InMemoryWorld;
    use crate::channel::recording::RecordingChannel;

    struct Fixture {
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
        stub: Arc<StubEffect>,
        writer: TestWriter,
        steve: ActorId,
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let world = Arc::new(InMemoryWorld::flat());
        world.place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        let writer = TestWriter::default();
        let cx = Arc::new(
            EffectContext::new(
                world,
                Arc::new(RecordingChannel::new()),
                ConfigHandle::new(Arc::new(config)),
            )
            .with_events(Arc::new(EventEmitter::new(Box::new(writer.clone())))),
        );
        let clock = Arc::new(ManualClock::new(1_000));
        let registry = Arc::new(EffectRegistry::new());
        let stub = Arc::new(StubEffect::new("footstep", Duration::from_secs(30)));
        registry.register(Arc::clone(&stub) as Arc<dyn crate::effect::EffectBehavior>);
        let cooldowns = Arc::new(CooldownGate::new(Arc::clone(&clock) as Arc<dyn crate::clock::Clock>));
        Fixture {
            clock,
            dispatcher: Dispatcher::new(registry, cooldowns, cx),
            stub,
            writer,
            steve: ActorId::new("steve"),
        }
    }

    #[test]
    fn test_success_applies_both_cooldowns() {
        let f = fixture(EngineConfig::default());
        let outcome = f.dispatcher.trigger(&f.steve, "FOOTSTEP", false);
        assert!(outcome.is_triggered());
        assert_eq!(f.stub.runs.load(Ordering::SeqCst), 1);

        let cooldowns = f.dispatcher.cooldowns();
        assert_eq!(
            cooldowns.remaining(&f.steve, "footstep"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            cooldowns.global_remaining(&f.steve),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstep", false),
            TriggerOutcome::OnGlobalCooldown
        );

        f.clock.advance(Duration::from_secs(5));
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstep", false),
            TriggerOutcome::OnCooldown
        );
        f.clock.advance(Duration::from_secs(25));
        assert!(f.dispatcher.trigger(&f.steve, "footstep", false).is_triggered());
    }

    #[test]
    fn test_unknown_key_suggests_closest() {
        let f = fixture(EngineConfig::default());
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstpe", false),
            TriggerOutcome::UnknownEffect {
                suggestion: Some("footstep".into())
            }
        );
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "zzzzzzzzzzzz", true),
            TriggerOutcome::UnknownEffect { suggestion: None }
        );
    }

    #[test]
    fn test_failed_execution_applies_no_cooldown() {
        let f = fixture(EngineConfig::default());
        f.stub.fail_trigger.store(true, Ordering::SeqCst);
        let outcome = f.dispatcher.trigger(&f.steve, "footstep", false);
        assert!(matches!(outcome, TriggerOutcome::ExecutionFailed { .. }));
        assert!(!f.dispatcher.cooldowns().is_on_cooldown(&f.steve, "footstep"));
        assert!(!f.dispatcher.cooldowns().is_on_global_cooldown(&f.steve));
        assert!(f.writer.lines().is_empty());
    }

    #[test]
    fn test_precondition_false_or_error() {
        let f = fixture(EngineConfig::default());
        f.stub.eligible.store(false, Ordering::SeqCst);
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstep", false),
            TriggerOutcome::PreconditionFailed
        );
        f.stub.eligible.store(true, Ordering::SeqCst);
        f.stub.fail_check.store(true, Ordering::SeqCst);
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstep", false),
            TriggerOutcome::PreconditionFailed
        );
        assert_eq!(f.stub.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_force_bypasses_gates() {
        let f = fixture(EngineConfig::default());
        f.stub.eligible.store(false, Ordering::SeqCst);
        f.dispatcher
            .cooldowns()
            .apply_global_cooldown(&f.steve, Duration::from_secs(60));
        assert!(f.dispatcher.trigger(&f.steve, "footstep", true).is_triggered());
        assert_eq!(f.stub.checks.load(Ordering::SeqCst), 0);

        let events = f.writer.lines();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "EffectTriggered");
        assert_eq!(events[0]["forced"], true);
    }

    #[test]
    fn test_configured_cooldown_and_disable() {
        let mut config = EngineConfig::default();
        config.effects.insert(
            "footstep".into(),
            EffectSettings {
                cooldown: Some(Duration::from_secs(2)),
                ..EffectSettings::default()
            },
        );
        let f = fixture(config.clone());
        assert!(f.dispatcher.trigger(&f.steve, "footstep", false).is_triggered());
        assert_eq!(
            f.dispatcher.cooldowns().remaining(&f.steve, "footstep"),
            Some(Duration::from_secs(2))
        );

        config.effects.get_mut("footstep").unwrap().enabled = false;
        let f = fixture(config);
        assert_eq!(
            f.dispatcher.trigger(&f.steve, "footstep", false),
            TriggerOutcome::PreconditionFailed
        );
        assert!(f.dispatcher.currently_triggerable(&f.steve).is_empty());
    }

    #[test]
    fn test_currently_triggerable_survives_failing_check() {
        let f = fixture(EngineConfig::default());
        let broken = Arc::new(StubEffect::new("action_bar", Duration::ZERO));
        broken.fail_check.store(true, Ordering::SeqCst);
        f.dispatcher.registry().register(broken);
        assert_eq!(f.dispatcher.currently_triggerable(&f.steve), vec!["footstep"]);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(TriggerOutcome::OnCooldown.to_string(), "on cooldown");
        assert_eq!(
            TriggerOutcome::UnknownEffect {
                suggestion: Some("stalker".into())
            }
            .to_string(),
            "unknown effect (did you mean 'stalker'?)"
        );
    }
}
