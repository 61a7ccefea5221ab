//! Probabilistic scheduler.
//!
//! One pass visits every connected actor, rolls against the actor's
//! environmental chance, and on a hit tries eligible effects in random order
//! until one runs. The pass is synchronous; the tokio driver that calls it
//! lives in [`crate::engine`].

pub mod chance;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::context::EffectContext;
use crate::dispatch::Dispatcher;
use crate::observability::metrics;
use crate::world::ActorId;

pub use chance::{DepthTier, EnvironmentContext, LightTier, compute_chance};

/// What one scheduler pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Actors that were rolled for.
    pub rolled: usize,
    /// Rolls that hit.
    pub hits: usize,
    /// Effects that ran, as `(actor, effect key)`.
    pub triggered: Vec<(String, String)>,
}

/// Totals across every pass since the scheduler was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Passes run.
    pub passes: u64,
    /// Rolls made.
    pub rolled: u64,
    /// Rolls that hit.
    pub hits: u64,
    /// Scheduled triggers per effect key.
    pub triggered: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct Counters {
    passes: AtomicU64,
    rolled: AtomicU64,
    hits: AtomicU64,
    triggered: DashMap<String, u64>,
}

/// Rolls for every eligible actor and triggers on hits.
pub struct ProbabilityScheduler {
    dispatcher: Arc<Dispatcher>,
    cx: Arc<EffectContext>,
    counters: Counters,
}

impl ProbabilityScheduler {
    /// Creates a scheduler dispatching through `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, cx: Arc<EffectContext>) -> Self {
        Self {
            dispatcher,
            cx,
            counters: Counters::default(),
        }
    }

    /// Snapshot of the running totals.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            passes: c.passes.load(Ordering::Relaxed),
            rolled: c.rolled.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            triggered: c
                .triggered
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    /// Runs one pass over every connected actor.
    pub fn run_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();
        for actor in self.cx.world().connected_actors() {
            self.visit(&actor, &mut summary);
        }
        self.record(&summary);
        debug!(
            rolled = summary.rolled,
            hits = summary.hits,
            triggered = summary.triggered.len(),
            "scheduler pass finished"
        );
        summary
    }

    fn record(&self, summary: &PassSummary) {
        let c = &self.counters;
        c.passes.fetch_add(1, Ordering::Relaxed);
        c.rolled.fetch_add(u64::try_from(summary.rolled).unwrap_or(u64::MAX), Ordering::Relaxed);
        c.hits.fetch_add(u64::try_from(summary.hits).unwrap_or(u64::MAX), Ordering::Relaxed);
        for (_, key) in &summary.triggered {
            *c.triggered.entry(key.clone()).or_insert(0) += 1;
        }
    }

    fn visit(&self, actor: &ActorId, summary: &mut PassSummary) {
        let Some(snapshot) = self.cx.world().actor(actor) else {
            return;
        };
        if !snapshot.alive || !snapshot.mode.is_interactive() {
            return;
        }
        if self.dispatcher.cooldowns().is_on_global_cooldown(actor) {
            trace!(actor = %actor, "skipped: global cooldown");
            return;
        }

        let config = self.cx.config().current();
        let env = EnvironmentContext::observe(
            self.cx.world(),
            &snapshot,
            config.chances.isolation_radius,
        );
        let chance = compute_chance(config.scheduler.base_event_probability, &config.chances, &env);
        let roll = self.cx.roll();
        let hit = roll < chance;
        metrics::record_roll(chance, hit);
        summary.rolled += 1;
        trace!(actor = %actor, chance, roll, ?env, "scheduler roll");
        if !hit {
            return;
        }
        summary.hits += 1;

        let mut keys = self.dispatcher.currently_triggerable(actor);
        if keys.is_empty() {
            debug!(actor = %actor, "roll hit but nothing is eligible");
            return;
        }
        self.cx.shuffle(&mut keys);
        for key in keys {
            if self.dispatcher.trigger(actor, &key, false).is_triggered() {
                summary.triggered.push((actor.to_string(), key));
                return;
            }
        }
        debug!(actor = %actor, "roll hit but every eligible effect was gated");
    }
}

impl std::fmt::Debug for ProbabilityScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbabilityScheduler")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::channel::recording::RecordingChannel;
    use crate::clock::{Clock, ManualClock};
    use crate::config::{ConfigHandle, EngineConfig};
    use crate::cooldown::CooldownGate;
    use crate::effect::tests::StubEffect;
    use crate::effect::{EffectBehavior, EffectRegistry};
    use crate::geometry::Vec3;
    use crate::world::memory::InMemoryWorld;
    use crate::world::{GameMode, WorldId};

    struct Fixture {
        world: Arc<InMemoryWorld>,
        scheduler: ProbabilityScheduler,
        dispatcher: Arc<Dispatcher>,
        stubs: Vec<Arc<StubEffect>>,
    }

    fn fixture(base: f64, keys: &[&str]) -> Fixture {
        let world = Arc::new(InMemoryWorld::flat());
        let mut config = EngineConfig::default();
        config.scheduler.base_event_probability = base;
        config.chances.max_calculated_chance = 1.0;
        let cx = Arc::new(
            EffectContext::new(
                Arc::clone(&world) as Arc<dyn crate::world::WorldView>,
                Arc::new(RecordingChannel::new()),
                ConfigHandle::new(Arc::new(config)),
            )
            .with_seed(11),
        );
        let registry = Arc::new(EffectRegistry::new());
        let stubs: Vec<Arc<StubEffect>> = keys
            .iter()
            .map(|k| Arc::new(StubEffect::new(k, Duration::from_secs(30))))
            .collect();
        for stub in &stubs {
            registry.register(Arc::clone(stub) as Arc<dyn EffectBehavior>);
        }
        let clock = Arc::new(ManualClock::new(0));
        let cooldowns = Arc::new(CooldownGate::new(clock as Arc<dyn Clock>));
        let dispatcher = Arc::new(Dispatcher::new(registry, cooldowns, Arc::clone(&cx)));
        Fixture {
            world,
            scheduler: ProbabilityScheduler::new(Arc::clone(&dispatcher), cx),
            dispatcher,
            stubs,
        }
    }

    fn runs(f: &Fixture) -> usize {
        f.stubs.iter().map(|s| s.runs.load(Ordering::SeqCst)).sum()
    }

    #[test]
    fn certain_roll_triggers_exactly_one_effect() {
        let f = fixture(1.0, &["footstep", "fake_chat", "action_bar"]);
        f.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        let summary = f.scheduler.run_pass();
        assert_eq!(summary.rolled, 1);
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.triggered.len(), 1);
        assert_eq!(runs(&f), 1);

        // Global cooldown now blocks the next pass before the roll.
        let summary = f.scheduler.run_pass();
        assert_eq!(summary.rolled, 0);
        assert_eq!(runs(&f), 1);

        let stats = f.scheduler.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.rolled, 1);
        assert_eq!(stats.triggered.values().sum::<u64>(), 1);
    }

    #[test]
    fn zero_chance_never_triggers() {
        let f = fixture(0.0, &["footstep"]);
        f.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        for _ in 0..50 {
            let summary = f.scheduler.run_pass();
            assert_eq!(summary.hits, 0);
        }
        assert_eq!(runs(&f), 0);
    }

    #[test]
    fn spectators_and_dead_are_skipped() {
        let f = fixture(1.0, &["footstep"]);
        let steve = ActorId::new("steve");
        let alex = ActorId::new("alex");
        f.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        f.world
            .place_actor("alex", &WorldId::overworld(), Vec3::new(200.5, 64.0, 0.5));
        f.world.update_actor(&steve, |a| a.mode = GameMode::Spectator);
        f.world.update_actor(&alex, |a| a.alive = false);
        assert_eq!(f.scheduler.run_pass(), PassSummary::default());
    }

    #[test]
    fn falls_through_gated_effects() {
        let f = fixture(1.0, &["footstep", "fake_chat"]);
        let steve = ActorId::new("steve");
        f.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        f.dispatcher
            .cooldowns()
            .apply_cooldown(&steve, "footstep", Duration::from_secs(60));
        let summary = f.scheduler.run_pass();
        assert_eq!(
            summary.triggered,
            vec![("steve".to_string(), "fake_chat".to_string())]
        );
    }

    #[test]
    fn nothing_eligible_is_silent() {
        let f = fixture(1.0, &["footstep"]);
        f.stubs[0].eligible.store(false, Ordering::SeqCst);
        f.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        let summary = f.scheduler.run_pass();
        assert_eq!(summary.hits, 1);
        assert!(summary.triggered.is_empty());
    }
}
