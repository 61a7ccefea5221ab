//! Engine facade and tick driver.
//!
//! [`IllusionEngine`] wires the registry, cooldowns, dispatcher, scheduler
//! and phantom families together and exposes the administrative surface.
//! One tokio task drives it: every `tick-duration` it sub-ticks every phantom
//! family and pending sequence, and every `interval-ticks` ticks it runs a
//! scheduler pass.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::appearance::AppearanceCache;
use crate::channel::RenderChannel;
use crate::channel::recording::RecordingChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigHandle, ConfigLoader, EngineConfig, LoadWarning, LoaderOptions};
use crate::context::EffectContext;
use crate::cooldown::CooldownGate;
use crate::dispatch::{Dispatcher, TriggerOutcome};
use crate::effect::ambient::{
    FakeDamageEffect, FootstepEffect, GhostBlockEffect, MisplacedSoundEffect,
    PeripheralParticleEffect, WindowBreakEffect,
};
use crate::effect::messages::{JoinLeaveEffect, MessageEffect};
use crate::effect::visual::{
    BlockFlickerEffect, BlockVanishEffect, InventoryShiftEffect, ItemDurabilityEffect,
    PersistentParticleEffect, VisualInteractEffect, VisualStructureEffect,
};
use crate::effect::{EffectBehavior, EffectDescriptor, EffectRegistry};
use crate::error::{PhantasmError, SchedulerError};
use crate::observability::{Event, EventEmitter, metrics};
use crate::phantom::follow::FollowEffect;
use crate::phantom::lurker::LurkerEffect;
use crate::phantom::stalker::StalkerEffect;
use crate::phantom::stare::StareEffect;
use crate::phantom::{DespawnReason, PhantomDriver};
use crate::scheduler::{PassSummary, ProbabilityScheduler, SchedulerStats};
use crate::world::memory::InMemoryWorld;
use crate::world::{ActorId, WorldView};

// ============================================================================
// Builder
// ============================================================================

/// Assembles an [`IllusionEngine`].
pub struct EngineBuilder {
    world: Arc<dyn WorldView>,
    channel: Arc<dyn RenderChannel>,
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    appearances: Option<Arc<AppearanceCache>>,
    events: Option<Arc<EventEmitter>>,
    seed: Option<u64>,
}

impl EngineBuilder {
    /// Starts a builder with default configuration and the system clock.
    #[must_use]
    pub fn new(world: Arc<dyn WorldView>, channel: Arc<dyn RenderChannel>) -> Self {
        Self {
            world,
            channel,
            config: Arc::new(EngineConfig::default()),
            clock: Arc::new(SystemClock::new()),
            appearances: None,
            events: None,
            seed: None,
        }
    }

    /// Initial configuration.
    #[must_use]
    pub fn config(mut self, config: Arc<EngineConfig>) -> Self {
        self.config = config;
        self
    }

    /// Clock used for cooldowns.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Appearance cache for figures and the fake participant.
    #[must_use]
    pub fn appearances(mut self, appearances: Arc<AppearanceCache>) -> Self {
        self.appearances = Some(appearances);
        self
    }

    /// Event stream.
    #[must_use]
    pub fn events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = Some(events);
        self
    }

    /// Fixed rng seed for reproducible runs.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the engine and registers every built-in effect.
    #[must_use]
    pub fn build(self) -> IllusionEngine {
        let mut cx = EffectContext::new(self.world, self.channel, ConfigHandle::new(self.config));
        if let Some(seed) = self.seed {
            cx = cx.with_seed(seed);
        }
        if let Some(appearances) = self.appearances {
            cx = cx.with_appearances(appearances);
        }
        if let Some(events) = self.events {
            cx = cx.with_events(events);
        }
        let cx = Arc::new(cx);

        let registry = Arc::new(EffectRegistry::new());
        let mut drivers: Vec<Arc<dyn PhantomDriver>> = Vec::new();

        let stalker = StalkerEffect::new(Arc::clone(&cx));
        let lurker = LurkerEffect::new(Arc::clone(&cx));
        let stare = StareEffect::new(Arc::clone(&cx));
        let follow = FollowEffect::new(Arc::clone(&cx));
        drivers.extend([stalker.driver(), lurker.driver(), stare.driver(), follow.driver()]);

        let effects: [Arc<dyn EffectBehavior>; 20] = [
            Arc::new(stalker),
            Arc::new(lurker),
            Arc::new(stare),
            Arc::new(follow),
            Arc::new(FootstepEffect::new(Arc::clone(&cx))),
            Arc::new(MisplacedSoundEffect::new(Arc::clone(&cx))),
            Arc::new(WindowBreakEffect::new(Arc::clone(&cx))),
            Arc::new(GhostBlockEffect::new(Arc::clone(&cx))),
            Arc::new(PeripheralParticleEffect::new(Arc::clone(&cx))),
            Arc::new(FakeDamageEffect::new(Arc::clone(&cx))),
            Arc::new(MessageEffect::fake_chat(Arc::clone(&cx))),
            Arc::new(MessageEffect::action_bar(Arc::clone(&cx))),
            Arc::new(JoinLeaveEffect::new(Arc::clone(&cx))),
            Arc::new(BlockFlickerEffect::new(Arc::clone(&cx))),
            Arc::new(BlockVanishEffect::new(Arc::clone(&cx))),
            Arc::new(VisualInteractEffect::new(Arc::clone(&cx))),
            Arc::new(VisualStructureEffect::new(Arc::clone(&cx))),
            Arc::new(PersistentParticleEffect::new(Arc::clone(&cx))),
            Arc::new(InventoryShiftEffect::new(Arc::clone(&cx))),
            Arc::new(ItemDurabilityEffect::new(Arc::clone(&cx))),
        ];
        for effect in effects {
            registry.register(effect);
        }

        let cooldowns = Arc::new(CooldownGate::new(self.clock));
        let dispatcher = Arc::new(Dispatcher::new(registry, cooldowns, Arc::clone(&cx)));
        let scheduler = ProbabilityScheduler::new(Arc::clone(&dispatcher), Arc::clone(&cx));

        IllusionEngine {
            cx,
            dispatcher,
            scheduler,
            drivers,
            ticks: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            driver: Mutex::new(DriverSlot::Idle),
        }
    }
}

/// Descriptors of the built-in effects, from an engine with no host attached.
#[must_use]
pub fn builtin_effects() -> Vec<EffectDescriptor> {
    EngineBuilder::new(
        Arc::new(InMemoryWorld::new()),
        Arc::new(RecordingChannel::new()),
    )
    .build()
    .list_effects()
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Outcome of a configuration reload.
#[derive(Debug)]
pub struct ReloadReport {
    /// Normalization warnings from the new file.
    pub warnings: Vec<LoadWarning>,
    /// Whether the running driver was restarted with a new period.
    pub driver_restarted: bool,
}

struct DriverTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
    interval_ticks: u64,
}

/// Driver state, guarded by one mutex.
enum DriverSlot {
    Idle,
    Running(DriverTask),
    /// A reload is waiting for the old task before spawning its successor.
    Restarting,
    Stopped,
}

/// The illusion engine.
pub struct IllusionEngine {
    cx: Arc<EffectContext>,
    dispatcher: Arc<Dispatcher>,
    scheduler: ProbabilityScheduler,
    drivers: Vec<Arc<dyn PhantomDriver>>,
    ticks: AtomicU64,
    shutdown: CancellationToken,
    driver: Mutex<DriverSlot>,
}

impl IllusionEngine {
    /// Shared services handed to every effect.
    #[must_use]
    pub const fn context(&self) -> &Arc<EffectContext> {
        &self.cx
    }

    /// The dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Scheduler totals since start-up.
    #[must_use]
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Host ticks processed so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Administrative surface
    // ------------------------------------------------------------------------

    /// Runs `key` for `actor`; `force` skips cooldowns and preconditions.
    pub fn trigger(&self, actor: &ActorId, key: &str, force: bool) -> TriggerOutcome {
        self.dispatcher.trigger(actor, key, force)
    }

    /// Clears one cooldown of `actor`, or all of them when `key` is `None`.
    pub fn clear_cooldown(&self, actor: &ActorId, key: Option<&str>) {
        self.dispatcher.cooldowns().clear(actor, key);
        debug!(actor = %actor, effect = ?key, "cooldown cleared");
    }

    /// Registered effects sorted by key.
    #[must_use]
    pub fn list_effects(&self) -> Vec<EffectDescriptor> {
        self.dispatcher.registry().descriptors()
    }

    /// Live phantom count per family.
    #[must_use]
    pub fn active_phantoms(&self) -> BTreeMap<&'static str, usize> {
        self.drivers
            .iter()
            .map(|d| (d.family_name(), d.active_count()))
            .collect()
    }

    /// Loads `path` and installs it as the live configuration.
    ///
    /// A running driver whose tick period or pass interval changed is
    /// cancelled, awaited and restarted, so the switch happens between ticks.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the file is missing or malformed; the
    /// previous configuration stays in place.
    pub async fn reload_config(self: &Arc<Self>, path: &Path) -> Result<ReloadReport, PhantasmError> {
        let loader = ConfigLoader::new(LoaderOptions {
            known_effects: Some(self.dispatcher.registry().all_keys()),
            ..LoaderOptions::default()
        });
        let loaded = loader.load(path)?;
        for warning in &loaded.warnings {
            warn!(
                location = warning.location.as_deref().unwrap_or("-"),
                "{}", warning.message
            );
        }
        let scheduler = loaded.config.scheduler.clone();
        self.cx.config().replace(loaded.config);

        let stale = {
            let mut slot = self.lock_driver();
            let changed = matches!(&*slot, DriverSlot::Running(task)
                if task.period != scheduler.tick_duration || task.interval_ticks != scheduler.interval_ticks);
            if changed {
                match std::mem::replace(&mut *slot, DriverSlot::Restarting) {
                    DriverSlot::Running(task) => Some(task),
                    other => {
                        *slot = other;
                        None
                    }
                }
            } else {
                None
            }
        };

        let driver_restarted = if let Some(task) = stale {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "driver task ended abnormally during restart");
            }
            let mut slot = self.lock_driver();
            if matches!(&*slot, DriverSlot::Restarting) {
                *slot = DriverSlot::Running(self.spawn_driver());
                true
            } else {
                debug!("engine stopped during reload; driver not restarted");
                false
            }
        } else {
            false
        };

        info!(
            path = %path.display(),
            warnings = loaded.warnings.len(),
            driver_restarted,
            "configuration reloaded"
        );
        self.cx.events().emit(Event::ConfigReloaded {
            timestamp: Utc::now(),
            driver_restarted,
            warnings: loaded.warnings.len(),
        });
        Ok(ReloadReport {
            warnings: loaded.warnings,
            driver_restarted,
        })
    }

    /// Tears down everything `actor` owns.
    ///
    /// Phantoms are despawned without signals, pending sequences dropped and
    /// cooldown state removed before this returns. Calling it again for the
    /// same actor finds nothing and does nothing. Returns the number of
    /// phantoms removed.
    pub fn on_actor_disconnected(&self, actor: &ActorId) -> usize {
        let removed: usize = self
            .drivers
            .iter()
            .map(|d| d.release_actor(actor, DespawnReason::OwnerGone))
            .sum();
        let sequences = self.cx.sequences().drop_actor(actor);
        self.dispatcher.cooldowns().remove_actor(actor);
        metrics::record_disconnect();
        if sequences > 0 {
            metrics::record_sequences_dropped("disconnect", sequences);
        }

        if removed > 0 || sequences > 0 {
            info!(actor = %actor, phantoms = removed, sequences, "actor state released");
        } else {
            debug!(actor = %actor, "disconnect with no active illusions");
        }
        self.cx.events().emit(Event::ActorDisconnected {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            phantoms_removed: removed,
        });
        removed
    }

    // ------------------------------------------------------------------------
    // Ticking
    // ------------------------------------------------------------------------

    /// Sub-ticks every phantom family and pending sequence once.
    pub fn advance_phantoms(&self) {
        for driver in &self.drivers {
            driver.advance();
        }
        self.cx.sequences().advance(self.cx.world(), self.cx.channel());
    }

    /// Runs one scheduler pass immediately.
    pub fn run_scheduler_pass(&self) -> PassSummary {
        self.scheduler.run_pass()
    }

    /// One host tick. Returns the pass summary on ticks that ran the
    /// scheduler.
    pub fn tick(&self) -> Option<PassSummary> {
        self.advance_phantoms();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.cx.config().current().scheduler.interval_ticks.max(1);
        (tick % every == 0).then(|| self.run_scheduler_pass())
    }

    // ------------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------------

    /// Spawns the tick driver on the current tokio runtime.
    ///
    /// Also starts the background appearance fetch.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::AlreadyRunning`] if a driver is running or
    ///   being restarted
    /// - [`SchedulerError::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut slot = self.lock_driver();
        match &*slot {
            DriverSlot::Idle => {}
            DriverSlot::Running(_) | DriverSlot::Restarting => return Err(SchedulerError::AlreadyRunning),
            DriverSlot::Stopped => return Err(SchedulerError::ShutDown),
        }
        let task = self.spawn_driver();
        let interval_ms = u64::try_from(
            self.cx.config().current().scheduler_interval().as_millis(),
        )
        .unwrap_or(u64::MAX);
        *slot = DriverSlot::Running(task);
        drop(slot);

        self.cx.appearances().prefetch();
        info!(
            effects = self.dispatcher.registry().len(),
            interval_ms, "illusion engine started"
        );
        self.cx.events().emit(Event::EngineStarted {
            timestamp: Utc::now(),
            effects: self.dispatcher.registry().len(),
            interval_ms,
        });
        Ok(())
    }

    /// Whether the driver task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        match &*self.lock_driver() {
            DriverSlot::Running(task) => !task.handle.is_finished(),
            DriverSlot::Restarting => true,
            DriverSlot::Idle | DriverSlot::Stopped => false,
        }
    }

    fn lock_driver(&self) -> MutexGuard<'_, DriverSlot> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_driver(self: &Arc<Self>) -> DriverTask {
        let config = self.cx.config().current();
        let period = config.scheduler.tick_duration;
        let cancel = self.shutdown.child_token();
        let token = cancel.clone();
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!("tick driver cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        engine.tick();
                    }
                }
            }
        });
        debug!(period_ms = period.as_millis(), "tick driver spawned");
        DriverTask {
            cancel,
            handle,
            period,
            interval_ticks: config.scheduler.interval_ticks,
        }
    }

    /// Stops the driver, waits for the in-flight tick, and despawns every
    /// phantom. Returns the number of phantoms removed.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DriverFailed`] if the driver task panicked;
    /// phantoms are released regardless.
    pub async fn shutdown(&self, reason: &str) -> Result<usize, SchedulerError> {
        self.shutdown.cancel();
        let slot = std::mem::replace(&mut *self.lock_driver(), DriverSlot::Stopped);
        let joined = match slot {
            DriverSlot::Running(task) => task
                .handle
                .await
                .map_err(|e| SchedulerError::DriverFailed(e.to_string())),
            DriverSlot::Idle | DriverSlot::Restarting | DriverSlot::Stopped => Ok(()),
        };

        let removed: usize = self
            .drivers
            .iter()
            .map(|d| d.release_all(DespawnReason::Cancelled))
            .sum();
        info!(reason, phantoms = removed, ticks = self.tick_count(), "illusion engine stopped");
        self.cx.events().emit(Event::EngineStopped {
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        joined.map(|()| removed)
    }
}

impl std::fmt::Debug for IllusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IllusionEngine")
            .field("dispatcher", &self.dispatcher)
            .field("ticks", &self.tick_count())
            .field("active", &self.active_phantoms())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
