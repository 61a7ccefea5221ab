//! Generic phantom state machine.
//!
//! Every phantom family runs through the same lifecycle:
//!
//! ```text
//! Spawning ──► Active ──► Despawning ──► Removed
//!     └──────────────────────┘
//! ```
//!
//! [`PhantomManager`] owns the transitions and the family's
//! [`ActivePhantomRegistry`]; the family itself only supplies the hooks in
//! [`PhantomFamily`]. Entering `Despawning` is a compare-and-swap, so exactly
//! one caller (sub-tick, disconnect or shutdown) runs cleanup per instance.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::ActivePhantomRegistry;
use crate::channel::PhantomId;
use crate::context::EffectContext;
use crate::error::{ChannelError, EffectError};
use crate::observability::{Event, metrics};
use crate::world::{ActorId, ActorSnapshot};

/// Sentinel for "not seen yet".
const NOT_SEEN: u64 = u64::MAX;

// ============================================================================
// Phases and outcomes
// ============================================================================

/// Lifecycle phase of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Registered, external spawn signal not yet confirmed.
    Spawning = 0,
    /// Visible and stepped every sub-tick.
    Active = 1,
    /// Cleanup in progress.
    Despawning = 2,
    /// Terminal.
    Removed = 3,
}

impl LifecyclePhase {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Spawning,
            1 => Self::Active,
            2 => Self::Despawning,
            _ => Self::Removed,
        }
    }
}

/// Why a phantom went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DespawnReason {
    /// Maximum lifespan reached.
    Timeout,
    /// Looked at, after the grace delay.
    Detected,
    /// Someone came too close.
    Proximity,
    /// The owner disconnected.
    OwnerGone,
    /// Cancelled administratively or at shutdown.
    Cancelled,
    /// Every puppeted subject vanished or was released.
    SubjectLost,
    /// The spawn signal could not be delivered.
    SpawnAborted,
}

impl DespawnReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Detected => "detected",
            Self::Proximity => "proximity",
            Self::OwnerGone => "owner_gone",
            Self::Cancelled => "cancelled",
            Self::SubjectLost => "subject_lost",
            Self::SpawnAborted => "spawn_aborted",
        }
    }
}

impl std::fmt::Display for DespawnReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one family step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing noteworthy.
    Continue,
    /// The phantom was looked at; despawn after the family's grace delay.
    Seen,
    /// Despawn now.
    Despawn(DespawnReason),
}

// ============================================================================
// Instance
// ============================================================================

/// One active illusion.
///
/// Lifecycle fields are atomics so the registry can hand out shared
/// references; family-specific state sits behind a mutex that only the
/// manager locks.
pub struct PhantomInstance<S> {
    id: PhantomId,
    owner: ActorId,
    family: &'static str,
    created_tick: u64,
    lifespan: u64,
    phase: AtomicU8,
    age: AtomicU64,
    seen_at: AtomicU64,
    timer: CancellationToken,
    state: Mutex<S>,
}

impl<S> PhantomInstance<S> {
    /// Creates an instance in the `Spawning` phase.
    #[must_use]
    pub fn new(
        id: PhantomId,
        owner: ActorId,
        family: &'static str,
        created_tick: u64,
        lifespan: u64,
        state: S,
    ) -> Self {
        Self {
            id,
            owner,
            family,
            created_tick,
            lifespan,
            phase: AtomicU8::new(LifecyclePhase::Spawning as u8),
            age: AtomicU64::new(0),
            seen_at: AtomicU64::new(NOT_SEEN),
            timer: CancellationToken::new(),
            state: Mutex::new(state),
        }
    }

    /// Synthetic id.
    #[must_use]
    pub const fn id(&self) -> PhantomId {
        self.id
    }

    /// Actor the illusion is shown to.
    #[must_use]
    pub const fn owner(&self) -> &ActorId {
        &self.owner
    }

    /// Family name.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        self.family
    }

    /// Manager sub-tick at which the instance was created.
    #[must_use]
    pub const fn created_tick(&self) -> u64 {
        self.created_tick
    }

    /// Maximum age in sub-ticks.
    #[must_use]
    pub const fn lifespan(&self) -> u64 {
        self.lifespan
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Sub-ticks stepped while active.
    #[must_use]
    pub fn age(&self) -> u64 {
        self.age.load(Ordering::SeqCst)
    }

    /// Age at which the phantom was first seen.
    #[must_use]
    pub fn seen_at(&self) -> Option<u64> {
        let v = self.seen_at.load(Ordering::SeqCst);
        (v != NOT_SEEN).then_some(v)
    }

    /// Token cancelled when the instance is cleaned up.
    #[must_use]
    pub const fn timer(&self) -> &CancellationToken {
        &self.timer
    }

    fn transition(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Moves into `Despawning`; only the first caller gets `true`.
    fn begin_despawn(&self) -> bool {
        self.transition(LifecyclePhase::Active, LifecyclePhase::Despawning)
            || self.transition(LifecyclePhase::Spawning, LifecyclePhase::Despawning)
    }

    fn mark_seen(&self, age: u64) {
        let _ = self
            .seen_at
            .compare_exchange(NOT_SEEN, age, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn lock_state(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Debug for PhantomInstance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhantomInstance")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("family", &self.family)
            .field("phase", &self.phase())
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Family hooks
// ============================================================================

/// Family-specific behavior plugged into [`PhantomManager`].
pub trait PhantomFamily: Send + Sync + Debug + 'static {
    /// Per-instance state (placement, subjects, animation counters).
    type State: Send + Debug + 'static;

    /// Family name, also the effect key.
    fn name(&self) -> &'static str;

    /// Sub-ticks between first being seen and despawning.
    fn grace_ticks(&self) -> u64 {
        0
    }

    /// Sends the external spawn signal.
    ///
    /// # Errors
    ///
    /// Returns the channel error when the signal was rejected; the manager
    /// then despawns the instance.
    fn render_spawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<Self::State>,
        state: &mut Self::State,
    ) -> Result<(), ChannelError>;

    /// Advances one sub-tick for an active instance whose owner is present.
    fn step(
        &self,
        cx: &EffectContext,
        owner: &ActorSnapshot,
        instance: &PhantomInstance<Self::State>,
        state: &mut Self::State,
    ) -> StepOutcome;

    /// Restores whatever the illusion changed on real subjects and releases
    /// claims. Runs once per instance, whether or not the owner is present.
    fn restore(&self, _cx: &EffectContext, _state: &mut Self::State) {}

    /// Sends the external despawn signal; only called while the owner is
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns the channel error when the signal was rejected.
    fn render_despawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<Self::State>,
        state: &mut Self::State,
    ) -> Result<(), ChannelError>;
}

// ============================================================================
// Manager
// ============================================================================

/// Runs the lifecycle for every instance of one family.
pub struct PhantomManager<F: PhantomFamily> {
    family: F,
    cx: Arc<EffectContext>,
    registry: ActivePhantomRegistry<F::State>,
    sub_tick: AtomicU64,
}

impl<F: PhantomFamily> PhantomManager<F> {
    /// Creates a manager for `family`.
    #[must_use]
    pub fn new(family: F, cx: Arc<EffectContext>) -> Self {
        Self {
            family,
            cx,
            registry: ActivePhantomRegistry::new(),
            sub_tick: AtomicU64::new(0),
        }
    }

    /// The family hooks.
    #[must_use]
    pub const fn family(&self) -> &F {
        &self.family
    }

    /// Shared context.
    #[must_use]
    pub const fn context(&self) -> &Arc<EffectContext> {
        &self.cx
    }

    /// The family's registry.
    #[must_use]
    pub const fn registry(&self) -> &ActivePhantomRegistry<F::State> {
        &self.registry
    }

    /// Whether `owner` has an instance of this family.
    #[must_use]
    pub fn is_active_for(&self, owner: &ActorId) -> bool {
        self.registry.is_active_for(owner)
    }

    /// Registers and shows a new instance.
    ///
    /// The instance is registered before any external signal. If the owner is
    /// gone by then, or the spawn signal fails, the instance is cleaned up
    /// and an error returned.
    ///
    /// # Errors
    ///
    /// - [`EffectError::AlreadyActive`] when `owner` already has one (no
    ///   signal is sent; `state` is restored and dropped)
    /// - [`EffectError::ActorUnavailable`] when the owner disconnected during
    ///   the spawn
    /// - [`EffectError::Channel`] when the spawn signal was rejected
    pub fn spawn(
        &self,
        owner: &ActorId,
        lifespan: u64,
        state: F::State,
    ) -> Result<PhantomId, EffectError> {
        let name = self.family.name();
        let instance = Arc::new(PhantomInstance::new(
            self.cx.ids().allocate(),
            owner.clone(),
            name,
            self.sub_tick.load(Ordering::SeqCst),
            lifespan,
            state,
        ));

        if !self.registry.insert_exclusive(Arc::clone(&instance)) {
            self.family.restore(&self.cx, &mut instance.lock_state());
            instance.phase.store(LifecyclePhase::Removed as u8, Ordering::SeqCst);
            debug!(actor = %owner, family = name, "spawn rejected; phantom already active");
            return Err(EffectError::AlreadyActive {
                family: name,
                actor: owner.to_string(),
            });
        }

        if !self.cx.world().is_connected(owner) {
            self.despawn(&instance, DespawnReason::SpawnAborted);
            return Err(EffectError::ActorUnavailable(owner.to_string()));
        }

        let sent = {
            let mut state = instance.lock_state();
            if instance.phase() == LifecyclePhase::Spawning {
                Some(self.family.render_spawn(&self.cx, &instance, &mut state))
            } else {
                None
            }
        };
        match sent {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                metrics::record_channel_error("spawn_phantom");
                warn!(actor = %owner, family = name, error = %e, "spawn signal failed");
                self.despawn(&instance, DespawnReason::SpawnAborted);
                return Err(e.into());
            }
            None => return Err(EffectError::ActorUnavailable(owner.to_string())),
        }

        if !instance.transition(LifecyclePhase::Spawning, LifecyclePhase::Active) {
            debug!(actor = %owner, family = name, "phantom cleaned up during spawn");
            return Err(EffectError::ActorUnavailable(owner.to_string()));
        }

        info!(actor = %owner, family = name, phantom_id = %instance.id(), lifespan, "phantom spawned");
        metrics::record_spawn(name);
        metrics::set_active_phantoms(name, self.registry.len());
        self.cx.events().emit(Event::PhantomSpawned {
            timestamp: Utc::now(),
            actor: owner.to_string(),
            family: name.to_string(),
            phantom_id: instance.id().0,
        });
        Ok(instance.id())
    }

    /// Advances every active instance by one sub-tick.
    pub fn advance(&self) {
        self.sub_tick.fetch_add(1, Ordering::SeqCst);
        for instance in self.registry.snapshot() {
            if instance.phase() != LifecyclePhase::Active {
                continue;
            }
            let age = instance.age.fetch_add(1, Ordering::SeqCst) + 1;

            let Some(owner) = self.cx.world().actor(instance.owner()) else {
                self.despawn(&instance, DespawnReason::OwnerGone);
                continue;
            };
            if age >= instance.lifespan() {
                self.despawn(&instance, DespawnReason::Timeout);
                continue;
            }

            let outcome = {
                let mut state = instance.lock_state();
                // Cleanup holds this lock; a despawn that won the race is final.
                if instance.phase() != LifecyclePhase::Active {
                    continue;
                }
                self.family.step(&self.cx, &owner, &instance, &mut state)
            };
            match outcome {
                StepOutcome::Continue => {}
                StepOutcome::Seen => {
                    if instance.seen_at().is_none() {
                        debug!(actor = %owner.id, family = self.family.name(), phantom_id = %instance.id(), age, "phantom seen");
                    }
                    instance.mark_seen(age);
                }
                StepOutcome::Despawn(reason) => {
                    self.despawn(&instance, reason);
                    continue;
                }
            }

            if let Some(seen) = instance.seen_at() {
                if age >= seen.saturating_add(self.family.grace_ticks()) {
                    self.despawn(&instance, DespawnReason::Detected);
                }
            }
        }
    }

    /// Despawns one instance. Returns `false` when someone else already did.
    pub fn despawn(&self, instance: &PhantomInstance<F::State>, reason: DespawnReason) -> bool {
        if !instance.begin_despawn() {
            return false;
        }
        let name = self.family.name();
        let owner = instance.owner();
        let connected = self.cx.world().is_connected(owner);

        {
            let mut state = instance.lock_state();
            self.family.restore(&self.cx, &mut state);
            instance.timer().cancel();
            self.registry.remove(owner, instance.id());
            if connected {
                if let Err(e) = self.family.render_despawn(&self.cx, instance, &mut state) {
                    metrics::record_channel_error("remove_phantom");
                    warn!(actor = %owner, family = name, error = %e, "despawn signal failed; cleanup continues");
                }
            }
        }
        instance.phase.store(LifecyclePhase::Removed as u8, Ordering::SeqCst);

        info!(actor = %owner, family = name, phantom_id = %instance.id(), %reason, age = instance.age(), "phantom despawned");
        metrics::record_despawn(name, reason.as_str());
        metrics::set_active_phantoms(name, self.registry.len());
        self.cx.events().emit(Event::PhantomDespawned {
            timestamp: Utc::now(),
            actor: owner.to_string(),
            family: name.to_string(),
            phantom_id: instance.id().0,
            reason: reason.as_str().to_string(),
            age_ticks: instance.age(),
        });
        true
    }

    /// Despawns every instance owned by `owner`.
    pub fn release_actor(&self, owner: &ActorId, reason: DespawnReason) -> usize {
        self.registry
            .for_actor(owner)
            .iter()
            .filter(|i| self.despawn(i, reason))
            .count()
    }

    /// Despawns every instance.
    pub fn release_all(&self, reason: DespawnReason) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|i| self.despawn(i, reason))
            .count()
    }
}

impl<F: PhantomFamily> Debug for PhantomManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhantomManager")
            .field("family", &self.family.name())
            .field("active", &self.registry.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
