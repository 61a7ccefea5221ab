//! Staring animals: nearby passive creatures freeze and turn to watch the owner.
//!
//! Each borrowed creature stares for its own 40 to 100 sub-ticks. Catching
//! any of them at it (looking straight at one within 36 blocks) ends every
//! stare at once.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::lifecycle::{PhantomFamily, PhantomInstance, PhantomManager, StepOutcome};
use super::puppet::{self, OWNER_FOCUS_HEIGHT, Puppet};
use super::{DespawnReason, PhantomDriver};
use crate::context::EffectContext;
use crate::effect::{EffectBehavior, EffectDescriptor, require_actor};
use crate::error::{ChannelError, EffectError};
use crate::geometry::{has_line_of_sight, orientation_towards, view_angle_within};
use crate::world::{ActorId, ActorSnapshot, CreatureSnapshot, Location};

/// Effect key.
pub const KEY: &str = "animal_stare";

const SEARCH_RADIUS: f64 = 64.0;
const MAX_SUBJECTS: usize = 3;
const MIN_STARE_TICKS: u64 = 40;
const MAX_STARE_TICKS: u64 = 100;
const CATCH_RANGE: f64 = 36.0;
const CATCH_CONE_DEGREES: f64 = 6.0;

/// Creatures currently staring for one owner.
#[derive(Debug, Default)]
pub struct StareState {
    /// Borrowed creatures.
    pub puppets: Vec<Puppet>,
}

/// Lifecycle hooks for staring animals.
#[derive(Debug, Default)]
pub struct StareFamily;

impl StareFamily {
    fn face_owner(
        cx: &EffectContext,
        owner: &ActorSnapshot,
        creature: &CreatureSnapshot,
    ) -> Result<(), ChannelError> {
        let orientation = orientation_towards(creature.eye(), owner.position.raised(OWNER_FOCUS_HEIGHT));
        cx.channel()
            .move_creature_view(&owner.id, creature.id, creature.position, orientation)
    }

    fn caught(cx: &EffectContext, owner: &ActorSnapshot, creature: &CreatureSnapshot) -> bool {
        creature.world == owner.world
            && owner.position.distance_squared(creature.position) <= CATCH_RANGE * CATCH_RANGE
            && view_angle_within(owner.eye, owner.look, creature.eye(), CATCH_CONE_DEGREES)
            && has_line_of_sight(
                cx.world(),
                Some(&owner.eye_location()),
                Some(&Location::new(creature.world.clone(), creature.eye())),
            )
    }
}

impl PhantomFamily for StareFamily {
    type State = StareState;

    fn name(&self) -> &'static str {
        KEY
    }

    fn render_spawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<StareState>,
        state: &mut StareState,
    ) -> Result<(), ChannelError> {
        let owner = cx
            .world()
            .actor(instance.owner())
            .ok_or_else(|| ChannelError::ViewerGone(instance.owner().to_string()))?;
        for puppet in &state.puppets {
            if let Some(creature) = cx.world().creature(puppet.creature) {
                Self::face_owner(cx, &owner, &creature)?;
            }
        }
        Ok(())
    }

    fn step(
        &self,
        cx: &EffectContext,
        owner: &ActorSnapshot,
        instance: &PhantomInstance<StareState>,
        state: &mut StareState,
    ) -> StepOutcome {
        let age = instance.age();
        let mut lost = false;
        for p in state.puppets.iter_mut().filter(|p| !p.is_released()) {
            let Some(creature) = cx.world().creature(p.creature) else {
                lost = true;
                puppet::release(cx, KEY, p);
                continue;
            };
            if age >= p.release_at {
                puppet::release(cx, KEY, p);
                continue;
            }
            if Self::caught(cx, owner, &creature) {
                debug!(actor = %owner.id, creature = %creature.id, "caught a staring creature");
                return StepOutcome::Despawn(DespawnReason::Detected);
            }
            if creature.world == owner.world {
                if let Err(e) = Self::face_owner(cx, owner, &creature) {
                    super::figure::note_send_failure(instance, "move_creature_view", &e);
                }
            }
        }

        if state.puppets.iter().all(Puppet::is_released) {
            let reason = if lost {
                DespawnReason::SubjectLost
            } else {
                DespawnReason::Timeout
            };
            return StepOutcome::Despawn(reason);
        }
        StepOutcome::Continue
    }

    fn restore(&self, cx: &EffectContext, state: &mut StareState) {
        for p in &mut state.puppets {
            puppet::release(cx, KEY, p);
        }
    }

    fn render_despawn(
        &self,
        _cx: &EffectContext,
        _instance: &PhantomInstance<StareState>,
        _state: &mut StareState,
    ) -> Result<(), ChannelError> {
        // Creatures resume their own facing once autonomy is back.
        Ok(())
    }
}

/// `animal_stare` effect.
#[derive(Debug)]
pub struct StareEffect {
    descriptor: EffectDescriptor,
    manager: Arc<PhantomManager<StareFamily>>,
}

impl StareEffect {
    /// Creates the effect and its manager.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                KEY,
                "Nearby animals stare intently at you.",
                Duration::from_secs(45),
            ),
            manager: Arc::new(PhantomManager::new(StareFamily, cx)),
        }
    }

    /// The family's manager.
    #[must_use]
    pub fn manager(&self) -> &PhantomManager<StareFamily> {
        &self.manager
    }

    /// The manager as a driver for the engine.
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PhantomDriver> {
        Arc::clone(&self.manager) as Arc<dyn PhantomDriver>
    }
}

impl EffectBehavior for StareEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        if self.manager.is_active_for(actor) {
            return Ok(false);
        }
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        Ok(!puppet::candidates(cx, &snapshot, SEARCH_RADIUS).is_empty())
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        let found = puppet::candidates(cx, &snapshot, SEARCH_RADIUS);
        let count = cx.with_rng(|rng| rng.random_range(1..=MAX_SUBJECTS));
        let puppets = puppet::acquire(cx, KEY, actor, found, count, || {
            cx.with_rng(|rng| rng.random_range(MIN_STARE_TICKS..=MAX_STARE_TICKS))
        });
        if puppets.is_empty() {
            debug!(actor = %actor, family = KEY, "no creature available to stare");
            return Ok(());
        }

        let lifespan = puppets.iter().map(|p| p.release_at).max().unwrap_or(MAX_STARE_TICKS);
        self.manager
            .spawn(actor, lifespan, StareState { puppets })
            .map(|_| ())
    }
}
