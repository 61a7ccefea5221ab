//! Following animals: creatures that creep closer while the owner looks away.
//!
//! The owner sees the borrowed creatures take small steps toward them every
//! few sub-ticks. A creature stops, and snaps back to where it really is, as
//! soon as the owner looks at it or walks up to it.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::figure::note_send_failure;
use super::lifecycle::{PhantomFamily, PhantomInstance, PhantomManager, StepOutcome};
use super::puppet::{self, OWNER_FOCUS_HEIGHT, Puppet};
use super::{DespawnReason, PhantomDriver};
use crate::context::EffectContext;
use crate::effect::{EffectBehavior, EffectDescriptor, require_actor};
use crate::error::{ChannelError, EffectError};
use crate::geometry::{Orientation, Vec3, orientation_towards, view_angle_within};
use crate::world::{ActorId, ActorSnapshot, CreatureSnapshot};

/// Effect key.
pub const KEY: &str = "animal_follow";

/// Maximum age in sub-ticks.
pub const LIFESPAN_TICKS: u64 = 400;

/// Sub-ticks between steps.
pub const STEP_INTERVAL: u64 = 5;

const SEARCH_RADIUS: f64 = 32.0;
const MAX_SUBJECTS: usize = 2;
const GAZE_THRESHOLD_DEGREES: f64 = 70.0;
const MIN_STEP: f64 = 0.3;
const MAX_STEP: f64 = 0.5;
const STEP_CAP_FRACTION: f64 = 0.8;
const STOP_DISTANCE: f64 = 2.0;
const GAZE_TARGET_HEIGHT: f64 = 1.0;

/// Creatures currently following one owner.
#[derive(Debug, Default)]
pub struct FollowState {
    /// Borrowed creatures; `view_position` is where the owner sees each.
    pub puppets: Vec<Puppet>,
}

/// Lifecycle hooks for following animals.
#[derive(Debug, Default)]
pub struct FollowFamily;

impl FollowFamily {
    /// Shows the creature where it really is again.
    fn resync(
        cx: &EffectContext,
        owner: &ActorId,
        puppet: &mut Puppet,
        creature: &CreatureSnapshot,
    ) -> Result<(), ChannelError> {
        puppet.view_position = creature.position;
        cx.channel()
            .move_creature_view(owner, creature.id, creature.position, Orientation::default())
    }

    fn should_stop(owner: &ActorSnapshot, puppet: &Puppet) -> bool {
        view_angle_within(
            owner.eye,
            owner.look,
            puppet.view_position.raised(GAZE_TARGET_HEIGHT),
            GAZE_THRESHOLD_DEGREES,
        ) || owner.position.distance_squared(puppet.view_position) < STOP_DISTANCE * STOP_DISTANCE
    }

    /// Moves the shown position a little toward the owner.
    fn creep(cx: &EffectContext, owner: &ActorSnapshot, puppet: &mut Puppet) -> Result<(), ChannelError> {
        let target = owner.position.raised(0.5);
        let offset = target - puppet.view_position;
        let distance = offset.length();
        if distance < MIN_STEP * 1.5 {
            return Ok(());
        }
        let Some(direction) = offset.normalized() else {
            return Ok(());
        };
        let stride = cx
            .with_rng(|rng| rng.random_range(MIN_STEP..MAX_STEP))
            .min(distance * STEP_CAP_FRACTION);
        let next: Vec3 = puppet.view_position + direction * stride;
        let facing = orientation_towards(next, owner.position.raised(OWNER_FOCUS_HEIGHT));
        cx.channel()
            .move_creature_view(&owner.id, puppet.creature, next, facing)?;
        puppet.view_position = next;
        Ok(())
    }
}

impl PhantomFamily for FollowFamily {
    type State = FollowState;

    fn name(&self) -> &'static str {
        KEY
    }

    fn render_spawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<FollowState>,
        _state: &mut FollowState,
    ) -> Result<(), ChannelError> {
        // Nothing is shown until the first step; only confirm the viewer.
        if cx.world().is_connected(instance.owner()) {
            Ok(())
        } else {
            Err(ChannelError::ViewerGone(instance.owner().to_string()))
        }
    }

    fn step(
        &self,
        cx: &EffectContext,
        owner: &ActorSnapshot,
        instance: &PhantomInstance<FollowState>,
        state: &mut FollowState,
    ) -> StepOutcome {
        let stepping = instance.age() % STEP_INTERVAL == 0;
        let mut lost = false;
        for p in state.puppets.iter_mut().filter(|p| !p.is_released()) {
            let Some(creature) = cx.world().creature(p.creature) else {
                lost = true;
                puppet::release(cx, KEY, p);
                continue;
            };
            if creature.world != owner.world {
                continue;
            }
            if Self::should_stop(owner, p) {
                debug!(actor = %owner.id, creature = %creature.id, "following creature noticed");
                puppet::release(cx, KEY, p);
                if let Err(e) = Self::resync(cx, &owner.id, p, &creature) {
                    note_send_failure(instance, "move_creature_view", &e);
                }
                continue;
            }
            if stepping {
                if let Err(e) = Self::creep(cx, owner, p) {
                    note_send_failure(instance, "move_creature_view", &e);
                }
            }
        }

        if state.puppets.iter().all(Puppet::is_released) {
            let reason = if lost {
                DespawnReason::SubjectLost
            } else {
                DespawnReason::Detected
            };
            return StepOutcome::Despawn(reason);
        }
        StepOutcome::Continue
    }

    fn restore(&self, cx: &EffectContext, state: &mut FollowState) {
        for p in &mut state.puppets {
            puppet::release(cx, KEY, p);
        }
    }

    fn render_despawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<FollowState>,
        state: &mut FollowState,
    ) -> Result<(), ChannelError> {
        let mut result = Ok(());
        for p in &mut state.puppets {
            let Some(creature) = cx.world().creature(p.creature) else {
                continue;
            };
            if creature.position == p.view_position {
                continue;
            }
            if let Err(e) = Self::resync(cx, instance.owner(), p, &creature) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

/// `animal_follow` effect.
#[derive(Debug)]
pub struct FollowEffect {
    descriptor: EffectDescriptor,
    manager: Arc<PhantomManager<FollowFamily>>,
}

impl FollowEffect {
    /// Creates the effect and its manager.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                KEY,
                "Nearby animals seem to follow you when your back is turned.",
                Duration::from_secs(60),
            ),
            manager: Arc::new(PhantomManager::new(FollowFamily, cx)),
        }
    }

    /// The family's manager.
    #[must_use]
    pub fn manager(&self) -> &PhantomManager<FollowFamily> {
        &self.manager
    }

    /// The manager as a driver for the engine.
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PhantomDriver> {
        Arc::clone(&self.manager) as Arc<dyn PhantomDriver>
    }
}

impl EffectBehavior for FollowEffect {
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
        let puppets = puppet::acquire(cx, KEY, actor, found, count, || LIFESPAN_TICKS);
        if puppets.is_empty() {
            debug!(actor = %actor, family = KEY, "no creature available to follow");
            return Ok(());
        }
        self.manager
            .spawn(actor, LIFESPAN_TICKS, FollowState { puppets })
            .map(|_| ())
    }
}
