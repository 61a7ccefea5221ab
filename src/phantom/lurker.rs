//! The lurker: a figure standing right behind the owner.
//!
//! It appears 1.2 blocks behind a participant who is standing still or
//! looking down, shuffles its feet every few sub-ticks, and vanishes shortly
//! after the owner turns around.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::PhantomDriver;
use super::figure::{self, FigureState};
use super::lifecycle::{PhantomFamily, PhantomInstance, PhantomManager, StepOutcome};
use crate::appearance::PHANTOM_DISPLAY_NAME;
use crate::context::EffectContext;
use crate::effect::catalog::step_sound_for;
use crate::effect::{EffectBehavior, EffectDescriptor, require_actor};
use crate::error::{ChannelError, EffectError};
use crate::geometry::{BlockPos, Orientation, Vec3, find_ground_level, orientation_towards, view_angle_within};
use crate::world::{ActorId, ActorSnapshot, is_isolated};

/// Effect key.
pub const KEY: &str = "null_spawn";

/// Maximum age in sub-ticks.
pub const LIFESPAN_TICKS: u64 = 400;

/// Sub-ticks between footsteps.
pub const FOOTSTEP_INTERVAL: u64 = 8;

const SPAWN_DISTANCE: f64 = 1.2;
const GROUND_SEARCH_HEIGHT: f64 = 6.0;
const GAZE_THRESHOLD_DEGREES: f64 = 90.0;
const DETECTION_GRACE_TICKS: u64 = 5;
const ISOLATION_RADIUS: f64 = 50.0;
const STILL_VELOCITY_SQ: f64 = 0.001;
const LOOKING_DOWN_PITCH: f64 = 45.0;
const MAX_HEAD_PITCH: f32 = 89.9;

/// Lifecycle hooks for the lurking figure.
#[derive(Debug, Default)]
pub struct LurkerFamily;

impl PhantomFamily for LurkerFamily {
    type State = FigureState;

    fn name(&self) -> &'static str {
        KEY
    }

    fn grace_ticks(&self) -> u64 {
        DETECTION_GRACE_TICKS
    }

    fn render_spawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<FigureState>,
        state: &mut FigureState,
    ) -> Result<(), ChannelError> {
        figure::show(cx, instance, state)
    }

    fn step(
        &self,
        cx: &EffectContext,
        owner: &ActorSnapshot,
        instance: &PhantomInstance<FigureState>,
        state: &mut FigureState,
    ) -> StepOutcome {
        figure::unlist_when_due(cx, instance, state);

        if instance.age() % FOOTSTEP_INTERVAL == 0 {
            let ground = cx
                .world()
                .material_at(&state.world, state.position.block().offset(0, -1, 0));
            let (volume, pitch) = cx.with_rng(|rng| {
                (rng.random_range(0.15..0.25_f32), rng.random_range(0.9..1.1_f32))
            });
            if let Err(e) = cx.channel().play_sound(
                &owner.id,
                step_sound_for(ground.as_deref()),
                state.position,
                volume,
                pitch,
            ) {
                figure::note_send_failure(instance, "sound", &e);
            }
        }

        if owner.world != state.world {
            return StepOutcome::Continue;
        }

        let facing = orientation_towards(state.head(), owner.eye);
        let facing = Orientation {
            pitch: facing.pitch.clamp(-MAX_HEAD_PITCH, MAX_HEAD_PITCH),
            ..facing
        };
        figure::turn(cx, instance, state, facing);

        if view_angle_within(owner.eye, owner.look, state.head(), GAZE_THRESHOLD_DEGREES) {
            StepOutcome::Seen
        } else {
            StepOutcome::Continue
        }
    }

    fn render_despawn(
        &self,
        cx: &EffectContext,
        instance: &PhantomInstance<FigureState>,
        state: &mut FigureState,
    ) -> Result<(), ChannelError> {
        figure::hide(cx, instance, state)
    }
}

/// Standing spot 1.2 blocks behind the owner, if there is room.
fn find_placement(cx: &EffectContext, owner: &ActorSnapshot) -> Option<Vec3> {
    let world = cx.world();
    let backwards = (owner.look * -1.0).normalized()?;
    let spot = owner.position + backwards * SPAWN_DISTANCE;
    let ground = find_ground_level(
        world,
        &owner.world,
        Vec3::new(spot.x, owner.position.y + GROUND_SEARCH_HEIGHT, spot.z),
    )?;

    let column = spot.block();
    let feet = BlockPos::new(column.x, ground, column.z);
    let placeable = !world.is_passable(&owner.world, feet.offset(0, -1, 0))
        && world.is_passable(&owner.world, feet)
        && world.is_passable(&owner.world, feet.offset(0, 1, 0));
    placeable.then(|| Vec3::new(spot.x, f64::from(ground), spot.z))
}

/// `null_spawn` effect.
#[derive(Debug)]
pub struct LurkerEffect {
    descriptor: EffectDescriptor,
    manager: Arc<PhantomManager<LurkerFamily>>,
}

impl LurkerEffect {
    /// Creates the effect and its manager.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                KEY,
                "A figure briefly appears directly behind you.",
                Duration::from_secs(10 * 60),
            ),
            manager: Arc::new(PhantomManager::new(LurkerFamily, cx)),
        }
    }

    /// The family's manager.
    #[must_use]
    pub fn manager(&self) -> &PhantomManager<LurkerFamily> {
        &self.manager
    }

    /// The manager as a driver for the engine.
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PhantomDriver> {
        Arc::clone(&self.manager) as Arc<dyn PhantomDriver>
    }
}

impl EffectBehavior for LurkerEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        if self.manager.is_active_for(actor) {
            return Ok(false);
        }
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        if !snapshot.alive || snapshot.is_busy() || !is_isolated(cx.world(), &snapshot, ISOLATION_RADIUS) {
            return Ok(false);
        }
        let still = snapshot.velocity.length_squared() < STILL_VELOCITY_SQ;
        Ok(still || snapshot.pitch > LOOKING_DOWN_PITCH)
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        let Some(position) = find_placement(cx, &snapshot) else {
            debug!(actor = %actor, family = KEY, "no room behind actor; nothing shown");
            return Ok(());
        };

        let state = FigureState {
            world: snapshot.world.clone(),
            position,
            orientation: orientation_towards(position.raised(figure::FIGURE_HEAD_HEIGHT), snapshot.eye),
            appearance: cx.appearances().appearance_for(PHANTOM_DISPLAY_NAME),
            item: None,
            roster_listed: false,
        };
        self.manager.spawn(actor, LIFESPAN_TICKS, state).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::recording::RenderCall;
    use crate::context::tests::{Harness, harness};
    use crate::world::WorldId;

    fn setup() -> (Harness, ActorId, LurkerEffect) {
        let h = harness(3);
        h.world
            .place_actor("steve", &WorldId::overworld(), Vec3::new(0.5, 64.0, 0.5));
        let effect = LurkerEffect::new(Arc::clone(&h.cx));
        (h, ActorId::new("steve"), effect)
    }

    #[test]
    fn appears_directly_behind() {
        let (h, steve, effect) = setup();
        effect.trigger(&steve).unwrap();
        let position = h
            .channel
            .calls()
            .into_iter()
            .find_map(|c| match c {
                RenderCall::SpawnPhantom { position, .. } => Some(position),
                _ => None,
            })
            .unwrap();
        assert!((position.z - (0.5 - SPAWN_DISTANCE)).abs() < 1e-9);
        assert!((position.x - 0.5).abs() < 1e-9);
        assert!((position.y - 64.0).abs() < 1e-9);
    }

    #[test]
    fn moving_actor_must_look_down() {
        let (h, steve, effect) = setup();
        h.world
            .update_actor(&steve, |a| a.velocity = Vec3::new(0.2, 0.0, 0.0));
        assert!(!effect.can_trigger(&steve).unwrap());
        h.world.update_actor(&steve, |a| a.pitch = 60.0);
        assert!(effect.can_trigger(&steve).unwrap());
        h.world.update_actor(&steve, |a| a.swimming = true);
        assert!(!effect.can_trigger(&steve).unwrap());
    }

    #[test]
    fn footsteps_follow_ground_material() {
        let (h, steve, effect) = setup();
        effect.trigger(&steve).unwrap();
        for _ in 0..FOOTSTEP_INTERVAL {
            effect.manager().advance();
        }
        let sounds: Vec<String> = h
            .channel
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RenderCall::Sound { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(sounds, vec!["block.grass.step".to_string()]);
    }

    #[test]
    fn turning_around_despawns_after_grace() {
        let (h, steve, effect) = setup();
        effect.trigger(&steve).unwrap();
        h.world
            .update_actor(&steve, |a| a.look = Vec3::new(0.0, 0.0, -1.0));
        for _ in 0..=DETECTION_GRACE_TICKS {
            assert!(effect.manager().is_active_for(&steve));
            effect.manager().advance();
        }
        assert!(!effect.manager().is_active_for(&steve));
        assert_eq!(h.channel.count("remove_phantom"), 1);
        assert_eq!(h.channel.count("roster_remove"), 1);
        assert_eq!(h.cx.sequences().pending_for(&steve), 0);
    }

    #[test]
    fn unobserved_lurker_times_out() {
        let (h, steve, effect) = setup();
        effect.trigger(&steve).unwrap();
        for _ in 0..LIFESPAN_TICKS {
            effect.manager().advance();
        }
        assert!(!effect.manager().is_active_for(&steve));
        assert_eq!(h.channel.count("roster_add"), 1);
        assert_eq!(h.channel.count("roster_remove"), 1);
    }
}
