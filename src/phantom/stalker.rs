//! The stalker: a distant figure that watches the owner.
//!
//! The figure is placed 60 to 100 blocks away, out of the owner's current
//! view but in their line of sight, and keeps turning to face them. It goes
//! away when anyone gets close, 80 sub-ticks after anyone looks at it, or
//! when its lifespan runs out.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::figure::{self, FigureState};
use super::lifecycle::{PhantomFamily, PhantomInstance, PhantomManager, StepOutcome};
use super::{DespawnReason, PhantomDriver};
use crate::appearance::PHANTOM_DISPLAY_NAME;
use crate::channel::Animation;
use crate::context::EffectContext;
use crate::effect::catalog::{STALKER_ITEMS, STALKER_SOUNDS};
use crate::effect::{EffectBehavior, EffectDescriptor, require_actor};
use crate::error::{ChannelError, EffectError};
use crate::geometry::{
    BlockPos, Vec3, find_ground_level, has_line_of_sight, orientation_towards, ring_offset,
    view_angle_degrees, view_angle_within,
};
use crate::world::{ActorId, ActorSnapshot, Location, Realm, actors_near, is_isolated};

/// Effect key.
pub const KEY: &str = "stalker";

/// Maximum age in sub-ticks.
pub const LIFESPAN_TICKS: u64 = 1_200;

const MIN_DISTANCE: f64 = 60.0;
const MAX_DISTANCE: f64 = 100.0;
const GAZE_THRESHOLD_DEGREES: f64 = 65.0;
const DETECTION_GRACE_TICKS: u64 = 80;
const INTERACTION_RADIUS: f64 = MAX_DISTANCE + 35.0;
const PROXIMITY_RADIUS: f64 = 20.0;
const ISOLATION_RADIUS: f64 = 128.0;

const PLACEMENT_ATTEMPTS: usize = 50;
const VERTICAL_SEARCH: i32 = 10;
const MIN_LOOK_OFFSET_DEGREES: f64 = 60.0;

const ITEM_CHANCE: f64 = 0.7;
const ARM_SWING_CHANCE: f64 = 0.025;
const SOUND_CHANCE: f64 = 0.01;

const NIGHT_START: u64 = 13_000;
const NIGHT_END: u64 = 23_000;
const MAX_DAYLIGHT: u8 = 7;
const DEEP_BELOW_SEA: f64 = 20.0;

// ============================================================================
// Family
// ============================================================================

/// Lifecycle hooks for the stalking figure.
#[derive(Debug, Default)]
pub struct StalkerFamily;

impl PhantomFamily for StalkerFamily {
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

        if cx.chance(ARM_SWING_CHANCE) {
            if let Err(e) =
                cx.channel()
                    .animate_phantom_actor(&owner.id, instance.id(), Animation::SwingArm)
            {
                figure::note_send_failure(instance, "animate_phantom", &e);
            }
        }

        if cx.chance(SOUND_CHANCE) {
            let kind = cx.pick(STALKER_SOUNDS).copied().unwrap_or("block.gravel.step");
            let (volume, pitch) = cx.with_rng(|rng| {
                (rng.random_range(0.1..0.3_f32), rng.random_range(0.95..1.05_f32))
            });
            if let Err(e) = cx
                .channel()
                .play_sound(&owner.id, kind, state.position, volume, pitch)
            {
                figure::note_send_failure(instance, "sound", &e);
            }
        }

        if owner.world == state.world {
            figure::face(cx, instance, state, owner.eye);
        }

        let origin = Location::new(state.world.clone(), state.position);
        let proximity_sq = PROXIMITY_RADIUS * PROXIMITY_RADIUS;
        let mut seen = false;
        for observer in actors_near(cx.world(), &origin, INTERACTION_RADIUS, None) {
            if observer.position.distance_squared(state.position) < proximity_sq {
                return StepOutcome::Despawn(DespawnReason::Proximity);
            }
            seen = seen
                || view_angle_within(observer.eye, observer.look, state.head(), GAZE_THRESHOLD_DEGREES);
        }
        if seen {
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

// ============================================================================
// Placement
// ============================================================================

/// Samples a standing spot on a ring around the owner.
///
/// Each attempt picks a column, scans it from ten blocks above the owner down
/// to ten below, and accepts the first ground level with a solid floor, room
/// for a figure, at least 60° away from where the owner is looking, and a
/// clear line of sight to the owner's eye.
fn find_placement(cx: &EffectContext, owner: &ActorSnapshot) -> Option<Vec3> {
    let world = cx.world();
    let feet = owner.position.block();
    let floor = world.min_height(&owner.world);
    let eye = owner.eye_location();

    for _ in 0..PLACEMENT_ATTEMPTS {
        let offset = cx.with_rng(|rng| ring_offset(rng, MIN_DISTANCE, MAX_DISTANCE));
        let column = Vec3::new(
            f64::from(feet.x) + offset.x,
            0.0,
            f64::from(feet.z) + offset.z,
        )
        .block();

        let mut tried = None;
        for y in ((feet.y - VERTICAL_SEARCH).max(floor)..=feet.y + VERTICAL_SEARCH).rev() {
            let spot = BlockPos::new(column.x, y, column.z).bottom_center();
            let Some(ground) = find_ground_level(world, &owner.world, spot) else {
                break;
            };
            if tried == Some(ground) {
                continue;
            }
            tried = Some(ground);

            let base = BlockPos::new(column.x, ground, column.z);
            if world.is_passable(&owner.world, base.offset(0, -1, 0))
                || !world.is_passable(&owner.world, base)
                || !world.is_passable(&owner.world, base.offset(0, 1, 0))
            {
                continue;
            }

            let candidate = base.bottom_center();
            let off_look = view_angle_degrees(owner.position, owner.look, candidate);
            if off_look.is_none_or(|angle| angle < MIN_LOOK_OFFSET_DEGREES) {
                continue;
            }

            let head = Location::new(owner.world.clone(), candidate.raised(figure::FIGURE_HEAD_HEIGHT));
            if has_line_of_sight(world, Some(&head), Some(&eye)) {
                return Some(candidate);
            }
        }
    }
    None
}

// ============================================================================
// Effect
// ============================================================================

/// `stalker` effect: eligibility, placement and the family's manager.
#[derive(Debug)]
pub struct StalkerEffect {
    descriptor: EffectDescriptor,
    manager: Arc<PhantomManager<StalkerFamily>>,
}

impl StalkerEffect {
    /// Creates the effect and its manager.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                KEY,
                "A distant figure briefly appears and watches you.",
                Duration::from_secs(15 * 60),
            ),
            manager: Arc::new(PhantomManager::new(StalkerFamily, cx)),
        }
    }

    /// The family's manager.
    #[must_use]
    pub fn manager(&self) -> &PhantomManager<StalkerFamily> {
        &self.manager
    }

    /// The manager as a driver for the engine.
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PhantomDriver> {
        Arc::clone(&self.manager) as Arc<dyn PhantomDriver>
    }
}

impl EffectBehavior for StalkerEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        if self.manager.is_active_for(actor) {
            return Ok(false);
        }
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        if snapshot.realm != Realm::Overworld || !is_isolated(cx.world(), &snapshot, ISOLATION_RADIUS) {
            return Ok(false);
        }

        let night = snapshot.world_time > NIGHT_START && snapshot.world_time < NIGHT_END;
        if !night && snapshot.light > MAX_DAYLIGHT {
            return Ok(false);
        }
        let sea = f64::from(cx.world().sea_level(&snapshot.world));
        Ok(!(snapshot.position.y < sea - DEEP_BELOW_SEA && snapshot.light < MAX_DAYLIGHT))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let cx = self.manager.context();
        let snapshot = require_actor(cx, actor)?;
        let Some(position) = find_placement(cx, &snapshot) else {
            debug!(actor = %actor, family = KEY, "no placement found; nothing shown");
            return Ok(());
        };

        let item = if cx.chance(ITEM_CHANCE) {
            cx.pick(STALKER_ITEMS).copied()
        } else {
            None
        };
        let state = FigureState {
            world: snapshot.world.clone(),
            position,
            orientation: orientation_towards(position.raised(figure::FIGURE_HEAD_HEIGHT), snapshot.eye),
            appearance: cx.appearances().appearance_for(PHANTOM_DISPLAY_NAME),
            item,
            roster_listed: false,
        };
        self.manager.spawn(actor, LIFESPAN_TICKS, state).map(|_| ())
    }
}

// ============================================================================
// Tests
// ============================================================================
