//! Sensory illusions around the actor: footsteps, out-of-place ambience,
//! breaking glass, doors operated by nobody, smoke at the edge of vision and
//! pain without a cause.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::catalog::{
    DEFAULT_STEP_SOUND, GLASS_BREAK_SOUND, HURT_SOUND, PERIPHERAL_PARTICLE, STEP_SOUNDS,
    interaction_sounds, is_glass, misplaced_pools, step_sound_for,
};
use super::{EffectBehavior, EffectDescriptor, require_actor};
use crate::context::EffectContext;
use crate::error::EffectError;
use crate::geometry::{BlockPos, Vec3, ring_offset};
use crate::sequence::{SequenceStep, TimedSequence};
use crate::world::{ActorId, ActorSnapshot, Realm};

fn is_night(world_time: u64) -> bool {
    world_time > 13_000 && world_time < 23_000
}

/// Pitch `1 ± variance`.
fn varied_pitch(cx: &EffectContext, variance: f32) -> f32 {
    cx.with_rng(|rng| 1.0 + rng.random_range(-variance..=variance))
}

// ============================================================================
// Footstep
// ============================================================================

/// Key of the footstep effect.
pub const FOOTSTEP_KEY: &str = "footstep";

const SINGLE_STEP_VOLUME: f32 = 0.4;
const SEQUENCE_STEP_VOLUME: f32 = 0.15;
const STEP_PITCH_VARIANCE: f32 = 0.15;

/// Phantom footsteps near the actor.
///
/// One trigger plays a single random step, a single step matching the
/// ground under the actor, or a short sequence of steps from one spot.
#[derive(Debug)]
pub struct FootstepEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl FootstepEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                FOOTSTEP_KEY,
                "Plays phantom footstep sounds near the player.",
                Duration::from_secs(30),
            ),
            cx,
        }
    }

    /// Step sound of whatever the actor stands on.
    fn cloned_sound(&self, actor: &ActorSnapshot) -> &'static str {
        let below = actor.position.raised(-0.1).block();
        if self.cx.world().is_passable(&actor.world, below) {
            return DEFAULT_STEP_SOUND;
        }
        step_sound_for(self.cx.world().material_at(&actor.world, below).as_deref())
    }

    fn random_sound(&self) -> &'static str {
        self.cx.pick(STEP_SOUNDS).copied().unwrap_or(DEFAULT_STEP_SOUND)
    }

    fn spot_near(&self, actor: &ActorSnapshot, min: f64, max: f64) -> Vec3 {
        self.cx.with_rng(|rng| {
            let offset = ring_offset(rng, min, max);
            actor.position + offset.raised(rng.random_range(-0.25..0.25))
        })
    }

    fn play_single(&self, actor: &ActorSnapshot, cloned: bool) -> Result<(), EffectError> {
        let kind = if cloned {
            self.cloned_sound(actor)
        } else {
            self.random_sound()
        };
        let position = self.spot_near(actor, 1.0, 2.5);
        let pitch = varied_pitch(&self.cx, STEP_PITCH_VARIANCE);
        debug!(actor = %actor.id, effect = FOOTSTEP_KEY, sound = kind, cloned, "single footstep");
        self.cx
            .channel()
            .play_sound(&actor.id, kind, position, SINGLE_STEP_VOLUME, pitch)?;
        Ok(())
    }

    fn schedule_sequence(&self, actor: &ActorSnapshot) {
        let (steps, spacing, cloned) = self.cx.with_rng(|rng| {
            (
                rng.random_range(2..=4_u64),
                rng.random_range(6..=10_u64),
                rng.random_bool(0.5),
            )
        });
        let cloned_kind = cloned.then(|| self.cloned_sound(actor));
        let position = self.spot_near(actor, 1.5, 3.0);

        let mut sequence = TimedSequence::new(FOOTSTEP_KEY);
        let mut previous = 0;
        for i in 0..steps {
            let jitter = self.cx.with_rng(|rng| rng.random_range(-1..=2_i64));
            let at = (i * spacing).saturating_add_signed(jitter);
            let kind = cloned_kind.unwrap_or_else(|| self.random_sound());
            sequence = sequence.then(
                at.saturating_sub(previous),
                SequenceStep::Sound {
                    kind: kind.to_string(),
                    position,
                    volume: SEQUENCE_STEP_VOLUME,
                    pitch: varied_pitch(&self.cx, STEP_PITCH_VARIANCE),
                },
            );
            previous = previous.max(at);
        }
        debug!(actor = %actor.id, effect = FOOTSTEP_KEY, steps, cloned, "footstep sequence scheduled");
        self.cx.sequences().schedule(&actor.id, sequence);
    }
}

impl EffectBehavior for FootstepEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        match self.cx.with_rng(|rng| rng.random_range(0..3)) {
            0 => self.play_single(&snapshot, false),
            1 => self.play_single(&snapshot, true),
            _ => {
                self.schedule_sequence(&snapshot);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Misplaced sound
// ============================================================================

/// Key of the misplaced-sound effect.
pub const MISPLACED_SOUND_KEY: &str = "misplaced_sound";

const MISPLACED_MIN_DISTANCE: f64 = 10.0;
const MISPLACED_MAX_DISTANCE: f64 = 20.0;
const MISPLACED_BASE_VOLUME: f32 = 0.8;
const MISPLACED_VOLUME_VARIANCE: f32 = 0.4;
const MISPLACED_PITCH_VARIANCE: f32 = 0.05;
const SHALLOW_DEPTH: i32 = 5;
const SURFACE_FLOOR_Y: f64 = 50.0;

/// Ambient sound that does not belong where the actor is.
#[derive(Debug)]
pub struct MisplacedSoundEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl MisplacedSoundEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                MISPLACED_SOUND_KEY,
                "Plays an ambient sound that does not fit the surroundings.",
                Duration::from_secs(120),
            ),
            cx,
        }
    }

    fn is_underground(&self, actor: &ActorSnapshot) -> bool {
        let sea = match actor.realm {
            Realm::Overworld => self.cx.world().sea_level(&actor.world),
            Realm::Nether | Realm::End => 63,
        };
        actor.position.y < f64::from(sea - SHALLOW_DEPTH) || actor.position.y < SURFACE_FLOOR_Y
    }
}

impl EffectBehavior for MisplacedSoundEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let underground = self.is_underground(&snapshot);
        let pools = misplaced_pools(snapshot.realm, underground, is_night(snapshot.world_time));
        let Some(kind) = self
            .cx
            .pick(&pools)
            .and_then(|pool| self.cx.pick(pool))
            .copied()
        else {
            return Ok(());
        };

        let (position, volume) = self.cx.with_rng(|rng| {
            let offset = ring_offset(rng, MISPLACED_MIN_DISTANCE, MISPLACED_MAX_DISTANCE);
            let position = snapshot.position + offset.raised(rng.random_range(-3.0..3.0));
            let volume = MISPLACED_BASE_VOLUME
                * (1.0 + rng.random_range(-MISPLACED_VOLUME_VARIANCE..=MISPLACED_VOLUME_VARIANCE));
            (position, volume)
        });
        let pitch = varied_pitch(&self.cx, MISPLACED_PITCH_VARIANCE);
        debug!(actor = %actor, effect = MISPLACED_SOUND_KEY, sound = kind, underground, "misplaced sound");
        self.cx
            .channel()
            .play_sound(actor, kind, position, volume, pitch)?;
        Ok(())
    }
}

// ============================================================================
// Window break
// ============================================================================

/// Key of the window-break effect.
pub const WINDOW_BREAK_KEY: &str = "fake_window_break";

const GLASS_SEARCH_RADIUS: i32 = 10;
const WINDOW_MIN_DISTANCE: f64 = 6.0;
const WINDOW_MAX_DISTANCE: f64 = 14.0;
const WINDOW_VOLUME: f32 = 0.5;
const WINDOW_PITCH_VARIANCE: f32 = 0.1;

/// Glass breaking somewhere close by.
///
/// The sound comes from a real glass block near the actor when there is
/// one, and from a random spot otherwise.
#[derive(Debug)]
pub struct WindowBreakEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl WindowBreakEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                WINDOW_BREAK_KEY,
                "Plays the sound of breaking glass nearby.",
                Duration::from_secs(50),
            ),
            cx,
        }
    }

    fn nearby_glass(&self, actor: &ActorSnapshot) -> Vec<BlockPos> {
        let center = actor.position.block();
        let r = GLASS_SEARCH_RADIUS;
        let mut found = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let pos = center.offset(dx, dy, dz);
                    if self
                        .cx
                        .world()
                        .material_at(&actor.world, pos)
                        .is_some_and(|m| is_glass(&m))
                    {
                        found.push(pos);
                    }
                }
            }
        }
        found
    }
}

impl EffectBehavior for WindowBreakEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let glass = self.nearby_glass(&snapshot);
        let position = match self.cx.pick(&glass) {
            Some(block) => block.bottom_center().raised(0.5),
            None => self.cx.with_rng(|rng| {
                let offset = ring_offset(rng, WINDOW_MIN_DISTANCE, WINDOW_MAX_DISTANCE);
                snapshot.position + offset.raised(rng.random_range(-0.5..0.5))
            }),
        };
        let pitch = varied_pitch(&self.cx, WINDOW_PITCH_VARIANCE);
        debug!(actor = %actor, effect = WINDOW_BREAK_KEY, from_glass = !glass.is_empty(), "window break");
        self.cx
            .channel()
            .play_sound(actor, GLASS_BREAK_SOUND, position, WINDOW_VOLUME, pitch)?;
        Ok(())
    }
}

// ============================================================================
// Ghost block
// ============================================================================

/// Key of the ghost-block effect.
pub const GHOST_BLOCK_KEY: &str = "ghost_block";

const INTERACTABLE_SEARCH_RADIUS: i32 = 6;
const INTERACTION_VOLUME: f32 = 0.6;
const INTERACTION_PITCH_VARIANCE: f32 = 0.1;

/// A nearby door, chest or lever sounds as if someone used it.
#[derive(Debug)]
pub struct GhostBlockEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl GhostBlockEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                GHOST_BLOCK_KEY,
                "A nearby door, chest or lever sounds as if it was used.",
                Duration::from_secs(35),
            ),
            cx,
        }
    }

    /// Interactable blocks around the actor with their open and close sounds.
    fn nearby_interactables(&self, actor: &ActorSnapshot) -> Vec<(BlockPos, (&'static str, &'static str))> {
        let center = actor.position.block();
        let r = INTERACTABLE_SEARCH_RADIUS;
        let mut found = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let pos = center.offset(dx, dy, dz);
                    let sounds = self
                        .cx
                        .world()
                        .material_at(&actor.world, pos)
                        .and_then(|m| interaction_sounds(&m));
                    if let Some(sounds) = sounds {
                        found.push((pos, sounds));
                    }
                }
            }
        }
        found
    }
}

impl EffectBehavior for GhostBlockEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self
            .cx
            .world()
            .actor(actor)
            .is_some_and(|a| !self.nearby_interactables(&a).is_empty()))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let found = self.nearby_interactables(&snapshot);
        let Some((pos, (open, close))) = self.cx.pick(&found).copied() else {
            debug!(actor = %actor, effect = GHOST_BLOCK_KEY, "nothing to operate");
            return Ok(());
        };
        let kind = if self.cx.chance(0.5) { open } else { close };
        let pitch = varied_pitch(&self.cx, INTERACTION_PITCH_VARIANCE);
        debug!(actor = %actor, effect = GHOST_BLOCK_KEY, ?pos, sound = kind, "ghost interaction");
        self.cx.channel().play_sound(
            actor,
            kind,
            pos.bottom_center().raised(0.5),
            INTERACTION_VOLUME,
            pitch,
        )?;
        Ok(())
    }
}

// ============================================================================
// Peripheral particle
// ============================================================================

/// Key of the peripheral-particle effect.
pub const PERIPHERAL_PARTICLE_KEY: &str = "peripheral_particle";

const PERIPHERAL_DISTANCE: f64 = 3.0;
const PERIPHERAL_MIN_YAW: f64 = 45.0;
const PERIPHERAL_MAX_YAW: f64 = 75.0;
const PERIPHERAL_MAX_PITCH: f64 = 20.0;
const PERIPHERAL_MAX_RISE: f64 = 0.85;
const PERIPHERAL_SPREAD: f32 = 0.05;

/// A wisp of smoke at the edge of the actor's field of view.
#[derive(Debug)]
pub struct PeripheralParticleEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl PeripheralParticleEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                PERIPHERAL_PARTICLE_KEY,
                "Smoke drifts at the edge of vision.",
                Duration::from_secs(90),
            ),
            cx,
        }
    }

    /// A point beside the line of sight, off to either side.
    fn peripheral_spot(&self, actor: &ActorSnapshot) -> Vec3 {
        let look = actor.look.normalized().unwrap_or(Vec3::new(0.0, 0.0, 1.0));
        let heading = look.z.atan2(look.x);
        let elevation = look.y.clamp(-1.0, 1.0).asin();
        let (yaw, pitch) = self.cx.with_rng(|rng| {
            let side = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let yaw = rng.random_range(PERIPHERAL_MIN_YAW..=PERIPHERAL_MAX_YAW) * side;
            let pitch = rng.random_range(-PERIPHERAL_MAX_PITCH..=PERIPHERAL_MAX_PITCH);
            (yaw.to_radians(), pitch.to_radians())
        });
        let rise = (elevation + pitch)
            .sin()
            .clamp(-PERIPHERAL_MAX_RISE, PERIPHERAL_MAX_RISE);
        let flat = (1.0 - rise * rise).sqrt();
        let angle = heading + yaw;
        let direction = Vec3::new(angle.cos() * flat, rise, angle.sin() * flat);
        actor.eye + direction * PERIPHERAL_DISTANCE
    }
}

impl EffectBehavior for PeripheralParticleEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let spot = self.peripheral_spot(&snapshot);
        if !self.cx.world().is_passable(&snapshot.world, spot.block()) {
            debug!(actor = %actor, effect = PERIPHERAL_PARTICLE_KEY, "peripheral spot is solid");
            return Ok(());
        }
        let count = self.cx.with_rng(|rng| rng.random_range(1..=3_u32));
        self.cx
            .channel()
            .spawn_particles(actor, PERIPHERAL_PARTICLE, spot, count, PERIPHERAL_SPREAD)?;
        Ok(())
    }
}

// ============================================================================
// Fake damage
// ============================================================================

/// Key of the fake-damage effect.
pub const FAKE_DAMAGE_KEY: &str = "fake_damage";

const MIN_HEALTH: f64 = 4.0;
const HURT_VOLUME: f32 = 16.0;

/// The actor's screen flinches or they hear themselves get hurt.
#[derive(Debug)]
pub struct FakeDamageEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl FakeDamageEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                FAKE_DAMAGE_KEY,
                "Shows a hurt flash or plays the hurt sound without any damage.",
                Duration::from_secs(40),
            ),
            cx,
        }
    }
}

impl EffectBehavior for FakeDamageEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self
            .cx
            .world()
            .actor(actor)
            .is_some_and(|a| a.alive && a.mode.is_interactive() && a.health > MIN_HEALTH))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let (flash, sound) = self.cx.with_rng(|rng| match rng.random_range(0..3) {
            0 => (true, false),
            1 => (false, true),
            _ => (true, true),
        });
        debug!(actor = %actor, effect = FAKE_DAMAGE_KEY, flash, sound, "fake damage");
        if flash {
            self.cx.channel().show_hurt_flash(actor)?;
        }
        if sound {
            self.cx
                .channel()
                .play_sound(actor, HURT_SOUND, snapshot.position, HURT_VOLUME, 1.0)?;
        }
        Ok(())
    }
}
