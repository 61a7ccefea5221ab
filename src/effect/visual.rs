//! Visual illusions restored by a delayed step: blocks that briefly look like
//! something else or vanish, doors that swing on their own, a structure that
//! was never built, lingering particles and items that trade places or wear.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::catalog::{
    BlueprintBlock, LINGERING_PARTICLES, STRUCTURE_BLUEPRINTS, VANISHING_MATERIALS,
    flicker_substitutes, is_openable,
};
use super::{EffectBehavior, EffectDescriptor, require_actor};
use crate::context::EffectContext;
use crate::error::EffectError;
use crate::geometry::{BlockPos, Vec3, has_line_of_sight, ring_offset};
use crate::sequence::{SequenceStep, TimedSequence};
use crate::world::{ActorId, ActorSnapshot, ItemDurability, Location};

/// Random block within `h` horizontally and `v` vertically of `center`.
fn random_block_near(cx: &EffectContext, center: BlockPos, h: i32, v: i32) -> BlockPos {
    cx.with_rng(|rng| {
        center.offset(
            rng.random_range(-h..=h),
            rng.random_range(-v..=v),
            rng.random_range(-h..=h),
        )
    })
}

// ============================================================================
// Block flicker
// ============================================================================

/// Key of the block flicker effect.
pub const BLOCK_FLICKER_KEY: &str = "block_flicker";

const FLICKER_HORIZONTAL_RADIUS: i32 = 8;
const FLICKER_VERTICAL_RADIUS: i32 = 4;
const FLICKER_ATTEMPTS: usize = 40;
const FLICKER_MIN_TICKS: u64 = 10;
const FLICKER_MAX_TICKS: u64 = 20;
const MIN_LIGHT: u8 = 5;

/// A nearby block swaps to a related material for a moment.
#[derive(Debug)]
pub struct BlockFlickerEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl BlockFlickerEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                BLOCK_FLICKER_KEY,
                "A nearby block briefly changes into a similar one.",
                Duration::from_secs(75),
            ),
            cx,
        }
    }

    /// A random nearby block with at least one substitute, and the substitute.
    fn pick_block(&self, actor: &ActorSnapshot) -> Option<(BlockPos, &'static str)> {
        let center = actor.position.block();
        for _ in 0..FLICKER_ATTEMPTS {
            let pos = random_block_near(
                &self.cx,
                center,
                FLICKER_HORIZONTAL_RADIUS,
                FLICKER_VERTICAL_RADIUS,
            );
            let Some(material) = self.cx.world().material_at(&actor.world, pos) else {
                continue;
            };
            if let Some(substitute) = self.cx.pick(flicker_substitutes(&material)).copied() {
                return Some((pos, substitute));
            }
        }
        None
    }
}

impl EffectBehavior for BlockFlickerEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self
            .cx
            .world()
            .actor(actor)
            .is_some_and(|a| a.light > MIN_LIGHT))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let Some((pos, substitute)) = self.pick_block(&snapshot) else {
            debug!(actor = %actor, effect = BLOCK_FLICKER_KEY, "no block to flicker");
            return Ok(());
        };
        self.cx.channel().show_block_override(actor, pos, substitute)?;

        let ticks = self
            .cx
            .with_rng(|rng| rng.random_range(FLICKER_MIN_TICKS..=FLICKER_MAX_TICKS));
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(BLOCK_FLICKER_KEY).then(ticks, SequenceStep::ClearBlock(pos)),
        );
        debug!(actor = %actor, effect = BLOCK_FLICKER_KEY, ?pos, substitute, ticks, "block flickered");
        Ok(())
    }
}

// ============================================================================
// Block vanish
// ============================================================================

/// Key of the block vanish effect.
pub const BLOCK_VANISH_KEY: &str = "block_vanish";

const VANISH_RADIUS: i32 = 5;
const VANISH_ELIGIBILITY_SAMPLES: usize = 10;
const VANISH_ATTEMPTS: usize = 40;
const VANISH_MIN_TICKS: u64 = 15;
const VANISH_MAX_TICKS: u64 = 30;

/// A nearby solid block disappears for a moment.
#[derive(Debug)]
pub struct BlockVanishEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl BlockVanishEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                BLOCK_VANISH_KEY,
                "A nearby solid block briefly vanishes.",
                Duration::from_secs(30),
            ),
            cx,
        }
    }

    fn sample(&self, actor: &ActorSnapshot, attempts: usize) -> Option<BlockPos> {
        let center = actor.position.block();
        (0..attempts)
            .map(|_| random_block_near(&self.cx, center, VANISH_RADIUS, VANISH_RADIUS))
            .find(|pos| {
                self.cx
                    .world()
                    .material_at(&actor.world, *pos)
                    .is_some_and(|m| VANISHING_MATERIALS.contains(&m.as_str()))
            })
    }
}

impl EffectBehavior for BlockVanishEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self
            .cx
            .world()
            .actor(actor)
            .is_some_and(|a| self.sample(&a, VANISH_ELIGIBILITY_SAMPLES).is_some()))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let Some(pos) = self.sample(&snapshot, VANISH_ATTEMPTS) else {
            debug!(actor = %actor, effect = BLOCK_VANISH_KEY, "no block to hide");
            return Ok(());
        };
        self.cx.channel().show_block_override(actor, pos, "air")?;
        let ticks = self
            .cx
            .with_rng(|rng| rng.random_range(VANISH_MIN_TICKS..=VANISH_MAX_TICKS));
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(BLOCK_VANISH_KEY).then(ticks, SequenceStep::ClearBlock(pos)),
        );
        debug!(actor = %actor, effect = BLOCK_VANISH_KEY, ?pos, ticks, "block vanished");
        Ok(())
    }
}

// ============================================================================
// Visual interact
// ============================================================================

/// Key of the visual interact effect.
pub const VISUAL_INTERACT_KEY: &str = "visual_interact";

const INTERACT_RADIUS: i32 = 6;
const INTERACT_MIN_TICKS: u64 = 8;
const INTERACT_MAX_TICKS: u64 = 15;

/// Visual state of `material` with its open flag flipped.
///
/// Materials without state are treated as closed.
#[must_use]
pub fn toggled_open_state(material: &str) -> String {
    let (name, open) = match material.split_once('[') {
        Some((name, state)) => (name, state.contains("open=true")),
        None => (material, false),
    };
    format!("{name}[open={}]", !open)
}

/// A nearby door, trapdoor or fence gate appears to swing by itself.
#[derive(Debug)]
pub struct VisualInteractEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl VisualInteractEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                VISUAL_INTERACT_KEY,
                "A nearby door, trapdoor or fence gate appears to open or close.",
                Duration::from_secs(60),
            ),
            cx,
        }
    }

    fn nearby_openables(&self, actor: &ActorSnapshot) -> Vec<(BlockPos, String)> {
        let center = actor.position.block();
        let r = INTERACT_RADIUS;
        let mut found = Vec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let pos = center.offset(dx, dy, dz);
                    if let Some(material) = self.cx.world().material_at(&actor.world, pos) {
                        let name = material.split('[').next().unwrap_or_default();
                        if is_openable(name) {
                            found.push((pos, material));
                        }
                    }
                }
            }
        }
        found
    }
}

impl EffectBehavior for VisualInteractEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self
            .cx
            .world()
            .actor(actor)
            .is_some_and(|a| !self.nearby_openables(&a).is_empty()))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let found = self.nearby_openables(&snapshot);
        let Some((pos, material)) = self.cx.pick(&found) else {
            debug!(actor = %actor, effect = VISUAL_INTERACT_KEY, "nothing to swing");
            return Ok(());
        };
        let shown = toggled_open_state(material);
        self.cx.channel().show_block_override(actor, *pos, &shown)?;
        let ticks = self
            .cx
            .with_rng(|rng| rng.random_range(INTERACT_MIN_TICKS..=INTERACT_MAX_TICKS));
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(VISUAL_INTERACT_KEY).then(ticks, SequenceStep::ClearBlock(*pos)),
        );
        debug!(actor = %actor, effect = VISUAL_INTERACT_KEY, ?pos, %shown, ticks, "block swung");
        Ok(())
    }
}

// ============================================================================
// Visual structure
// ============================================================================

/// Key of the visual structure effect.
pub const VISUAL_STRUCTURE_KEY: &str = "visual_structure";

const STRUCTURE_SEARCH_RADIUS: f64 = 128.0;
const STRUCTURE_ATTEMPTS: usize = 50;
const STRUCTURE_VERTICAL_SEARCH: i32 = 10;
const STRUCTURE_MIN_TICKS: u64 = 40;
const STRUCTURE_MAX_TICKS: u64 = 80;

/// Horizontal reach of a blueprint from its base block.
fn blueprint_reach(blueprint: &[BlueprintBlock]) -> f64 {
    blueprint
        .iter()
        .map(|((x, _, z), _)| f64::from(x * x + z * z).sqrt())
        .fold(0.0, f64::max)
}

/// A small strange structure stands somewhere in view for a few seconds.
#[derive(Debug)]
pub struct VisualStructureEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl VisualStructureEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                VISUAL_STRUCTURE_KEY,
                "A small, strange structure appears briefly.",
                Duration::from_secs(90),
            ),
            cx,
        }
    }

    /// Whether `base` has a solid floor and room for every raised block.
    fn fits(&self, actor: &ActorSnapshot, base: BlockPos, blueprint: &[BlueprintBlock]) -> bool {
        let world = self.cx.world();
        if !world.is_passable(&actor.world, base) || world.is_passable(&actor.world, base.offset(0, -1, 0)) {
            return false;
        }
        blueprint
            .iter()
            .filter(|((_, y, _), _)| *y > 0)
            .all(|((x, y, z), _)| world.is_passable(&actor.world, base.offset(*x, *y, *z)))
    }

    /// A visible base block the blueprint fits on.
    fn find_base(&self, actor: &ActorSnapshot, blueprint: &[BlueprintBlock]) -> Option<BlockPos> {
        let reach = (STRUCTURE_SEARCH_RADIUS - blueprint_reach(blueprint) + 5.0).max(0.0);
        let eye = actor.eye_location();
        for _ in 0..STRUCTURE_ATTEMPTS {
            let column = self
                .cx
                .with_rng(|rng| actor.position + ring_offset(rng, 0.0, reach))
                .block();
            let found = (column.y - STRUCTURE_VERTICAL_SEARCH..=column.y + STRUCTURE_VERTICAL_SEARCH)
                .rev()
                .map(|y| BlockPos::new(column.x, y, column.z))
                .find(|base| self.fits(actor, *base, blueprint));
            let Some(base) = found else {
                continue;
            };
            let target = Location::new(actor.world.clone(), base.bottom_center().raised(0.5));
            if has_line_of_sight(self.cx.world(), Some(&eye), Some(&target)) {
                return Some(base);
            }
        }
        None
    }
}

impl EffectBehavior for VisualStructureEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let Some(blueprint) = self.cx.pick(STRUCTURE_BLUEPRINTS).copied() else {
            return Ok(());
        };
        let Some(base) = self.find_base(&snapshot, blueprint) else {
            debug!(actor = %actor, effect = VISUAL_STRUCTURE_KEY, "no placement in view");
            return Ok(());
        };

        let mut shown = Vec::with_capacity(blueprint.len());
        for ((x, y, z), material) in blueprint {
            let pos = base.offset(*x, *y, *z);
            if let Err(e) = self.cx.channel().show_block_override(actor, pos, material) {
                for pos in shown {
                    let _ = self.cx.channel().clear_block_override(actor, pos);
                }
                return Err(e.into());
            }
            shown.push(pos);
        }

        let ticks = self
            .cx
            .with_rng(|rng| rng.random_range(STRUCTURE_MIN_TICKS..=STRUCTURE_MAX_TICKS));
        debug!(actor = %actor, effect = VISUAL_STRUCTURE_KEY, ?base, blocks = shown.len(), ticks, "structure shown");
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(VISUAL_STRUCTURE_KEY).then(ticks, SequenceStep::ClearBlocks(shown)),
        );
        Ok(())
    }
}

// ============================================================================
// Persistent particle
// ============================================================================

/// Key of the persistent particle effect.
pub const PERSISTENT_PARTICLE_KEY: &str = "persistent_particle";

const LINGER_RADIUS: f64 = 20.0;
const LINGER_VERTICAL: f64 = 5.0;
const LINGER_ATTEMPTS: usize = 20;
/// Sub-ticks between bursts.
pub const LINGER_INTERVAL: u64 = 5;
/// Bursts per trigger, the first sent immediately.
pub const LINGER_BURSTS: u64 = 8;
const LINGER_COUNT: u32 = 3;
const LINGER_SPREAD: f32 = 0.2;

/// Particles hang in one spot for a couple of seconds.
#[derive(Debug)]
pub struct PersistentParticleEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl PersistentParticleEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                PERSISTENT_PARTICLE_KEY,
                "Particles linger at one spot nearby.",
                Duration::from_secs(50),
            ),
            cx,
        }
    }

    fn random_spot(&self, actor: &ActorSnapshot) -> Vec3 {
        self.cx.with_rng(|rng| {
            let offset = ring_offset(rng, 0.0, LINGER_RADIUS);
            actor.position + offset.raised(rng.random_range(-LINGER_VERTICAL..=LINGER_VERTICAL))
        })
    }

    /// An open spot near the actor, or any spot once the attempts run out.
    fn pick_spot(&self, actor: &ActorSnapshot) -> Vec3 {
        (0..LINGER_ATTEMPTS)
            .map(|_| self.random_spot(actor))
            .find(|spot| self.cx.world().is_passable(&actor.world, spot.block()))
            .unwrap_or_else(|| self.random_spot(actor))
    }
}

impl EffectBehavior for PersistentParticleEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor))
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        let snapshot = require_actor(&self.cx, actor)?;
        let kind = self.cx.pick(LINGERING_PARTICLES).copied().unwrap_or("smoke");
        let spot = self.pick_spot(&snapshot);
        self.cx
            .channel()
            .spawn_particles(actor, kind, spot, LINGER_COUNT, LINGER_SPREAD)?;

        let sequence = (1..LINGER_BURSTS).fold(TimedSequence::new(PERSISTENT_PARTICLE_KEY), |seq, _| {
            seq.then(
                LINGER_INTERVAL,
                SequenceStep::Particles {
                    kind: kind.to_string(),
                    position: spot,
                    count: LINGER_COUNT,
                    spread: LINGER_SPREAD,
                },
            )
        });
        self.cx.sequences().schedule(actor, sequence);
        debug!(actor = %actor, effect = PERSISTENT_PARTICLE_KEY, particle = kind, ?spot, "particles lingering");
        Ok(())
    }
}

// ============================================================================
// Inventory shift
// ============================================================================

/// Key of the inventory shift effect.
pub const INVENTORY_SHIFT_KEY: &str = "inventory_shift";

/// Main inventory and hotbar slots the shift may touch.
pub const SHIFT_SLOTS: std::ops::RangeInclusive<u16> = 9..=44;

const MIN_ITEMS: usize = 2;
const MIN_CHANGED: usize = 2;
const MAX_CHANGED: usize = 4;
const SHIFT_MIN_TICKS: u64 = 20;
const SHIFT_MAX_TICKS: u64 = 40;

/// A few inventory slots show each other's items for a moment.
#[derive(Debug)]
pub struct InventoryShiftEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl InventoryShiftEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                INVENTORY_SHIFT_KEY,
                "Items in the inventory appear to swap places for a moment.",
                Duration::from_secs(75),
            ),
            cx,
        }
    }

    fn contents(&self, actor: &ActorId) -> Vec<(u16, Option<String>)> {
        SHIFT_SLOTS
            .map(|slot| (slot, self.cx.world().inventory_slot(actor, slot)))
            .collect()
    }
}

impl EffectBehavior for InventoryShiftEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        if !self.cx.world().is_connected(actor) {
            return Ok(false);
        }
        let filled = self
            .contents(actor)
            .iter()
            .filter(|(_, item)| item.is_some())
            .count();
        Ok(filled >= MIN_ITEMS)
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        if !self.cx.world().is_connected(actor) {
            return Err(EffectError::ActorUnavailable(actor.to_string()));
        }
        let original = self.contents(actor);
        let mut shuffled: Vec<Option<String>> = original.iter().map(|(_, item)| item.clone()).collect();
        self.cx.shuffle(&mut shuffled);

        let mut changed: Vec<(u16, Option<String>)> = original
            .iter()
            .zip(shuffled)
            .filter(|((_, before), after)| before != after)
            .map(|((slot, _), after)| (*slot, after))
            .collect();
        if changed.is_empty() {
            debug!(actor = %actor, effect = INVENTORY_SHIFT_KEY, "shuffle changed nothing");
            return Ok(());
        }
        self.cx.shuffle(&mut changed);
        let wanted = self.cx.with_rng(|rng| rng.random_range(MIN_CHANGED..=MAX_CHANGED));
        changed.truncate(wanted);

        let mut shown = Vec::with_capacity(changed.len());
        for (slot, item) in &changed {
            if let Err(e) = self
                .cx
                .channel()
                .show_inventory_slot_override(actor, *slot, item.as_deref())
            {
                // Undo what was already shown before reporting.
                for slot in shown {
                    let _ = self.cx.channel().clear_inventory_slot_override(actor, slot);
                }
                return Err(e.into());
            }
            shown.push(*slot);
        }

        let ticks = self
            .cx
            .with_rng(|rng| rng.random_range(SHIFT_MIN_TICKS..=SHIFT_MAX_TICKS));
        debug!(actor = %actor, effect = INVENTORY_SHIFT_KEY, slots = shown.len(), ticks, "inventory shifted");
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(INVENTORY_SHIFT_KEY).then(ticks, SequenceStep::ClearSlots(shown)),
        );
        Ok(())
    }
}

// ============================================================================
// Item durability
// ============================================================================

/// Key of the item durability effect.
pub const ITEM_DURABILITY_KEY: &str = "item_durability";

/// Armor, inventory, hotbar and offhand slots whose wear may be faked.
pub const WEAR_SLOTS: std::ops::RangeInclusive<u16> = 5..=45;

const MIN_REMAINING: u16 = 5;
const MIN_EXTRA_WEAR: u16 = 5;
const MAX_EXTRA_WEAR: u16 = 20;
const WEAR_TICKS: u64 = 10;

/// A worn item looks more worn than it is for half a second.
#[derive(Debug)]
pub struct ItemDurabilityEffect {
    descriptor: EffectDescriptor,
    cx: Arc<EffectContext>,
}

impl ItemDurabilityEffect {
    /// Creates the effect.
    #[must_use]
    pub fn new(cx: Arc<EffectContext>) -> Self {
        Self {
            descriptor: EffectDescriptor::new(
                ITEM_DURABILITY_KEY,
                "An item briefly appears to lose durability.",
                Duration::from_secs(40),
            ),
            cx,
        }
    }

    /// Slots holding an item with wear left to fake, with that item's wear.
    fn worn_slots(&self, actor: &ActorId) -> Vec<(u16, ItemDurability)> {
        WEAR_SLOTS
            .filter_map(|slot| {
                self.cx
                    .world()
                    .item_durability(actor, slot)
                    .filter(|d| d.remaining() > MIN_REMAINING)
                    .map(|d| (slot, d))
            })
            .collect()
    }
}

impl EffectBehavior for ItemDurabilityEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn can_trigger(&self, actor: &ActorId) -> Result<bool, EffectError> {
        Ok(self.cx.world().is_connected(actor) && !self.worn_slots(actor).is_empty())
    }

    fn trigger(&self, actor: &ActorId) -> Result<(), EffectError> {
        if !self.cx.world().is_connected(actor) {
            return Err(EffectError::ActorUnavailable(actor.to_string()));
        }
        let slots = self.worn_slots(actor);
        let Some((slot, wear)) = self.cx.pick(&slots).copied() else {
            debug!(actor = %actor, effect = ITEM_DURABILITY_KEY, "no worn item");
            return Ok(());
        };
        let extra = self
            .cx
            .with_rng(|rng| rng.random_range(MIN_EXTRA_WEAR..=MAX_EXTRA_WEAR));
        let shown = wear.damage.saturating_add(extra).min(wear.max);
        self.cx.channel().show_item_damage(actor, slot, shown)?;
        self.cx.sequences().schedule(
            actor,
            TimedSequence::new(ITEM_DURABILITY_KEY).then(WEAR_TICKS, SequenceStep::ClearSlots(vec![slot])),
        );
        debug!(actor = %actor, effect = ITEM_DURABILITY_KEY, slot, shown, "item wear faked");
        Ok(())
    }
}
