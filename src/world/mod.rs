//! Read-side view of the host simulation.
//!
//! The engine never owns world state. Everything it needs to know about
//! participants, terrain and creatures arrives through [`WorldView`], which
//! the host implements over its own data. [`memory::InMemoryWorld`] is a
//! self-contained implementation used by the simulator and the tests.

pub mod memory;

use std::fmt::{self, Debug};

use serde::Serialize;

use crate::geometry::{BlockPos, Vec3};

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a connected participant.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ActorId(pub String);

impl ActorId {
    /// Creates an actor id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a real (host-owned) creature.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CreatureId(pub i32);

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a world (dimension instance).
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
pub struct WorldId(pub String);

impl WorldId {
    /// Creates a world id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The conventional name of the primary overworld.
    #[must_use]
    pub fn overworld() -> Self {
        Self::new("world")
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position inside a specific world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// World the position belongs to.
    pub world: WorldId,
    /// Coordinates.
    pub position: Vec3,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub const fn new(world: WorldId, position: Vec3) -> Self {
        Self { world, position }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Environment class of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Realm {
    /// Surface world with a day cycle.
    #[default]
    Overworld,
    /// First hostile realm.
    Nether,
    /// Second hostile realm.
    End,
}

/// Interaction mode of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Normal play.
    #[default]
    Survival,
    /// Restricted normal play.
    Adventure,
    /// Unrestricted building.
    Creative,
    /// Non-interactive observer.
    Spectator,
}

impl GameMode {
    /// Whether illusions may target a participant in this mode.
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Survival | Self::Adventure)
    }
}

/// Point-in-time state of a connected participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    /// Participant id.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Current world.
    pub world: WorldId,
    /// Environment class of `world`.
    pub realm: Realm,
    /// Feet position.
    pub position: Vec3,
    /// Eye position.
    pub eye: Vec3,
    /// Look direction (need not be normalized).
    pub look: Vec3,
    /// Vertical rotation in degrees; positive looks down.
    pub pitch: f64,
    /// Current velocity.
    pub velocity: Vec3,
    /// Combined light level at the feet, 0 to 15.
    pub light: u8,
    /// Time of day in ticks, 0 to 23999.
    pub world_time: u64,
    /// Interaction mode.
    pub mode: GameMode,
    /// Whether the participant is alive.
    pub alive: bool,
    /// Current health points; 20 is full.
    pub health: f64,
    /// Riding something.
    pub in_vehicle: bool,
    /// Gliding.
    pub gliding: bool,
    /// Swimming.
    pub swimming: bool,
}

impl ActorSnapshot {
    /// Feet location.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.world.clone(), self.position)
    }

    /// Eye location.
    #[must_use]
    pub fn eye_location(&self) -> Location {
        Location::new(self.world.clone(), self.eye)
    }

    /// Whether the participant is occupied with movement that would make a
    /// close-range figure implausible.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_vehicle || self.gliding || self.swimming
    }
}

/// Point-in-time state of a real creature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatureSnapshot {
    /// Creature id.
    pub id: CreatureId,
    /// Kind name, e.g. `"cow"`.
    pub kind: String,
    /// Current world.
    pub world: WorldId,
    /// Feet position.
    pub position: Vec3,
    /// Eye height above the feet.
    pub eye_height: f64,
    /// Whether the kind is a passive animal.
    pub passive: bool,
    /// Whether the host's autonomous behavior is enabled.
    pub autonomous: bool,
}

impl CreatureSnapshot {
    /// Eye position.
    #[must_use]
    pub const fn eye(&self) -> Vec3 {
        self.position.raised(self.eye_height)
    }
}

// ============================================================================
// World View
// ============================================================================

/// Read access to the host simulation, plus the one authoritative toggle the
/// puppeting families need.
pub trait WorldView: Send + Sync + Debug {
    /// Currently connected participants, in a stable order.
    fn connected_actors(&self) -> Vec<ActorId>;

    /// Snapshot of a participant, or `None` once disconnected.
    fn actor(&self, id: &ActorId) -> Option<ActorSnapshot>;

    /// Whether the participant is still connected.
    fn is_connected(&self, id: &ActorId) -> bool {
        self.actor(id).is_some()
    }

    /// Surface reference height of a world.
    fn sea_level(&self, world: &WorldId) -> i32;

    /// Lowest buildable height of a world.
    fn min_height(&self, world: &WorldId) -> i32;

    /// Whether a figure could stand inside the block.
    fn is_passable(&self, world: &WorldId, pos: BlockPos) -> bool;

    /// Material name of a block, or `None` when not loaded.
    fn material_at(&self, world: &WorldId, pos: BlockPos) -> Option<String>;

    /// Whether a solid block lies on the segment between two points.
    fn is_occluded(&self, world: &WorldId, from: Vec3, to: Vec3) -> bool;

    /// Creatures within `radius` of `center`.
    fn nearby_creatures(&self, world: &WorldId, center: Vec3, radius: f64)
    -> Vec<CreatureSnapshot>;

    /// Snapshot of one creature, or `None` once it is gone.
    fn creature(&self, id: CreatureId) -> Option<CreatureSnapshot>;

    /// Enables or disables a creature's autonomous behavior.
    ///
    /// Returns `false` when the creature no longer exists.
    fn set_creature_autonomy(&self, id: CreatureId, enabled: bool) -> bool;

    /// Item shown in a participant's inventory slot, `None` when empty.
    fn inventory_slot(&self, actor: &ActorId, slot: u16) -> Option<String>;

    /// Wear of the item in `slot`, `None` when the slot is empty or the item
    /// does not wear out.
    fn item_durability(&self, _actor: &ActorId, _slot: u16) -> Option<ItemDurability> {
        None
    }
}

/// Wear state of a damageable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDurability {
    /// Damage taken so far.
    pub damage: u16,
    /// Damage at which the item breaks.
    pub max: u16,
}

impl ItemDurability {
    /// Damage left before the item breaks.
    #[must_use]
    pub const fn remaining(self) -> u16 {
        self.max.saturating_sub(self.damage)
    }
}

/// Participants other than `exclude` within `radius` of `center` in the same world.
#[must_use]
pub fn actors_near(
    world: &dyn WorldView,
    center: &Location,
    radius: f64,
    exclude: Option<&ActorId>,
) -> Vec<ActorSnapshot> {
    let radius_sq = radius * radius;
    world
        .connected_actors()
        .iter()
        .filter(|id| Some(*id) != exclude)
        .filter_map(|id| world.actor(id))
        .filter(|a| a.world == center.world && a.position.distance_squared(center.position) <= radius_sq)
        .collect()
}

/// Whether nobody else stands within `radius` of `actor`, or `actor` is the
/// only one connected.
#[must_use]
pub fn is_isolated(world: &dyn WorldView, actor: &ActorSnapshot, radius: f64) -> bool {
    world.connected_actors().len() <= 1
        || actors_near(world, &actor.location(), radius, Some(&actor.id)).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_modes() {
        assert!(GameMode::Survival.is_interactive());
        assert!(GameMode::Adventure.is_interactive());
        assert!(!GameMode::Creative.is_interactive());
        assert!(!GameMode::Spectator.is_interactive());
    }

    #[test]
    fn actor_id_display() {
        assert_eq!(ActorId::new("steve").to_string(), "steve");
    }

    #[test]
    fn creature_eye_is_raised() {
        let c = CreatureSnapshot {
            id: CreatureId(3),
            kind: "cow".into(),
            world: WorldId::overworld(),
            position: Vec3::new(1.0, 64.0, 1.0),
            eye_height: 1.3,
            passive: true,
            autonomous: true,
        };
        assert!((c.eye().y - 65.3).abs() < 1e-9);
    }

    #[test]
    fn isolation_ignores_other_worlds() {
        let world = memory::InMemoryWorld::flat();
        let nether = WorldId::new("world_nether");
        world.place_actor("a", &WorldId::overworld(), Vec3::new(0.0, 64.0, 0.0));
        assert!(is_isolated(&world, &world.actor(&ActorId::new("a")).unwrap(), 64.0));

        world.place_actor("b", &nether, Vec3::new(1.0, 64.0, 0.0));
        assert!(is_isolated(&world, &world.actor(&ActorId::new("a")).unwrap(), 64.0));

        world.place_actor("c", &WorldId::overworld(), Vec3::new(10.0, 64.0, 0.0));
        assert!(!is_isolated(&world, &world.actor(&ActorId::new("a")).unwrap(), 64.0));
        assert!(is_isolated(&world, &world.actor(&ActorId::new("a")).unwrap(), 5.0));
    }
}
