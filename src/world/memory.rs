//! In-memory world used by the simulator and the tests.
//!
//! Terrain is a flat slab per world (solid below the configured ground level,
//! air above) with optional per-block overrides. All state lives in `DashMap`s
//! so tests can mutate the world while an engine is reading it.

use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;

use super::{
    ActorId, ActorSnapshot, CreatureId, CreatureSnapshot, GameMode, ItemDurability, Location, Realm,
    WorldId, WorldView,
};
use crate::geometry::{BlockPos, Vec3};

/// Eye height of a standing participant.
pub const ACTOR_EYE_HEIGHT: f64 = 1.62;

const DEFAULT_SEA_LEVEL: i32 = 63;
const DEFAULT_MIN_HEIGHT: i32 = -64;
const RAY_STEP: f64 = 0.2;

const PASSABLE_MATERIALS: [&str; 6] = [
    "air",
    "cave_air",
    "short_grass",
    "tall_grass",
    "torch",
    "snow",
];

/// A flat, mutable world.
#[derive(Debug)]
pub struct InMemoryWorld {
    actors: DashMap<ActorId, ActorSnapshot>,
    creatures: DashMap<CreatureId, CreatureSnapshot>,
    ground: DashMap<WorldId, i32>,
    sea_levels: DashMap<WorldId, i32>,
    blocks: DashMap<(WorldId, BlockPos), String>,
    inventory: DashMap<(ActorId, u16), String>,
    durability: DashMap<(ActorId, u16), ItemDurability>,
    next_creature: AtomicI32,
}

impl Default for InMemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorld {
    /// Creates an empty world with no terrain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actors: DashMap::new(),
            creatures: DashMap::new(),
            ground: DashMap::new(),
            sea_levels: DashMap::new(),
            blocks: DashMap::new(),
            inventory: DashMap::new(),
            durability: DashMap::new(),
            next_creature: AtomicI32::new(1),
        }
    }

    /// Creates a world with a flat overworld at ground level 64.
    #[must_use]
    pub fn flat() -> Self {
        let world = Self::new();
        world.set_ground_level(&WorldId::overworld(), 64);
        world
    }

    /// Makes every block below `y` solid in `world`.
    pub fn set_ground_level(&self, world: &WorldId, y: i32) {
        self.ground.insert(world.clone(), y);
    }

    /// Overrides the surface reference height of `world`.
    pub fn set_sea_level(&self, world: &WorldId, y: i32) {
        self.sea_levels.insert(world.clone(), y);
    }

    /// Places a block, overriding the terrain.
    pub fn set_block(&self, world: &WorldId, pos: BlockPos, material: &str) {
        self.blocks
            .insert((world.clone(), pos), material.to_ascii_lowercase());
    }

    /// Inserts or replaces a participant.
    pub fn upsert_actor(&self, snapshot: ActorSnapshot) {
        self.actors.insert(snapshot.id.clone(), snapshot);
    }

    /// Applies `f` to a participant's snapshot if connected.
    pub fn update_actor(&self, id: &ActorId, f: impl FnOnce(&mut ActorSnapshot)) {
        if let Some(mut a) = self.actors.get_mut(id) {
            f(&mut a);
        }
    }

    /// Disconnects a participant.
    pub fn remove_actor(&self, id: &ActorId) {
        self.actors.remove(id);
        self.inventory.retain(|(owner, _), _| owner != id);
        self.durability.retain(|(owner, _), _| owner != id);
    }

    /// Adds a creature and returns its id.
    pub fn add_creature(&self, kind: &str, world: &WorldId, position: Vec3, passive: bool) -> CreatureId {
        let id = CreatureId(self.next_creature.fetch_add(1, Ordering::SeqCst));
        self.creatures.insert(
            id,
            CreatureSnapshot {
                id,
                kind: kind.to_string(),
                world: world.clone(),
                position,
                eye_height: 1.3,
                passive,
                autonomous: true,
            },
        );
        id
    }

    /// Removes a creature.
    pub fn remove_creature(&self, id: CreatureId) {
        self.creatures.remove(&id);
    }

    /// Sets or clears an inventory slot.
    pub fn set_inventory_slot(&self, actor: &ActorId, slot: u16, item: Option<&str>) {
        match item {
            Some(item) => {
                self.inventory.insert((actor.clone(), slot), item.to_string());
            }
            None => {
                self.inventory.remove(&(actor.clone(), slot));
                self.durability.remove(&(actor.clone(), slot));
            }
        }
    }

    /// Puts a damageable item with the given wear into a slot.
    pub fn set_worn_item(&self, actor: &ActorId, slot: u16, item: &str, damage: u16, max: u16) {
        self.set_inventory_slot(actor, slot, Some(item));
        self.durability
            .insert((actor.clone(), slot), ItemDurability { damage, max });
    }
}

/// A standing, alive, daytime survival participant at `position`, looking +z.
#[must_use]
pub fn actor_at(id: &str, world: &WorldId, position: Vec3) -> ActorSnapshot {
    ActorSnapshot {
        id: ActorId::new(id),
        name: id.to_string(),
        world: world.clone(),
        realm: Realm::Overworld,
        position,
        eye: position.raised(ACTOR_EYE_HEIGHT),
        look: Vec3::new(0.0, 0.0, 1.0),
        pitch: 0.0,
        velocity: Vec3::ZERO,
        light: 15,
        world_time: 6_000,
        mode: GameMode::Survival,
        alive: true,
        health: 20.0,
        in_vehicle: false,
        gliding: false,
        swimming: false,
    }
}

impl WorldView for InMemoryWorld {
    fn connected_actors(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.actors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn actor(&self, id: &ActorId) -> Option<ActorSnapshot> {
        self.actors.get(id).map(|a| a.clone())
    }

    fn sea_level(&self, world: &WorldId) -> i32 {
        self.sea_levels.get(world).map_or(DEFAULT_SEA_LEVEL, |v| *v)
    }

    fn min_height(&self, _world: &WorldId) -> i32 {
        DEFAULT_MIN_HEIGHT
    }

    fn is_passable(&self, world: &WorldId, pos: BlockPos) -> bool {
        self.material_at(world, pos)
            .is_none_or(|m| PASSABLE_MATERIALS.contains(&m.as_str()))
    }

    fn material_at(&self, world: &WorldId, pos: BlockPos) -> Option<String> {
        if let Some(m) = self.blocks.get(&(world.clone(), pos)) {
            return Some(m.clone());
        }
        let ground = self.ground.get(world).map(|g| *g);
        let material = match ground {
            Some(g) if pos.y == g - 1 => "grass_block",
            Some(g) if pos.y < g - 1 && pos.y >= DEFAULT_MIN_HEIGHT => "stone",
            _ => "air",
        };
        Some(material.to_string())
    }

    fn is_occluded(&self, world: &WorldId, from: Vec3, to: Vec3) -> bool {
        let distance = from.distance(to);
        if distance <= RAY_STEP {
            return false;
        }
        let Some(dir) = (to - from).normalized() else {
            return false;
        };
        let start_block = from.block();
        let end_block = to.block();
        let mut travelled = RAY_STEP;
        while travelled < distance {
            let block = (from + dir * travelled).block();
            if block != start_block && block != end_block && !self.is_passable(world, block) {
                return true;
            }
            travelled += RAY_STEP;
        }
        false
    }

    fn nearby_creatures(
        &self,
        world: &WorldId,
        center: Vec3,
        radius: f64,
    ) -> Vec<CreatureSnapshot> {
        let radius_sq = radius * radius;
        let mut found: Vec<CreatureSnapshot> = self
            .creatures
            .iter()
            .filter(|c| &c.world == world && c.position.distance_squared(center) <= radius_sq)
            .map(|c| c.clone())
            .collect();
        found.sort_by_key(|c| c.id);
        found
    }

    fn creature(&self, id: CreatureId) -> Option<CreatureSnapshot> {
        self.creatures.get(&id).map(|c| c.clone())
    }

    fn set_creature_autonomy(&self, id: CreatureId, enabled: bool) -> bool {
        self.creatures.get_mut(&id).is_some_and(|mut c| {
            c.autonomous = enabled;
            true
        })
    }

    fn inventory_slot(&self, actor: &ActorId, slot: u16) -> Option<String> {
        self.inventory
            .get(&(actor.clone(), slot))
            .map(|v| v.clone())
    }

    fn item_durability(&self, actor: &ActorId, slot: u16) -> Option<ItemDurability> {
        self.durability.get(&(actor.clone(), slot)).map(|v| *v)
    }
}

impl InMemoryWorld {
    /// Convenience for placing a participant and returning its location.
    pub fn place_actor(&self, id: &str, world: &WorldId, position: Vec3) -> Location {
        self.upsert_actor(actor_at(id, world, position));
        Location::new(world.clone(), position)
    }
}
